use graph_maker_core::RequestError;
use thiserror::Error;

/// Why a graph maker run stopped.
///
/// Objects created on the platform before the failure are left in place.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] RequestError),

    /// An object the workspace is expected to provide is missing.
    #[error("{0}")]
    PlatformState(String),

    #[error("completion failed")]
    Completion(#[source] anyhow::Error),

    #[error("no actor for node {0}")]
    UnresolvedNode(String),

    #[error("platform call '{op}' failed")]
    Platform {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl RunError {
    /// Stable machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Validation(_) => "validation",
            RunError::PlatformState(_) => "platform_state",
            RunError::Completion(_) => "completion",
            RunError::UnresolvedNode(_) => "unresolved_node",
            RunError::Platform { .. } => "platform",
        }
    }
}

/// Attach the failing operation's name to a platform client error.
pub(crate) trait PlatformOp<T> {
    fn op(self, op: &'static str) -> Result<T, RunError>;
}

impl<T> PlatformOp<T> for anyhow::Result<T> {
    fn op(self, op: &'static str) -> Result<T, RunError> {
        self.map_err(|source| RunError::Platform { op, source })
    }
}
