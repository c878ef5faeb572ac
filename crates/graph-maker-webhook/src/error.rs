use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use graph_maker_core::form_schema::FormSchemaError;
use graph_maker_engine::RunError;
use serde_json::json;
use std::any::Any;
use std::backtrace::Backtrace;
use tracing::error;

/// Failure of a webhook call, rendered as `{"error": {"kind", "message"}}`.
#[derive(Debug)]
pub enum ApiError {
    /// The body is not a JSON object.
    Payload(JsonRejection),
    Run(RunError),
    Schema(FormSchemaError),
    Internal(anyhow::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Payload(e)
    }
}

impl From<RunError> for ApiError {
    fn from(e: RunError) -> Self {
        ApiError::Run(e)
    }
}

impl From<FormSchemaError> for ApiError {
    fn from(e: FormSchemaError) -> Self {
        ApiError::Schema(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Payload(_)
            | ApiError::Run(RunError::Validation(_))
            | ApiError::Schema(_) => StatusCode::BAD_REQUEST,
            ApiError::Run(RunError::UnresolvedNode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Run(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Payload(_) => "validation",
            ApiError::Run(e) => e.kind(),
            ApiError::Schema(_) => "schema",
            ApiError::Internal(_) => "internal",
        }
    }

    fn into_report(self) -> anyhow::Error {
        match self {
            ApiError::Payload(e) => anyhow::Error::msg(e.body_text()),
            ApiError::Run(e) => e.into(),
            ApiError::Schema(e) => e.into(),
            ApiError::Internal(e) => e,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let report = self.into_report();
        let message = format!("{:#}", report);

        // Debug output carries the source chain and, when enabled, the backtrace.
        error!(kind, status = status.as_u16(), "Request failed: {:?}", report);

        error_body(status, kind, &message)
    }
}

fn error_body(status: StatusCode, kind: &str, message: &str) -> Response {
    let body = json!({ "error": { "kind": kind, "message": message } });
    (status, Json(body)).into_response()
}

/// Render a handler panic as an internal error, logging the panic message
/// with a captured backtrace.
pub(crate) fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "non-string panic payload"
    };
    let backtrace = Backtrace::force_capture();
    error!(
        kind = "internal",
        status = 500,
        "Request handler panicked: {}\n{}",
        detail,
        backtrace
    );

    error_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        &format!("request handler panicked: {}", detail),
    )
}
