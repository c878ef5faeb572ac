use super::provision::GraphTarget;
use graph_maker_platform::Platform;
use tracing::{info, warn};

pub const DEFAULT_DEEP_LINK_BASE: &str = "https://sim.simulator.company";

const COMMENT_PREFIX: &str = "The graph is created based on the event content:\r\n";

/// Browser link to a layer of a graph.
pub fn deep_link(base: &str, workspace_id: &str, target: &GraphTarget) -> String {
    format!(
        "{}/actors_graph/{}/graph/{}/layers/{}",
        base.trim_end_matches('/'),
        workspace_id,
        target.graph_id,
        target.layer_id
    )
}

pub fn comment_text(link: &str) -> String {
    format!("{}{}", COMMENT_PREFIX, link)
}

/// Post the confirmation comment. Failures are logged, never returned.
pub(crate) async fn notify<P: Platform>(platform: &P, record_id: &str, link: &str) {
    match platform.create_comment(record_id, &comment_text(link)).await {
        Ok(()) => info!("Posted graph link to record {}", record_id),
        Err(e) => warn!("Failed to comment on record {}: {:#}", record_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_points_at_the_layer() {
        let target = GraphTarget {
            graph_id: "g1".into(),
            layer_id: "l1".into(),
        };

        assert_eq!(
            deep_link(DEFAULT_DEEP_LINK_BASE, "ws", &target),
            "https://sim.simulator.company/actors_graph/ws/graph/g1/layers/l1"
        );
        assert_eq!(
            deep_link("http://localhost:3000/", "ws", &target),
            "http://localhost:3000/actors_graph/ws/graph/g1/layers/l1"
        );
    }

    #[test]
    fn comment_uses_crlf_before_link() {
        assert_eq!(
            comment_text("http://x"),
            "The graph is created based on the event content:\r\nhttp://x"
        );
    }
}
