use super::*;
use anyhow::{Result, anyhow};
use graph_maker_core::form_schema::Section;
use graph_maker_core::{Edge, Node};
use graph_maker_platform::{AccessTarget, FormTemplate, LinkType, NewActor, Position};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    SystemForms,
    CustomForms,
    LinkTypes,
    CreateFormTemplate(String),
    GrantAccess(AccessTarget, String, i64),
    CreateActor {
        reference: String,
        title: String,
        form_id: i64,
    },
    CreateLayerActor(String, i64),
    CreateLink {
        link_type: i64,
        source: String,
        target: String,
    },
    AddActorToLayer {
        layer: String,
        actor: String,
        position: Position,
    },
    AddEdgeToLayer {
        layer: String,
        link: String,
        source: i64,
        target: i64,
    },
    CreateComment(String, String),
}

/// Records every call and hands out sequential ids.
struct FakePlatform {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI64,
    system_forms: Option<Vec<FormTemplate>>,
    custom_forms: Option<Vec<FormTemplate>>,
    link_types: Option<Vec<LinkType>>,
    fail_comment: bool,
    fail_placement: bool,
}

impl FakePlatform {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(0),
            system_forms: Some(vec![form(1, "Graphs"), form(2, "Layers"), form(9, "Tasks")]),
            custom_forms: Some(vec![form(3, "GraphMakerForm.")]),
            link_types: Some(vec![
                LinkType {
                    id: 8,
                    name: "relation".into(),
                },
                LinkType {
                    id: 4,
                    name: "hierarchy".into(),
                },
            ]),
            fail_comment: false,
            fail_placement: false,
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(*c)).count()
    }
}

fn form(id: i64, title: &str) -> FormTemplate {
    FormTemplate {
        id,
        title: title.into(),
    }
}

impl Platform for FakePlatform {
    async fn system_forms(&self, _workspace_id: &str) -> Result<Option<Vec<FormTemplate>>> {
        self.record(Call::SystemForms);
        Ok(self.system_forms.clone())
    }

    async fn custom_forms(&self, _workspace_id: &str) -> Result<Option<Vec<FormTemplate>>> {
        self.record(Call::CustomForms);
        Ok(self.custom_forms.clone())
    }

    async fn link_types(&self, _workspace_id: &str) -> Result<Option<Vec<LinkType>>> {
        self.record(Call::LinkTypes);
        Ok(self.link_types.clone())
    }

    async fn create_form_template(
        &self,
        _workspace_id: &str,
        title: &str,
        sections: &[Section],
    ) -> Result<i64> {
        assert!(sections.is_empty());
        self.record(Call::CreateFormTemplate(title.into()));
        Ok(self.id())
    }

    async fn grant_access(&self, target: AccessTarget, object_id: &str, user_id: i64) -> Result<()> {
        self.record(Call::GrantAccess(target, object_id.into(), user_id));
        Ok(())
    }

    async fn create_actor(&self, actor: &NewActor) -> Result<String> {
        self.record(Call::CreateActor {
            reference: actor.reference.clone(),
            title: actor.title.clone(),
            form_id: actor.form_id,
        });
        Ok(format!("actor-{}", self.id()))
    }

    async fn create_layer_actor(&self, title: &str, form_id: i64) -> Result<String> {
        self.record(Call::CreateLayerActor(title.into(), form_id));
        Ok(format!("layer-{}", self.id()))
    }

    async fn create_link(
        &self,
        link_type: i64,
        _workspace_id: &str,
        source: &str,
        target: &str,
    ) -> Result<String> {
        self.record(Call::CreateLink {
            link_type,
            source: source.into(),
            target: target.into(),
        });
        Ok(format!("link-{}", self.id()))
    }

    async fn add_actor_to_layer(
        &self,
        layer_id: &str,
        actor_id: &str,
        position: Position,
    ) -> Result<i64> {
        self.record(Call::AddActorToLayer {
            layer: layer_id.into(),
            actor: actor_id.into(),
            position,
        });
        if self.fail_placement {
            return Err(anyhow!("Platform request failed (500): boom"));
        }
        Ok(100 + self.id())
    }

    async fn add_edge_to_layer(
        &self,
        layer_id: &str,
        link_id: &str,
        source_placement: i64,
        target_placement: i64,
    ) -> Result<()> {
        self.record(Call::AddEdgeToLayer {
            layer: layer_id.into(),
            link: link_id.into(),
            source: source_placement,
            target: target_placement,
        });
        Ok(())
    }

    async fn create_comment(&self, record_id: &str, text: &str) -> Result<()> {
        self.record(Call::CreateComment(record_id.into(), text.into()));
        if self.fail_comment {
            return Err(anyhow!("comments disabled"));
        }
        Ok(())
    }
}

/// Replies with queued outputs in order and records the prompts it saw.
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn graphs(graphs: &[Graph]) -> Self {
        Self::new(
            graphs
                .iter()
                .map(|g| Ok(serde_json::to_string(g).unwrap()))
                .collect(),
        )
    }

    fn prompts(&self) -> Vec<(String, String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CompletionBackend for ScriptedBackend {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, system: &str, user: &str, schema: &StructuredSchema) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.into(), user.into(), schema.name.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected completion for {:?}", user))
    }
}

fn request(user_msg: &str) -> Request {
    Request {
        reference: "abc".into(),
        user_msg: user_msg.into(),
        system_msg: graph_maker_core::DEFAULT_SYSTEM_PROMPT.into(),
        chunk_size: graph_maker_core::DEFAULT_CHUNK_SIZE,
        users: vec![1],
        open_api_key: "sk".into(),
        sim_api_key: "sim".into(),
        workspace_id: "ws".into(),
        event_actor_id: None,
    }
}

fn a_to_b() -> Graph {
    Graph::new(
        vec![Node::new("n1", "A", 0, 0), Node::new("n2", "B", 1, 0)],
        vec![Edge::new("n1", "n2")],
    )
}

fn maker(
    platform: FakePlatform,
    backend: ScriptedBackend,
) -> GraphMaker<FakePlatform, ScriptedBackend> {
    GraphMaker::new(platform, backend, GraphMakerConfig::default())
}

#[tokio::test]
async fn replays_nodes_then_edges_in_order() {
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[a_to_b()]));

    let graph = maker.run(&request("A->B")).await.unwrap();

    assert_eq!(graph, a_to_b());
    assert_eq!(
        maker.platform().calls(),
        vec![
            Call::SystemForms,
            Call::CustomForms,
            Call::LinkTypes,
            Call::CreateActor {
                reference: "".into(),
                title: "abc".into(),
                form_id: 1,
            },
            Call::GrantAccess(AccessTarget::Actor, "actor-1".into(), 1),
            Call::CreateLayerActor("Layer".into(), 2),
            Call::CreateLink {
                link_type: 4,
                source: "actor-1".into(),
                target: "layer-2".into(),
            },
            Call::GrantAccess(AccessTarget::Actor, "layer-2".into(), 1),
            Call::CreateActor {
                reference: "abc.A".into(),
                title: "A".into(),
                form_id: 3,
            },
            Call::AddActorToLayer {
                layer: "layer-2".into(),
                actor: "actor-4".into(),
                position: Position { x: 0, y: 0 },
            },
            Call::CreateActor {
                reference: "abc.B".into(),
                title: "B".into(),
                form_id: 3,
            },
            Call::AddActorToLayer {
                layer: "layer-2".into(),
                actor: "actor-6".into(),
                position: Position { x: 50, y: 0 },
            },
            Call::CreateLink {
                link_type: 4,
                source: "actor-4".into(),
                target: "actor-6".into(),
            },
            Call::AddEdgeToLayer {
                layer: "layer-2".into(),
                link: "link-8".into(),
                source: 105,
                target: 107,
            },
        ]
    );
}

#[tokio::test]
async fn sends_system_prompt_and_text_with_graph_schema() {
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[a_to_b()]));
    let mut req = request("A->B");
    req.system_msg = "Draw it".into();

    maker.run(&req).await.unwrap();

    assert_eq!(
        maker.completion.prompts(),
        vec![(
            "Draw it".to_string(),
            "A->B".to_string(),
            "structured_output".to_string()
        )]
    );
    let properties = &maker.schema().schema["properties"];
    assert!(properties["nodes"].is_object());
    assert!(properties["edges"].is_object());
}

#[tokio::test]
async fn unknown_edge_endpoint_replays_nothing() {
    let graph = Graph::new(
        vec![Node::new("n1", "A", 0, 0)],
        vec![Edge::new("n1", "n9")],
    );
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[graph]));

    let err = maker.run(&request("A")).await.unwrap_err();

    assert!(matches!(&err, RunError::UnresolvedNode(id) if id == "n9"));
    assert_eq!(err.to_string(), "no actor for node n9");
    let platform = maker.platform();
    assert_eq!(platform.count(|c| matches!(c, Call::CreateLink { .. })), 1);
    assert_eq!(platform.count(|c| matches!(c, Call::AddActorToLayer { .. })), 0);
    assert_eq!(platform.count(|c| matches!(c, Call::AddEdgeToLayer { .. })), 0);
    assert_eq!(
        platform.count(|c| matches!(c, Call::CreateActor { form_id: 3, .. })),
        0
    );
}

#[tokio::test]
async fn oversized_coordinates_fail_before_any_node_is_created() {
    let graph = Graph::new(
        vec![
            Node::new("n1", "A", 0, 0),
            Node::new("n2", "B", i64::MAX / 10, 0),
        ],
        vec![Edge::new("n1", "n2")],
    );
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[graph]));

    let err = maker.run(&request("A->B")).await.unwrap_err();

    assert_eq!(err.kind(), "completion");
    let message = format!("{:#}", anyhow::Error::from(err));
    assert!(message.contains("node n2 coordinate out of range"), "{}", message);
    let platform = maker.platform();
    assert_eq!(
        platform.count(|c| matches!(c, Call::CreateActor { form_id: 3, .. })),
        0
    );
    assert_eq!(platform.count(|c| matches!(c, Call::AddActorToLayer { .. })), 0);
}

#[tokio::test]
async fn node_references_are_percent_encoded() {
    let graph = Graph::new(vec![Node::new("n1", "Big Node", -2, 3)], vec![]);
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[graph]));
    let mut req = request("x");
    req.reference = "my ref".into();

    maker.run(&req).await.unwrap();

    let calls = maker.platform().calls();
    assert!(calls.contains(&Call::CreateActor {
        reference: "my+ref.Big+Node".into(),
        title: "Big Node".into(),
        form_id: 3,
    }));
    assert!(calls.iter().any(|c| matches!(
        c,
        Call::AddActorToLayer { position: Position { x: -100, y: 150 }, .. }
    )));
}

#[tokio::test]
async fn existing_node_form_is_reused() {
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[a_to_b()]));

    maker.run(&request("A->B")).await.unwrap();

    let platform = maker.platform();
    assert_eq!(
        platform.count(|c| matches!(c, Call::CreateFormTemplate(_))),
        0
    );
    assert_eq!(
        platform.count(|c| matches!(
            c,
            Call::GrantAccess(AccessTarget::FormTemplate | AccessTarget::TemplateActors, ..)
        )),
        0
    );
}

#[tokio::test]
async fn missing_node_form_is_created_and_shared() {
    let mut platform = FakePlatform::new();
    platform.custom_forms = Some(vec![form(7, "Other")]);
    let maker = maker(platform, ScriptedBackend::graphs(&[a_to_b()]));
    let mut req = request("A->B");
    req.users = vec![1, 2];

    maker.run(&req).await.unwrap();

    let calls = maker.platform().calls();
    assert_eq!(
        &calls[2..7],
        &[
            Call::CreateFormTemplate("GraphMakerForm.".into()),
            Call::GrantAccess(AccessTarget::FormTemplate, "1".into(), 1),
            Call::GrantAccess(AccessTarget::TemplateActors, "1".into(), 1),
            Call::GrantAccess(AccessTarget::FormTemplate, "1".into(), 2),
            Call::GrantAccess(AccessTarget::TemplateActors, "1".into(), 2),
        ]
    );
    assert_eq!(
        maker
            .platform()
            .count(|c| matches!(c, Call::CreateActor { form_id: 1, title, .. } if title != "abc")),
        2
    );
}

#[tokio::test]
async fn missing_workspace_objects_are_fatal() {
    let cases: [(fn(&mut FakePlatform), &str); 6] = [
        (|p: &mut FakePlatform| p.system_forms = None, "no forms"),
        (
            |p: &mut FakePlatform| p.system_forms = Some(vec![form(1, "Graphs")]),
            "no 'Layers' system form",
        ),
        (
            |p: &mut FakePlatform| p.system_forms = Some(vec![form(2, "Layers")]),
            "no 'Graphs' system form",
        ),
        (|p: &mut FakePlatform| p.custom_forms = None, "no custom forms"),
        (|p: &mut FakePlatform| p.link_types = None, "no links"),
        (
            |p: &mut FakePlatform| p.link_types = Some(vec![]),
            "no 'hierarchy' link type",
        ),
    ];

    for (setup, expected) in cases {
        let mut platform = FakePlatform::new();
        setup(&mut platform);
        let maker = maker(platform, ScriptedBackend::new(vec![]));

        let err = maker.run(&request("A")).await.unwrap_err();

        assert_eq!(err.kind(), "platform_state");
        assert_eq!(err.to_string(), expected);
        assert_eq!(
            maker
                .platform()
                .count(|c| matches!(c, Call::CreateActor { .. } | Call::CreateLink { .. })),
            0
        );
    }
}

#[tokio::test]
async fn comment_links_to_the_layer() {
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[a_to_b()]));
    let mut req = request("A->B");
    req.event_actor_id = Some("event-1".into());

    maker.run(&req).await.unwrap();

    let calls = maker.platform().calls();
    assert_eq!(
        calls.last(),
        Some(&Call::CreateComment(
            "event-1".into(),
            "The graph is created based on the event content:\r\n\
             https://sim.simulator.company/actors_graph/ws/graph/actor-1/layers/layer-2"
                .into()
        ))
    );
}

#[tokio::test]
async fn no_comment_without_event_record() {
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[a_to_b()]));

    maker.run(&request("A->B")).await.unwrap();

    assert_eq!(
        maker
            .platform()
            .count(|c| matches!(c, Call::CreateComment(..))),
        0
    );
}

#[tokio::test]
async fn failed_comment_does_not_fail_the_run() {
    let mut platform = FakePlatform::new();
    platform.fail_comment = true;
    let maker = maker(platform, ScriptedBackend::graphs(&[a_to_b()]));
    let mut req = request("A->B");
    req.event_actor_id = Some("event-1".into());

    let graph = maker.run(&req).await.unwrap();

    assert_eq!(graph, a_to_b());
}

#[tokio::test]
async fn completion_failure_is_fatal() {
    let maker = maker(
        FakePlatform::new(),
        ScriptedBackend::new(vec![Err(anyhow!("LLM request failed (429): slow down"))]),
    );

    let err = maker.run(&request("A")).await.unwrap_err();

    assert_eq!(err.kind(), "completion");
    assert!(format!("{:#}", anyhow::Error::from(err)).contains("slow down"));
    assert_eq!(
        maker
            .platform()
            .count(|c| matches!(c, Call::AddActorToLayer { .. })),
        0
    );
}

#[tokio::test]
async fn undecodable_completion_is_fatal() {
    let maker = maker(
        FakePlatform::new(),
        ScriptedBackend::new(vec![Ok(r#"{"nodes": []}"#.into())]),
    );

    let err = maker.run(&request("A")).await.unwrap_err();

    assert!(matches!(err, RunError::Completion(_)));
}

#[tokio::test]
async fn platform_failure_names_the_operation() {
    let mut platform = FakePlatform::new();
    platform.fail_placement = true;
    let maker = maker(platform, ScriptedBackend::graphs(&[a_to_b()]));

    let err = maker.run(&request("A->B")).await.unwrap_err();

    assert!(matches!(err, RunError::Platform { op: "place node on layer", .. }));
    assert_eq!(
        maker
            .platform()
            .count(|c| matches!(c, Call::AddActorToLayer { .. })),
        1
    );
}

#[tokio::test]
async fn first_chunk_policy_sends_only_the_first_chunk() {
    let maker = maker(FakePlatform::new(), ScriptedBackend::graphs(&[a_to_b()]));
    let mut req = request("abcdefg");
    req.chunk_size = 3;

    let graph = maker.run(&req).await.unwrap();

    assert_eq!(graph, a_to_b());
    let prompts = maker.completion.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].1, "abc");
}

#[tokio::test]
async fn all_chunks_policy_replays_every_chunk_with_its_own_ids() {
    // Both responses use n1/n2; each must resolve within its own chunk.
    let second = Graph::new(
        vec![Node::new("n1", "C", 0, 1), Node::new("n2", "D", 1, 1)],
        vec![Edge::new("n2", "n1")],
    );
    let config = GraphMakerConfig {
        chunk_policy: ChunkPolicy::AllChunks,
        ..Default::default()
    };
    let maker = GraphMaker::new(
        FakePlatform::new(),
        ScriptedBackend::graphs(&[a_to_b(), second.clone()]),
        config,
    );
    let mut req = request("ABCD");
    req.chunk_size = 2;

    let graph = maker.run(&req).await.unwrap();

    let mut expected = a_to_b();
    expected.append(second);
    assert_eq!(graph, expected);

    let users: Vec<String> = maker
        .completion
        .prompts()
        .into_iter()
        .map(|p| p.1)
        .collect();
    assert_eq!(users, vec!["AB", "CD"]);

    let calls = maker.platform().calls();
    let d_actor = calls
        .iter()
        .position(|c| matches!(c, Call::CreateActor { title, .. } if title == "D"))
        .unwrap();
    // D (actor-11) -> C (actor-9)
    assert!(calls[d_actor..].contains(&Call::CreateLink {
        link_type: 4,
        source: "actor-11".into(),
        target: "actor-9".into(),
    }));
    assert_eq!(
        maker
            .platform()
            .count(|c| matches!(c, Call::CreateLayerActor(..))),
        1
    );
}

#[test]
fn chunk_policy_parses_its_display_form() {
    for policy in [ChunkPolicy::FirstChunk, ChunkPolicy::AllChunks] {
        assert_eq!(policy.to_string().parse::<ChunkPolicy>(), Ok(policy));
    }
    assert!("every".parse::<ChunkPolicy>().is_err());
}
