use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

/// Key under which the webhook payload carries the graph maker parameters.
pub const REQUEST_KEY: &str = "graph_maker_req";

/// Key the response graph is written back under.
pub const RESPONSE_KEY: &str = "graph_maker_rsp";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert in creating detailed graphs. You know how to arrange(visualize) actors on a graph beautifully.";

/// Large enough that real inputs always fit in a single chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 20_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("no {0} field")]
    MissingField(&'static str),

    #[error("field {field} must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("no users field")]
    NoUsers,

    #[error("failed to parse user ID: {0}")]
    InvalidUserId(String),

    #[error("chunk_size must be a positive integer, got {0}")]
    InvalidChunkSize(String),
}

/// Validated parameters of one graph maker invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    /// Namespace prefix for every platform reference the run generates.
    pub reference: String,
    pub user_msg: String,
    pub system_msg: String,
    pub chunk_size: usize,
    pub users: Vec<i64>,
    pub open_api_key: String,
    pub sim_api_key: String,
    pub workspace_id: String,
    /// Record that triggered the run; the confirmation comment goes here.
    pub event_actor_id: Option<String>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("reference", &self.reference)
            .field("user_msg_chars", &self.user_msg.chars().count())
            .field("system_msg", &self.system_msg)
            .field("chunk_size", &self.chunk_size)
            .field("users", &self.users)
            .field("open_api_key", &"<redacted>")
            .field("sim_api_key", &"<redacted>")
            .field("workspace_id", &self.workspace_id)
            .field("event_actor_id", &self.event_actor_id)
            .finish()
    }
}

/// A payload field decoded to its expected type, or a marker that the type
/// did not match.
#[derive(Deserialize)]
#[serde(untagged)]
enum Typed<T> {
    Valid(T),
    Invalid(IgnoredAny),
}

impl<T> Typed<T> {
    fn require(self, field: &'static str, expected: &'static str) -> Result<T, RequestError> {
        match self {
            Typed::Valid(value) => Ok(value),
            Typed::Invalid(IgnoredAny) => Err(RequestError::InvalidType { field, expected }),
        }
    }
}

/// User ids arrive as numeric strings or as plain numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserId {
    Number(i64),
    Text(String),
    Other(Value),
}

impl UserId {
    fn parse(self) -> Result<i64, RequestError> {
        match self {
            UserId::Number(id) => Ok(id),
            UserId::Text(s) => s.parse().map_err(|_| RequestError::InvalidUserId(s)),
            UserId::Other(value) => Err(RequestError::InvalidUserId(value.to_string())),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawPayload {
    #[serde(rename = "ref")]
    reference: Option<Typed<String>>,
    graph_maker_req: Option<Typed<Map<String, Value>>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawRequest {
    open_api_key: Option<Typed<String>>,
    system_msg: Option<Typed<String>>,
    user_msg: Option<Typed<String>>,
    chunk_size: Option<Typed<Number>>,
    users: Option<Typed<Vec<UserId>>>,
    sim_api_key: Option<Typed<String>>,
    workspace_id: Option<Typed<String>>,
    #[serde(rename = "ref")]
    reference: Option<Typed<String>>,
    event_actor_id: Option<Typed<String>>,
}

impl Request {
    /// Decode and validate a webhook payload.
    ///
    /// `ref` is read from the top level of the payload, falling back to
    /// `graph_maker_req.ref`. Nothing here touches the network.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, RequestError> {
        let not_an_object = || RequestError::InvalidType {
            field: REQUEST_KEY,
            expected: "an object",
        };
        let outer: RawPayload =
            serde_json::from_value(Value::Object(payload.clone())).map_err(|_| not_an_object())?;
        let req = outer
            .graph_maker_req
            .ok_or(RequestError::MissingField(REQUEST_KEY))?
            .require(REQUEST_KEY, "an object")?;
        let raw: RawRequest =
            serde_json::from_value(Value::Object(req)).map_err(|_| not_an_object())?;

        let open_api_key = required_str(raw.open_api_key, "open_api_key")?;
        let system_msg = optional_str(raw.system_msg, "system_msg")?
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let user_msg = required_str(raw.user_msg, "user_msg")?;
        let chunk_size = chunk_size(raw.chunk_size)?;
        let users = users(raw.users)?;
        let sim_api_key = required_str(raw.sim_api_key, "sim_api_key")?;
        let workspace_id = required_str(raw.workspace_id, "workspace_id")?;
        let reference = match optional_str(outer.reference, "ref")?.filter(|s| !s.is_empty()) {
            Some(r) => r,
            None => required_str(raw.reference, "ref")?,
        };
        let event_actor_id =
            optional_str(raw.event_actor_id, "event_actor_id")?.filter(|s| !s.is_empty());

        Ok(Self {
            reference,
            user_msg,
            system_msg,
            chunk_size,
            users,
            open_api_key,
            sim_api_key,
            workspace_id,
            event_actor_id,
        })
    }
}

fn optional_str(
    value: Option<Typed<String>>,
    field: &'static str,
) -> Result<Option<String>, RequestError> {
    value.map(|v| v.require(field, "a string")).transpose()
}

fn required_str(value: Option<Typed<String>>, field: &'static str) -> Result<String, RequestError> {
    optional_str(value, field)?
        .filter(|s| !s.is_empty())
        .ok_or(RequestError::MissingField(field))
}

fn chunk_size(value: Option<Typed<Number>>) -> Result<usize, RequestError> {
    let Some(value) = value else {
        return Ok(DEFAULT_CHUNK_SIZE);
    };
    let value = value.require("chunk_size", "a number")?;

    let size = match value.as_u64() {
        Some(v) => Some(v),
        // Payloads routed through JSON tooling often carry integers as floats.
        None => value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64),
    };

    match size.and_then(|s| usize::try_from(s).ok()) {
        Some(s) if s > 0 => Ok(s),
        _ => Err(RequestError::InvalidChunkSize(value.to_string())),
    }
}

fn users(value: Option<Typed<Vec<UserId>>>) -> Result<Vec<i64>, RequestError> {
    let entries = value
        .ok_or(RequestError::NoUsers)?
        .require("users", "an array")?;
    if entries.is_empty() {
        return Err(RequestError::NoUsers);
    }
    entries.into_iter().map(UserId::parse).collect()
}
