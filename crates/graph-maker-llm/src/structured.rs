//! Schema-constrained completions.
//!
//! A [`StructuredSchema`] is derived from a Rust type with `schemars` and sent
//! as the `json_schema` response format. The returned content is decoded
//! straight into that type; there is no repair pass.

use crate::{CompletionBackend, JsonSchemaFormat, ResponseFormat};
use anyhow::{Context, Result};
use schemars::JsonSchema;
use schemars::generate::SchemaSettings;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Keywords emitted by schema generation that strict structured outputs reject.
const UNSUPPORTED_KEYWORDS: &[&str] = &["format", "$schema"];

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    pub name: String,
    pub description: Option<String>,
    pub schema: Value,
    pub strict: bool,
}

impl StructuredSchema {
    /// Generate a strict, fully inlined schema for `T`.
    pub fn for_type<T: JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let settings = SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        });
        let mut schema = settings
            .into_generator()
            .into_root_schema_for::<T>()
            .to_value();
        strip_keywords(&mut schema);

        Self {
            name: name.into(),
            description: Some(description.into()),
            schema,
            strict: true,
        }
    }

    pub fn response_format(&self) -> ResponseFormat {
        ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: self.name.clone(),
                description: self.description.clone(),
                schema: self.schema.clone(),
                strict: self.strict,
            },
        }
    }
}

fn strip_keywords(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            for key in UNSUPPORTED_KEYWORDS {
                map.remove(*key);
            }
            for (key, child) in map.iter_mut() {
                match (key.as_str(), child) {
                    // Keys under `properties` are field names, not keywords.
                    ("properties", Value::Object(props)) => {
                        props.values_mut().for_each(strip_keywords)
                    }
                    (_, child) => strip_keywords(child),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_keywords),
        _ => {}
    }
}

/// Run one schema-constrained completion and decode the result as `T`.
pub async fn complete_structured<T: DeserializeOwned>(
    backend: &impl CompletionBackend,
    system: &str,
    user: &str,
    schema: &StructuredSchema,
) -> Result<T> {
    let content = backend
        .complete(system, user, schema)
        .await
        .with_context(|| format!("{} completion failed", schema.name))?;

    debug!(
        "{} raw output ({} chars) from {}",
        schema.name,
        content.len(),
        backend.model_name()
    );

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to decode {} output as JSON", schema.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Mutex;

    /// Documented sample.
    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        /// Label text
        label: String,
        count: i64,
        children: Vec<Child>,
    }

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Child {
        id: String,
    }

    struct CannedBackend {
        content: String,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl CompletionBackend for CannedBackend {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            system: &str,
            user: &str,
            schema: &StructuredSchema,
        ) -> Result<String> {
            self.calls.lock().unwrap().push((
                system.to_string(),
                user.to_string(),
                schema.name.clone(),
            ));
            Ok(self.content.clone())
        }
    }

    fn backend(content: &str) -> CannedBackend {
        CannedBackend {
            content: content.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn schema_is_inlined_and_closed() {
        let schema = StructuredSchema::for_type::<Sample>("structured_output", "test");
        let value = &schema.schema;

        assert_eq!(value["type"], "object");
        assert_eq!(value["additionalProperties"], false);
        assert_eq!(value["properties"]["label"]["description"], "Label text");
        let mut required: Vec<&str> = value["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        required.sort_unstable();
        assert_eq!(required, vec!["children", "count", "label"]);

        let child = &value["properties"]["children"]["items"];
        assert_eq!(child["type"], "object");
        assert_eq!(child["additionalProperties"], false);

        let text = value.to_string();
        assert!(!text.contains("$ref"));
        assert!(!text.contains("\"format\""));
        assert!(!text.contains("$schema"));
        assert!(schema.strict);
    }

    #[test]
    fn response_format_wraps_schema() {
        let schema = StructuredSchema::for_type::<Child>("structured_output", "desc");
        let format = serde_json::to_value(schema.response_format()).unwrap();
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["name"], "structured_output");
        assert_eq!(format["json_schema"]["description"], "desc");
        assert_eq!(format["json_schema"]["strict"], true);
        assert_eq!(format["json_schema"]["schema"]["type"], "object");
    }

    #[tokio::test]
    async fn decodes_backend_output() {
        let backend = backend(r#"{"label":"x","count":2,"children":[{"id":"c1"}]}"#);
        let schema = StructuredSchema::for_type::<Sample>("structured_output", "test");

        let sample: Sample = complete_structured(&backend, "sys", "user text", &schema)
            .await
            .unwrap();

        assert_eq!(sample.count, 2);
        assert_eq!(sample.children[0].id, "c1");
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sys");
        assert_eq!(calls[0].1, "user text");
    }

    #[tokio::test]
    async fn undecodable_output_is_an_error() {
        let backend = backend(r#"{"label":"x"}"#);
        let schema = StructuredSchema::for_type::<Sample>("structured_output", "test");

        let err = complete_structured::<Sample>(&backend, "sys", "user", &schema)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to decode structured_output"));
    }
}
