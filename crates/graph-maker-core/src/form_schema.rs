//! Platform form definitions and their JSON Schema rendering.
//!
//! The structured output webhook receives a form definition (sections of
//! typed fields) and answers with a JSON Schema an LLM can be constrained
//! with. Each recognised field class maps to exactly one schema shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use thiserror::Error;

pub const REQUEST_KEY: &str = "structured_output_req";
pub const RESPONSE_KEY: &str = "structured_output_rsp";

const DRAFT_2020_12: &str = "https://json-schema.org/draft/2020-12/schema";

#[derive(Debug, Error)]
pub enum FormSchemaError {
    #[error("no {0} field")]
    MissingField(&'static str),

    #[error("failed to decode form definition: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unknown item class: {0}")]
    UnknownClass(String),

    #[error("Unknown extra options source type: {0}")]
    UnknownOptionsSource(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Form {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Vec<Field>,
}

/// One field of a form section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub visibility: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub id_not_changed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOption {
    pub title: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_source: Option<OptionsSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsSource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: OptionsSourceValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsSourceValue {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaProperty>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<&'static str>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<OneOf>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneOf {
    #[serde(rename = "const")]
    pub value: String,
    pub title: String,
}

impl SchemaProperty {
    fn new(kind: &'static str, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: Some(description.into()),
            properties: BTreeMap::new(),
            required: Vec::new(),
            enum_values: None,
            one_of: None,
        }
    }
}

/// Extract the form definition from a structured output webhook payload.
pub fn form_from_payload(payload: &Map<String, Value>) -> Result<Form, FormSchemaError> {
    let req = payload
        .get(REQUEST_KEY)
        .and_then(Value::as_object)
        .ok_or(FormSchemaError::MissingField(REQUEST_KEY))?;
    let forms = req
        .get("forms")
        .filter(|v| v.is_object())
        .ok_or(FormSchemaError::MissingField("structured_output_req.forms"))?;
    Ok(Form::deserialize(forms)?)
}

/// Map every enabled field of the form to a schema property keyed by field id.
///
/// Upload fields and disabled fields are skipped, as are fields without an id.
pub fn form_properties(
    form: &Form,
) -> Result<BTreeMap<String, SchemaProperty>, FormSchemaError> {
    let mut properties = BTreeMap::new();

    for section in &form.sections {
        for field in &section.content {
            if field.visibility == "disabled" {
                continue;
            }
            let Some(schema) = field_schema(&section.title, field)? else {
                continue;
            };
            if !field.id.is_empty() {
                properties.insert(field.id.clone(), schema);
            }
        }
    }

    Ok(properties)
}

/// Build the complete `structured_output` schema document for a form.
pub fn structured_output_schema(form: &Form) -> Result<Value, FormSchemaError> {
    let properties = form_properties(form)?;
    Ok(json!({
        "$schema": DRAFT_2020_12,
        "type": "object",
        "additionalProperties": false,
        "name": "structured_output",
        "properties": properties,
    }))
}

fn field_schema(
    section: &str,
    field: &Field,
) -> Result<Option<SchemaProperty>, FormSchemaError> {
    let description = format!("Section: {}, field: {}", section, field.title);

    let schema = match field.class.as_str() {
        "edit" => SchemaProperty::new("string", description),
        "check" => SchemaProperty::new("boolean", description),
        "calendar" => calendar_schema(),
        "select" | "multiSelect" => select_schema(description, field)?,
        "upload" => return Ok(None),
        other => return Err(FormSchemaError::UnknownClass(other.to_string())),
    };

    Ok(Some(schema))
}

fn calendar_schema() -> SchemaProperty {
    let mut properties = BTreeMap::new();
    properties.insert(
        "startDate".to_string(),
        SchemaProperty::new("integer", "Date and time in unixtime"),
    );
    properties.insert(
        "endDate".to_string(),
        SchemaProperty::new("integer", "Date and time in unixtime"),
    );
    properties.insert(
        "timeZoneOffset".to_string(),
        SchemaProperty::new("integer", "time Zone Offset"),
    );
    properties.insert(
        "sendInvite".to_string(),
        SchemaProperty::new("boolean", "always false"),
    );

    SchemaProperty {
        kind: "object",
        description: None,
        properties,
        required: vec!["startDate", "endDate", "timeZoneOffset", "sendInvite"],
        enum_values: None,
        one_of: None,
    }
}

fn select_schema(
    description: String,
    field: &Field,
) -> Result<SchemaProperty, FormSchemaError> {
    let mut schema = SchemaProperty::new("string", description);

    if !field.options.is_empty() {
        schema.enum_values = Some(field.options.iter().map(|o| o.value.clone()).collect());
        schema.one_of = Some(
            field
                .options
                .iter()
                .map(|o| OneOf {
                    value: o.value.clone(),
                    title: o.title.clone(),
                })
                .collect(),
        );
    } else if let Some(source) = field.extra.as_ref().and_then(|e| e.options_source.as_ref()) {
        // Actor filters resolve their options at runtime; the field stays a plain string.
        if source.kind != "actorFilter" {
            return Err(FormSchemaError::UnknownOptionsSource(source.kind.clone()));
        }
    }

    Ok(schema)
}
