use serde_json::{Map, Value, json};

use crate::answers::AnswerSet;
use crate::spec::field::{FieldSpec, FieldType};
use crate::spec::form::FormBundle;
use crate::visibility::VisibilityMap;

/// JSON Schema describing the answers accepted for the visible fields.
///
/// Requiredness depends on the answers for `requiredIf` fields, so the
/// current answers are taken into account.
pub fn generate(bundle: &FormBundle, visibility: &VisibilityMap, answers: &AnswerSet) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in &bundle.fields {
        if !visibility.get(&field.id).copied().unwrap_or(true) {
            continue;
        }
        properties.insert(field.id.clone(), field_schema(field));
        if field.is_required(answers) {
            required.push(Value::String(field.id.clone()));
        }
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": bundle.title,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn field_schema(field: &FieldSpec) -> Value {
    let mut schema = match field.kind {
        FieldType::Text | FieldType::Textarea | FieldType::Phone => json!({ "type": "string" }),
        FieldType::Email => json!({ "type": "string", "format": "email" }),
        FieldType::Date => json!({ "type": "string", "format": "date-time" }),
        FieldType::Number => json!({ "type": ["number", "string"] }),
        FieldType::Checkbox => json!({ "type": "boolean" }),
        FieldType::Select | FieldType::Radio => {
            json!({ "type": "string", "enum": field.option_values().collect::<Vec<_>>() })
        }
        FieldType::Multiselect => json!({
            "type": "array",
            "items": { "type": "string", "enum": field.option_values().collect::<Vec<_>>() },
        }),
        // Stored lists may also arrive JSON-encoded or wrapped under `value`.
        FieldType::Composite => json!({
            "anyOf": [
                { "type": "array", "items": { "type": "object" } },
                { "type": "string" },
                { "type": "object", "required": ["value"] },
            ]
        }),
        FieldType::Address | FieldType::File => json!({ "type": ["string", "object"] }),
    };

    if let Some(map) = schema.as_object_mut() {
        map.insert("title".into(), Value::String(field.label.clone()));
        if let Some(help) = &field.help_text {
            map.insert("description".into(), Value::String(help.clone()));
        }
        if let Some(rules) = &field.validation {
            if let Some(pattern) = &rules.pattern {
                map.insert("pattern".into(), Value::String(pattern.clone()));
            }
            if let Some(min_len) = rules.min_length {
                map.insert("minLength".into(), Value::from(min_len));
            }
            if let Some(max_len) = rules.max_length {
                map.insert("maxLength".into(), Value::from(max_len));
            }
            if let Some(min) = rules.min {
                map.insert("minimum".into(), Value::from(min));
            }
            if let Some(max) = rules.max {
                map.insert("maximum".into(), Value::from(max));
            }
        }
    }
    schema
}

/// JSON Schema of the bundle format itself, for authoring tools.
pub fn bundle_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(FormBundle)).unwrap_or(Value::Null)
}
