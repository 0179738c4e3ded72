use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use visa_spec::{
    AnswerAction, AnswerSet, DateError, DatePolicy, DocumentChecklist, EntityKind, FormBundle,
    FormRegistry, FormState, RegistryError, RenderPayload, SubEntityList, build_render_payload,
    render_json_ui as visa_render_json_ui, render_text as visa_render_text,
    required_documents as visa_required_documents, resolve_visibility, validate,
    visibility::dependents,
};

const DEFAULT_BUNDLE: &str = include_str!("../../visa-spec/tests/fixtures/canada_visitor.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("form '{0}/{1}' is not available")]
    FormUnavailable(String, String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("render error: {0}")]
    Render(String),
    #[error("{0}")]
    Date(#[from] DateError),
    #[error("{0}")]
    InvalidArgument(String),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    bundle_json: Option<String>,
}

fn load_registry(config_json: &str) -> Result<FormRegistry, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let bundle_json = config.bundle_json.as_deref().unwrap_or(DEFAULT_BUNDLE);
    let bundle: FormBundle =
        serde_json::from_str(bundle_json).map_err(ComponentError::ConfigParse)?;

    Ok(FormRegistry::builder().register(bundle)?.build())
}

fn with_form<T>(
    country: &str,
    form_id: &str,
    config_json: &str,
    f: impl FnOnce(&FormBundle) -> Result<T, ComponentError>,
) -> Result<T, ComponentError> {
    let registry = load_registry(config_json)?;
    let bundle = registry
        .get(country, form_id)
        .ok_or_else(|| ComponentError::FormUnavailable(country.to_string(), form_id.to_string()))?;
    f(bundle)
}

fn parse_answers(answers_json: &str) -> AnswerSet {
    serde_json::from_str::<Value>(answers_json)
        .map(|value| AnswerSet::from_value(&value))
        .unwrap_or_default()
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

pub fn describe(country: &str, form_id: &str, config_json: &str) -> String {
    respond(with_form(country, form_id, config_json, encode::<FormBundle>))
}

pub fn visible_fields(
    country: &str,
    form_id: &str,
    config_json: &str,
    answers_json: &str,
) -> String {
    respond(with_form(country, form_id, config_json, |bundle| {
        let answers = parse_answers(answers_json);
        let visibility = resolve_visibility(bundle, &answers);
        let visible: Vec<&str> = bundle
            .fields
            .iter()
            .filter(|field| visibility.get(&field.id).copied().unwrap_or(true))
            .map(|field| field.id.as_str())
            .collect();
        Ok(json!({ "visible": visible, "visibility": visibility }))
    }))
}

pub fn required_documents(
    country: &str,
    form_id: &str,
    config_json: &str,
    answers_json: &str,
) -> String {
    respond(with_form(country, form_id, config_json, |bundle| {
        let answers = parse_answers(answers_json);
        Ok(json!({ "required": visa_required_documents(&bundle.documents, &answers) }))
    }))
}

pub fn document_checklist(
    country: &str,
    form_id: &str,
    config_json: &str,
    answers_json: &str,
) -> String {
    respond(with_form(country, form_id, config_json, |bundle| {
        let answers = parse_answers(answers_json);
        let checklist = DocumentChecklist::build(&bundle.documents, &answers, |trigger| {
            bundle
                .field(trigger)
                .map(|field| field.label.clone())
                .unwrap_or_else(|| trigger.to_string())
        });
        encode(&checklist)
    }))
}

pub fn validate_answers(
    country: &str,
    form_id: &str,
    config_json: &str,
    answers_json: &str,
) -> String {
    respond(with_form(country, form_id, config_json, |bundle| {
        let value: Value = serde_json::from_str(answers_json).map_err(ComponentError::ConfigParse)?;
        encode(&validate(bundle, &AnswerSet::from_value(&value)))
    }))
}

/// Writes one answer and returns the recomputed state with its validation.
pub fn submit_patch(
    country: &str,
    form_id: &str,
    config_json: &str,
    answers_json: &str,
    field_id: &str,
    value_json: &str,
) -> String {
    respond(with_form(country, form_id, config_json, |bundle| {
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::ConfigParse)?;
        let action = if value.is_null() {
            AnswerAction::Clear {
                field: field_id.to_string(),
            }
        } else {
            AnswerAction::Set {
                field: field_id.to_string(),
                value,
            }
        };
        debug!(form_id, field_id, "submit patch");
        let answers = parse_answers(answers_json).apply(action);
        let state = FormState::compute(bundle, &answers);
        let validation = validate(bundle, &answers);
        let status = if validation.valid {
            "complete"
        } else if validation.errors.is_empty() && validation.unknown_fields.is_empty() {
            "need_input"
        } else {
            "error"
        };
        Ok(json!({
            "status": status,
            "answers": answers.to_value(),
            "affected_fields": dependents(bundle, field_id),
            "visible_fields": state.visible_fields,
            "required_documents": state.required_documents,
            "validation": encode(&validation)?,
        }))
    }))
}

fn render_payload(
    country: &str,
    form_id: &str,
    config_json: &str,
    answers_json: &str,
) -> Result<RenderPayload, ComponentError> {
    with_form(country, form_id, config_json, |bundle| {
        Ok(build_render_payload(bundle, &parse_answers(answers_json)))
    })
}

pub fn render_text(country: &str, form_id: &str, config_json: &str, answers_json: &str) -> String {
    respond_string(
        render_payload(country, form_id, config_json, answers_json).and_then(|payload| {
            visa_render_text(&payload).map_err(|error| ComponentError::Render(error.to_string()))
        }),
    )
}

pub fn render_json_ui(
    country: &str,
    form_id: &str,
    config_json: &str,
    answers_json: &str,
) -> String {
    respond(
        render_payload(country, form_id, config_json, answers_json)
            .map(|payload| visa_render_json_ui(&payload)),
    )
}

/// Normalizes whatever a sub-entity editor was handed into its record list.
pub fn normalize_entities(kind: &str, raw_json: &str) -> String {
    respond(
        kind.parse::<EntityKind>()
            .map_err(ComponentError::InvalidArgument)
            .map(|kind| {
                let raw = serde_json::from_str(raw_json)
                    .unwrap_or_else(|_| Value::String(raw_json.to_string()));
                let list = SubEntityList::initialize(kind, &raw);
                let mut map = Map::new();
                map.insert("records".into(), list.to_value());
                map.insert(
                    "active".into(),
                    list.active().map(Value::from).unwrap_or(Value::Null),
                );
                Value::Object(map)
            }),
    )
}

/// Normalizes a picked date to the stored ISO form.
pub fn normalize_date(raw: &str, disable_future_dates: bool) -> String {
    respond(
        DatePolicy::new(disable_future_dates)
            .select(raw, Utc::now())
            .map(|value| json!({ "value": value }))
            .map_err(ComponentError::from),
    )
}
