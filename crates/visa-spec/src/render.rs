use handlebars::{Handlebars, RenderError, no_escape};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    answers::AnswerSet,
    answers_schema,
    documents::DocumentChecklist,
    requirement::RequirementLevel,
    spec::{
        field::{EntityKind, FieldOption, FieldType},
        form::FormBundle,
    },
    visibility::resolve_visibility,
};

const TEXT_TEMPLATE: &str = "\
Form: {{title}} ({{country}}/{{id}})
Status: {{status}} ({{answered}}/{{total}})
{{#if help}}Help: {{help}}
{{/if}}{{#if next}}Next field: {{next.id}} ({{next.label}})
{{else}}All required visible fields are answered.
{{/if}}Visible fields:
{{#each fields}} - {{this.id}} ({{this.label}}){{#if this.required}} [required]{{/if}}{{#if this.display}} = {{this.display}}{{/if}}
{{/each}}{{#each checklist}}Documents - {{this.title}}:
{{#each this.documents}}   * {{this.name}}{{#if this.required}} [required]{{/if}}
{{/each}}{{/each}}";

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    /// A visible required field is still unanswered.
    NeedInput,
    /// Every visible required field is answered.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// Describes a single field for render outputs.
#[derive(Debug, Clone, Serialize)]
pub struct RenderField {
    pub id: String,
    pub group: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<RequirementLevel>,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Record template for composite fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKind>,
    pub answered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderStep {
    pub id: String,
    pub title: String,
    /// Visible field ids in this step, in declaration order.
    pub fields: Vec<String>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPayload {
    pub form_id: String,
    pub country: String,
    pub form_title: String,
    pub form_version: String,
    pub status: RenderStatus,
    pub next_field_id: Option<String>,
    pub progress: RenderProgress,
    pub help: Option<String>,
    pub steps: Vec<RenderStep>,
    pub fields: Vec<RenderField>,
    pub checklist: DocumentChecklist,
    pub schema: Value,
}

/// Build the renderer payload from the bundle and the current answers.
pub fn build_render_payload(bundle: &FormBundle, answers: &AnswerSet) -> RenderPayload {
    let visibility = resolve_visibility(bundle, answers);
    let is_visible = |id: &str| visibility.get(id).copied().unwrap_or(true);

    let fields = bundle
        .fields
        .iter()
        .map(|field| RenderField {
            id: field.id.clone(),
            group: field.group.clone(),
            label: field.label.clone(),
            kind: field.kind,
            required: field.is_required(answers),
            requirement: field.requirement_level(),
            visible: is_visible(&field.id),
            current_value: answers.get(&field.id).cloned(),
            options: field.options.clone(),
            entity: field.entity,
            answered: field.has_answer(answers),
        })
        .collect::<Vec<_>>();

    let next_field_id = fields
        .iter()
        .find(|field| field.visible && field.required && !field.answered)
        .map(|field| field.id.clone());

    let total = fields.iter().filter(|field| field.visible).count();
    let answered = fields
        .iter()
        .filter(|field| field.visible && field.answered)
        .count();

    let steps = if bundle.steps.is_empty() {
        bundle
            .groups()
            .into_iter()
            .map(|group| RenderStep {
                id: group.to_string(),
                title: group.to_string(),
                fields: visible_in_groups(&fields, &[group]),
            })
            .collect()
    } else {
        bundle
            .steps
            .iter()
            .map(|step| {
                let groups: Vec<&str> = step.groups.iter().map(String::as_str).collect();
                RenderStep {
                    id: step.id.clone(),
                    title: step.title.clone(),
                    fields: visible_in_groups(&fields, &groups),
                }
            })
            .collect()
    };

    let checklist = DocumentChecklist::build(&bundle.documents, answers, |trigger| {
        bundle
            .field(trigger)
            .map(|field| field.label.clone())
            .unwrap_or_else(|| trigger.to_string())
    });

    let status = if next_field_id.is_some() {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Complete
    };

    RenderPayload {
        form_id: bundle.id.clone(),
        country: bundle.country.clone(),
        form_title: bundle.title.clone(),
        form_version: bundle.version.clone(),
        status,
        next_field_id,
        progress: RenderProgress { answered, total },
        help: bundle.description.clone(),
        steps,
        fields,
        checklist,
        schema: answers_schema::generate(bundle, &visibility, answers),
    }
}

fn visible_in_groups(fields: &[RenderField], groups: &[&str]) -> Vec<String> {
    fields
        .iter()
        .filter(|field| field.visible && groups.contains(&field.group.as_str()))
        .map(|field| field.id.clone())
        .collect()
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    json!({
        "form_id": payload.form_id,
        "country": payload.country,
        "form_title": payload.form_title,
        "form_version": payload.form_version,
        "status": payload.status.as_str(),
        "next_field_id": payload.next_field_id,
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
        },
        "help": payload.help,
        "steps": payload.steps,
        "fields": payload.fields,
        "documents": payload.checklist.groups,
        "schema": payload.schema,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> Result<String, RenderError> {
    let mut engine = Handlebars::new();
    engine.register_escape_fn(no_escape);

    let next = payload.next_field_id.as_ref().and_then(|id| {
        payload
            .fields
            .iter()
            .find(|field| &field.id == id)
            .map(|field| json!({ "id": field.id, "label": field.label }))
    });
    let fields = payload
        .fields
        .iter()
        .filter(|field| field.visible)
        .map(|field| {
            json!({
                "id": field.id,
                "label": field.label,
                "required": field.required,
                "display": field.current_value.as_ref().map(value_to_display),
            })
        })
        .collect::<Vec<_>>();

    let context = json!({
        "title": payload.form_title,
        "country": payload.country,
        "id": payload.form_id,
        "status": payload.status.as_str(),
        "answered": payload.progress.answered,
        "total": payload.progress.total,
        "help": payload.help,
        "next": next,
        "fields": fields,
        "checklist": payload.checklist.groups,
    });

    engine.render_template(TEXT_TEMPLATE, &context)
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        Value::Array(items) => format!("[{} item(s)]", items.len()),
        other => other.to_string(),
    }
}
