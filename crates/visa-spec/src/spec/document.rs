use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `{questionId, value}` requirement trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCondition {
    pub question_id: String,
    pub value: Value,
}

/// Informational mapping from a document to the answer it can prefill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractableField {
    pub field_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A supporting document the applicant may have to provide.
///
/// Conditions are a flat list with AND semantics; unlike field `showIf`
/// they never nest or combine with OR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<DocumentCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extractable_fields: Vec<ExtractableField>,
}

fn default_required() -> bool {
    true
}

impl DocumentSpec {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            required: true,
            category: None,
            conditions: Vec::new(),
            extractable_fields: Vec::new(),
        }
    }

    pub fn with_condition(mut self, question_id: impl Into<String>, value: Value) -> Self {
        self.conditions.push(DocumentCondition {
            question_id: question_id.into(),
            value,
        });
        self
    }

    /// Field whose answer made this document appear, if any.
    pub fn trigger(&self) -> Option<&str> {
        self.conditions
            .first()
            .map(|condition| condition.question_id.as_str())
    }
}
