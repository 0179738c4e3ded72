use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::AnswerSet;
use crate::condition::Condition;
use crate::requirement::RequirementLevel;
use crate::sub_entity::{NormalizedInput, normalize_external_input};

/// Supported field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Email,
    #[serde(alias = "tel")]
    Phone,
    Number,
    Select,
    Multiselect,
    Radio,
    Checkbox,
    Date,
    Address,
    File,
    Composite,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Multiselect => "multiselect",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Address => "address",
            FieldType::File => "file",
            FieldType::Composite => "composite",
        }
    }

    pub fn has_options(&self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Multiselect | FieldType::Radio
        )
    }
}

/// Repeatable record kinds edited through a sub-entity list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Children,
    Education,
    Employment,
    Military,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Children => "children",
            EntityKind::Education => "education",
            EntityKind::Employment => "employment",
            EntityKind::Military => "military",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "children" | "child" => Ok(EntityKind::Children),
            "education" => Ok(EntityKind::Education),
            "employment" => Ok(EntityKind::Employment),
            "military" => Ok(EntityKind::Military),
            other => Err(format!("unknown entity kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// Value rules checked on visible, answered fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Replaces the default error text for any rule violation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Declarative description of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub id: String,
    pub group: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<RequirementLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_future_dates: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKind>,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, group: impl Into<String>, kind: FieldType) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            group: group.into(),
            kind,
            placeholder: None,
            help_text: None,
            options: Vec::new(),
            show_if: None,
            dependencies: Vec::new(),
            required: None,
            required_if: None,
            requirement: None,
            validation: None,
            disable_future_dates: false,
            entity: None,
        }
    }

    /// Visible iff `showIf` and every dependency hold.
    pub fn is_visible(&self, answers: &AnswerSet) -> bool {
        crate::condition::is_active(answers, self.show_if.as_ref())
            && self
                .dependencies
                .iter()
                .all(|dependency| dependency.evaluate(answers))
    }

    /// Resolves requiredness from the typed attributes first and only falls
    /// back to a marker embedded in the label.
    pub fn is_required(&self, answers: &AnswerSet) -> bool {
        if let Some(condition) = &self.required_if {
            return condition.evaluate(answers);
        }
        if let Some(required) = self.required {
            return required;
        }
        self.requirement_level() == Some(RequirementLevel::Mandatory)
    }

    pub fn requirement_level(&self) -> Option<RequirementLevel> {
        self.requirement.or_else(|| RequirementLevel::from_label(&self.label))
    }

    /// Whether the stored answer holds something. A sub-entity list that
    /// normalizes to no records counts as unanswered.
    pub fn has_answer(&self, answers: &AnswerSet) -> bool {
        if !answers.is_answered(&self.id) {
            return false;
        }
        match (self.kind, answers.get(&self.id)) {
            (FieldType::Composite, Some(value)) => !matches!(
                normalize_external_input(value),
                Ok(NormalizedInput::Empty)
            ),
            _ => true,
        }
    }

    pub fn option_values(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|option| option.value.as_str())
    }

    /// Every condition attached to the field.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.show_if
            .iter()
            .chain(self.dependencies.iter())
            .chain(self.required_if.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_stored_lists_are_unanswered() {
        let field = FieldSpec::new("children", "family", FieldType::Composite);
        let empty = AnswerSet::new().with("children", json!("{\"value\":[]}"));
        assert!(!field.has_answer(&empty));

        let filled = AnswerSet::new().with("children", json!({ "value": [{ "id": 1 }] }));
        assert!(field.has_answer(&filled));

        let text = FieldSpec::new("children", "family", FieldType::Text);
        assert!(text.has_answer(&empty));
    }

    #[test]
    fn deserializes_camel_case_descriptor() {
        let field: FieldSpec = serde_json::from_value(json!({
            "id": "spouseName",
            "group": "family",
            "type": "text",
            "label": "Spouse name",
            "showIf": { "field": "maritalStatus", "value": "married" },
            "requiredIf": { "field": "maritalStatus", "value": "married" },
            "validation": { "maxLength": 80 }
        }))
        .expect("deserialize");

        assert_eq!(field.kind, FieldType::Text);
        assert_eq!(
            field.validation.as_ref().and_then(|rules| rules.max_length),
            Some(80)
        );
        assert!(!field.is_visible(&AnswerSet::new()));
        let married = AnswerSet::new().with("maritalStatus", json!("married"));
        assert!(field.is_visible(&married));
        assert!(field.is_required(&married));
    }

    #[test]
    fn dependencies_are_anded_with_show_if() {
        let mut field = FieldSpec::new("x", "g", FieldType::Text);
        field.show_if = Some(Condition::equals("a", json!("yes")));
        field.dependencies = vec![Condition::not_equals("b", json!("no"))];

        let answers = AnswerSet::new().with("a", json!("yes"));
        assert!(field.is_visible(&answers));
        assert!(!field.is_visible(&answers.with("b", json!("no"))));
    }

    #[test]
    fn explicit_required_beats_label_marker() {
        let mut field = FieldSpec::new("familyName", "identity", FieldType::Text);
        field.label = "Family name (M)".into();
        assert!(field.is_required(&AnswerSet::new()));

        field.required = Some(false);
        assert!(!field.is_required(&AnswerSet::new()));
        assert_eq!(field.label, "Family name (M)");
    }

    #[test]
    fn tel_alias_maps_to_phone() {
        let kind: FieldType = serde_json::from_value(json!("tel")).expect("kind");
        assert_eq!(kind, FieldType::Phone);
    }
}
