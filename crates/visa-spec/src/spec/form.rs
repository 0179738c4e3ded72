use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::document::DocumentSpec;
use crate::spec::field::FieldSpec;

/// Ordered page of the form, made of one or more field groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Complete schema for one country / form id pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormBundle {
    pub country: String,
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepSpec>,
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentSpec>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BundleError {
    #[error("field id '{0}' is declared more than once")]
    DuplicateField(String),
    #[error("step '{step}' lists group '{group}' which has no fields")]
    UnknownStepGroup { step: String, group: String },
}

/// Non-fatal findings about a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintWarning {
    /// Field or document carrying the condition.
    pub owner: String,
    /// Field id the condition reads but the bundle never declares.
    pub missing_field: String,
}

impl FormBundle {
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// Group names in declaration order.
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.fields
            .iter()
            .map(|field| field.group.as_str())
            .filter(|group| seen.insert(*group))
            .collect()
    }

    /// Structural checks a bundle must pass before it can be registered.
    pub fn check(&self) -> Result<(), BundleError> {
        let mut ids = BTreeSet::new();
        for field in &self.fields {
            if !ids.insert(field.id.as_str()) {
                return Err(BundleError::DuplicateField(field.id.clone()));
            }
        }

        let groups: BTreeSet<&str> = self
            .fields
            .iter()
            .map(|field| field.group.as_str())
            .collect();
        for step in &self.steps {
            if let Some(group) = step
                .groups
                .iter()
                .find(|group| !groups.contains(group.as_str()))
            {
                return Err(BundleError::UnknownStepGroup {
                    step: step.id.clone(),
                    group: group.clone(),
                });
            }
        }

        Ok(())
    }

    /// Conditions pointing at fields the bundle does not declare.
    ///
    /// These evaluate with the unanswered default, so they are reported
    /// rather than rejected.
    pub fn lint(&self) -> Vec<LintWarning> {
        let ids: BTreeSet<&str> = self.fields.iter().map(|field| field.id.as_str()).collect();
        let mut warnings = Vec::new();

        for field in &self.fields {
            let referenced: BTreeSet<&str> = field
                .conditions()
                .flat_map(|condition| condition.referenced_fields())
                .collect();
            for missing in referenced.into_iter().filter(|id| !ids.contains(id)) {
                warnings.push(LintWarning {
                    owner: field.id.clone(),
                    missing_field: missing.to_string(),
                });
            }
        }

        for document in &self.documents {
            for condition in &document.conditions {
                if !ids.contains(condition.question_id.as_str()) {
                    warnings.push(LintWarning {
                        owner: document.id.clone(),
                        missing_field: condition.question_id.clone(),
                    });
                }
            }
        }

        warnings
    }
}
