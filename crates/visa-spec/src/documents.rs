use std::collections::BTreeSet;

use serde::Serialize;

use crate::answers::AnswerSet;
use crate::condition::strict_eq;
use crate::spec::document::DocumentSpec;

/// A document applies iff every listed condition matches.
pub fn is_active(document: &DocumentSpec, answers: &AnswerSet) -> bool {
    document.conditions.iter().all(|condition| {
        answers
            .get(&condition.question_id)
            .is_some_and(|actual| strict_eq(actual, &condition.value))
    })
}

/// Descriptors that currently apply. Entries sharing an id are kept apart.
pub fn active_documents<'a>(
    documents: &'a [DocumentSpec],
    answers: &AnswerSet,
) -> Vec<&'a DocumentSpec> {
    documents
        .iter()
        .filter(|document| is_active(document, answers))
        .collect()
}

/// Ids of the documents the applicant must currently provide.
pub fn required_documents(documents: &[DocumentSpec], answers: &AnswerSet) -> BTreeSet<String> {
    documents
        .iter()
        .filter(|document| document.required && is_active(document, answers))
        .map(|document| document.id.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistEntry {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
}

/// Documents grouped by the answer that triggered them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistGroup {
    /// Field id of the first condition, or `None` for general requirements.
    pub trigger: Option<String>,
    pub title: String,
    pub documents: Vec<ChecklistEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentChecklist {
    pub groups: Vec<ChecklistGroup>,
}

impl DocumentChecklist {
    /// Groups active documents by their first condition's field.
    ///
    /// The general group always comes first; triggered groups follow in the
    /// order their first document is declared. `title_for` maps a trigger
    /// field id to a display title.
    pub fn build<F>(documents: &[DocumentSpec], answers: &AnswerSet, title_for: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        let mut general = Vec::new();
        let mut triggered: Vec<ChecklistGroup> = Vec::new();

        for document in active_documents(documents, answers) {
            let entry = ChecklistEntry {
                id: document.id.clone(),
                name: document.name.clone(),
                description: document.description.clone(),
                required: document.required,
            };
            match document.trigger() {
                None => general.push(entry),
                Some(trigger) => match triggered
                    .iter_mut()
                    .find(|group| group.trigger.as_deref() == Some(trigger))
                {
                    Some(group) => group.documents.push(entry),
                    None => triggered.push(ChecklistGroup {
                        trigger: Some(trigger.to_string()),
                        title: title_for(trigger),
                        documents: vec![entry],
                    }),
                },
            }
        }

        let mut groups = Vec::with_capacity(triggered.len() + 1);
        if !general.is_empty() {
            groups.push(ChecklistGroup {
                trigger: None,
                title: "General requirements".to_string(),
                documents: general,
            });
        }
        groups.extend(triggered);
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.documents.len()).sum()
    }
}
