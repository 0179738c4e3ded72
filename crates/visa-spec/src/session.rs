use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::answers::{AnswerAction, AnswerSet};
use crate::documents::required_documents;
use crate::spec::form::FormBundle;
use crate::visibility::visible_fields;

/// Derived state the renderer and the checklist consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormState {
    pub visible_fields: Vec<String>,
    pub required_documents: BTreeSet<String>,
}

impl FormState {
    pub fn compute(bundle: &FormBundle, answers: &AnswerSet) -> Self {
        Self {
            visible_fields: visible_fields(bundle, answers)
                .into_iter()
                .map(str::to_string)
                .collect(),
            required_documents: required_documents(&bundle.documents, answers),
        }
    }
}

type SaveHook<'a> = Box<dyn FnMut(&AnswerSet) + 'a>;

/// One user's in-progress answers for one bundle.
pub struct FormSession<'a> {
    bundle: &'a FormBundle,
    answers: AnswerSet,
    state: FormState,
    on_save: Option<SaveHook<'a>>,
}

impl<'a> FormSession<'a> {
    pub fn new(bundle: &'a FormBundle) -> Self {
        Self::resume(bundle, AnswerSet::new())
    }

    pub fn resume(bundle: &'a FormBundle, answers: AnswerSet) -> Self {
        let state = FormState::compute(bundle, &answers);
        Self {
            bundle,
            answers,
            state,
            on_save: None,
        }
    }

    /// Hook invoked with the updated answers after every applied action.
    pub fn on_save(mut self, hook: impl FnMut(&AnswerSet) + 'a) -> Self {
        self.on_save = Some(Box::new(hook));
        self
    }

    pub fn bundle(&self) -> &FormBundle {
        self.bundle
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Replaces one answer, recomputes visibility and documents, then hands
    /// the new answers to the save hook.
    pub fn apply(&mut self, action: AnswerAction) -> &FormState {
        debug!(form_id = %self.bundle.id, field = action.field(), "applying answer");
        self.answers = self.answers.apply(action);
        self.state = FormState::compute(self.bundle, &self.answers);
        if let Some(hook) = self.on_save.as_mut() {
            hook(&self.answers);
        }
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::spec::document::DocumentSpec;
    use crate::spec::field::{FieldSpec, FieldType};
    use serde_json::json;

    fn bundle() -> FormBundle {
        let mut spouse = FieldSpec::new("spouseName", "family", FieldType::Text);
        spouse.show_if = Some(Condition::equals("maritalStatus", json!("married")));
        FormBundle {
            country: "ca".into(),
            id: "visitor".into(),
            title: "Visitor".into(),
            version: "1".into(),
            description: None,
            steps: vec![],
            fields: vec![
                FieldSpec::new("maritalStatus", "family", FieldType::Select),
                spouse,
            ],
            documents: vec![
                DocumentSpec::new("marriage_certificate")
                    .with_condition("maritalStatus", json!("married")),
            ],
        }
    }

    #[test]
    fn apply_recomputes_state_before_saving() {
        let spec = bundle();
        let mut saved = Vec::new();
        {
            let mut session = FormSession::new(&spec).on_save(|answers: &AnswerSet| {
                saved.push(answers.get("maritalStatus").cloned());
            });
            assert_eq!(session.state().visible_fields, vec!["maritalStatus"]);

            let state = session.apply(AnswerAction::Set {
                field: "maritalStatus".into(),
                value: json!("married"),
            });
            assert_eq!(state.visible_fields, vec!["maritalStatus", "spouseName"]);
            assert!(state.required_documents.contains("marriage_certificate"));

            session.apply(AnswerAction::Clear {
                field: "maritalStatus".into(),
            });
            assert!(session.state().required_documents.is_empty());
        }
        assert_eq!(saved, vec![Some(json!("married")), None]);
    }
}
