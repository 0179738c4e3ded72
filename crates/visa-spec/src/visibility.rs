use std::collections::{BTreeMap, BTreeSet};

use crate::answers::AnswerSet;
use crate::spec::form::FormBundle;

pub type VisibilityMap = BTreeMap<String, bool>;

/// Evaluates every field of the bundle against the answers.
///
/// Recomputed from scratch on each call; bundles hold hundreds of fields at
/// most.
pub fn resolve_visibility(bundle: &FormBundle, answers: &AnswerSet) -> VisibilityMap {
    bundle
        .fields
        .iter()
        .map(|field| (field.id.clone(), field.is_visible(answers)))
        .collect()
}

/// Ids of the visible fields, in declaration order.
pub fn visible_fields<'a>(bundle: &'a FormBundle, answers: &AnswerSet) -> Vec<&'a str> {
    bundle
        .fields
        .iter()
        .filter(|field| field.is_visible(answers))
        .map(|field| field.id.as_str())
        .collect()
}

/// Fields whose conditions read `changed`: the only ones whose visibility
/// can flip when that answer is written.
pub fn dependents<'a>(bundle: &'a FormBundle, changed: &str) -> BTreeSet<&'a str> {
    bundle
        .fields
        .iter()
        .filter(|field| {
            field
                .conditions()
                .any(|condition| condition.referenced_fields().contains(changed))
        })
        .map(|field| field.id.as_str())
        .collect()
}
