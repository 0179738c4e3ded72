use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current answers of one in-progress form session, keyed by field id.
///
/// Updates never mutate in place: [`AnswerSet::with`], [`AnswerSet::without`]
/// and [`AnswerSet::apply`] return a new set with exactly one key replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    values: Map<String, Value>,
}

/// A single write against an [`AnswerSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AnswerAction {
    Set { field: String, value: Value },
    Clear { field: String },
}

impl AnswerAction {
    pub fn field(&self) -> &str {
        match self {
            AnswerAction::Set { field, .. } | AnswerAction::Clear { field } => field,
        }
    }
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from a JSON object. Anything else yields an empty set.
    pub fn from_value(value: &Value) -> Self {
        Self {
            values: value.as_object().cloned().unwrap_or_default(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// True when the field holds something a user actually entered.
    pub fn is_answered(&self, field: &str) -> bool {
        self.values.get(field).is_some_and(has_content)
    }

    pub fn with(&self, field: impl Into<String>, value: Value) -> Self {
        let mut values = self.values.clone();
        values.insert(field.into(), value);
        Self { values }
    }

    pub fn without(&self, field: &str) -> Self {
        let mut values = self.values.clone();
        values.remove(field);
        Self { values }
    }

    pub fn apply(&self, action: AnswerAction) -> Self {
        match action {
            AnswerAction::Set { field, value } => self.with(field, value),
            AnswerAction::Clear { field } => self.without(&field),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl From<Map<String, Value>> for AnswerSet {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn with_leaves_original_untouched() {
        let before = AnswerSet::new().with("maritalStatus", json!("single"));
        let after = before.with("maritalStatus", json!("married"));
        assert_eq!(before.get("maritalStatus"), Some(&json!("single")));
        assert_eq!(after.get("maritalStatus"), Some(&json!("married")));
    }

    #[test]
    fn apply_clear_removes_key() {
        let answers = AnswerSet::from_value(&json!({ "a": 1, "b": 2 }));
        let cleared = answers.apply(AnswerAction::Clear { field: "a".into() });
        assert!(!cleared.contains("a"));
        assert_eq!(cleared.len(), 1);
    }

    #[test]
    fn blank_values_are_not_answered() {
        let answers = AnswerSet::from_value(&json!({
            "empty": "  ",
            "null": null,
            "list": [],
            "no": false,
            "zero": 0
        }));
        assert!(!answers.is_answered("empty"));
        assert!(!answers.is_answered("null"));
        assert!(!answers.is_answered("list"));
        assert!(answers.is_answered("no"));
        assert!(answers.is_answered("zero"));
        assert!(!answers.is_answered("missing"));
    }

    #[test]
    fn non_object_value_is_empty_set() {
        assert!(AnswerSet::from_value(&json!([1, 2])).is_empty());
    }
}
