//! Repeatable records (children, education, employment, military history)
//! edited as an ordered list with positional integer ids.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::spec::field::EntityKind;

const MAX_NESTING: usize = 4;

#[derive(Debug, Error)]
pub enum SubEntityError {
    #[error("input is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected input shape: {0}")]
    UnexpectedShape(&'static str),
    #[error("record {0} does not exist")]
    UnknownRecord(u32),
    #[error("field '{0}' cannot be edited")]
    ReservedField(String),
}

/// Result of reading the value a host hands to a sub-entity editor.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedInput {
    Records(Vec<Map<String, Value>>),
    Empty,
}

/// Accepts a raw array, a JSON string, or an object wrapping an array under
/// `value`, in any combination of those.
pub fn normalize_external_input(raw: &Value) -> Result<NormalizedInput, SubEntityError> {
    normalize_nested(raw, 0)
}

fn normalize_nested(raw: &Value, depth: usize) -> Result<NormalizedInput, SubEntityError> {
    if depth > MAX_NESTING {
        return Err(SubEntityError::UnexpectedShape("input nested too deeply"));
    }
    match raw {
        Value::Null => Ok(NormalizedInput::Empty),
        Value::Array(items) if items.is_empty() => Ok(NormalizedInput::Empty),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .cloned()
                    .ok_or(SubEntityError::UnexpectedShape("list item is not an object"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(NormalizedInput::Records),
        Value::String(text) if text.trim().is_empty() => Ok(NormalizedInput::Empty),
        Value::String(text) => {
            let parsed: Value = serde_json::from_str(text)?;
            if parsed.is_string() {
                return Err(SubEntityError::UnexpectedShape("doubly encoded string"));
            }
            normalize_nested(&parsed, depth + 1)
        }
        Value::Object(map) => match map.get("value") {
            Some(inner) => normalize_nested(inner, depth + 1),
            None => Err(SubEntityError::UnexpectedShape("object without a value key")),
        },
        _ => Err(SubEntityError::UnexpectedShape("scalar input")),
    }
}

impl EntityKind {
    /// Keys of a blank record, all initialized to empty strings.
    pub fn blank_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Children => &[
                "firstName",
                "lastName",
                "dateOfBirth",
                "countryOfBirth",
                "relationship",
            ],
            EntityKind::Education => &[
                "institution",
                "fieldOfStudy",
                "degree",
                "city",
                "country",
                "startDate",
                "endDate",
            ],
            EntityKind::Employment => &[
                "employer",
                "occupation",
                "city",
                "country",
                "startDate",
                "endDate",
            ],
            EntityKind::Military => &["country", "branch", "rank", "startDate", "endDate"],
        }
    }

    /// Whether the editor keeps one record selected for editing.
    pub fn tracks_active(&self) -> bool {
        matches!(self, EntityKind::Children)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: u32,
    pub fields: Map<String, Value>,
}

impl Record {
    fn blank(kind: EntityKind, id: u32) -> Self {
        let fields = kind
            .blank_fields()
            .iter()
            .map(|key| (key.to_string(), Value::String(String::new())))
            .collect();
        Self { id, fields }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 1);
        map.insert("id".into(), Value::from(self.id));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// In-memory list behind one sub-entity editor.
#[derive(Debug, Clone, PartialEq)]
pub struct SubEntityList {
    kind: EntityKind,
    records: Vec<Record>,
    active: Option<u32>,
}

impl SubEntityList {
    /// A list holding a single blank record with id 1.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            records: vec![Record::blank(kind, 1)],
            active: kind.tracks_active().then_some(1),
        }
    }

    /// Builds the list from whatever the host stored. Unreadable input is
    /// logged and replaced by the single blank record.
    pub fn initialize(kind: EntityKind, raw: &Value) -> Self {
        match normalize_external_input(raw) {
            Ok(NormalizedInput::Records(maps)) => Self::from_records(kind, maps),
            Ok(NormalizedInput::Empty) => Self::new(kind),
            Err(error) => {
                warn!(kind = kind.as_str(), %error, "discarding malformed sub-entity input");
                Self::new(kind)
            }
        }
    }

    fn from_records(kind: EntityKind, maps: Vec<Map<String, Value>>) -> Self {
        let mut records: Vec<Record> = Vec::with_capacity(maps.len());
        for mut fields in maps {
            let declared = fields
                .remove("id")
                .as_ref()
                .and_then(record_id)
                .filter(|id| records.iter().all(|record| record.id != *id));
            let id = match declared {
                Some(id) => id,
                None => next_id(&mut records),
            };
            records.push(Record { id, fields });
        }
        let active = kind
            .tracks_active()
            .then(|| records.first().map(|record| record.id))
            .flatten();
        Self {
            kind,
            records,
            active,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn ids(&self) -> Vec<u32> {
        self.records.iter().map(|record| record.id).collect()
    }

    pub fn get(&self, id: u32) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn active(&self) -> Option<u32> {
        self.active
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a blank record with the next id and returns that id.
    pub fn add(&mut self) -> u32 {
        let id = next_id(&mut self.records);
        self.records.push(Record::blank(self.kind, id));
        if self.kind.tracks_active() {
            self.active = Some(id);
        }
        id
    }

    /// Removes a record and renumbers the rest from 1.
    ///
    /// Ids are positional: any id held before the call may now name a
    /// different record.
    pub fn remove(&mut self, id: u32) -> Result<(), SubEntityError> {
        let position = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or(SubEntityError::UnknownRecord(id))?;
        self.records.remove(position);

        if self.records.is_empty() {
            *self = Self::new(self.kind);
            return Ok(());
        }

        let active_position = self
            .active
            .filter(|active| *active != id)
            .and_then(|active| self.records.iter().position(|record| record.id == active));
        renumber(&mut self.records);
        if self.kind.tracks_active() {
            self.active = Some(active_position.map_or(1, |index| index as u32 + 1));
        }
        Ok(())
    }

    pub fn update_field(
        &mut self,
        id: u32,
        field: &str,
        value: Value,
    ) -> Result<(), SubEntityError> {
        if field == "id" {
            return Err(SubEntityError::ReservedField(field.to_string()));
        }
        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(SubEntityError::UnknownRecord(id))?;
        record.fields.insert(field.to_string(), value);
        Ok(())
    }

    pub fn select(&mut self, id: u32) -> Result<(), SubEntityError> {
        if self.get(id).is_none() {
            return Err(SubEntityError::UnknownRecord(id));
        }
        if self.kind.tracks_active() {
            self.active = Some(id);
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.records.iter().map(Record::to_value).collect())
    }
}

fn record_id(value: &Value) -> Option<u32> {
    let id = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }?;
    u32::try_from(id).ok().filter(|id| *id > 0)
}

/// One past the highest id. When that would overflow, the records are
/// renumbered from 1 first.
fn next_id(records: &mut [Record]) -> u32 {
    let highest = records.iter().map(|record| record.id).max().unwrap_or(0);
    highest.checked_add(1).unwrap_or_else(|| {
        renumber(records);
        records.len() as u32 + 1
    })
}

fn renumber(records: &mut [Record]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.id = index as u32 + 1;
    }
}

/// Receives the whole serialized list after every mutation.
///
/// `persist_immediately` is true for structural changes (add, remove) and
/// false for field edits, which hosts usually debounce.
pub trait ChangeSink {
    fn on_change(&mut self, list: &Value, persist_immediately: bool);
}

impl<F> ChangeSink for F
where
    F: FnMut(&Value, bool),
{
    fn on_change(&mut self, list: &Value, persist_immediately: bool) {
        self(list, persist_immediately)
    }
}

/// A [`SubEntityList`] that publishes every change to its sink.
pub struct SubEntityEditor<S: ChangeSink> {
    list: SubEntityList,
    sink: S,
}

impl<S: ChangeSink> SubEntityEditor<S> {
    pub fn new(kind: EntityKind, raw: &Value, sink: S) -> Self {
        Self {
            list: SubEntityList::initialize(kind, raw),
            sink,
        }
    }

    pub fn list(&self) -> &SubEntityList {
        &self.list
    }

    pub fn into_inner(self) -> (SubEntityList, S) {
        (self.list, self.sink)
    }

    pub fn add(&mut self) -> u32 {
        let id = self.list.add();
        self.publish(true);
        id
    }

    pub fn remove(&mut self, id: u32) -> Result<(), SubEntityError> {
        self.list.remove(id)?;
        self.publish(true);
        Ok(())
    }

    pub fn update_field(
        &mut self,
        id: u32,
        field: &str,
        value: Value,
    ) -> Result<(), SubEntityError> {
        self.list.update_field(id, field, value)?;
        self.publish(false);
        Ok(())
    }

    pub fn select(&mut self, id: u32) -> Result<(), SubEntityError> {
        self.list.select(id)
    }

    fn publish(&mut self, persist_immediately: bool) {
        let serialized = self.list.to_value();
        self.sink.on_change(&serialized, persist_immediately);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_accepts_three_shapes() {
        let raw = json!([{ "id": 1, "employer": "Acme" }]);
        let as_string = Value::String(raw.to_string());
        let wrapped = json!({ "value": raw.clone() });

        for input in [&raw, &as_string, &wrapped] {
            match normalize_external_input(input).expect("normalize") {
                NormalizedInput::Records(records) => assert_eq!(records[0]["employer"], "Acme"),
                NormalizedInput::Empty => panic!("expected records"),
            }
        }
    }

    #[test]
    fn normalize_rejects_unexpected_shapes() {
        assert!(normalize_external_input(&json!(42)).is_err());
        assert!(normalize_external_input(&json!({ "items": [] })).is_err());
        assert!(normalize_external_input(&json!("not json")).is_err());
        assert!(normalize_external_input(&json!([1, 2])).is_err());
    }

    #[test]
    fn malformed_input_degrades_to_blank_record() {
        let list = SubEntityList::initialize(EntityKind::Employment, &json!("{broken"));
        assert_eq!(list.ids(), vec![1]);
        assert_eq!(list.records()[0].fields["employer"], "");
        assert_eq!(list.active(), None);
    }

    #[test]
    fn missing_and_duplicate_ids_get_fresh_ones() {
        let list = SubEntityList::initialize(
            EntityKind::Education,
            &json!([{ "id": 4 }, { "institution": "MIT" }, { "id": 4 }, { "id": "2" }]),
        );
        assert_eq!(list.ids(), vec![4, 5, 6, 2]);
    }

    #[test]
    fn remove_keeps_active_on_same_record() {
        let mut list = SubEntityList::initialize(
            EntityKind::Children,
            &json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }]),
        );
        list.select(3).expect("select");
        list.remove(1).expect("remove");
        assert_eq!(list.ids(), vec![1, 2]);
        assert_eq!(list.active(), Some(2));

        list.remove(2).expect("remove active");
        assert_eq!(list.active(), Some(1));
    }

    #[test]
    fn unknown_record_is_an_error() {
        let mut list = SubEntityList::new(EntityKind::Military);
        assert!(matches!(
            list.remove(9),
            Err(SubEntityError::UnknownRecord(9))
        ));
        assert!(matches!(
            list.update_field(1, "id", json!(7)),
            Err(SubEntityError::ReservedField(_))
        ));
    }

    #[test]
    fn editor_publishes_post_mutation_state() {
        let mut published = Vec::new();
        let mut editor = SubEntityEditor::new(
            EntityKind::Employment,
            &Value::Null,
            |list: &Value, persist: bool| published.push((list.clone(), persist)),
        );

        editor.add();
        editor
            .update_field(2, "employer", json!("Globex"))
            .expect("update");
        editor.remove(1).expect("remove");
        assert!(editor.update_field(5, "employer", json!("x")).is_err());
        drop(editor);

        assert_eq!(published.len(), 3);
        assert_eq!(published[0].0.as_array().map(Vec::len), Some(2));
        assert!(published[0].1);
        assert_eq!(published[1].0[1]["employer"], "Globex");
        assert!(!published[1].1);
        assert_eq!(published[2].0, json!([{
            "id": 1,
            "employer": "Globex",
            "occupation": "",
            "city": "",
            "country": "",
            "startDate": "",
            "endDate": ""
        }]));
        assert!(published[2].1);
    }
}
