use serde_json::{Value, json};

use visa_spec::{
    EntityKind, NormalizedInput, SubEntityEditor, SubEntityList, normalize_external_input,
};

fn list_of(kind: EntityKind, ids: &[u32]) -> SubEntityList {
    let raw = Value::Array(ids.iter().map(|id| json!({ "id": id })).collect());
    SubEntityList::initialize(kind, &raw)
}

#[test]
fn removal_renumbers_from_one() {
    let mut list = list_of(EntityKind::Education, &[1, 2, 3]);
    list.remove(2).expect("remove");
    assert_eq!(list.ids(), vec![1, 2]);
}

#[test]
fn removing_last_record_leaves_a_blank_one() {
    let mut list = list_of(EntityKind::Employment, &[1]);
    list.update_field(1, "employer", json!("Initech")).expect("edit");
    list.remove(1).expect("remove");
    assert_eq!(list.ids(), vec![1]);
    assert_eq!(list.records()[0].fields["employer"], "");
}

#[test]
fn add_uses_max_id_plus_one() {
    let mut list = list_of(EntityKind::Military, &[5, 2]);
    assert_eq!(list.add(), 6);
    assert_eq!(list.ids(), vec![5, 2, 6]);

    let mut fresh = SubEntityList::new(EntityKind::Military);
    fresh.remove(1).expect("remove");
    assert_eq!(fresh.add(), 2);
}

#[test]
fn exhausted_ids_are_renumbered_on_load() {
    let list = SubEntityList::initialize(
        EntityKind::Employment,
        &json!([{ "id": u32::MAX }, { "employer": "Acme" }]),
    );
    assert_eq!(list.ids(), vec![1, 2]);
    assert_eq!(list.records()[1].fields["employer"], "Acme");
}

#[test]
fn add_after_highest_possible_id_renumbers() {
    let mut list = SubEntityList::initialize(EntityKind::Children, &json!([{ "id": u32::MAX }]));
    assert_eq!(list.add(), 2);
    assert_eq!(list.ids(), vec![1, 2]);
    assert_eq!(list.active(), Some(2));

    let mut jobs = SubEntityList::initialize(
        EntityKind::Employment,
        &json!([{ "id": 7 }, { "id": u32::MAX }]),
    );
    assert_eq!(jobs.add(), 3);
    assert_eq!(jobs.ids(), vec![1, 2, 3]);
}

#[test]
fn add_to_empty_input_starts_at_one() {
    assert_eq!(
        normalize_external_input(&json!([])).expect("normalize"),
        NormalizedInput::Empty
    );
    let list = SubEntityList::initialize(EntityKind::Education, &json!([]));
    assert_eq!(list.ids(), vec![1]);
}

#[test]
fn wrapped_empty_string_yields_one_active_child() {
    let list = SubEntityList::initialize(EntityKind::Children, &json!("{\"value\":[]}"));
    assert_eq!(list.ids(), vec![1]);
    assert_eq!(list.active(), Some(1));
    assert_eq!(list.records()[0].fields["firstName"], "");
}

#[test]
fn added_child_becomes_active() {
    let mut list = list_of(EntityKind::Children, &[1, 2]);
    assert_eq!(list.active(), Some(1));
    let id = list.add();
    assert_eq!(list.active(), Some(id));

    let mut jobs = list_of(EntityKind::Employment, &[1]);
    jobs.add();
    assert_eq!(jobs.active(), None);
}

#[test]
fn editor_flags_structural_changes_for_immediate_save() {
    let mut events: Vec<bool> = Vec::new();
    let mut editor = SubEntityEditor::new(
        EntityKind::Children,
        &json!({ "value": [{ "id": 1, "firstName": "Ana" }] }),
        |_: &Value, persist: bool| events.push(persist),
    );
    editor.update_field(1, "firstName", json!("Ana Maria")).expect("edit");
    editor.add();
    editor.remove(2).expect("remove");
    let (list, _) = editor.into_inner();

    assert_eq!(list.records()[0].fields["firstName"], "Ana Maria");
    assert_eq!(events, vec![false, true, true]);
}
