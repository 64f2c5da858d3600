// ABOUTME: Overlay records are free-form JSON objects identified by a reserved "_id" key.
// ABOUTME: Provides id assignment and the shallow field merge used by the record store.

use serde_json::{Map, Value};

/// The reserved key holding a record's identifier.
pub const ID_KEY: &str = "_id";

/// A user-defined overlay: arbitrary JSON fields plus the reserved `_id`.
pub type OverlayRecord = Map<String, Value>;

/// Return the record's `_id` when it is present and a string.
pub fn record_id(record: &OverlayRecord) -> Option<&str> {
    record.get(ID_KEY).and_then(Value::as_str)
}

/// Whether the record carries exactly the given id.
pub fn has_id(record: &OverlayRecord, id: &str) -> bool {
    record_id(record) == Some(id)
}

/// The id handed to the next created record: the 1-based position it will
/// occupy among the currently stored records. Ids are reused once records
/// are deleted.
pub fn next_id(existing: usize) -> String {
    (existing + 1).to_string()
}

/// Stamp `id` onto the record, replacing any caller-supplied `_id`.
pub fn assign_id(record: &mut OverlayRecord, id: String) {
    record.insert(ID_KEY.to_string(), Value::String(id));
}

/// Shallow merge: every key in `fields` overwrites or extends `record`.
/// A `_id` inside `fields` is skipped so an update cannot re-key a record.
pub fn merge_fields(record: &mut OverlayRecord, fields: &OverlayRecord) {
    for (key, value) in fields {
        if key == ID_KEY {
            continue;
        }
        record.insert(key.clone(), value.clone());
    }
}
