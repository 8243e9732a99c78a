//! Lenient decoding of MISP event JSON into [`Record`]s.
//!
//! Remote data is not schema-guaranteed: ids arrive as strings or numbers,
//! timestamps as epoch seconds in either form, arrays may be missing. Decoding
//! never fails; anything unexpected becomes an empty/default value.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::model::{Attribute, Record, RecordObject, Timestamp};

/// Decode an event, accepting either `{"Event": {...}}` or the bare event object.
pub fn record_from_json(json: &Value) -> Record {
    let event = json.get("Event").unwrap_or(json);

    let orgc = event.get("Orgc").unwrap_or(&Value::Null);
    let org_id = text(orgc, "id");
    let org_id = if org_id.is_empty() { text(event, "orgc_id") } else { org_id };

    Record {
        id: text(event, "id"),
        uuid: text(event, "uuid"),
        title: text(event, "info"),
        org_id,
        org_name: text(orgc, "name"),
        published_at: timestamp(event, "publish_timestamp"),
        timestamp: timestamp(event, "timestamp"),
        tags: tag_ids(event),
        attributes: array(event, "Attribute").iter().map(attribute_from_json).collect(),
        objects: array(event, "Object").iter().map(object_from_json).collect(),
        extends: Some(text(event, "extends_uuid")).filter(|s| !s.is_empty()),
        extensions: extension_ids(event),
    }
}

fn attribute_from_json(json: &Value) -> Attribute {
    Attribute {
        id: text(json, "id"),
        category: text(json, "category"),
        kind: text(json, "type"),
        value: text(json, "value"),
        relation: Some(text(json, "object_relation")).filter(|s| !s.is_empty()),
        timestamp: timestamp(json, "timestamp"),
        tags: tag_ids(json),
    }
}

fn object_from_json(json: &Value) -> RecordObject {
    let template_id = text(json, "template_uuid");
    let template_id = if template_id.is_empty() { text(json, "template_id") } else { template_id };

    RecordObject {
        id: text(json, "id"),
        template_id,
        name: text(json, "name"),
        timestamp: timestamp(json, "timestamp"),
        attributes: array(json, "Attribute").iter().map(attribute_from_json).collect(),
    }
}

/// `extensionEvents` is keyed by uuid; each value should carry the numeric id.
fn extension_ids(event: &Value) -> Vec<String> {
    let Some(map) = event.get("extensionEvents").and_then(Value::as_object) else {
        return Vec::new();
    };
    map.iter()
        .map(|(uuid, ext)| {
            let id = text(ext, "id");
            if id.is_empty() { uuid.clone() } else { id }
        })
        .collect()
}

fn tag_ids(json: &Value) -> BTreeSet<String> {
    array(json, "Tag")
        .iter()
        .map(|t| text(t, "id"))
        .filter(|id| !id.is_empty())
        .collect()
}

fn array<'a>(json: &'a Value, key: &str) -> &'a [Value] {
    json.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// String or number field as text; anything else is empty.
pub fn text(json: &Value, key: &str) -> String {
    match json.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Epoch seconds (string or number) or RFC 3339. Unparseable values become the epoch.
pub(crate) fn timestamp(json: &Value, key: &str) -> Timestamp {
    let secs = match json.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(secs) => Some(secs),
            Err(_) => {
                return DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            }
        },
        _ => None,
    };
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
