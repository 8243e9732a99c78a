use std::collections::BTreeMap;

use crate::model::{Record, RecordObject, Timestamp};

/// The most recent timestamp anywhere in the record: its own modification and
/// publish timestamps, every attribute, every object and that object's attributes.
pub fn latest_timestamp(record: &Record) -> Timestamp {
    let attributes = record.attributes.iter().map(|a| a.timestamp);
    let objects = record.objects.iter().flat_map(|o| {
        std::iter::once(o.timestamp).chain(o.attributes.iter().map(|a| a.timestamp))
    });

    attributes
        .chain(objects)
        .fold(record.timestamp.max(record.published_at), Timestamp::max)
}

/// Relation key → value for every object built from `template_id`.
///
/// Objects are scanned in order and attributes within an object in order; a
/// later attribute with the same relation key overwrites an earlier one.
/// Attributes without a relation key are ignored. No matching object yields
/// an empty map.
pub fn attributes_by_relation(record: &Record, template_id: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for object in record.objects.iter().filter(|o| o.template_id == template_id) {
        map.extend(object_relations(object));
    }
    map
}

/// Relation key → value for a single object, last write wins.
pub fn object_relations(object: &RecordObject) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for attribute in &object.attributes {
        if let Some(ref relation) = attribute.relation {
            map.insert(relation.clone(), attribute.value.clone());
        }
    }
    map
}

/// Values of the record's top-level attributes of a given type, in order.
pub fn values_of_type<'a>(record: &'a Record, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    record
        .attributes
        .iter()
        .filter(move |a| a.kind == kind)
        .map(|a| a.value.as_str())
}
