use crate::model::{Attribute, Monitor, Record};

/// Attributes carrying the marker tag, as `(type, value)` pairs.
///
/// Top-level attributes come first, then each object's attributes in order.
/// Duplicates are yielded as found; collect into a set to deduplicate.
pub fn monitors<'a>(record: &'a Record, marker_tag_id: &'a str) -> impl Iterator<Item = Monitor> + 'a {
    record
        .attributes
        .iter()
        .chain(record.objects.iter().flat_map(|o| o.attributes.iter()))
        .filter(move |a| a.tags.contains(marker_tag_id))
        .map(to_monitor)
}

fn to_monitor(attribute: &Attribute) -> Monitor {
    Monitor {
        kind: attribute.kind.clone(),
        value: attribute.value.clone(),
    }
}
