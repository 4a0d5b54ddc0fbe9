//! Lenient mapping of model JSON into domain types.
//!
//! Models drift from the requested shape: numbers where strings were asked
//! for, a flat address string instead of an object, confidence given as text.
//! These helpers accept what they can and drop what they cannot.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use juso_core::{AddressComponent, AddressComponents, ContactEntry, PhoneType, RawContact};
use juso_tools::components_from_text;

use crate::strategy::Attempt;

/// Non-blank string or number as text.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric entries of a confidence map, clamped to [0, 1].
pub(crate) fn scores(value: Option<&Value>) -> BTreeMap<String, f64> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(key, score)| {
            let score = match score {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }?;
            score.is_finite().then(|| (key.clone(), score.clamp(0.0, 1.0)))
        })
        .collect()
}

fn flag(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(scalar_text)
}

pub(crate) fn address_from_value(value: &Value) -> AddressComponents {
    match value {
        Value::String(text) => components_from_text(text),
        Value::Object(map) => {
            let mut address = AddressComponents::default();
            for component in AddressComponent::ALL {
                address.set(component, field(map, component.as_str()));
            }
            address.room_number = field(map, "room_number");
            address.confidence = scores(map.get("confidence"));
            address.human_review = flag(map, "human_review");
            address
        }
        _ => AddressComponents::default(),
    }
}

/// One element of an `entries` array. Entry numbers are left at 0 for the
/// caller to assign; a non-object element becomes a placeholder.
pub(crate) fn entry_from_value(value: &Value) -> ContactEntry {
    let Some(map) = value.as_object() else {
        return ContactEntry::fallback(0);
    };
    ContactEntry {
        name: field(map, "name"),
        phone_number: field(map, "phone_number").or_else(|| field(map, "phone")),
        phone_type: field(map, "phone_type").map(|label| PhoneType::from_label(&label)),
        address: map.get("address").map(address_from_value).unwrap_or_default(),
        confidence: scores(map.get("confidence")),
        entry_number: 0,
        human_review: flag(map, "human_review"),
    }
}

/// The non-empty `entries` array of a multi-entry reply.
pub(crate) fn entries_from_value(value: &Value) -> Attempt<Vec<ContactEntry>> {
    let entries = value
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| "reply has no entries array".to_string())?;
    if entries.is_empty() {
        return Err("entries array is empty".to_string());
    }
    Ok(entries.iter().map(entry_from_value).collect())
}

fn raw_contact_from_value(value: &Value) -> Option<RawContact> {
    let map = value.as_object()?;
    let contact = RawContact {
        name: field(map, "name"),
        phone_number: field(map, "phone_number").or_else(|| field(map, "phone")),
        address: field(map, "address"),
        raw_text: field(map, "raw_text"),
    };
    let blank = contact.name.is_none()
        && contact.phone_number.is_none()
        && contact.address.is_none()
        && contact.raw_text.is_none();
    (!blank).then_some(contact)
}

/// Contacts from a bare array or a `{"contacts": [...]}` envelope. An empty
/// list is a valid answer; blank elements are dropped.
pub(crate) fn contacts_from_value(value: &Value) -> Attempt<Vec<RawContact>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("contacts")
            .and_then(Value::as_array)
            .ok_or_else(|| "object has no contacts array".to_string())?,
        other => return Err(format!("expected a contact list, got {}", kind(other))),
    };
    Ok(items.iter().filter_map(raw_contact_from_value).collect())
}

/// Address object from a single-address reply, bare or under `"address"`.
pub(crate) fn corrected_address_from_value(value: &Value) -> Attempt<AddressComponents> {
    let candidate = match value.get("address") {
        Some(nested @ Value::Object(_)) => nested,
        _ => value,
    };
    if !candidate.is_object() {
        return Err(format!("expected an address object, got {}", kind(candidate)));
    }
    let address = address_from_value(candidate);
    if address.is_empty() {
        return Err("address object has no components".to_string());
    }
    Ok(address)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
