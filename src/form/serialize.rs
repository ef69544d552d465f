//! Flatten a [`Document`] into the mapping sent to the submission service.

use serde_json::Value;

use crate::bus::FieldMap;

use super::document::{ControlKind, Document};

/// Name of the consent checkbox that is always submitted as a
/// `"True"` / `"False"` string.
pub const DECLARATION_FIELD: &str = "declaration";

/// Collect the successful controls the way a browser builds form data.
///
/// * disabled controls, buttons and file inputs are skipped
/// * checkboxes and radios contribute their value (default `"on"`) only when
///   checked
/// * selects contribute the selected option's value
/// * a name that occurs more than once becomes a sequence
pub fn form_data(doc: &Document) -> FieldMap {
    let mut map = FieldMap::new();

    for (_, control) in doc.controls() {
        if control.disabled || control.name.is_empty() {
            continue;
        }

        let value = match &control.kind {
            ControlKind::Text { .. } | ControlKind::TextArea => Some(control.value.clone()),
            ControlKind::Select => control.selected_value().map(str::to_string),
            ControlKind::Checkbox | ControlKind::Radio => control.checked.then(|| {
                if control.value.is_empty() {
                    "on".to_string()
                } else {
                    control.value.clone()
                }
            }),
            ControlKind::File | ControlKind::Unsupported { .. } => None,
        };
        let Some(value) = value else {
            continue;
        };

        match map.get_mut(&control.name) {
            None => {
                map.insert(control.name.clone(), Value::String(value));
            }
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }

    map
}

/// [`form_data`] plus the declaration normalization.
pub fn submission_payload(doc: &Document) -> FieldMap {
    let mut map = form_data(doc);
    if let Some(declaration) = doc.first(DECLARATION_FIELD) {
        let flag = if declaration.checked { "True" } else { "False" };
        map.insert(DECLARATION_FIELD.to_string(), Value::String(flag.to_string()));
    }
    map
}
