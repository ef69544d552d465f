//! Apply a schema-less key/value payload to a [`Document`].
//!
//! Every key is matched against control names; all controls sharing the
//! name are visited and coerced according to their [`ControlKind`]:
//!
//! | Kind        | Rule                                                          |
//! |-------------|---------------------------------------------------------------|
//! | Select      | option value match, then display-text match; change emitted   |
//! | Text / area | raw string value                                              |
//! | Checkbox    | checked iff `true` / `"true"` / `"on"` / `"1"`               |
//! | Radio       | checked iff its own value equals the payload value           |
//! | File        | never set; advisory                                           |
//! | Unsupported | advisory                                                      |
//!
//! Nothing is rolled back: each key is applied independently and problems
//! are reported as [`BindingAdvisory`] values in the returned [`BindReport`].

use serde_json::Value;
use thiserror::Error;

use crate::bus::FieldMap;

use super::document::{ControlId, ControlKind, Document};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// A non-fatal problem found while binding one key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingAdvisory {
    #[error("form field with name {name:?} not found")]
    MissingField { name: String },

    #[error("no option matching {value:?} in select {name:?}")]
    UnmatchedOption { name: String, value: String },

    #[error("file input {name:?} cannot be filled programmatically")]
    FileNotSettable { name: String },

    #[error("unhandled <{tag}> element for field {name:?}")]
    UnsupportedControl { name: String, tag: String },
}

/// The controls one payload key was applied to.
#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldBinding {
    pub name: String,
    /// Kind of the first matched control.
    pub control_kind: ControlKind,
    pub controls: Vec<ControlId>,
}

/// Outcome of one [`bind`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindReport {
    pub bindings: Vec<FormFieldBinding>,
    pub advisories: Vec<BindingAdvisory>,
}

impl BindReport {
    pub fn is_clean(&self) -> bool {
        self.advisories.is_empty()
    }
}

// ---------------------------------------------------------------------------
// bind
// ---------------------------------------------------------------------------

/// Apply `payload` to `doc`, key by key in payload order.
///
/// ```
/// use serde_json::json;
/// use voice_form_assistant::form::{bind, Control, Document};
///
/// let mut doc = Document::new(vec![Control::text("issue_location")]);
/// let payload = json!({ "issue_location": "Main St", "nope": 1 });
/// let report = bind(&mut doc, payload.as_object().unwrap());
///
/// assert_eq!(doc.first("issue_location").unwrap().value, "Main St");
/// assert_eq!(report.advisories.len(), 1);
/// ```
pub fn bind(doc: &mut Document, payload: &FieldMap) -> BindReport {
    let mut report = BindReport::default();

    for (name, value) in payload {
        let ids = doc.find(name);
        let Some(first) = ids.first().and_then(|id| doc.get(*id)) else {
            report.advisories.push(BindingAdvisory::MissingField { name: name.clone() });
            continue;
        };
        report.bindings.push(FormFieldBinding {
            name: name.clone(),
            control_kind: first.kind.clone(),
            controls: ids.clone(),
        });

        for id in ids {
            if let Some(advisory) = apply(doc, id, name, value) {
                report.advisories.push(advisory);
            }
        }
    }

    for advisory in &report.advisories {
        log::warn!("form: {advisory}");
    }
    log::debug!(
        "form: bound {} field(s), {} advisory(ies)",
        report.bindings.len(),
        report.advisories.len()
    );
    report
}

fn apply(doc: &mut Document, id: ControlId, name: &str, value: &Value) -> Option<BindingAdvisory> {
    let kind = doc.get(id)?.kind.clone();

    match kind {
        ControlKind::Select => {
            let control = doc.get_mut(id)?;
            match match_option(&control.options, value) {
                Some(index) => {
                    control.selected = Some(index);
                    doc.dispatch_change(id);
                    None
                }
                None => Some(BindingAdvisory::UnmatchedOption {
                    name: name.to_string(),
                    value: stringify(value),
                }),
            }
        }
        ControlKind::Text { .. } | ControlKind::TextArea => {
            doc.get_mut(id)?.value = stringify(value);
            None
        }
        ControlKind::Checkbox => {
            doc.get_mut(id)?.checked = is_truthy(value);
            None
        }
        ControlKind::Radio => {
            if doc.get(id)?.value == stringify(value) {
                doc.check_radio(id);
            }
            None
        }
        ControlKind::File => Some(BindingAdvisory::FileNotSettable {
            name: name.to_string(),
        }),
        ControlKind::Unsupported { tag } => Some(BindingAdvisory::UnsupportedControl {
            name: name.to_string(),
            tag,
        }),
    }
}

/// Index of the option matching `value`: value match over every candidate
/// first, then display-text match.
fn match_option(options: &[super::document::SelectOption], value: &Value) -> Option<usize> {
    let candidates: Vec<String> = match value {
        Value::Array(items) => items.iter().map(stringify).collect(),
        other => vec![stringify(other)],
    };

    candidates
        .iter()
        .find_map(|c| options.iter().position(|o| &o.value == c))
        .or_else(|| {
            candidates
                .iter()
                .find_map(|c| options.iter().position(|o| &o.text == c))
        })
}

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// String form of a JSON value as a browser page would render it.
///
/// ```
/// use serde_json::json;
/// use voice_form_assistant::form::stringify;
///
/// assert_eq!(stringify(&json!("a")), "a");
/// assert_eq!(stringify(&json!(2.0)), "2");
/// assert_eq!(stringify(&json!(null)), "");
/// assert_eq!(stringify(&json!(["x", 1, null])), "x,1,");
/// ```
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Checkbox truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => matches!(
            stringify(other).to_ascii_lowercase().as_str(),
            "true" | "on" | "1"
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
