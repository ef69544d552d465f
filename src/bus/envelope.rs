//! Typed cross-context messages and their JSON envelope.
//!
//! On the wire every message is `{ "type": ..., "payload": ... }`:
//!
//! ```text
//! PREFILL_FORM              host → embedded   payload: { <field>: <value>, ... }
//! FORM_SUBMITTED_IN_IFRAME  embedded → host   payload: { message, formType, formData }
//! ```

use serde::{Deserialize, Serialize};

/// Schema-less form payload: field name → JSON value.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Payload of a completed submission, reported by the embedded context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionNotice {
    /// Human-readable confirmation from the submission service.
    pub message: String,
    /// Form type identified by the embedded page.
    #[serde(rename = "formType", default)]
    pub form_type: Option<String>,
    /// The mapping that was submitted.
    #[serde(rename = "formData", default)]
    pub form_data: FieldMap,
}

/// Every message that may cross the context boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum CrossContextMessage {
    /// Populate the embedded form from a backend-supplied mapping.
    #[serde(rename = "PREFILL_FORM")]
    PrefillForm(FieldMap),
    /// The embedded form was submitted and accepted.
    #[serde(rename = "FORM_SUBMITTED_IN_IFRAME")]
    FormSubmitted(SubmissionNotice),
}

impl CrossContextMessage {
    /// Wire name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CrossContextMessage::PrefillForm(_) => "PREFILL_FORM",
            CrossContextMessage::FormSubmitted(_) => "FORM_SUBMITTED_IN_IFRAME",
        }
    }
}
