//! Form model and the dynamic binding engine.
//!
//! ```text
//!  FieldMap ──bind──▶ Document ──submission_payload──▶ FieldMap ──▶ GrievanceSink
//!                        ▲
//!   FormCatalog ─load────┘          FormPage = Document + host origin + FormType
//! ```
//!
//! # Quick start
//!
//! ```
//! use serde_json::json;
//! use voice_form_assistant::form::{bind, FormCatalog};
//!
//! let mut doc = FormCatalog::builtin().load("govt_service").unwrap();
//! let payload = json!({ "service_type": "Other", "other_service": "Ration card" });
//! let report = bind(&mut doc, payload.as_object().unwrap());
//!
//! assert!(report.is_clean());
//! assert!(!doc.first("other_service").unwrap().hidden);
//! ```

pub mod binder;
pub mod catalog;
pub mod document;
pub mod form_type;
pub mod page;
pub mod serialize;

pub use binder::{bind, is_truthy, stringify, BindReport, BindingAdvisory, FormFieldBinding};
pub use catalog::{is_valid_form_name, FormCatalog};
pub use document::{Control, ControlId, ControlKind, DependentRule, Document, SelectOption};
pub use form_type::FormType;
pub use page::{FormPage, PendingSubmission, SubmitError};
pub use serialize::{form_data, submission_payload, DECLARATION_FIELD};
