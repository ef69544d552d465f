//! The embedded page: a loaded form plus its message handler and submit
//! flow.

use thiserror::Error;
use url::Origin;

use crate::backend::{BackendError, GrievanceSink};
use crate::bus::{
    CrossContextMessage, FieldMap, InboundMessage, OriginConstraint, PortSender, SubmissionNotice,
};

use super::binder::{bind, BindReport};
use super::document::Document;
use super::form_type::FormType;
use super::serialize::submission_payload;

/// Confirmation used when the submission service sends no message.
const DEFAULT_CONFIRMATION: &str = "Form submitted.";

#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("submission failed: {0}")]
    SubmissionFailure(#[from] BackendError),

    #[error("no form is loaded")]
    NoForm,
}

/// A form document loaded into the embedded context.
#[derive(Debug, Clone)]
pub struct FormPage {
    path: String,
    form_type: FormType,
    document: Document,
    host_origin: Origin,
}

impl FormPage {
    /// `host_origin` is the only origin allowed to prefill this page and the
    /// only target of its submission notices.
    pub fn new(path: &str, document: Document, host_origin: Origin) -> Self {
        let form_type = FormType::identify(path, Some(&document));
        Self {
            path: path.to_string(),
            form_type,
            document,
            host_origin,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn form_type(&self) -> FormType {
        self.form_type
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Handle a message posted to this page.
    ///
    /// Messages from any origin other than the host are ignored, as are
    /// undecodable envelopes and kinds this side does not handle.  Returns
    /// the bind report when a prefill was applied.
    pub fn receive(&mut self, inbound: &InboundMessage) -> Option<BindReport> {
        if !inbound.is_from(&self.host_origin) {
            log::warn!(
                "form: ignoring message from untrusted origin {}",
                inbound.origin.ascii_serialization()
            );
            return None;
        }

        match inbound.decode() {
            Ok(CrossContextMessage::PrefillForm(payload)) => {
                log::info!("form: prefilling {} with {} field(s)", self.path, payload.len());
                Some(bind(&mut self.document, &payload))
            }
            Ok(other) => {
                log::debug!("form: ignoring {} on embedded side", other.kind());
                None
            }
            Err(e) => {
                log::debug!("form: {e}");
                None
            }
        }
    }

    /// Snapshot what a submit would send.  The returned value owns
    /// everything it needs, so no lock on the page is held while it is
    /// sent.
    pub fn prepare_submission(&self) -> PendingSubmission {
        PendingSubmission {
            payload: submission_payload(&self.document),
            form_type: self.form_type,
            host_origin: self.host_origin.clone(),
        }
    }
}

/// A serialized form waiting to be posted.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub payload: FieldMap,
    pub form_type: FormType,
    host_origin: Origin,
}

impl PendingSubmission {
    /// Post the payload to `sink`; on success notify the host through
    /// `port`.
    pub async fn send(
        self,
        sink: &dyn GrievanceSink,
        port: &PortSender,
    ) -> Result<SubmissionNotice, SubmitError> {
        let confirmation = sink.submit_grievance(&self.payload).await.map_err(|e| {
            log::error!("form: submission failed: {e}");
            SubmitError::from(e)
        })?;

        let notice = SubmissionNotice {
            message: confirmation.unwrap_or_else(|| DEFAULT_CONFIRMATION.to_string()),
            form_type: Some(self.form_type.as_str().to_string()),
            form_data: self.payload,
        };

        let posted = port.send(
            &CrossContextMessage::FormSubmitted(notice.clone()),
            &OriginConstraint::Exact(self.host_origin),
        );
        if !posted {
            log::warn!("form: submission notice was not delivered to the host");
        }
        Ok(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{origin_of, MessageBus};
    use crate::form::catalog::FormCatalog;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingSink {
        seen: Mutex<Vec<FieldMap>>,
        reply: Result<Option<String>, BackendError>,
    }

    #[async_trait]
    impl GrievanceSink for RecordingSink {
        async fn submit_grievance(&self, form: &FieldMap) -> Result<Option<String>, BackendError> {
            self.seen.lock().unwrap().push(form.clone());
            self.reply.clone()
        }
    }

    fn host() -> Origin {
        origin_of("http://localhost:5050").unwrap()
    }

    fn page() -> FormPage {
        let doc = FormCatalog::builtin().load("infrastructure").unwrap();
        FormPage::new("/forms/infrastructure", doc, host())
    }

    fn prefill(origin: Origin) -> InboundMessage {
        InboundMessage {
            origin,
            data: json!({ "type": "PREFILL_FORM", "payload": { "issue_location": "Main St" } }),
        }
    }

    #[test]
    fn identifies_type_from_path() {
        assert_eq!(page().form_type(), FormType::Infrastructure);
    }

    #[test]
    fn prefill_from_host_is_applied() {
        let mut page = page();
        let report = page.receive(&prefill(host())).unwrap();
        assert!(report.is_clean());
        assert_eq!(page.document().first("issue_location").unwrap().value, "Main St");
    }

    #[test]
    fn prefill_from_other_origin_is_ignored() {
        let mut page = page();
        let evil = origin_of("https://evil.example").unwrap();
        assert!(page.receive(&prefill(evil)).is_none());
        assert_eq!(page.document().first("issue_location").unwrap().value, "");
    }

    #[test]
    fn unknown_envelope_is_ignored() {
        let mut page = page();
        let inbound = InboundMessage {
            origin: host(),
            data: json!({ "type": "RESIZE", "payload": {} }),
        };
        assert!(page.receive(&inbound).is_none());
    }

    #[tokio::test]
    async fn successful_submit_notifies_host() {
        let (host_port, embedded_port) = MessageBus::pair(host(), host());
        let sink = RecordingSink {
            seen: Mutex::new(Vec::new()),
            reply: Ok(Some("Form submitted successfully via main app!".into())),
        };

        let notice = page()
            .prepare_submission()
            .send(&sink, embedded_port.sender())
            .await
            .unwrap();
        assert_eq!(notice.form_type.as_deref(), Some("infrastructure"));
        assert_eq!(sink.seen.lock().unwrap()[0]["declaration"], json!("False"));

        let (_tx, mut rx) = host_port.split();
        let inbound = rx.recv().await.unwrap();
        match inbound.decode().unwrap() {
            CrossContextMessage::FormSubmitted(n) => {
                assert_eq!(n.message, "Form submitted successfully via main app!");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_confirmation_uses_default_message() {
        let (_host_port, embedded_port) = MessageBus::pair(host(), host());
        let sink = RecordingSink {
            seen: Mutex::new(Vec::new()),
            reply: Ok(None),
        };
        let notice = page()
            .prepare_submission()
            .send(&sink, embedded_port.sender())
            .await
            .unwrap();
        assert_eq!(notice.message, "Form submitted.");
    }

    #[tokio::test]
    async fn failed_submit_posts_nothing() {
        let (host_port, embedded_port) = MessageBus::pair(host(), host());
        let sink = RecordingSink {
            seen: Mutex::new(Vec::new()),
            reply: Err(BackendError::Service("db down".into())),
        };

        let err = page()
            .prepare_submission()
            .send(&sink, embedded_port.sender())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::SubmissionFailure(_)));

        drop(embedded_port);
        let (_tx, mut rx) = host_port.split();
        assert!(rx.recv().await.is_none());
    }
}
