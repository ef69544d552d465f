//! `LocalFrame`: an in-process embedded context.
//!
//! Owns the embedded half of the bus.  A pump task applies inbound messages
//! to the loaded [`FormPage`]; the page itself sits behind a
//! `std::sync::Mutex` that is never held across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::{Origin, Url};

use crate::backend::GrievanceSink;
use crate::bus::{blank_origin, ContextPort, FieldMap, PortSender, SubmissionNotice};
use crate::form::{bind, BindReport, FormPage, FormType, SubmitError};

use super::loader::FormLoader;
use super::{EmbeddedFrame, FrameError};

/// Something that happened inside the embedded context.
#[derive(Debug, Clone)]
pub enum FrameNotice {
    Loaded { path: String, form_type: FormType },
    Prefilled(BindReport),
    Submitted(SubmissionNotice),
    Reset,
}

type PageSlot = Arc<Mutex<Option<FormPage>>>;

fn lock(slot: &Mutex<Option<FormPage>>) -> MutexGuard<'_, Option<FormPage>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct LocalFrame {
    loader: Arc<dyn FormLoader>,
    sink: Arc<dyn GrievanceSink>,
    base: Url,
    host_origin: Origin,
    port: PortSender,
    page: PageSlot,
    generation: AtomicU64,
    notices: broadcast::Sender<FrameNotice>,
    pump: JoinHandle<()>,
}

impl LocalFrame {
    /// Start the embedded context on `port`.
    ///
    /// Relative addresses are resolved against `base`, whose origin is also
    /// the host origin trusted for prefills.  Must be called inside a tokio
    /// runtime.
    pub fn new(
        port: ContextPort,
        loader: Arc<dyn FormLoader>,
        sink: Arc<dyn GrievanceSink>,
        base: Url,
    ) -> Self {
        let page: PageSlot = Arc::new(Mutex::new(None));
        let (notices, _) = broadcast::channel(32);

        let pump_page = page.clone();
        let pump_notices = notices.clone();
        let (port, pump) = port.on_receive(move |inbound| {
            let report = lock(&pump_page).as_mut().and_then(|p| p.receive(&inbound));
            if let Some(report) = report {
                let _ = pump_notices.send(FrameNotice::Prefilled(report));
            }
        });

        Self {
            loader,
            sink,
            host_origin: base.origin(),
            base,
            port,
            page,
            generation: AtomicU64::new(0),
            notices,
            pump,
        }
    }

    /// Receive notices about loads, prefills, submissions and resets.
    pub fn subscribe(&self) -> broadcast::Receiver<FrameNotice> {
        self.notices.subscribe()
    }

    /// A copy of the loaded page.
    pub fn snapshot(&self) -> Option<FormPage> {
        lock(&self.page).clone()
    }

    /// Edit one field as the user would.  `None` when no form is loaded.
    pub fn set_field(&self, name: &str, value: &str) -> Option<BindReport> {
        let mut payload = FieldMap::new();
        payload.insert(name.to_string(), serde_json::Value::String(value.to_string()));
        lock(&self.page)
            .as_mut()
            .map(|p| bind(p.document_mut(), &payload))
    }

    /// Submit the loaded form.  On failure the form stays loaded.
    pub async fn submit(&self) -> Result<SubmissionNotice, SubmitError> {
        let pending = lock(&self.page)
            .as_ref()
            .map(FormPage::prepare_submission)
            .ok_or(SubmitError::NoForm)?;

        let notice = pending.send(self.sink.as_ref(), &self.port).await?;
        let _ = self.notices.send(FrameNotice::Submitted(notice.clone()));
        Ok(notice)
    }

    fn blank(&self) {
        *lock(&self.page) = None;
        self.port.relocate(blank_origin());
    }
}

#[async_trait]
impl EmbeddedFrame for LocalFrame {
    async fn navigate(&self, address: &str) -> Result<Origin, FrameError> {
        let url = self
            .base
            .join(address)
            .map_err(|e| FrameError::InvalidAddress(format!("{address}: {e}")))?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // The previous document is gone as soon as navigation starts.
        self.blank();
        log::info!("frame: loading {url}");

        let document = self.loader.load(&url).await?;
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("frame: load of {url} superseded");
            return Err(FrameError::Superseded);
        }

        let origin = url.origin();
        let page = FormPage::new(url.path(), document, self.host_origin.clone());
        let notice = FrameNotice::Loaded {
            path: page.path().to_string(),
            form_type: page.form_type(),
        };
        *lock(&self.page) = Some(page);
        self.port.relocate(origin.clone());
        let _ = self.notices.send(notice);
        Ok(origin)
    }

    fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.blank();
        log::info!("frame: reset to blank");
        let _ = self.notices.send(FrameNotice::Reset);
    }
}

impl Drop for LocalFrame {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::bus::{origin_of, CrossContextMessage, MessageBus, OriginConstraint};
    use crate::form::FormCatalog;
    use crate::frame::CatalogLoader;
    use serde_json::json;

    struct OkSink;

    #[async_trait]
    impl GrievanceSink for OkSink {
        async fn submit_grievance(&self, _: &FieldMap) -> Result<Option<String>, BackendError> {
            Ok(Some("Grievance recorded".into()))
        }
    }

    fn base() -> Url {
        Url::parse("http://localhost:5050/").unwrap()
    }

    fn frame() -> (ContextPort, LocalFrame) {
        let (host, embedded) = MessageBus::pair(base().origin(), blank_origin());
        let loader = Arc::new(CatalogLoader::new(Arc::new(FormCatalog::builtin()), base()));
        (host, LocalFrame::new(embedded, loader, Arc::new(OkSink), base()))
    }

    fn prefill(value: serde_json::Value) -> CrossContextMessage {
        CrossContextMessage::PrefillForm(value.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn navigate_loads_and_relocates() {
        let (host, frame) = frame();
        let origin = frame.navigate("/forms/corruption").await.unwrap();

        assert_eq!(origin, origin_of("http://localhost:5050").unwrap());
        assert_eq!(host.sender().peer_origin(), origin);
        assert_eq!(frame.snapshot().unwrap().form_type(), FormType::Corruption);
    }

    #[tokio::test]
    async fn failed_navigation_leaves_frame_blank() {
        let (host, frame) = frame();
        frame.navigate("/forms/funds").await.unwrap();
        let err = frame.navigate("/forms/nope").await.unwrap_err();

        assert!(matches!(err, FrameError::NotFound(_)));
        assert!(frame.snapshot().is_none());
        assert_ne!(host.sender().peer_origin(), base().origin());
    }

    #[tokio::test]
    async fn prefill_reaches_loaded_page() {
        let (host, frame) = frame();
        let mut notices = frame.subscribe();
        let origin = frame.navigate("/forms/infrastructure").await.unwrap();

        host.sender().send(
            &prefill(json!({ "issue_location": "Main St", "issue_duration": "1-4 weeks" })),
            &OriginConstraint::Exact(origin),
        );

        loop {
            if let FrameNotice::Prefilled(report) = notices.recv().await.unwrap() {
                assert!(report.is_clean());
                break;
            }
        }
        let page = frame.snapshot().unwrap();
        assert_eq!(page.document().first("issue_location").unwrap().value, "Main St");
        assert_eq!(
            page.document().first("issue_duration").unwrap().selected_value(),
            Some("one_to_four_weeks")
        );
    }

    #[tokio::test]
    async fn reset_blanks_and_blocks_exact_posts() {
        let (host, frame) = frame();
        let origin = frame.navigate("/forms/funds").await.unwrap();
        frame.reset();

        assert!(frame.snapshot().is_none());
        assert!(!host
            .sender()
            .send(&prefill(json!({ "scheme_name": "x" })), &OriginConstraint::Exact(origin)));
    }

    #[tokio::test]
    async fn submit_posts_notice_to_host() {
        let (host, frame) = frame();
        frame.navigate("/forms/govt_service").await.unwrap();
        frame.set_field("declaration", "on").unwrap();

        let notice = frame.submit().await.unwrap();
        assert_eq!(notice.message, "Grievance recorded");
        assert_eq!(notice.form_data["declaration"], json!("True"));

        let (_tx, mut rx) = host.split();
        let inbound = rx.recv().await.unwrap();
        assert!(inbound.is_from(&base().origin()));
        assert!(matches!(
            inbound.decode().unwrap(),
            CrossContextMessage::FormSubmitted(_)
        ));
    }

    #[tokio::test]
    async fn submit_without_form_fails() {
        let (_host, frame) = frame();
        assert!(matches!(frame.submit().await, Err(SubmitError::NoForm)));
    }
}
