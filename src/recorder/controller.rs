//! Recording state machine.
//!
//! ```text
//! Idle ──start (granted)──▶ Recording ──stop──▶ Stopping
//!      ──start (denied)───▶ Idle                 │ Finished
//!                                                ▼
//!                           Idle ◀──empty── Processing ──job──▶ Transcriber
//!                                                │ complete
//!                                                ▼
//!                                   Idle (transcript / nothing heard)
//!                                   Error ──clear_error──▶ Idle
//! ```
//!
//! Transitions are synchronous.  The only network call (transcription) is
//! handed back to the caller as a [`TranscriptionJob`] so it can be spawned
//! without blocking the event loop; its result re-enters through
//! [`RecordingController::complete`].

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::backend::{AudioUnit, BackendError, Transcriber};
use crate::config::RecordingConfig;

use super::device::{CaptureDevice, CaptureEvent, CaptureSink, TrackGuard};

// ---------------------------------------------------------------------------
// RecordingState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    /// Stop requested; waiting for the device to finalize.
    Stopping,
    /// Audio handed to the transcriber.
    Processing,
    /// Transcription failed; cleared by the orchestrator after reporting.
    Error,
}

impl RecordingState {
    pub fn label(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Recording => "recording",
            RecordingState::Stopping => "stopping",
            RecordingState::Processing => "processing",
            RecordingState::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Why `start` was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    #[error("recorder is busy ({})", .0.label())]
    Busy(RecordingState),

    #[error("microphone access denied: {0}")]
    CaptureDenied(String),
}

/// Transcription failed.
#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    #[error("{0}")]
    Service(#[from] BackendError),

    #[error("transcription task aborted: {0}")]
    Aborted(String),
}

/// What to do after the device finalized.
pub enum ProcessingStep {
    /// Nothing was captured; the controller is back to `Idle`.
    Empty,
    /// Run this job and pass its result to
    /// [`RecordingController::complete`].
    Submit(TranscriptionJob),
}

/// Result of a finished transcription.
#[derive(Debug, Clone)]
pub enum RecordingOutcome {
    /// Non-empty transcript; feed it in as typed input.
    Transcript(String),
    /// The service heard nothing usable.
    NoTranscript,
    /// The controller is in `Error` until [`RecordingController::clear_error`].
    Failed(TranscriptionError),
    /// The controller was not processing; the result was dropped.
    Stale,
}

/// A pending transcription request.
pub struct TranscriptionJob {
    unit: AudioUnit,
    language: String,
    transcriber: Arc<dyn Transcriber>,
}

impl TranscriptionJob {
    pub fn unit(&self) -> &AudioUnit {
        &self.unit
    }

    pub async fn run(self) -> Result<String, TranscriptionError> {
        log::info!(
            "recorder: transcribing {} bytes ({}, language={})",
            self.unit.bytes.len(),
            self.unit.mime_type,
            self.language
        );
        Ok(self.transcriber.transcribe(&self.unit, &self.language).await?)
    }
}

// ---------------------------------------------------------------------------
// RecordingController
// ---------------------------------------------------------------------------

pub struct RecordingController {
    device: Arc<dyn CaptureDevice>,
    transcriber: Arc<dyn Transcriber>,
    mime_preferences: Vec<String>,
    fallback_mime: String,

    state: RecordingState,
    session: u64,
    chunks: Vec<Vec<u8>>,
    mime_type: String,
    track: Option<TrackGuard>,

    events_tx: mpsc::UnboundedSender<CaptureEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<CaptureEvent>>,
}

impl RecordingController {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        transcriber: Arc<dyn Transcriber>,
        config: &RecordingConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            device,
            transcriber,
            mime_preferences: config.mime_preferences.clone(),
            fallback_mime: config.fallback_mime.clone(),
            state: RecordingState::Idle,
            session: 0,
            chunks: Vec::new(),
            mime_type: config.fallback_mime.clone(),
            track: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Take the receiver of device events.  Feed every event back into
    /// [`handle_event`](Self::handle_event).  Returns `None` after the first
    /// call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<CaptureEvent>> {
        self.events_rx.take()
    }

    /// First preferred encoding the device supports, else the fallback.
    pub fn choose_mime(&self) -> String {
        self.mime_preferences
            .iter()
            .find(|m| self.device.supports(m))
            .cloned()
            .unwrap_or_else(|| self.fallback_mime.clone())
    }

    /// Acquire the device and begin recording.
    ///
    /// Only valid from `Idle`.  A denied or failed acquisition leaves the
    /// controller `Idle`.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        if self.state != RecordingState::Idle {
            return Err(RecorderError::Busy(self.state));
        }

        let mime = self.choose_mime();
        self.session += 1;
        let sink = CaptureSink::new(self.session, self.events_tx.clone());

        match self.device.open(&mime, sink).await {
            Ok(track) => {
                self.chunks.clear();
                self.mime_type = mime;
                self.track = Some(TrackGuard::new(track));
                self.state = RecordingState::Recording;
                log::info!(
                    "recorder: recording session {} ({})",
                    self.session,
                    self.mime_type
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("recorder: capture denied: {e}");
                Err(RecorderError::CaptureDenied(e.to_string()))
            }
        }
    }

    /// Ask the device to finalize.  No-op unless `Recording`; returns
    /// whether a stop was issued.
    pub fn stop(&mut self) -> bool {
        if self.state != RecordingState::Recording {
            log::debug!("recorder: stop ignored in {}", self.state.label());
            return false;
        }
        self.state = RecordingState::Stopping;
        if let Some(track) = self.track.as_mut() {
            track.stop();
        }
        true
    }

    /// Apply one device event.  Returns a step when the recording finalized.
    pub fn handle_event(&mut self, event: CaptureEvent, language: &str) -> Option<ProcessingStep> {
        if event.session() != self.session {
            log::debug!("recorder: dropping event from session {}", event.session());
            return None;
        }

        match event {
            CaptureEvent::Data { bytes, .. } => {
                if matches!(self.state, RecordingState::Recording | RecordingState::Stopping) {
                    self.chunks.push(bytes);
                }
                None
            }
            CaptureEvent::Finished { .. } => {
                if !matches!(self.state, RecordingState::Recording | RecordingState::Stopping) {
                    return None;
                }
                Some(self.finish(language))
            }
        }
    }

    fn finish(&mut self, language: &str) -> ProcessingStep {
        self.state = RecordingState::Processing;
        self.track = None;

        let bytes = std::mem::take(&mut self.chunks).concat();
        if bytes.is_empty() {
            log::info!("recorder: nothing captured");
            self.state = RecordingState::Idle;
            return ProcessingStep::Empty;
        }

        ProcessingStep::Submit(TranscriptionJob {
            unit: AudioUnit {
                bytes,
                mime_type: self.mime_type.clone(),
            },
            language: language.to_string(),
            transcriber: self.transcriber.clone(),
        })
    }

    /// Apply the transcription result.
    pub fn complete(&mut self, result: Result<String, TranscriptionError>) -> RecordingOutcome {
        if self.state != RecordingState::Processing {
            log::warn!(
                "recorder: transcription result arrived in {}, dropped",
                self.state.label()
            );
            return RecordingOutcome::Stale;
        }

        match result {
            Ok(text) if !text.trim().is_empty() => {
                self.state = RecordingState::Idle;
                RecordingOutcome::Transcript(text.trim().to_string())
            }
            Ok(_) => {
                log::info!("recorder: empty transcript");
                self.state = RecordingState::Idle;
                RecordingOutcome::NoTranscript
            }
            Err(e) => {
                log::error!("recorder: transcription failed: {e}");
                self.state = RecordingState::Error;
                RecordingOutcome::Failed(e)
            }
        }
    }

    /// Acknowledge a reported failure.
    pub fn clear_error(&mut self) {
        if self.state == RecordingState::Error {
            self.state = RecordingState::Idle;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::device::{CaptureTrack, DeviceError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    // -- Test doubles --------------------------------------------------------

    /// Emits the configured chunks when stopped.
    struct ScriptedDevice {
        chunks: Vec<Vec<u8>>,
        deny: bool,
        supported: Vec<&'static str>,
        released: Arc<AtomicBool>,
        opened_with: Mutex<Vec<String>>,
    }

    impl ScriptedDevice {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks,
                deny: false,
                supported: vec!["audio/ogg;codecs=opus"],
                released: Arc::new(AtomicBool::new(false)),
                opened_with: Mutex::new(Vec::new()),
            }
        }
    }

    struct ScriptedTrack {
        chunks: Vec<Vec<u8>>,
        sink: CaptureSink,
        released: Arc<AtomicBool>,
    }

    impl CaptureTrack for ScriptedTrack {
        fn stop(&mut self) {
            for chunk in self.chunks.drain(..) {
                self.sink.data(chunk);
            }
            self.sink.finished();
        }
        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CaptureDevice for ScriptedDevice {
        fn supports(&self, mime_type: &str) -> bool {
            self.supported.contains(&mime_type)
        }

        async fn open(
            &self,
            mime_type: &str,
            sink: CaptureSink,
        ) -> Result<Box<dyn CaptureTrack>, DeviceError> {
            if self.deny {
                return Err(DeviceError::PermissionDenied);
            }
            self.opened_with.lock().unwrap().push(mime_type.to_string());
            Ok(Box::new(ScriptedTrack {
                chunks: self.chunks.clone(),
                sink,
                released: self.released.clone(),
            }))
        }
    }

    struct CountingTranscriber {
        calls: AtomicUsize,
        reply: Result<String, BackendError>,
    }

    #[async_trait]
    impl Transcriber for CountingTranscriber {
        async fn transcribe(&self, _: &AudioUnit, _: &str) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn transcriber(reply: Result<String, BackendError>) -> Arc<CountingTranscriber> {
        Arc::new(CountingTranscriber {
            calls: AtomicUsize::new(0),
            reply,
        })
    }

    fn controller(
        device: Arc<ScriptedDevice>,
        transcriber: Arc<CountingTranscriber>,
    ) -> RecordingController {
        RecordingController::new(device, transcriber, &RecordingConfig::default())
    }

    /// Drain queued device events until one yields a step.
    fn pump(ctl: &mut RecordingController, rx: &mut mpsc::UnboundedReceiver<CaptureEvent>) -> Option<ProcessingStep> {
        while let Ok(event) = rx.try_recv() {
            if let Some(step) = ctl.handle_event(event, "en") {
                return Some(step);
            }
        }
        None
    }

    // -- Tests ---------------------------------------------------------------

    #[test]
    fn stop_while_idle_is_noop() {
        let mut ctl = controller(Arc::new(ScriptedDevice::new(vec![])), transcriber(Ok("x".into())));
        assert!(!ctl.stop());
        assert_eq!(ctl.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn start_while_recording_is_busy() {
        let device = Arc::new(ScriptedDevice::new(vec![vec![1]]));
        let mut ctl = controller(device.clone(), transcriber(Ok("x".into())));
        ctl.start().await.unwrap();

        let err = ctl.start().await.unwrap_err();
        assert_eq!(err, RecorderError::Busy(RecordingState::Recording));
        assert_eq!(ctl.state(), RecordingState::Recording);
        assert_eq!(device.opened_with.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn denial_stays_idle() {
        let mut device = ScriptedDevice::new(vec![]);
        device.deny = true;
        let mut ctl = controller(Arc::new(device), transcriber(Ok("x".into())));

        assert!(matches!(ctl.start().await, Err(RecorderError::CaptureDenied(_))));
        assert_eq!(ctl.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn picks_first_supported_encoding() {
        let device = Arc::new(ScriptedDevice::new(vec![]));
        let mut ctl = controller(device.clone(), transcriber(Ok("x".into())));
        ctl.start().await.unwrap();
        assert_eq!(device.opened_with.lock().unwrap()[0], "audio/ogg;codecs=opus");

        let mut none = ScriptedDevice::new(vec![]);
        none.supported.clear();
        let ctl = controller(Arc::new(none), transcriber(Ok("x".into())));
        assert_eq!(ctl.choose_mime(), "audio/webm");
    }

    #[tokio::test]
    async fn empty_capture_never_transcribes() {
        let device = Arc::new(ScriptedDevice::new(vec![]));
        let stt = transcriber(Ok("x".into()));
        let mut ctl = controller(device.clone(), stt.clone());
        let mut rx = ctl.take_events().unwrap();

        ctl.start().await.unwrap();
        assert!(ctl.stop());
        assert_eq!(ctl.state(), RecordingState::Stopping);

        assert!(matches!(pump(&mut ctl, &mut rx), Some(ProcessingStep::Empty)));
        assert_eq!(ctl.state(), RecordingState::Idle);
        assert_eq!(stt.calls.load(Ordering::SeqCst), 0);
        assert!(device.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn full_cycle_yields_transcript() {
        let device = Arc::new(ScriptedDevice::new(vec![vec![1, 2], vec![3]]));
        let stt = transcriber(Ok("  pothole on Main St ".into()));
        let mut ctl = controller(device.clone(), stt.clone());
        let mut rx = ctl.take_events().unwrap();

        ctl.start().await.unwrap();
        ctl.stop();

        let job = match pump(&mut ctl, &mut rx) {
            Some(ProcessingStep::Submit(job)) => job,
            _ => panic!("expected a transcription job"),
        };
        assert_eq!(ctl.state(), RecordingState::Processing);
        assert_eq!(job.unit().bytes, vec![1, 2, 3]);
        assert_eq!(job.unit().mime_type, "audio/ogg;codecs=opus");
        assert!(device.released.load(Ordering::SeqCst));

        let outcome = ctl.complete(job.run().await);
        assert!(matches!(outcome, RecordingOutcome::Transcript(ref t) if t == "pothole on Main St"));
        assert_eq!(ctl.state(), RecordingState::Idle);
        assert_eq!(stt.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_enters_error_until_cleared() {
        let device = Arc::new(ScriptedDevice::new(vec![vec![9]]));
        let stt = transcriber(Err(BackendError::Service("Transcription failed".into())));
        let mut ctl = controller(device, stt);
        let mut rx = ctl.take_events().unwrap();

        ctl.start().await.unwrap();
        ctl.stop();
        let Some(ProcessingStep::Submit(job)) = pump(&mut ctl, &mut rx) else {
            panic!("expected a transcription job");
        };

        assert!(matches!(ctl.complete(job.run().await), RecordingOutcome::Failed(_)));
        assert_eq!(ctl.state(), RecordingState::Error);
        assert!(matches!(ctl.start().await, Err(RecorderError::Busy(RecordingState::Error))));

        ctl.clear_error();
        assert_eq!(ctl.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn empty_transcript_returns_to_idle() {
        let device = Arc::new(ScriptedDevice::new(vec![vec![9]]));
        let mut ctl = controller(device, transcriber(Ok("   ".into())));
        let mut rx = ctl.take_events().unwrap();

        ctl.start().await.unwrap();
        ctl.stop();
        let Some(ProcessingStep::Submit(job)) = pump(&mut ctl, &mut rx) else {
            panic!("expected a transcription job");
        };
        assert!(matches!(ctl.complete(job.run().await), RecordingOutcome::NoTranscript));
        assert_eq!(ctl.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn stale_session_events_are_dropped() {
        let device = Arc::new(ScriptedDevice::new(vec![]));
        let mut ctl = controller(device, transcriber(Ok("x".into())));
        ctl.start().await.unwrap();

        let stale = CaptureEvent::Data {
            session: 0,
            bytes: vec![1],
        };
        assert!(ctl.handle_event(stale, "en").is_none());
        assert!(ctl
            .handle_event(CaptureEvent::Finished { session: 0 }, "en")
            .is_none());
        assert_eq!(ctl.state(), RecordingState::Recording);
    }

    #[test]
    fn complete_outside_processing_is_stale() {
        let mut ctl = controller(Arc::new(ScriptedDevice::new(vec![])), transcriber(Ok("x".into())));
        assert!(matches!(ctl.complete(Ok("late".into())), RecordingOutcome::Stale));
        assert_eq!(ctl.state(), RecordingState::Idle);
    }
}
