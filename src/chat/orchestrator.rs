//! `ConversationOrchestrator`: the host context's event loop.
//!
//! ```text
//!  HostEvent ──▶ ┌──────────────────────────┐ ──TurnRequest──▶ ChatBackend
//!  CaptureEvent ▶│ ConversationOrchestrator │ ──navigate/reset─▶ EmbeddedFrame
//!  Completion ──▶│  SessionContext, status  │ ──PREFILL_FORM──▶ MessageBus
//!  bus inbound ─▶└──────────────────────────┘ ──speak──────────▶ SpeechOutput
//! ```
//!
//! Network calls are spawned and come back as completions, so the loop
//! never waits on the network.  Every turn carries a monotonic id and every
//! form load a navigation number; results older than the latest issued are
//! dropped.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use url::Origin;

use crate::backend::{BackendError, BotAction, ChatBackend, InitResponse, TurnRequest, TurnResponse};
use crate::bus::{
    ContextPort, CrossContextMessage, FieldMap, InboundMessage, OriginConstraint, PortReceiver,
    PortSender,
};
use crate::config::ChatFlow;
use crate::frame::{EmbeddedFrame, FrameError};
use crate::recorder::{
    CaptureEvent, ProcessingStep, RecorderError, RecordingController, RecordingOutcome,
    RecordingState, TranscriptionError,
};
use crate::speech::SpeechOutput;

use super::session::ChatMessage;
use super::state::{lock_host, HostNotice, HostState, SharedHostState, MIC_READY};

const INIT_FAILED: &str = "Error initializing chat. Please refresh.";
const MIC_LISTENING: &str = "Listening... Click mic to stop.";
const MIC_PROCESSING: &str = "Processing...";
const MIC_TRANSCRIBING: &str = "Transcribing...";
const MIC_NO_AUDIO: &str = "No audio. Click mic to speak.";
const MIC_NO_TRANSCRIPT: &str = "No transcript. Try again.";
const MIC_STT_ERROR: &str = "Transcription Error. Try again.";
const MIC_DENIED: &str = "Mic access denied or error.";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Input from the user or the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Start (or restart) the conversation.
    Initialize,
    /// Send typed text.
    SubmitText(String),
    /// Mic button.
    ToggleMic,
}

/// Result of a spawned network call.
enum Completion {
    Init(Result<InitResponse, BackendError>),
    Turn {
        id: u64,
        result: Result<TurnResponse, BackendError>,
    },
    Transcription(Result<String, TranscriptionError>),
    FrameLoaded {
        navigation: u64,
        form_type: Option<String>,
        prefill: Option<FieldMap>,
        result: Result<Origin, FrameError>,
    },
}

// ---------------------------------------------------------------------------
// ConversationOrchestrator
// ---------------------------------------------------------------------------

/// Drives one chat session.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use voice_form_assistant::backend::ChatBackend;
/// # use voice_form_assistant::bus::ContextPort;
/// # use voice_form_assistant::frame::EmbeddedFrame;
/// # use voice_form_assistant::recorder::RecordingController;
/// # use voice_form_assistant::speech::SpeechOutput;
/// use voice_form_assistant::chat::{new_shared_host_state, ConversationOrchestrator, HostEvent};
/// use voice_form_assistant::config::ChatFlow;
///
/// # async fn example(
/// #     host_port: ContextPort,
/// #     backend: Arc<dyn ChatBackend>,
/// #     frame: Arc<dyn EmbeddedFrame>,
/// #     recorder: RecordingController,
/// #     speech: SpeechOutput,
/// # ) {
/// let state = new_shared_host_state("en");
/// let orchestrator = ConversationOrchestrator::new(
///     state.clone(),
///     ChatFlow::Grievance,
///     host_port,
///     backend,
///     frame,
///     recorder,
///     speech,
/// );
///
/// let (events_tx, events_rx) = tokio::sync::mpsc::channel(16);
/// events_tx.send(HostEvent::Initialize).await.unwrap();
/// orchestrator.run(events_rx).await;
/// # }
/// ```
pub struct ConversationOrchestrator {
    state: SharedHostState,
    flow: ChatFlow,
    backend: Arc<dyn ChatBackend>,
    frame: Arc<dyn EmbeddedFrame>,
    port: PortSender,
    inbound: PortReceiver,
    host_origin: Origin,
    recorder: RecordingController,
    capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
    speech: SpeechOutput,

    latest_turn: u64,
    navigation: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    notices: Option<mpsc::UnboundedSender<HostNotice>>,
}

impl ConversationOrchestrator {
    pub fn new(
        state: SharedHostState,
        flow: ChatFlow,
        host_port: ContextPort,
        backend: Arc<dyn ChatBackend>,
        frame: Arc<dyn EmbeddedFrame>,
        mut recorder: RecordingController,
        speech: SpeechOutput,
    ) -> Self {
        let host_origin = host_port.sender().origin();
        let (port, inbound) = host_port.split();
        let capture_rx = recorder
            .take_events()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            state,
            flow,
            backend,
            frame,
            port,
            inbound,
            host_origin,
            recorder,
            capture_rx,
            speech,
            latest_turn: 0,
            navigation: 0,
            completions_tx,
            completions_rx,
            in_flight: 0,
            notices: None,
        }
    }

    /// Also report changes on `tx`.
    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<HostNotice>) -> Self {
        self.notices = Some(tx);
        self
    }

    pub fn state(&self) -> SharedHostState {
        self.state.clone()
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Run until `events` is closed.
    pub async fn run(mut self, mut events: mpsc::Receiver<HostEvent>) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
                Some(event) = self.capture_rx.recv() => self.on_capture(event),
                Some(done) = self.completions_rx.recv() => self.on_completion(done),
                Some(inbound) = self.inbound.recv() => self.on_inbound(inbound),
            }
        }
        self.speech.silence();
        log::info!("chat: event channel closed, orchestrator shutting down");
    }

    pub async fn dispatch(&mut self, event: HostEvent) {
        match event {
            HostEvent::Initialize => self.initialize(),
            HostEvent::SubmitText(text) => self.submit_user_text(&text),
            HostEvent::ToggleMic => self.toggle_mic().await,
        }
    }

    /// Process queued device events and bus messages, then wait for every
    /// in-flight network call (and any call it triggers) to be applied.
    pub async fn settle(&mut self) {
        loop {
            while let Ok(event) = self.capture_rx.try_recv() {
                self.on_capture(event);
            }
            self.poll_inbound();
            if self.in_flight == 0 {
                break;
            }
            match self.completions_rx.recv().await {
                Some(done) => self.on_completion(done),
                None => break,
            }
        }
    }

    /// Apply bus messages that have already arrived.
    pub fn poll_inbound(&mut self) {
        while let Some(inbound) = self.inbound.try_recv() {
            self.on_inbound(inbound);
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Ask the backend for the conversation start.
    pub fn initialize(&mut self) {
        let backend = self.backend.clone();
        let flow = self.flow;
        log::info!("chat: initializing {flow:?} conversation");
        self.spawn(
            async move { Completion::Init(backend.init_chat(flow).await) },
            |reason| Completion::Init(Err(BackendError::Request(reason))),
        );
    }

    /// Send a user turn.  Blank text is ignored.
    pub fn submit_user_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.append(ChatMessage::user(text));
        self.set_input("");

        self.latest_turn += 1;
        let id = self.latest_turn;
        let request = TurnRequest {
            message: text.to_string(),
            language: self.language(),
        };
        let backend = self.backend.clone();
        log::debug!("chat: turn {id} sent");
        self.spawn(
            async move {
                Completion::Turn {
                    id,
                    result: backend.send_message(&request).await,
                }
            },
            move |reason| Completion::Turn {
                id,
                result: Err(BackendError::Request(reason)),
            },
        );
    }

    /// Start recording when idle, stop when recording.
    pub async fn toggle_mic(&mut self) {
        match self.recorder.state() {
            RecordingState::Idle => match self.recorder.start().await {
                Ok(()) => self.set_mic_status(MIC_LISTENING),
                Err(RecorderError::CaptureDenied(reason)) => {
                    self.set_mic_status(MIC_DENIED);
                    self.append_bot(&format!("Microphone unavailable: {reason}"), None);
                }
                Err(e) => log::warn!("chat: {e}"),
            },
            RecordingState::Recording => {
                if self.recorder.stop() {
                    self.set_mic_status(MIC_PROCESSING);
                }
            }
            other => log::debug!("chat: mic toggle ignored while {}", other.label()),
        }
        self.sync_recording();
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn on_capture(&mut self, event: CaptureEvent) {
        let language = self.language();
        match self.recorder.handle_event(event, &language) {
            None => {}
            Some(ProcessingStep::Empty) => self.set_mic_status(MIC_NO_AUDIO),
            Some(ProcessingStep::Submit(job)) => {
                self.set_mic_status(MIC_TRANSCRIBING);
                log::debug!(
                    "chat: transcribing {} bytes ({})",
                    job.unit().bytes.len(),
                    job.unit().mime_type
                );
                self.spawn(
                    async move { Completion::Transcription(job.run().await) },
                    |reason| Completion::Transcription(Err(TranscriptionError::Aborted(reason))),
                );
            }
        }
        self.sync_recording();
    }

    fn on_completion(&mut self, done: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match done {
            Completion::Init(result) => self.on_init(result),
            Completion::Turn { id, result } => {
                if id < self.latest_turn {
                    log::warn!(
                        "chat: discarding response to turn {id}, turn {} is newer",
                        self.latest_turn
                    );
                    return;
                }
                match result {
                    Ok(response) => self.on_turn(response),
                    Err(e) => {
                        log::error!("chat: turn {id} failed: {e}");
                        self.append_bot(&format!("Error: {e}"), None);
                    }
                }
            }
            Completion::Transcription(result) => self.on_transcription(result),
            Completion::FrameLoaded {
                navigation,
                form_type,
                prefill,
                result,
            } => self.on_frame_loaded(navigation, form_type, prefill, result),
        }
    }

    fn on_init(&mut self, result: Result<InitResponse, BackendError>) {
        let init = match result {
            Ok(init) => init,
            Err(e) => {
                log::error!("chat: initialization failed: {e}");
                self.append(ChatMessage::bot(INIT_FAILED, None));
                return;
            }
        };

        let replayed = self.with_state(|s| {
            s.session.replace_history(&init.history);
            s.session.history().to_vec()
        });
        for message in replayed {
            self.notify(HostNotice::Message(message));
        }

        let Some(greeting) = init.bot_response.filter(|g| !g.trim().is_empty()) else {
            return;
        };
        // Appended even when the replayed history ends with the same text.
        self.with_state(|s| s.session.update_language(init.language.as_deref()));
        self.append_bot(&greeting, init.audio_url);
    }

    fn on_turn(&mut self, response: TurnResponse) {
        if let Some(text) = response
            .bot_response
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            self.with_state(|s| s.session.update_language(response.language.as_deref()));
            self.append_bot(text, response.audio_url.clone());
        }

        match response.bot_action() {
            Some(BotAction::LoadForm {
                url,
                form_type,
                prefill,
            }) => self.load_form(url, form_type, prefill),
            Some(BotAction::FormSubmitted) => {
                self.set_form_status("Form submission confirmed. Thank you!");
                self.reset_frame();
            }
            Some(BotAction::EndConversation) => {
                self.set_form_status("Conversation ended.");
                self.with_state(|s| s.ended = true);
            }
            None => {}
        }
    }

    fn on_transcription(&mut self, result: Result<String, TranscriptionError>) {
        match self.recorder.complete(result) {
            RecordingOutcome::Transcript(text) => {
                self.set_input(&text);
                self.submit_user_text(&text);
                self.set_mic_status(MIC_READY);
            }
            RecordingOutcome::NoTranscript => self.set_mic_status(MIC_NO_TRANSCRIPT),
            RecordingOutcome::Failed(e) => {
                self.set_mic_status(MIC_STT_ERROR);
                self.append_bot(&format!("STT Error: {e}"), None);
                self.recorder.clear_error();
            }
            RecordingOutcome::Stale => {}
        }
        self.sync_recording();
    }

    fn on_frame_loaded(
        &mut self,
        navigation: u64,
        form_type: Option<String>,
        prefill: Option<FieldMap>,
        result: Result<Origin, FrameError>,
    ) {
        if navigation != self.navigation {
            log::warn!("chat: discarding form load {navigation}, superseded");
            return;
        }

        match result {
            Ok(origin) => {
                let mut status = format!("{} form loaded.", form_type.as_deref().unwrap_or("Grievance"));
                if let Some(payload) = prefill.filter(|p| !p.is_empty()) {
                    let delivered = self.port.send(
                        &CrossContextMessage::PrefillForm(payload),
                        &OriginConstraint::Exact(origin),
                    );
                    if delivered {
                        status.push_str(" Form data pre-filled.");
                    } else {
                        log::warn!(
                            "chat: prefill was not delivered, embedded context is at {}",
                            self.port.peer_origin().ascii_serialization()
                        );
                    }
                }
                self.set_form_status(&status);
            }
            Err(FrameError::Superseded) => log::debug!("chat: form load superseded"),
            Err(e) => {
                log::error!("chat: form load failed: {e}");
                self.set_form_status(&format!(
                    "Could not load {} form: {e}",
                    form_type.as_deref().unwrap_or("grievance")
                ));
            }
        }
    }

    fn on_inbound(&mut self, inbound: InboundMessage) {
        if !inbound.is_from(&self.host_origin) {
            log::warn!(
                "chat: ignoring message from {}",
                inbound.origin.ascii_serialization()
            );
            return;
        }

        match inbound.decode() {
            Ok(CrossContextMessage::FormSubmitted(notice)) => {
                self.set_form_status(&format!("Form submitted: {}", notice.message));
                let form_type = notice
                    .form_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "grievance".to_string());
                self.append_bot(&format!("The {form_type} form has been submitted."), None);
                self.reset_frame();
            }
            Ok(other) => log::debug!("chat: ignoring {} on host side", other.kind()),
            Err(e) => log::debug!("chat: {e}"),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn load_form(&mut self, url: String, form_type: Option<String>, prefill: Option<FieldMap>) {
        let form_type = form_type.filter(|t| !t.trim().is_empty());
        self.set_form_status(&format!(
            "Loading {} form...",
            form_type.as_deref().unwrap_or("grievance")
        ));

        self.navigation += 1;
        let navigation = self.navigation;
        let frame = self.frame.clone();
        let aborted_type = form_type.clone();
        self.spawn(
            async move {
                let result = frame.navigate(&url).await;
                Completion::FrameLoaded {
                    navigation,
                    form_type,
                    prefill,
                    result,
                }
            },
            move |reason| Completion::FrameLoaded {
                navigation,
                form_type: aborted_type,
                prefill: None,
                result: Err(FrameError::Aborted(reason)),
            },
        );
    }

    fn reset_frame(&mut self) {
        self.navigation += 1;
        self.frame.reset();
    }

    /// Run `task` and deliver its completion. A task that panics or is
    /// cancelled still delivers `aborted`, so `in_flight` always settles.
    fn spawn<F, A>(&mut self, task: F, aborted: A)
    where
        F: Future<Output = Completion> + Send + 'static,
        A: FnOnce(String) -> Completion + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.completions_tx.clone();
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            let completion = match handle.await {
                Ok(completion) => completion,
                Err(e) => {
                    log::error!("orchestrator: background task failed: {e}");
                    aborted(format!("task aborted: {e}"))
                }
            };
            let _ = tx.send(completion);
        });
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        f(&mut lock_host(&self.state))
    }

    fn notify(&self, notice: HostNotice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }

    fn language(&self) -> String {
        self.with_state(|s| s.session.language_code.clone())
    }

    fn append(&mut self, message: ChatMessage) {
        self.with_state(|s| s.session.push(message.clone()));
        self.notify(HostNotice::Message(message));
    }

    /// Append a bot message and voice it.
    fn append_bot(&mut self, text: &str, audio_ref: Option<String>) {
        self.append(ChatMessage::bot(text, audio_ref.clone()));
        let language = self.language();
        let spoken = self.speech.speak(text, audio_ref.as_deref(), &language);
        log::debug!("chat: bot message voiced: {spoken:?}");
    }

    fn set_form_status(&self, status: &str) {
        self.with_state(|s| s.form_status = status.to_string());
        self.notify(HostNotice::FormStatus(status.to_string()));
    }

    fn set_mic_status(&self, status: &str) {
        self.with_state(|s| s.mic_status = status.to_string());
        self.notify(HostNotice::MicStatus(status.to_string()));
    }

    fn set_input(&self, text: &str) {
        self.with_state(|s| s.input = text.to_string());
        self.notify(HostNotice::Input(text.to_string()));
    }

    fn sync_recording(&self) {
        let recording = self.recorder.state();
        self.with_state(|s| s.recording = recording);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
