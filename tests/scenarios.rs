//! End-to-end scenarios: orchestrator, bus, embedded frame and the HTTP
//! backend wired together against a mock server.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use voice_form_assistant::backend::HttpBackend;
use voice_form_assistant::bus::{blank_origin, MessageBus};
use voice_form_assistant::chat::{
    lock_host, new_shared_host_state, ChatMessage, ConversationOrchestrator, HostEvent,
    SharedHostState, MIC_READY,
};
use voice_form_assistant::config::{BackendConfig, ChatFlow, RecordingConfig};
use voice_form_assistant::form::{FormCatalog, FormType};
use voice_form_assistant::frame::{CatalogLoader, EmbeddedFrame, FrameNotice, LocalFrame};
use voice_form_assistant::recorder::{FileCapture, RecordingController, RecordingState};
use voice_form_assistant::speech::{ConsoleSpeech, SpeechOutput};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOST: &str = "http://localhost:5050/";

struct Host {
    orc: ConversationOrchestrator,
    state: SharedHostState,
    frame: Arc<LocalFrame>,
}

fn host(server: &MockServer, input_file: Option<PathBuf>) -> Host {
    let backend = Arc::new(
        HttpBackend::from_config(&BackendConfig {
            base_url: server.uri(),
            ..BackendConfig::default()
        })
        .unwrap(),
    );

    let base = Url::parse(HOST).unwrap();
    let (host_port, embedded_port) = MessageBus::pair(base.origin(), blank_origin());
    let loader = Arc::new(CatalogLoader::new(Arc::new(FormCatalog::builtin()), base.clone()));
    let frame = Arc::new(LocalFrame::new(embedded_port, loader, backend.clone(), base));

    let recording = RecordingConfig {
        input_file,
        ..RecordingConfig::default()
    };
    let device = Arc::new(FileCapture::new(
        recording.input_file.clone(),
        recording.chunk_bytes,
    ));
    let recorder = RecordingController::new(device, backend.clone(), &recording);
    let speech = SpeechOutput::new(Arc::new(ConsoleSpeech), None, BTreeMap::new());

    let state = new_shared_host_state("en");
    let orc = ConversationOrchestrator::new(
        state.clone(),
        ChatFlow::Grievance,
        host_port,
        backend,
        frame.clone(),
        recorder,
        speech,
    );
    Host { orc, state, frame }
}

fn texts(state: &SharedHostState) -> Vec<String> {
    lock_host(state)
        .session
        .history()
        .iter()
        .map(|m| m.text.clone())
        .collect()
}

async fn reply(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/send_message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn greeting_is_shown_after_init() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/init_grievance_chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [],
            "bot_response": "Hello! What is your grievance about?",
            "language": "en"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = host(&server, None);
    h.orc.dispatch(HostEvent::Initialize).await;
    h.orc.settle().await;

    assert_eq!(texts(&h.state), vec!["Hello! What is your grievance about?"]);
}

#[tokio::test]
async fn text_turn_loads_and_prefills_form() {
    let server = MockServer::start().await;
    reply(
        &server,
        json!({
            "bot_response": "Please describe location",
            "action": "LOAD_FORM",
            "form_url": "/forms/infrastructure",
            "form_type": "infrastructure",
            "form_data": {
                "issue_location": "Main St",
                "issue_duration": "1-4 weeks",
                "ward_number": 12
            }
        }),
    )
    .await;

    let mut h = host(&server, None);
    let mut notices = h.frame.subscribe();
    h.orc.submit_user_text("There is a pothole on Main St");
    h.orc.settle().await;

    assert_eq!(
        texts(&h.state),
        vec!["There is a pothole on Main St", "Please describe location"]
    );
    assert_eq!(
        lock_host(&h.state).form_status,
        "infrastructure form loaded. Form data pre-filled."
    );

    let report = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(FrameNotice::Prefilled(report)) = notices.recv().await {
                return report;
            }
        }
    })
    .await
    .expect("prefill was applied");
    assert_eq!(report.advisories.len(), 1, "ward_number has no field");

    let page = h.frame.snapshot().unwrap();
    assert_eq!(page.form_type(), FormType::Infrastructure);
    assert_eq!(page.document().first("issue_location").unwrap().value, "Main St");
    assert_eq!(
        page.document().first("issue_duration").unwrap().selected_value(),
        Some("one_to_four_weeks")
    );
}

#[tokio::test]
async fn unknown_form_reports_load_failure() {
    let server = MockServer::start().await;
    reply(
        &server,
        json!({
            "bot_response": "Opening the form",
            "action": "LoadForm",
            "form_url": "/forms/parking",
            "form_type": "parking"
        }),
    )
    .await;

    let mut h = host(&server, None);
    h.orc.submit_user_text("parking issue");
    h.orc.settle().await;

    assert!(lock_host(&h.state)
        .form_status
        .starts_with("Could not load parking form:"));
    assert!(h.frame.snapshot().is_none());
}

#[tokio::test]
async fn submission_is_acknowledged_and_frame_reset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit_grievance"))
        .and(body_partial_json(json!({
            "issue_location": "Main St",
            "declaration": "True"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Grievance recorded" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut h = host(&server, None);
    h.frame.navigate("/forms/infrastructure").await.unwrap();
    h.frame.set_field("issue_location", "Main St").unwrap();
    h.frame.set_field("declaration", "on").unwrap();

    let notice = h.frame.submit().await.unwrap();
    assert_eq!(notice.message, "Grievance recorded");

    h.orc.poll_inbound();

    let state = lock_host(&h.state);
    assert_eq!(state.form_status, "Form submitted: Grievance recorded");
    assert_eq!(
        state.session.last(),
        Some(&ChatMessage::bot(
            "The infrastructure form has been submitted.",
            None
        ))
    );
    assert!(h.frame.snapshot().is_none());
}

#[tokio::test]
async fn government_service_submission_carries_dependent_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit_grievance"))
        .and(body_partial_json(json!({
            "service_type": "other",
            "other_service": "Water supply",
            "declaration": "True"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Grievance recorded" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut h = host(&server, None);
    h.frame.navigate("/forms/govt_service").await.unwrap();
    h.frame.set_field("service_type", "other").unwrap();
    h.frame.set_field("other_service", "Water supply").unwrap();
    h.frame.set_field("declaration", "on").unwrap();

    let page = h.frame.snapshot().unwrap();
    let other = page.document().first("other_service").unwrap();
    assert!(!other.hidden && other.required);

    let notice = h.frame.submit().await.unwrap();
    assert_eq!(notice.form_type.as_deref(), Some("government_service"));

    h.orc.poll_inbound();
    assert_eq!(
        lock_host(&h.state).session.last(),
        Some(&ChatMessage::bot(
            "The government_service form has been submitted.",
            None
        ))
    );
}

#[tokio::test]
async fn denied_microphone_never_transcribes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe_audio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "transcript": "x" })))
        .expect(0)
        .mount(&server)
        .await;

    let mut h = host(&server, None);
    h.orc.dispatch(HostEvent::ToggleMic).await;
    h.orc.settle().await;

    let state = lock_host(&h.state);
    assert_eq!(state.mic_status, "Mic access denied or error.");
    assert_eq!(state.recording, RecordingState::Idle);
}

#[tokio::test]
async fn voice_turn_is_transcribed_and_sent() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.webm");
    std::fs::write(&clip, vec![7u8; 10_000]).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe_audio"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "transcript": "Streetlight broken near school" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    reply(&server, json!({ "bot_response": "Which street is the school on?" })).await;

    let mut h = host(&server, Some(clip));
    h.orc.dispatch(HostEvent::ToggleMic).await;
    assert_eq!(lock_host(&h.state).recording, RecordingState::Recording);

    h.orc.dispatch(HostEvent::ToggleMic).await;
    h.orc.settle().await;

    assert_eq!(
        texts(&h.state),
        vec!["Streetlight broken near school", "Which street is the school on?"]
    );
    let state = lock_host(&h.state);
    assert_eq!(state.recording, RecordingState::Idle);
    assert_eq!(state.mic_status, MIC_READY);
    assert_eq!(state.input, "");
}
