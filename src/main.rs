//! Application entry point: a terminal host for the voice form assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk; on first run the defaults are written
//!    out so they can be edited.
//! 3. Build the HTTP backend from config.
//! 4. Pair the host and embedded ports on the message bus.
//! 5. Start the embedded [`LocalFrame`] on the built-in form catalog.
//! 6. Build the recorder (file-backed capture) and speech output.
//! 7. Spawn the orchestrator and the notice printers.
//! 8. Read commands from stdin until `/quit` or EOF.
//!
//! An optional first argument is the host page path (e.g. `/schemes`); it
//! selects the chat flow instead of `host.flow`.
//!
//! # Commands
//!
//! | Input | Effect |
//! |-------|--------|
//! | any text | send a chat turn |
//! | `/mic` | start or stop voice capture |
//! | `/form` | print the embedded form |
//! | `/set <name> <value>` | edit a form field |
//! | `/submit` | submit the embedded form |
//! | `/quit` | exit |

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use url::Url;
use voice_form_assistant::{
    backend::HttpBackend,
    bus::{blank_origin, MessageBus},
    chat::{new_shared_host_state, ConversationOrchestrator, HostEvent, HostNotice, Role},
    config::{AppConfig, AppPaths, ChatFlow},
    form::{FormCatalog, FormPage},
    frame::{CatalogLoader, FrameNotice, LocalFrame},
    recorder::{FileCapture, RecordingController},
    speech::{ConsoleSpeech, SpeechOutput, SpeechSynthesizer},
};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Say(String),
    Mic,
    Form,
    Set { name: String, value: String },
    Submit,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Command::Say(line.to_string()));
        };

        let (verb, args) = rest.split_once(' ').unwrap_or((rest, ""));
        let command = match verb {
            "mic" => Command::Mic,
            "form" => Command::Form,
            "submit" => Command::Submit,
            "quit" | "exit" => Command::Quit,
            "set" => match args.trim().split_once(' ') {
                Some((name, value)) => Command::Set {
                    name: name.to_string(),
                    value: value.trim().to_string(),
                },
                None => Command::Unknown(line.to_string()),
            },
            _ => Command::Unknown(line.to_string()),
        };
        Some(command)
    }
}

/// The flow implied by the page path argument, else the configured one.
fn chat_flow(page_path: Option<&str>, configured: ChatFlow) -> ChatFlow {
    page_path.map_or(configured, ChatFlow::from_page_path)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

async fn print_notices(mut rx: mpsc::UnboundedReceiver<HostNotice>) {
    while let Some(notice) = rx.recv().await {
        match notice {
            HostNotice::Message(message) => match message.role {
                Role::User => println!("you> {}", message.text),
                Role::Bot => println!("bot> {}", message.text),
            },
            HostNotice::FormStatus(status) => println!("[form] {status}"),
            HostNotice::MicStatus(status) => println!("[mic] {status}"),
            HostNotice::Input(_) => {}
        }
    }
}

async fn print_frame_notices(mut rx: broadcast::Receiver<FrameNotice>) {
    loop {
        match rx.recv().await {
            Ok(FrameNotice::Loaded { path, form_type }) => {
                println!("[frame] loaded {path} ({form_type})")
            }
            Ok(FrameNotice::Prefilled(report)) => {
                println!("[frame] prefilled {} field(s)", report.bindings.len());
                for advisory in &report.advisories {
                    println!("[frame]   ! {advisory}");
                }
            }
            Ok(FrameNotice::Submitted(notice)) => println!("[frame] submitted: {}", notice.message),
            Ok(FrameNotice::Reset) => println!("[frame] blank"),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("main: {n} frame notices skipped")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_form(page: Option<FormPage>) {
    let Some(page) = page else {
        println!("[frame] no form loaded");
        return;
    };

    println!("[frame] {} ({})", page.path(), page.form_type());
    for (_, control) in page.document().controls() {
        if control.hidden {
            continue;
        }
        let value = match control.kind.label() {
            "select" => control.selected_value().unwrap_or_default().to_string(),
            "checkbox" | "radio" => format!("{} [{}]", control.value, if control.checked { "x" } else { " " }),
            _ => control.value.clone(),
        };
        let marker = if control.required { "*" } else { "" };
        println!("  {}{marker} <{}> = {value}", control.name, control.kind.label());
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice form assistant starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let settings_file = AppPaths::new().settings_file;
    if !settings_file.exists() {
        match config.save() {
            Ok(()) => log::info!("Wrote default settings to {}", settings_file.display()),
            Err(e) => log::warn!("Could not write default settings: {e}"),
        }
    }
    let flow = chat_flow(std::env::args().nth(1).as_deref(), config.host.flow);
    log::info!("Chat flow: {flow:?}");
    let base = Url::parse(&config.host.origin)
        .with_context(|| format!("invalid host origin {:?}", config.host.origin))?;

    // 3. Backend
    let backend = Arc::new(HttpBackend::from_config(&config.backend)?);

    // 4-5. Bus and embedded frame
    let (host_port, embedded_port) = MessageBus::pair(base.origin(), blank_origin());
    let catalog = FormCatalog::builtin();
    log::info!("Form catalog: {}", catalog.names().collect::<Vec<_>>().join(", "));
    let loader = Arc::new(CatalogLoader::new(Arc::new(catalog), base.clone()));
    let frame = Arc::new(LocalFrame::new(embedded_port, loader, backend.clone(), base));

    // 6. Recorder and speech
    let device = Arc::new(FileCapture::new(
        config.recording.input_file.clone(),
        config.recording.chunk_bytes,
    ));
    let recorder = RecordingController::new(device, backend.clone(), &config.recording);

    let synthesizer: Option<Arc<dyn SpeechSynthesizer>> = if config.speech.fallback_synthesis {
        Some(Arc::new(ConsoleSpeech))
    } else {
        None
    };
    let speech = SpeechOutput::new(
        Arc::new(ConsoleSpeech),
        synthesizer,
        config.speech.voice_tags.clone(),
    );

    // 7. Orchestrator
    let state = new_shared_host_state(&config.host.default_language);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let orchestrator = ConversationOrchestrator::new(
        state,
        flow,
        host_port,
        backend.clone(),
        frame.clone(),
        recorder,
        speech,
    )
    .with_notices(notice_tx);

    tokio::spawn(print_notices(notice_rx));
    tokio::spawn(print_frame_notices(frame.subscribe()));

    let (events_tx, events_rx) = mpsc::channel::<HostEvent>(16);
    let runner = tokio::spawn(orchestrator.run(events_rx));
    events_tx.send(HostEvent::Initialize).await?;

    // 8. Command loop
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        match command {
            Command::Say(text) => events_tx.send(HostEvent::SubmitText(text)).await?,
            Command::Mic => events_tx.send(HostEvent::ToggleMic).await?,
            Command::Form => print_form(frame.snapshot()),
            Command::Set { name, value } => match frame.set_field(&name, &value) {
                Some(report) => {
                    for advisory in &report.advisories {
                        println!("[frame] ! {advisory}");
                    }
                }
                None => println!("[frame] no form loaded"),
            },
            Command::Submit => {
                if let Err(e) = frame.submit().await {
                    println!("[frame] {e}");
                }
            }
            Command::Quit => break,
            Command::Unknown(input) => println!("unknown command {input:?}"),
        }
    }

    drop(events_tx);
    runner.await?;
    log::info!("Voice form assistant shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_chat_text() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse(" hello "), Some(Command::Say("hello".into())));
        assert_eq!(Command::parse("/mic"), Some(Command::Mic));
        assert_eq!(
            Command::parse("/set issue_location Main St"),
            Some(Command::Set {
                name: "issue_location".into(),
                value: "Main St".into()
            })
        );
        assert_eq!(Command::parse("/set lonely"), Some(Command::Unknown("/set lonely".into())));
        assert_eq!(Command::parse("/exit"), Some(Command::Quit));
    }

    #[test]
    fn page_path_argument_selects_flow() {
        assert_eq!(chat_flow(Some("/schemes"), ChatFlow::Grievance), ChatFlow::Scheme);
        assert_eq!(chat_flow(Some("/"), ChatFlow::Scheme), ChatFlow::Grievance);
        assert_eq!(chat_flow(None, ChatFlow::Scheme), ChatFlow::Scheme);
    }
}
