//! Voice form assistant: a chat host that talks to a conversational
//! backend, captures voice for transcription, and drives an embedded
//! grievance form over an origin-checked message channel.
//!
//! ```text
//!   ┌──────────── host context ────────────┐        ┌──── embedded context ────┐
//!   │ chat::ConversationOrchestrator        │  bus   │ frame::LocalFrame         │
//!   │   backend::ChatBackend ◀──── HTTP     │◀──────▶│   form::FormPage          │
//!   │   recorder::RecordingController       │        │   backend::GrievanceSink  │
//!   │   speech::SpeechOutput                │        └───────────────────────────┘
//!   └───────────────────────────────────────┘
//! ```

pub mod backend;
pub mod bus;
pub mod chat;
pub mod config;
pub mod form;
pub mod frame;
pub mod recorder;
pub mod speech;
