//! External collaborators: conversational backend, transcription, and form
//! submission.
//!
//! * [`ChatBackend`]: init routes and `send_message`.
//! * [`Transcriber`]: `transcribe_audio`.
//! * [`GrievanceSink`]: `submit_grievance`.
//! * [`HttpBackend`]: reqwest implementation of all three.
//! * [`BackendError`]: every non-success outcome.

pub mod http;
pub mod service;
pub mod types;

pub use http::HttpBackend;
pub use service::{BackendError, ChatBackend, GrievanceSink, Transcriber};
pub use types::{AudioUnit, BotAction, HistoryEntry, InitResponse, TurnRequest, TurnResponse};
