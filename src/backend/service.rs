//! Trait seams for the external collaborators and their shared error type.
//!
//! Implementors must be `Send + Sync` so they can be held as
//! `Arc<dyn …>` and called from spawned tasks.

use async_trait::async_trait;
use thiserror::Error;

use crate::bus::FieldMap;
use crate::config::ChatFlow;

use super::types::{AudioUnit, InitResponse, TurnRequest, TurnResponse};

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Any non-success outcome of a backend call.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// HTTP transport or connection error.
    #[error("request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("HTTP error! status: {status}, message: {message}")]
    Status { status: u16, message: String },

    /// The body could not be parsed as the expected JSON.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The service answered successfully but reported an error in the body.
    #[error("{0}")]
    Service(String),

    /// The configured base URL or endpoint is not a valid URL.
    #[error("invalid endpoint URL: {0}")]
    Url(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The conversational backend: decides dialogue turns.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start (or restart) the conversation for `flow`.
    async fn init_chat(&self, flow: ChatFlow) -> Result<InitResponse, BackendError>;

    /// Send one user turn.
    async fn send_message(&self, request: &TurnRequest) -> Result<TurnResponse, BackendError>;
}

/// Speech-to-text service.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio`, using `language` as a hint.
    ///
    /// An empty string means the service heard nothing usable.
    async fn transcribe(&self, audio: &AudioUnit, language: &str) -> Result<String, BackendError>;
}

/// Receives completed grievance forms.
#[async_trait]
pub trait GrievanceSink: Send + Sync {
    /// Submit the flattened form; returns the service's confirmation text
    /// when it sent one.
    async fn submit_grievance(&self, form: &FieldMap) -> Result<Option<String>, BackendError>;
}

// Compile-time assertion: the seams must be usable as trait objects.
const _: fn() = || {
    fn _assert_object_safe(
        _: Box<dyn ChatBackend>,
        _: Box<dyn Transcriber>,
        _: Box<dyn GrievanceSink>,
    ) {
    }
};
