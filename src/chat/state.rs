//! Host-side state shared with front ends.
//!
//! The orchestrator is the only writer of [`HostState`]; renderers read it
//! through [`SharedHostState`] or follow the [`HostNotice`] stream.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::recorder::RecordingState;

use super::session::{ChatMessage, SessionContext};

/// Mic status shown while idle.
pub const MIC_READY: &str = "Click mic to speak";

/// Everything a front end renders.
#[derive(Debug, Clone)]
pub struct HostState {
    pub session: SessionContext,
    /// Status line above the embedded form.
    pub form_status: String,
    /// Status line next to the mic button.
    pub mic_status: String,
    /// Contents of the text input.
    pub input: String,
    pub recording: RecordingState,
    /// Set once the backend ends the conversation.  Input stays enabled.
    pub ended: bool,
}

impl HostState {
    pub fn new(language_code: &str) -> Self {
        Self {
            session: SessionContext::new(language_code),
            form_status: String::new(),
            mic_status: MIC_READY.to_string(),
            input: String::new(),
            recording: RecordingState::Idle,
            ended: false,
        }
    }
}

/// Cheap to clone; lock only for short critical sections and never across
/// `.await`.
pub type SharedHostState = Arc<Mutex<HostState>>;

pub fn new_shared_host_state(language_code: &str) -> SharedHostState {
    Arc::new(Mutex::new(HostState::new(language_code)))
}

/// Lock the shared state, recovering from a poisoned lock.
pub fn lock_host(state: &SharedHostState) -> MutexGuard<'_, HostState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// A change front ends may want to render immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNotice {
    Message(ChatMessage),
    FormStatus(String),
    MicStatus(String),
    Input(String),
}
