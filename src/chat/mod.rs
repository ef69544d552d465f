//! The host context: chat history, status lines and the orchestrator that
//! ties the backend, the embedded frame, voice capture and speech together.
//!
//! # Quick start
//!
//! ```rust
//! use voice_form_assistant::chat::{lock_host, new_shared_host_state, ChatMessage, MIC_READY};
//!
//! let state = new_shared_host_state("en");
//! lock_host(&state).session.push(ChatMessage::user("My street light is broken"));
//!
//! let host = lock_host(&state);
//! assert_eq!(host.session.history().len(), 1);
//! assert_eq!(host.mic_status, MIC_READY);
//! ```

pub mod orchestrator;
pub mod session;
pub mod state;

pub use orchestrator::{ConversationOrchestrator, HostEvent};
pub use session::{ChatMessage, Role, SessionContext};
pub use state::{lock_host, new_shared_host_state, HostNotice, HostState, SharedHostState, MIC_READY};
