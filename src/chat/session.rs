//! Conversation history and language context.

use crate::backend::HistoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

/// One rendered chat line.  Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    /// Server audio for this message, when the backend sent one.
    pub audio_ref: Option<String>,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            text: text.to_string(),
            audio_ref: None,
        }
    }

    pub fn bot(text: &str, audio_ref: Option<String>) -> Self {
        Self {
            role: Role::Bot,
            text: text.to_string(),
            audio_ref,
        }
    }
}

impl From<&HistoryEntry> for ChatMessage {
    fn from(entry: &HistoryEntry) -> Self {
        let role = if entry.is_user() { Role::User } else { Role::Bot };
        Self {
            role,
            text: entry.content.clone(),
            audio_ref: None,
        }
    }
}

/// The conversation as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub language_code: String,
    history: Vec<ChatMessage>,
}

impl SessionContext {
    pub fn new(language_code: &str) -> Self {
        Self {
            language_code: language_code.to_string(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// Replace the history with past turns returned by an init route.
    pub fn replace_history(&mut self, entries: &[HistoryEntry]) {
        self.history = entries.iter().map(ChatMessage::from).collect();
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.history.last()
    }

    /// Adopt a language reported by the backend.  Blank codes are ignored.
    pub fn update_language(&mut self, code: Option<&str>) {
        if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
            if code != self.language_code {
                log::info!("chat: language context is now {code:?}");
                self.language_code = code.to_string();
            }
        }
    }
}
