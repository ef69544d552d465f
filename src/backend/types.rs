//! Wire types exchanged with the conversational backend.

use serde::{Deserialize, Serialize};

use crate::bus::FieldMap;

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One past turn returned by the init routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn is_user(&self) -> bool {
        self.role.eq_ignore_ascii_case("user")
    }
}

/// Response of `init_grievance_chat` / `init_scheme_chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub bot_response: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// Body of `send_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    pub language: String,
}

/// Response of `send_message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    #[serde(default)]
    pub bot_response: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub form_url: Option<String>,
    #[serde(default)]
    pub form_type: Option<String>,
    #[serde(default)]
    pub form_data: Option<FieldMap>,
}

/// What the host should do after showing a bot reply.
#[derive(Debug, Clone, PartialEq)]
pub enum BotAction {
    /// Navigate the embedded context to `url`, then prefill it.
    LoadForm {
        url: String,
        form_type: Option<String>,
        prefill: Option<FieldMap>,
    },
    /// The server confirmed the form was filed.
    FormSubmitted,
    /// The conversation is over.
    EndConversation,
}

impl TurnResponse {
    /// Parse the `action` field.
    ///
    /// Both `LOAD_FORM` and `LoadForm` spellings are accepted.  Unknown
    /// actions, and `LOAD_FORM` without a `form_url`, yield `None`.
    pub fn bot_action(&self) -> Option<BotAction> {
        let raw = self.action.as_deref()?;
        let normalised: String = raw
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalised.as_str() {
            "LOADFORM" => {
                let url = self.form_url.clone().filter(|u| !u.trim().is_empty())?;
                Some(BotAction::LoadForm {
                    url,
                    form_type: self.form_type.clone(),
                    prefill: self.form_data.clone(),
                })
            }
            "FORMSUBMITTED" => Some(BotAction::FormSubmitted),
            "ENDCONVERSATION" => Some(BotAction::EndConversation),
            _ => {
                log::warn!("backend: ignoring unknown action {raw:?}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// A finished recording ready for transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioUnit {
    pub bytes: Vec<u8>,
    /// Encoding, e.g. `audio/webm;codecs=opus`.
    pub mime_type: String,
}

impl AudioUnit {
    /// Upload file name derived from the encoding subtype.
    ///
    /// ```
    /// use voice_form_assistant::backend::AudioUnit;
    ///
    /// let unit = AudioUnit { bytes: vec![1], mime_type: "audio/ogg;codecs=opus".into() };
    /// assert_eq!(unit.file_name(), "user_audio.ogg");
    /// ```
    pub fn file_name(&self) -> String {
        let subtype = self
            .mime_type
            .split('/')
            .nth(1)
            .and_then(|s| s.split(';').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("webm");
        format!("user_audio.{subtype}")
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Response of `transcribe_audio`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TranscriptResponse {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Response of `submit_grievance`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> TurnResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn load_form_in_both_spellings() {
        for action in ["LOAD_FORM", "LoadForm"] {
            let resp = response(json!({
                "bot_response": "Please describe location",
                "action": action,
                "form_url": "/forms/infrastructure",
                "form_data": { "issue_location": "Main St" }
            }));
            match resp.bot_action() {
                Some(BotAction::LoadForm { url, prefill, .. }) => {
                    assert_eq!(url, "/forms/infrastructure");
                    assert_eq!(prefill.unwrap()["issue_location"], "Main St");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn load_form_without_url_is_no_action() {
        let resp = response(json!({ "bot_response": "hi", "action": "LOAD_FORM" }));
        assert_eq!(resp.bot_action(), None);
    }

    #[test]
    fn other_actions_and_unknown() {
        assert_eq!(
            response(json!({ "action": "FORM_SUBMITTED" })).bot_action(),
            Some(BotAction::FormSubmitted)
        );
        assert_eq!(
            response(json!({ "action": "EndConversation" })).bot_action(),
            Some(BotAction::EndConversation)
        );
        assert_eq!(response(json!({ "action": "DANCE" })).bot_action(), None);
        assert_eq!(response(json!({})).bot_action(), None);
    }

    #[test]
    fn null_form_data_is_tolerated() {
        let resp = response(json!({ "bot_response": "x", "form_data": null, "audio_url": null }));
        assert!(resp.form_data.is_none());
        assert!(resp.audio_url.is_none());
    }

    #[test]
    fn init_history_roles() {
        let init: InitResponse = serde_json::from_value(json!({
            "history": [
                { "role": "assistant", "content": "Hello" },
                { "role": "user", "content": "Hi" }
            ],
            "bot_response": "Hello",
            "language": "en"
        }))
        .unwrap();
        assert!(!init.history[0].is_user());
        assert!(init.history[1].is_user());
    }

    #[test]
    fn audio_file_name_defaults() {
        let unit = AudioUnit {
            bytes: vec![],
            mime_type: "weird".into(),
        };
        assert_eq!(unit.file_name(), "user_audio.webm");
        assert!(unit.is_empty());
    }
}
