//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ChatFlow
// ---------------------------------------------------------------------------

/// Which top-level conversation the host page runs.
///
/// | Variant   | Init route            |
/// |-----------|-----------------------|
/// | Grievance | `init_grievance_chat` |
/// | Scheme    | `init_scheme_chat`    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatFlow {
    /// File a citizen grievance through one of the catalog forms.
    Grievance,
    /// Find a government scheme.
    Scheme,
}

impl Default for ChatFlow {
    fn default() -> Self {
        Self::Grievance
    }
}

impl ChatFlow {
    /// Derive the flow from the host page path: anything under `/schemes`
    /// runs the scheme finder, everything else the grievance flow.
    ///
    /// ```
    /// use voice_form_assistant::config::ChatFlow;
    ///
    /// assert_eq!(ChatFlow::from_page_path("/schemes/find"), ChatFlow::Scheme);
    /// assert_eq!(ChatFlow::from_page_path("/"), ChatFlow::Grievance);
    /// ```
    pub fn from_page_path(path: &str) -> Self {
        if path.contains("/schemes") {
            Self::Scheme
        } else {
            Self::Grievance
        }
    }
}

// ---------------------------------------------------------------------------
// EndpointConfig
// ---------------------------------------------------------------------------

/// Paths of the backend routes, relative to [`BackendConfig::base_url`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub init_grievance: String,
    pub init_scheme: String,
    pub send_message: String,
    pub transcribe: String,
    pub submit_grievance: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            init_grievance: "/init_grievance_chat".into(),
            init_scheme: "/init_scheme_chat".into(),
            send_message: "/send_message".into(),
            transcribe: "/transcribe_audio".into(),
            submit_grievance: "/submit_grievance".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Settings for the conversational backend and its sibling services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,
    /// Per-request timeout in seconds.  `0` disables the timeout.
    pub timeout_secs: u64,
    /// Route paths.
    pub endpoints: EndpointConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5050".into(),
            timeout_secs: 60,
            endpoints: EndpointConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

/// Settings for the host context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Origin of the host page.  Embedded forms are resolved against it and
    /// inbound bus messages must come from it.
    pub origin: String,
    /// Conversation flow started by `initialize`.
    pub flow: ChatFlow,
    /// Language code used until the backend reports one.
    pub default_language: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5050".into(),
            flow: ChatFlow::default(),
            default_language: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingConfig
// ---------------------------------------------------------------------------

/// Settings for voice capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Encodings in descending preference; the first one the device supports
    /// is used.
    pub mime_preferences: Vec<String>,
    /// Encoding used when the device supports none of the preferences.
    pub fallback_mime: String,
    /// Pre-recorded clip served by the terminal capture device.  `None`
    /// means no capture device is available.
    pub input_file: Option<PathBuf>,
    /// Size of the chunks the terminal capture device emits.
    pub chunk_bytes: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            mime_preferences: vec![
                "audio/webm;codecs=opus".into(),
                "audio/ogg;codecs=opus".into(),
                "audio/wav".into(),
                "audio/mp4".into(),
                "audio/webm".into(),
            ],
            fallback_mime: "audio/webm".into(),
            input_file: None,
            chunk_bytes: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for spoken bot replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Use the local synthesizer when a reply carries no audio reference.
    pub fallback_synthesis: bool,
    /// Language code → synthesizer voice tag.  Keys are lower-case.
    pub voice_tags: BTreeMap<String, String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        let voice_tags = [
            ("en", "en-US"),
            ("hi", "hi-IN"),
            ("ta", "ta-IN"),
            ("mr", "mr-IN"),
            ("kn", "kn-IN"),
        ]
        .into_iter()
        .map(|(code, tag)| (code.to_string(), tag.to_string()))
        .collect();

        Self {
            fallback_synthesis: true,
            voice_tags,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_form_assistant::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend connection settings.
    pub backend: BackendConfig,
    /// Host context settings.
    pub host: HostConfig,
    /// Voice capture settings.
    pub recording: RecordingConfig,
    /// Spoken reply settings.
    pub speech: SpeechConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
