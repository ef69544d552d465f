//! Playback slot and the speech fallback path.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("playback failed: {0}")]
    Playback(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A playing audio unit.
pub trait Playback: Send {
    /// Stop playback and release the unit.
    fn stop(&mut self);
}

/// Plays audio by reference (URL or path).
pub trait AudioPlayer: Send + Sync {
    fn play(&self, audio_ref: &str) -> Result<Box<dyn Playback>, SpeechError>;
}

/// Local text-to-speech.
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` with the voice for `voice_tag` (BCP-47, e.g. `hi-IN`).
    fn speak(&self, text: &str, voice_tag: &str) -> Result<(), SpeechError>;

    /// Cancel any utterance in progress.
    fn cancel(&self);
}

const _: fn() = || {
    fn _assert_object_safe(
        _: Box<dyn AudioPlayer>,
        _: Box<dyn SpeechSynthesizer>,
        _: Box<dyn Playback>,
    ) {
    }
};

/// Voice tag for a language code: table lookup (case-insensitive), else
/// the code itself.
///
/// ```
/// use std::collections::BTreeMap;
/// use voice_form_assistant::speech::voice_tag;
///
/// let table = BTreeMap::from([("hi".to_string(), "hi-IN".to_string())]);
/// assert_eq!(voice_tag("HI", &table), "hi-IN");
/// assert_eq!(voice_tag("bn", &table), "bn");
/// ```
pub fn voice_tag(code: &str, table: &BTreeMap<String, String>) -> String {
    let lower = code.to_ascii_lowercase();
    table
        .iter()
        .find(|(k, _)| k.to_ascii_lowercase() == lower)
        .map(|(_, tag)| tag.clone())
        .unwrap_or_else(|| code.to_string())
}

// ---------------------------------------------------------------------------
// PlaybackSlot
// ---------------------------------------------------------------------------

/// Stops its unit when dropped.
struct PlaybackHandle(Box<dyn Playback>);

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Holds at most one playing unit; starting another stops the previous.
pub struct PlaybackSlot {
    player: Arc<dyn AudioPlayer>,
    current: Option<PlaybackHandle>,
}

impl PlaybackSlot {
    pub fn new(player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            player,
            current: None,
        }
    }

    pub fn start(&mut self, audio_ref: &str) -> Result<(), SpeechError> {
        self.stop();
        let playback = self.player.play(audio_ref)?;
        self.current = Some(PlaybackHandle(playback));
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.is_playing() {
            log::debug!("speech: stopping current playback");
        }
        self.current = None;
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }
}

// ---------------------------------------------------------------------------
// SpeechOutput
// ---------------------------------------------------------------------------

/// How a bot message was voiced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spoken {
    Played,
    Synthesized { voice: String },
    Silent,
}

/// Voices bot messages: plays the server audio when there is one, else
/// falls back to local synthesis.
pub struct SpeechOutput {
    slot: PlaybackSlot,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    voice_tags: BTreeMap<String, String>,
}

impl SpeechOutput {
    pub fn new(
        player: Arc<dyn AudioPlayer>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        voice_tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            slot: PlaybackSlot::new(player),
            synthesizer,
            voice_tags,
        }
    }

    pub fn speak(&mut self, text: &str, audio_ref: Option<&str>, language: &str) -> Spoken {
        if let Some(audio_ref) = audio_ref.filter(|r| !r.trim().is_empty()) {
            return match self.slot.start(audio_ref) {
                Ok(()) => Spoken::Played,
                Err(e) => {
                    log::error!("speech: {e}");
                    Spoken::Silent
                }
            };
        }

        self.slot.stop();
        let Some(synth) = self.synthesizer.as_ref() else {
            log::debug!("speech: no synthesizer, message not voiced");
            return Spoken::Silent;
        };
        if text.trim().is_empty() {
            return Spoken::Silent;
        }

        let voice = voice_tag(language, &self.voice_tags);
        synth.cancel();
        match synth.speak(text, &voice) {
            Ok(()) => Spoken::Synthesized { voice },
            Err(e) => {
                log::warn!("speech: {e}");
                Spoken::Silent
            }
        }
    }

    /// Stop whatever is playing.
    pub fn silence(&mut self) {
        self.slot.stop();
        if let Some(synth) = &self.synthesizer {
            synth.cancel();
        }
    }
}
