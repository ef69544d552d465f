//! Voicing bot messages.
//!
//! [`SpeechOutput`] owns one [`PlaybackSlot`]: server audio is played
//! through it, and when a message has no audio the optional
//! [`SpeechSynthesizer`] speaks the text with the voice mapped from the
//! session language by [`voice_tag`].

pub mod console;
pub mod output;

pub use console::ConsoleSpeech;
pub use output::{
    voice_tag, AudioPlayer, Playback, PlaybackSlot, SpeechError, SpeechOutput, SpeechSynthesizer,
    Spoken,
};
