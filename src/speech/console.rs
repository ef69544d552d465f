//! Terminal stand-ins for audio output: they log instead of making sound.

use super::output::{AudioPlayer, Playback, SpeechError, SpeechSynthesizer};

/// Logs every unit it is asked to play or speak.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSpeech;

struct ConsolePlayback(String);

impl Playback for ConsolePlayback {
    fn stop(&mut self) {
        log::debug!("speech: stopped {}", self.0);
    }
}

impl AudioPlayer for ConsoleSpeech {
    fn play(&self, audio_ref: &str) -> Result<Box<dyn Playback>, SpeechError> {
        log::info!("speech: playing {audio_ref}");
        Ok(Box::new(ConsolePlayback(audio_ref.to_string())))
    }
}

impl SpeechSynthesizer for ConsoleSpeech {
    fn speak(&self, text: &str, voice_tag: &str) -> Result<(), SpeechError> {
        log::info!("speech: [{voice_tag}] {text}");
        Ok(())
    }

    fn cancel(&self) {}
}
