//! Speech narration: speak one utterance at a time with a chosen voice.
//!
//! - `kokoro`: Kokoro ONNX synthesis + rodio playback

pub mod kokoro;

use tracing::{info, warn};

use crate::error::NarratorError;

/// Words per minute that map to Kokoro's neutral speed of 1.0.
pub const BASE_RATE_WPM: u32 = 150;

/// A text-to-speech engine that plays each utterance to completion.
pub trait Narrator: Send + Sync {
    /// Available voice ids, sorted. The first one is the default voice.
    fn voices(&self) -> Vec<String>;

    /// Select the voice and set rate (words per minute) and volume (0.0..=1.0).
    fn configure(&self, voice_id: &str, rate: u32, volume: f32) -> Result<(), NarratorError>;

    /// Synthesize and play `text`, blocking until playback has finished.
    /// Empty text is a no-op.
    fn speak(&self, text: &str) -> Result<(), NarratorError>;
}

/// Configure `narrator`, substituting the first available voice when
/// `voice_id` is absent or unknown. Returns the voice actually selected.
pub fn configure_with_fallback(
    narrator: &dyn Narrator,
    voice_id: Option<&str>,
    rate: u32,
    volume: f32,
) -> Result<String, NarratorError> {
    if let Some(voice) = voice_id {
        match narrator.configure(voice, rate, volume) {
            Ok(()) => return Ok(voice.to_string()),
            Err(NarratorError::VoiceUnavailable(id)) => {
                warn!("Voice '{id}' unavailable, falling back to default voice");
            }
            Err(e) => return Err(e),
        }
    }

    let fallback = narrator
        .voices()
        .into_iter()
        .next()
        .ok_or(NarratorError::NoVoices)?;
    narrator.configure(&fallback, rate, volume)?;
    info!("Using voice: {fallback}");
    Ok(fallback)
}

/// Speak a sample pronunciation of `selection`.
///
/// With nothing selected, speaks `fallback` if one is configured and stays
/// silent otherwise. Returns the text spoken, if any.
pub fn sample(
    narrator: &dyn Narrator,
    selection: Option<&str>,
    fallback: Option<&str>,
) -> Result<Option<String>, NarratorError> {
    let text = selection
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| fallback.map(str::trim).filter(|s| !s.is_empty()));

    match text {
        Some(text) => {
            narrator.speak(text)?;
            Ok(Some(text.to_string()))
        }
        None => Ok(None),
    }
}

/// In-memory narrator for tests: records every utterance.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    pub struct ScriptedNarrator {
        voices: Vec<String>,
        pub configured: Mutex<Option<(String, u32, f32)>>,
        pub spoken: Mutex<Vec<String>>,
        pub fail: AtomicBool,
        speak_time: Duration,
    }

    impl ScriptedNarrator {
        pub fn new(voices: &[&str]) -> Self {
            Self {
                voices: voices.iter().map(|v| v.to_string()).collect(),
                configured: Mutex::new(None),
                spoken: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                speak_time: Duration::ZERO,
            }
        }

        pub fn with_speak_time(mut self, speak_time: Duration) -> Self {
            self.speak_time = speak_time;
            self
        }

        pub fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }

        pub fn voice(&self) -> Option<String> {
            self.configured.lock().unwrap().as_ref().map(|c| c.0.clone())
        }
    }

    impl Narrator for ScriptedNarrator {
        fn voices(&self) -> Vec<String> {
            self.voices.clone()
        }

        fn configure(&self, voice_id: &str, rate: u32, volume: f32) -> Result<(), NarratorError> {
            if !self.voices.iter().any(|v| v == voice_id) {
                return Err(NarratorError::VoiceUnavailable(voice_id.to_string()));
            }
            *self.configured.lock().unwrap() = Some((voice_id.to_string(), rate, volume));
            Ok(())
        }

        fn speak(&self, text: &str) -> Result<(), NarratorError> {
            if text.trim().is_empty() {
                return Ok(());
            }
            if self.fail.load(Ordering::Relaxed) {
                return Err(NarratorError::Synthesis("scripted failure".into()));
            }
            if !self.speak_time.is_zero() {
                std::thread::sleep(self.speak_time);
            }
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }
}
