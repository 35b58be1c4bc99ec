//! A running practice session: quiz state plus its narration loop.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::narration::{self, Cadence};
use super::session::{AnswerSummary, Draw, PracticeSession, SessionState};
use crate::config::Config;
use crate::error::PracticeError;
use crate::narrator::{configure_with_fallback, Narrator};
use crate::vocabulary::{VocabularySet, WordEntry};

type FinishedCallback = Box<dyn FnOnce(&AnswerSummary) + Send>;

/// Narration parameters fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub rate: u32,
    pub volume: f32,
    pub cadence: Cadence,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            rate: config.narrator.rate,
            volume: config.narrator.volume,
            cadence: Cadence::from(&config.practice),
        }
    }
}

/// Start a practice session over `words`, narrated with `voice_id`.
///
/// Must be called from within a tokio runtime.
pub fn start_session(
    words: VocabularySet,
    voice_id: Option<&str>,
    narrator: Arc<dyn Narrator>,
    options: SessionOptions,
) -> Result<SessionHandle, PracticeError> {
    SessionHandle::start(words, voice_id, narrator, options, &mut rand::rng())
}

/// Owner of one practice session and its background narration task.
///
/// Dropping the handle cancels narration.
pub struct SessionHandle {
    session: PracticeSession,
    voice: Option<String>,
    slot: watch::Sender<Option<String>>,
    cancel: CancellationToken,
    narration: Option<JoinHandle<()>>,
    on_finished: Option<FinishedCallback>,
}

impl SessionHandle {
    pub fn start<R: Rng + ?Sized>(
        words: VocabularySet,
        voice_id: Option<&str>,
        narrator: Arc<dyn Narrator>,
        options: SessionOptions,
        rng: &mut R,
    ) -> Result<Self, PracticeError> {
        let session = PracticeSession::new(words, rng)?;

        let voice = match configure_with_fallback(narrator.as_ref(), voice_id, options.rate, options.volume) {
            Ok(voice) => Some(voice),
            Err(e) => {
                warn!("Narrator setup failed, practising without a configured voice: {e}");
                None
            }
        };

        let (slot, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let narration = narration::spawn(narrator, rx, cancel.clone(), options.cadence);

        info!(
            "Practice session started: {} words, voice={}",
            session.progress().1,
            voice.as_deref().unwrap_or("-")
        );

        Ok(Self {
            session,
            voice,
            slot,
            cancel,
            narration: Some(narration),
            on_finished: None,
        })
    }

    /// Register the callback that receives the final summary.
    /// Fired at most once, when the word list is exhausted.
    pub fn on_finished(&mut self, callback: impl FnOnce(&AnswerSummary) + Send + 'static) {
        self.on_finished = Some(Box::new(callback));
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    pub fn current_word(&self) -> Option<&str> {
        self.session.current_word()
    }

    pub fn practiced_words(&self) -> &[String] {
        self.session.practiced_words()
    }

    pub fn remaining_count(&self) -> usize {
        self.session.remaining_count()
    }

    pub fn progress(&self) -> (usize, usize) {
        self.session.progress()
    }

    pub fn summary(&self) -> AnswerSummary {
        self.session.summary()
    }

    pub fn show_answer(&self) -> Result<WordEntry, PracticeError> {
        self.session.show_answer()
    }

    /// Draw the next word and hand it to the narration loop. On exhaustion,
    /// fires the finished callback and closes the session.
    pub fn draw_next(&mut self) -> Result<Draw, PracticeError> {
        let draw = self.session.draw_next()?;
        match &draw {
            Draw::Word(word) => {
                self.slot.send_replace(Some(word.clone()));
            }
            Draw::Finished(summary) => {
                self.slot.send_replace(None);
                if let Some(callback) = self.on_finished.take() {
                    callback(summary);
                }
                self.release();
            }
        }
        Ok(draw)
    }

    /// Stop narration and close the session. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.session.close();
        self.release();
    }

    /// Wait for the narration task to exit. Call after `close`.
    pub async fn closed(&mut self) {
        if let Some(handle) = self.narration.take() {
            if let Err(e) = handle.await {
                warn!("Narration task ended abnormally: {e}");
            }
        }
    }

    fn release(&mut self) {
        self.slot.send_replace(None);
        self.cancel.cancel();
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::narrator::testing::ScriptedNarrator;

    const TICK: Duration = Duration::from_millis(10);

    fn options() -> SessionOptions {
        SessionOptions {
            rate: 150,
            volume: 1.0,
            cadence: Cadence {
                pause: TICK,
                pauses_per_cycle: 3,
            },
        }
    }

    fn apple_dog() -> VocabularySet {
        [("apple", "苹果"), ("dog", "狗")].into_iter().collect()
    }

    fn start(narrator: &Arc<ScriptedNarrator>, voice: Option<&str>) -> SessionHandle {
        SessionHandle::start(
            apple_dog(),
            voice,
            narrator.clone(),
            options(),
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_vocabulary_is_rejected() {
        let narrator = Arc::new(ScriptedNarrator::new(&["af_heart"]));
        let result = start_session(VocabularySet::new(), Some("af_heart"), narrator, options());
        assert!(matches!(result, Err(PracticeError::EmptyVocabulary)));
    }

    #[tokio::test]
    async fn unknown_voice_falls_back() {
        let narrator = Arc::new(ScriptedNarrator::new(&["af_heart", "bf_emma"]));
        let mut handle = start(&narrator, Some("zz_missing"));
        assert_eq!(handle.voice(), Some("af_heart"));
        assert_eq!(narrator.voice().as_deref(), Some("af_heart"));
        handle.close();
        handle.closed().await;
    }

    #[tokio::test]
    async fn session_without_voices_still_runs() {
        let narrator = Arc::new(ScriptedNarrator::new(&[]));
        let mut handle = start(&narrator, None);
        assert_eq!(handle.voice(), None);
        assert!(matches!(handle.draw_next().unwrap(), Draw::Word(_)));
        handle.close();
        handle.closed().await;
    }

    #[tokio::test]
    async fn nothing_is_narrated_before_first_draw() {
        let narrator = Arc::new(ScriptedNarrator::new(&["af_heart"]));
        let mut handle = start(&narrator, None);
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(handle.show_answer(), Err(PracticeError::NoCurrentWord));
        assert_eq!(handle.state(), SessionState::Idle);
        handle.close();
        handle.closed().await;
        assert!(narrator.spoken().is_empty());
    }

    #[tokio::test]
    async fn drawn_word_is_narrated() {
        let narrator = Arc::new(ScriptedNarrator::new(&["af_heart"]));
        let mut handle = start(&narrator, None);

        let Draw::Word(word) = handle.draw_next().unwrap() else {
            panic!("expected a word");
        };
        tokio::time::sleep(TICK * 5).await;
        handle.close();
        handle.closed().await;

        let spoken = narrator.spoken();
        assert!(!spoken.is_empty());
        assert!(spoken.iter().all(|w| *w == word));
    }

    #[tokio::test]
    async fn show_answer_does_not_wait_for_speech() {
        let narrator = Arc::new(
            ScriptedNarrator::new(&["af_heart"]).with_speak_time(Duration::from_millis(200)),
        );
        let mut handle = start(&narrator, None);
        handle.draw_next().unwrap();
        tokio::time::sleep(TICK).await;

        let answer = tokio::time::timeout(TICK, async { handle.show_answer() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Some(answer.word.as_str()), handle.current_word());

        handle.close();
        handle.closed().await;
    }

    #[tokio::test]
    async fn no_narration_after_close() {
        let narrator = Arc::new(ScriptedNarrator::new(&["af_heart"]));
        let mut handle = start(&narrator, None);
        handle.draw_next().unwrap();
        tokio::time::sleep(TICK * 4).await;

        handle.close();
        handle.closed().await;
        let count = narrator.spoken().len();

        tokio::time::sleep(TICK * 6).await;
        assert_eq!(narrator.spoken().len(), count);
        assert_eq!(handle.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let narrator = Arc::new(ScriptedNarrator::new(&["af_heart"]));
        let mut handle = start(&narrator, None);
        handle.close();
        handle.close();
        handle.closed().await;
        handle.closed().await;
        assert_eq!(handle.draw_next(), Err(PracticeError::SessionClosed));
    }

    #[tokio::test]
    async fn finished_callback_fires_once_with_summary() {
        let narrator = Arc::new(ScriptedNarrator::new(&["af_heart"]));
        let mut handle = start(&narrator, None);

        let calls = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(None));
        {
            let calls = calls.clone();
            let received = received.clone();
            handle.on_finished(move |summary| {
                calls.fetch_add(1, Ordering::SeqCst);
                *received.lock().unwrap() = Some(summary.clone());
            });
        }

        let mut drawn = Vec::new();
        loop {
            match handle.draw_next().unwrap() {
                Draw::Word(w) => drawn.push(w),
                Draw::Finished(summary) => {
                    let words: Vec<&str> = summary.entries.iter().map(|e| e.word.as_str()).collect();
                    assert_eq!(words, drawn.iter().map(String::as_str).collect::<Vec<_>>());
                    break;
                }
            }
        }
        assert_eq!(drawn.len(), 2);
        assert_eq!(handle.draw_next(), Err(PracticeError::SessionClosed));
        handle.closed().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let summary = received.lock().unwrap().clone().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(handle.current_word(), None);
        assert_eq!(handle.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn closing_early_does_not_fire_callback() {
        let narrator = Arc::new(ScriptedNarrator::new(&["af_heart"]));
        let mut handle = start(&narrator, None);
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = calls.clone();
            handle.on_finished(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        handle.draw_next().unwrap();
        handle.close();
        handle.closed().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
