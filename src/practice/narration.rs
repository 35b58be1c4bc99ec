//! Background narration: repeats the current word until it changes or the
//! session is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PracticeConfig;
use crate::narrator::Narrator;

/// Pause length and number of pauses between repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub pause: Duration,
    pub pauses_per_cycle: u32,
}

impl From<&PracticeConfig> for Cadence {
    fn from(config: &PracticeConfig) -> Self {
        Self {
            pause: config.pause(),
            pauses_per_cycle: config.pauses_per_cycle,
        }
    }
}

/// Spawn the narration loop for one session.
pub(crate) fn spawn(
    narrator: Arc<dyn Narrator>,
    slot: watch::Receiver<Option<String>>,
    cancel: CancellationToken,
    cadence: Cadence,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run(narrator, slot, cancel, cadence).await;
        debug!("Narration loop stopped");
    })
}

async fn run(
    narrator: Arc<dyn Narrator>,
    mut slot: watch::Receiver<Option<String>>,
    cancel: CancellationToken,
    cadence: Cadence,
) {
    loop {
        let current = slot.borrow_and_update().clone();

        let word = match current {
            Some(word) => word,
            None => {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    changed = slot.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
                continue;
            }
        };

        if cancel.is_cancelled() {
            return;
        }
        speak(&narrator, word).await;

        for _ in 0..cadence.pauses_per_cycle {
            tokio::select! {
                () = cancel.cancelled() => return,
                changed = slot.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    // Cleared or replaced: stop repeating the old word
                    break;
                }
                () = tokio::time::sleep(cadence.pause) => {}
            }
        }
    }
}

/// Speak on the blocking pool. Failures are logged and swallowed.
async fn speak(narrator: &Arc<dyn Narrator>, word: String) {
    let narrator = Arc::clone(narrator);
    let result = tokio::task::spawn_blocking(move || {
        let result = narrator.speak(&word);
        (word, result)
    })
    .await;

    match result {
        Ok((word, Ok(()))) => debug!("Narrated '{word}'"),
        Ok((word, Err(e))) => warn!("Narration of '{word}' failed: {e}"),
        Err(e) => warn!("Narration task failed: {e}"),
    }
}
