//! Quiz state machine: draws words without repetition until exhausted.
//!
//! Idle → AwaitingAnswer → … → Finished → Closed

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PracticeError;
use crate::vocabulary::{VocabularySet, WordEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingAnswer,
    Finished,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::AwaitingAnswer => write!(f, "AWAITING_ANSWER"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Every practiced word with its translation, in draw order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnswerSummary {
    pub entries: Vec<WordEntry>,
}

impl AnswerSummary {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for AnswerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Outcome of a draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draw {
    /// A new current word.
    Word(String),
    /// The word list is exhausted; the session is now closed.
    Finished(AnswerSummary),
}

/// Quiz state over one vocabulary snapshot.
///
/// `remaining` is shuffled once up front and drawn from the back, so each
/// word is drawn exactly once and the session ends after `len` draws.
#[derive(Debug)]
pub struct PracticeSession {
    all_words: Arc<VocabularySet>,
    remaining: Vec<String>,
    practiced: Vec<String>,
    current: Option<String>,
    state: SessionState,
}

impl PracticeSession {
    pub fn new<R: Rng + ?Sized>(words: VocabularySet, rng: &mut R) -> Result<Self, PracticeError> {
        if words.is_empty() {
            return Err(PracticeError::EmptyVocabulary);
        }

        let mut remaining: Vec<String> = words.words().map(str::to_string).collect();
        remaining.shuffle(rng);

        Ok(Self {
            practiced: Vec::with_capacity(remaining.len()),
            remaining,
            all_words: Arc::new(words),
            current: None,
            state: SessionState::Idle,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_word(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn practiced_words(&self) -> &[String] {
        &self.practiced
    }

    pub fn remaining_count(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_remaining(&self, word: &str) -> bool {
        self.remaining.iter().any(|w| w == word)
    }

    /// (words practiced, vocabulary size)
    pub fn progress(&self) -> (usize, usize) {
        (self.practiced.len(), self.all_words.len())
    }

    pub fn vocabulary(&self) -> &VocabularySet {
        &self.all_words
    }

    /// Draw the next word, or finish and close the session when none remain.
    pub fn draw_next(&mut self) -> Result<Draw, PracticeError> {
        if self.state == SessionState::Closed {
            return Err(PracticeError::SessionClosed);
        }

        match self.remaining.pop() {
            Some(word) => {
                self.practiced.push(word.clone());
                self.current = Some(word.clone());
                self.state = SessionState::AwaitingAnswer;
                debug!(
                    "Drew '{word}' ({}/{})",
                    self.practiced.len(),
                    self.all_words.len()
                );
                Ok(Draw::Word(word))
            }
            None => {
                self.current = None;
                self.state = SessionState::Finished;
                let summary = self.summary();
                info!("All {} words practiced", summary.len());
                self.state = SessionState::Closed;
                Ok(Draw::Finished(summary))
            }
        }
    }

    /// The current word with its translation.
    pub fn show_answer(&self) -> Result<WordEntry, PracticeError> {
        let word = self.current.as_deref().ok_or(PracticeError::NoCurrentWord)?;
        let translation = self
            .all_words
            .translation(word)
            .ok_or(PracticeError::NoCurrentWord)?;
        Ok(WordEntry::new(word, translation))
    }

    /// Answers for every practiced word, in draw order.
    pub fn summary(&self) -> AnswerSummary {
        AnswerSummary {
            entries: self
                .practiced
                .iter()
                .filter_map(|w| self.all_words.translation(w).map(|t| WordEntry::new(w, t)))
                .collect(),
        }
    }

    /// Returns false if already closed.
    pub fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        info!("Session: {} → {}", self.state, SessionState::Closed);
        self.current = None;
        self.state = SessionState::Closed;
        true
    }
}
