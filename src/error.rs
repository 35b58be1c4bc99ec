//! Error types shared across the crate.

use thiserror::Error;

/// Errors emitted by the practice session.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("no words available for practice")]
    EmptyVocabulary,
    /// Callers treat this as a silent no-op.
    #[error("no word has been drawn yet")]
    NoCurrentWord,
    #[error("practice session is closed")]
    SessionClosed,
}

/// Errors emitted by a speech narrator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NarratorError {
    #[error("voice not available: {0}")]
    VoiceUnavailable(String),
    #[error("no synthesis voices installed")]
    NoVoices,
    #[error("failed to load speech engine: {0}")]
    Load(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
}

/// Errors emitted while loading a word list.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VocabularyError {
    #[error("failed to read word list: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid word list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("word list is empty")]
    Empty,
}
