//! vocab-drill: vocabulary practice with spoken pronunciation.
//!
//! A practice session draws every word of a list exactly once, in random
//! order, while a background narration loop keeps repeating the current word.

pub mod config;
pub mod error;
pub mod history;
pub mod narrator;
pub mod practice;
pub mod vocabulary;

pub use error::{NarratorError, PracticeError, VocabularyError};
pub use narrator::Narrator;
pub use practice::{start_session, Draw, SessionHandle, SessionOptions};
pub use vocabulary::{VocabularySet, WordEntry};
