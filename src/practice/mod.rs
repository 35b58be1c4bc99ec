//! Practice sessions: randomized quiz over a word list with spoken prompts.
//!
//! - `session`: draw/answer/close state machine
//! - `narration`: background loop repeating the current word
//! - `handle`: ties the two together for the front end

pub mod handle;
pub mod narration;
pub mod session;

pub use handle::{start_session, SessionHandle, SessionOptions};
pub use narration::Cadence;
pub use session::{AnswerSummary, Draw, PracticeSession, SessionState};
