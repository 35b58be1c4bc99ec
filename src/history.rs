//! Practice history.
//!
//! Stores one record per practice session as daily JSONL files in
//! ~/.vocab-drill-history/.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Directory for history JSONL files.
pub fn history_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vocab-drill-history")
}

fn history_file(dir: &Path, date: &str) -> PathBuf {
    let date_str = if date == "today" {
        Local::now().format("%Y-%m-%d").to_string()
    } else {
        date.to_string()
    };
    dir.join(format!("{date_str}.jsonl"))
}

/// Record of a single practice session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: String,
    pub voice: Option<String>,
    pub vocabulary_size: usize,
    pub words_practiced: usize,
    /// True when every word was drawn, false when closed early.
    pub finished: bool,
    pub duration_s: f64,
}

impl SessionRecord {
    pub fn now(
        voice: Option<&str>,
        (words_practiced, vocabulary_size): (usize, usize),
        finished: bool,
        duration_s: f64,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            voice: voice.map(str::to_string),
            vocabulary_size,
            words_practiced,
            finished,
            duration_s,
        }
    }
}

/// Append a session record to today's history file.
pub fn save_record(record: &SessionRecord) {
    save_record_in(&history_dir(), record);
}

pub fn save_record_in(dir: &Path, record: &SessionRecord) {
    if let Err(e) = fs::create_dir_all(dir) {
        error!("Failed to create history dir: {e}");
        return;
    }

    let path = history_file(dir, "today");
    match fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(mut file) => match serde_json::to_string(record) {
            Ok(json) => {
                if let Err(e) = writeln!(file, "{json}") {
                    error!("Failed to write history record: {e}");
                } else {
                    debug!("Saved session record to {}", path.display());
                }
            }
            Err(e) => error!("Failed to serialize record: {e}"),
        },
        Err(e) => error!("Failed to open history file: {e}"),
    }
}

/// Load all session records for a given date (`YYYY-MM-DD` or `today`).
pub fn load_records(date: &str) -> Vec<SessionRecord> {
    load_records_in(&history_dir(), date)
}

pub fn load_records_in(dir: &Path, date: &str) -> Vec<SessionRecord> {
    let path = history_file(dir, date);
    let file = match fs::File::open(&path) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };

    std::io::BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<SessionRecord>(&line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping malformed history line: {e}");
                None
            }
        })
        .collect()
}
