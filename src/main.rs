//! vocab-drill: drill a word list by ear from the terminal.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use vocab_drill::config::Config;
use vocab_drill::history::{self, SessionRecord};
use vocab_drill::narrator::kokoro::KokoroNarrator;
use vocab_drill::narrator::{self, Narrator};
use vocab_drill::{start_session, Draw, PracticeError, SessionOptions, VocabularySet};

#[derive(Parser, Debug)]
#[command(name = "vocab-drill", about = "Vocabulary practice with spoken pronunciation")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Practice a JSON word list ({"word": "translation", ...})
    Practice {
        words: PathBuf,
        /// Voice id (defaults to the configured voice)
        #[arg(long)]
        voice: Option<String>,
    },
    /// List available voices
    Voices,
    /// Speak a sample pronunciation
    Sample {
        word: Option<String>,
        #[arg(long)]
        voice: Option<String>,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Next,
    Answer,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "" | "n" => Self::Next,
            "a" => Self::Answer,
            "q" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Suppress noisy ort internals
    let filter = if args.verbose {
        EnvFilter::new("debug,ort=info")
    } else {
        EnvFilter::new("info,ort=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(args.config.as_deref());

    match args.command {
        Command::Practice { words, voice } => practice(&config, &words, voice).await,
        Command::Voices => list_voices(&config).await,
        Command::Sample { word, voice } => sample(&config, word, voice).await,
    }
}

async fn load_narrator(config: &Config) -> Result<Arc<KokoroNarrator>, Box<dyn std::error::Error>> {
    info!("Loading Kokoro TTS model...");
    let narrator_config = config.narrator.clone();
    let narrator = tokio::task::spawn_blocking(move || KokoroNarrator::load(&narrator_config)).await??;
    Ok(Arc::new(narrator))
}

async fn practice(
    config: &Config,
    words_path: &Path,
    voice: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let words = VocabularySet::load_json(words_path)?;
    let narrator = load_narrator(config).await?;
    let voice = voice.unwrap_or_else(|| config.narrator.voice.clone());

    let mut session = start_session(words, Some(&voice), narrator, SessionOptions::from(config))?;
    session.on_finished(|summary| {
        println!("\nAll answers:\n{summary}");
    });

    println!("[Enter]/n next word, a show answer, q quit");
    let started = Instant::now();
    let mut input = stdin_lines();

    let finished = loop {
        let line = tokio::select! {
            line = input.recv() => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break false;
        };

        match Input::parse(&line) {
            Input::Next => match session.draw_next()? {
                Draw::Word(_) => {
                    let (done, total) = session.progress();
                    println!("[{done}/{total}] listen...");
                }
                Draw::Finished(_) => {
                    println!("You have practiced every word.");
                    break true;
                }
            },
            Input::Answer => match session.show_answer() {
                Ok(entry) => println!("{entry}"),
                Err(PracticeError::NoCurrentWord) => debug!("No current word to answer"),
                Err(e) => return Err(e.into()),
            },
            Input::Quit => break false,
            Input::Unknown(other) => println!("Unknown command: {other}"),
        }
    };

    session.close();
    session.closed().await;

    if config.practice.history {
        history::save_record(&SessionRecord::now(
            session.voice(),
            session.progress(),
            finished,
            started.elapsed().as_secs_f64(),
        ));
    }
    Ok(())
}

/// Forward stdin lines over a channel. The reader thread is detached so a
/// pending read never holds up shutdown.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn list_voices(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let narrator = load_narrator(config).await?;
    for voice in narrator.voices() {
        let marker = if voice == config.narrator.voice { "*" } else { " " };
        println!("{marker} {voice}");
    }
    Ok(())
}

async fn sample(
    config: &Config,
    word: Option<String>,
    voice: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let narrator = load_narrator(config).await?;
    let voice = voice.unwrap_or_else(|| config.narrator.voice.clone());
    let rate = config.narrator.rate;
    let volume = config.narrator.volume;
    let fallback = config.practice.sample_fallback_word.clone();

    let spoken = tokio::task::spawn_blocking(move || {
        narrator::configure_with_fallback(narrator.as_ref(), Some(&voice), rate, volume)?;
        narrator::sample(narrator.as_ref(), word.as_deref(), fallback.as_deref())
    })
    .await??;

    match spoken {
        Some(text) => info!("Sampled: {text}"),
        None => info!("Nothing to sample"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_practice_input() {
        assert_eq!(Input::parse(""), Input::Next);
        assert_eq!(Input::parse(" n "), Input::Next);
        assert_eq!(Input::parse("a"), Input::Answer);
        assert_eq!(Input::parse("q"), Input::Quit);
        assert_eq!(Input::parse("x"), Input::Unknown("x".into()));
    }

    #[test]
    fn parses_subcommands() {
        let args = Args::try_parse_from(["vocab-drill", "-v", "practice", "words.json", "--voice", "bf_emma"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Practice { words, voice } => {
                assert_eq!(words, PathBuf::from("words.json"));
                assert_eq!(voice.as_deref(), Some("bf_emma"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
