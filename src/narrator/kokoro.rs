//! Kokoro TTS narrator: text → phonemes → ONNX inference → audio playback.
//!
//! Pipeline:
//! 1. Text → sentences (split on .!?)
//! 2. Sentence → phonemes (misaki-rs G2P)
//! 3. Phonemes → token IDs (tokenizer.json vocabulary)
//! 4. Token IDs + voice style + speed → ONNX inference → f32 audio (24kHz)
//! 5. Audio → rodio Sink, blocking until the sentence has played

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use ndarray::{Array2, Array3};
use ndarray_npy::NpzReader;
use ort::value::Tensor;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, info, warn};

use super::{Narrator, BASE_RATE_WPM};
use crate::config::NarratorConfig;
use crate::error::NarratorError;

const SAMPLE_RATE: u32 = 24000;
const MAX_TOKENS: usize = 510; // Voice style array first dimension
const STYLE_DIM: usize = 256;

/// Voice style vectors indexed by token count. shape: (510, 256)
struct VoiceStyle {
    styles: Array2<f32>,
}

#[derive(Debug, Clone, PartialEq)]
struct Settings {
    voice: String,
    speed: f32,
    volume: f32,
}

/// Narrator backed by the Kokoro ONNX model.
pub struct KokoroNarrator {
    // ort 2.0 Session::run needs &mut
    session: Mutex<ort::session::Session>,
    phonemizer: misaki_rs::G2P,
    vocab: HashMap<char, i64>,
    voices: BTreeMap<String, VoiceStyle>,
    settings: Mutex<Settings>,
    // Kept alive for the narrator's lifetime
    output_stream: Mutex<OutputStream>,
}

impl KokoroNarrator {
    /// Load the tokenizer, voice bank, ONNX model, phonemizer and audio
    /// output. Blocking; call from `spawn_blocking` inside async code.
    pub fn load(config: &NarratorConfig) -> Result<Self, NarratorError> {
        let t0 = Instant::now();

        let tokenizer_path = config.tokenizer_path();
        info!("Loading tokenizer from {}", tokenizer_path.display());
        let vocab = load_tokenizer(&tokenizer_path)?;
        info!("Tokenizer loaded: {} tokens", vocab.len());

        let voices_path = config.voices_path();
        info!("Loading voices from {}", voices_path.display());
        let voices = load_voices(&voices_path)?;
        info!("Loaded {} voices", voices.len());

        let model_path = config.model_path();
        info!("Loading ONNX model from {}", model_path.display());
        let session = ort::session::Session::builder()
            .map_err(|e| NarratorError::Load(format!("ONNX session builder: {e}")))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| NarratorError::Load(format!("optimization level: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| NarratorError::Load(format!("thread count: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| NarratorError::Load(format!("ONNX model: {e}")))?;

        let phonemizer = misaki_rs::G2P::new(misaki_rs::Language::EnglishUS);

        let output_stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| NarratorError::Playback(format!("audio output: {e}")))?;

        let narrator = Self {
            session: Mutex::new(session),
            phonemizer,
            vocab,
            voices,
            settings: Mutex::new(Settings {
                voice: config.voice.clone(),
                speed: rate_to_speed(config.rate),
                volume: config.volume.clamp(0.0, 1.0),
            }),
            output_stream: Mutex::new(output_stream),
        };

        info!("Kokoro narrator loaded in {}ms", t0.elapsed().as_millis());
        Ok(narrator)
    }

    fn settings(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate audio samples for a single sentence.
    fn synthesize(&self, text: &str, settings: &Settings) -> Result<Vec<f32>, NarratorError> {
        let (phonemes, _tokens) = self
            .phonemizer
            .g2p(text)
            .map_err(|e| NarratorError::Synthesis(format!("phonemization: {e}")))?;

        if phonemes.is_empty() {
            return Ok(Vec::new());
        }

        let token_ids = tokenize(&phonemes, &self.vocab);
        let n_tokens = token_ids.len();

        let voice = self
            .voices
            .get(&settings.voice)
            .ok_or_else(|| NarratorError::VoiceUnavailable(settings.voice.clone()))?;
        let style_idx = n_tokens.saturating_sub(2).min(voice.styles.nrows().saturating_sub(1));
        let style_vec: Vec<f32> = voice.styles.row(style_idx).to_vec();

        let tokens = Array2::from_shape_vec((1, n_tokens), token_ids)
            .map_err(|e| NarratorError::Synthesis(format!("tokens tensor: {e}")))?;
        let tokens = Tensor::from_array(tokens)
            .map_err(|e| NarratorError::Synthesis(format!("tokens ort tensor: {e}")))?;

        let style = Array2::from_shape_vec((1, STYLE_DIM), style_vec)
            .map_err(|e| NarratorError::Synthesis(format!("style tensor: {e}")))?;
        let style = Tensor::from_array(style)
            .map_err(|e| NarratorError::Synthesis(format!("style ort tensor: {e}")))?;

        let speed = Tensor::from_array(ndarray::Array1::from_vec(vec![settings.speed]))
            .map_err(|e| NarratorError::Synthesis(format!("speed ort tensor: {e}")))?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![
                "tokens" => tokens,
                "style" => style,
                "speed" => speed
            ])
            .map_err(|e| NarratorError::Synthesis(format!("ONNX inference: {e}")))?;

        let (_name, audio) = outputs
            .iter()
            .next()
            .ok_or_else(|| NarratorError::Synthesis("no output tensor from model".into()))?;
        let (_shape, samples) = audio
            .try_extract_tensor::<f32>()
            .map_err(|e| NarratorError::Synthesis(format!("audio tensor: {e}")))?;

        let samples = samples.to_vec();
        debug!(
            "Generated {} samples ({:.1}s)",
            samples.len(),
            samples.len() as f32 / SAMPLE_RATE as f32
        );
        Ok(samples)
    }

    /// Play samples and block until the sink drains.
    fn play(&self, samples: Vec<f32>, volume: f32) {
        let sink = {
            let stream = self.output_stream.lock().unwrap_or_else(PoisonError::into_inner);
            Sink::connect_new(stream.mixer())
        };
        sink.set_volume(volume);
        sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples));
        sink.sleep_until_end();
    }
}

impl Narrator for KokoroNarrator {
    fn voices(&self) -> Vec<String> {
        self.voices.keys().cloned().collect()
    }

    fn configure(&self, voice_id: &str, rate: u32, volume: f32) -> Result<(), NarratorError> {
        if !self.voices.contains_key(voice_id) {
            return Err(NarratorError::VoiceUnavailable(voice_id.to_string()));
        }
        let mut settings = self.settings();
        settings.voice = voice_id.to_string();
        settings.speed = rate_to_speed(rate);
        settings.volume = volume.clamp(0.0, 1.0);
        info!(
            "Narrator configured: voice={} speed={:.2} volume={:.2}",
            settings.voice, settings.speed, settings.volume
        );
        Ok(())
    }

    fn speak(&self, text: &str) -> Result<(), NarratorError> {
        let sentences = split_sentences(text.trim());
        if sentences.is_empty() {
            return Ok(());
        }

        // Snapshot so a concurrent configure() applies from the next utterance
        let settings = self.settings().clone();

        for (i, sentence) in sentences.iter().enumerate() {
            let t_gen = Instant::now();
            let samples = match self.synthesize(sentence, &settings) {
                Ok(s) => s,
                Err(e @ NarratorError::VoiceUnavailable(_)) => return Err(e),
                Err(e) => {
                    warn!("Synthesis failed for sentence {}: {e}", i + 1);
                    continue;
                }
            };
            if samples.is_empty() {
                continue;
            }

            let gen_ms = t_gen.elapsed().as_secs_f64() * 1000.0;
            let t_play = Instant::now();
            self.play(samples, settings.volume);
            debug!(
                "Sentence {}/{}: gen={gen_ms:.0}ms play={:.1}s",
                i + 1,
                sentences.len(),
                t_play.elapsed().as_secs_f64()
            );
        }

        Ok(())
    }
}

/// Map a words-per-minute rate onto Kokoro's speed factor.
fn rate_to_speed(rate: u32) -> f32 {
    (rate.max(1) as f32 / BASE_RATE_WPM as f32).clamp(0.25, 4.0)
}

/// Phonemes → token IDs, padded with 0 on both ends and capped at MAX_TOKENS.
fn tokenize(phonemes: &str, vocab: &HashMap<char, i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::with_capacity(phonemes.len() + 2);
    ids.push(0);
    // Unknown characters are dropped
    ids.extend(phonemes.chars().filter_map(|ch| vocab.get(&ch).copied()));
    ids.push(0);
    ids.truncate(MAX_TOKENS);
    ids
}

/// Load tokenizer vocabulary from tokenizer.json.
fn load_tokenizer(path: &Path) -> Result<HashMap<char, i64>, NarratorError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| NarratorError::Load(format!("read tokenizer: {e}")))?;
    parse_tokenizer(&contents)
}

fn parse_tokenizer(contents: &str) -> Result<HashMap<char, i64>, NarratorError> {
    let data: serde_json::Value = serde_json::from_str(contents)
        .map_err(|e| NarratorError::Load(format!("parse tokenizer JSON: {e}")))?;

    let vocab = data["model"]["vocab"]
        .as_object()
        .ok_or_else(|| NarratorError::Load("missing model.vocab in tokenizer.json".into()))?;

    let mut map = HashMap::with_capacity(vocab.len());
    for (token, id) in vocab {
        let id = id
            .as_i64()
            .ok_or_else(|| NarratorError::Load(format!("token id for {token:?} is not an integer")))?;
        if let Some(ch) = token.chars().next() {
            map.insert(ch, id);
        }
    }
    Ok(map)
}

/// Load all voice styles from an NPZ voice bank.
fn load_voices(path: &Path) -> Result<BTreeMap<String, VoiceStyle>, NarratorError> {
    let file = fs::File::open(path)
        .map_err(|e| NarratorError::Load(format!("open voices file: {e}")))?;
    let mut npz = NpzReader::new(file)
        .map_err(|e| NarratorError::Load(format!("read NPZ voices file: {e}")))?;

    let names = npz
        .names()
        .map_err(|e| NarratorError::Load(format!("list NPZ entries: {e}")))?;

    let mut voices = BTreeMap::new();
    for npy_name in names {
        let name = npy_name.trim_end_matches(".npy").to_string();
        let arr: Array3<f32> = npz
            .by_name(&npy_name)
            .map_err(|e| NarratorError::Load(format!("voice '{name}': {e}")))?;

        // (510, 1, 256) → (510, 256)
        let (rows, cols) = (arr.shape()[0], arr.shape()[2]);
        let styles = arr
            .into_shape_with_order((rows, cols))
            .map_err(|e| NarratorError::Load(format!("reshape voice '{name}': {e}")))?;

        voices.insert(name, VoiceStyle { styles });
    }

    if voices.is_empty() {
        return Err(NarratorError::NoVoices);
    }
    Ok(voices)
}

/// Split text into sentences at .!? boundaries.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?')
            && bytes.get(i + 1).is_some_and(u8::is_ascii_whitespace)
        {
            let s = text[start..=i].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = i + 1;
        }
    }

    let s = text[start..].trim();
    if !s.is_empty() {
        sentences.push(s);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_is_one_sentence() {
        assert_eq!(split_sentences("apple"), vec!["apple"]);
    }

    #[test]
    fn splits_on_terminal_punctuation_followed_by_space() {
        assert_eq!(
            split_sentences("Good morning. How are you? Fine!"),
            vec!["Good morning.", "How are you?", "Fine!"]
        );
    }

    #[test]
    fn abbreviations_without_space_stay_joined() {
        assert_eq!(split_sentences("e.g.x done"), vec!["e.g.x done"]);
    }

    #[test]
    fn blank_text_has_no_sentences() {
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn base_rate_is_neutral_speed() {
        assert!((rate_to_speed(150) - 1.0).abs() < f32::EPSILON);
        assert!((rate_to_speed(300) - 2.0).abs() < f32::EPSILON);
        assert!((rate_to_speed(0) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn tokenize_pads_and_drops_unknown() {
        let vocab: HashMap<char, i64> = [('a', 43), ('p', 56)].into_iter().collect();
        assert_eq!(tokenize("apz", &vocab), vec![0, 43, 56, 0]);
    }

    #[test]
    fn tokenize_caps_length() {
        let vocab: HashMap<char, i64> = [('a', 1)].into_iter().collect();
        let long = "a".repeat(MAX_TOKENS * 2);
        assert_eq!(tokenize(&long, &vocab).len(), MAX_TOKENS);
    }

    #[test]
    fn parses_tokenizer_vocab() {
        let json = r#"{"model": {"vocab": {"a": 43, "b": 44}}}"#;
        let vocab = parse_tokenizer(json).unwrap();
        assert_eq!(vocab.get(&'a'), Some(&43));
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn tokenizer_without_vocab_is_rejected() {
        assert!(matches!(parse_tokenizer("{}"), Err(NarratorError::Load(_))));
    }
}
