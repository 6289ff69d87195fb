//! Example-embedding semantic matcher (Tier 3)
//!
//! Every example utterance is embedded once by `initialize`; a query is
//! embedded and compared by cosine similarity against the whole index.
//! The matcher reports ready only after the index is complete, and the
//! orchestrator skips the tier until then instead of waiting.

use async_trait::async_trait;
use concierge_core::{Error, Language, MatchQuery, Result, SemanticMatch, SemanticMatcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default dimension of the hashing embedder
pub const HASHING_DIMENSION: usize = 256;

/// Text to vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Deterministic character-trigram hashing embedder
///
/// No model, no I/O. Good enough to tell "where is the laundry" from "wifi
/// password" and stable across runs, which is what tests need.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Synchronous embedding; the trait method wraps this
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        let words: Vec<String> = text
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
            .filter(|w| !w.is_empty())
            .collect();
        let padded: Vec<char> = format!(" {} ", words.join(" ")).chars().collect();

        for gram in padded.windows(3) {
            let hash = fnv1a(gram);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(vector)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for c in chars {
        for byte in (*c as u32).to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale to unit length; zero vectors stay zero
pub fn normalize(v: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&v);
    if norm == 0.0 {
        return v;
    }
    v.into_iter().map(|x| x / norm).collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (na, nb) = (l2_norm(a), l2_norm(b));
    if na == 0.0 || nb == 0.0 || a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / (na * nb)
}

/// Examples for one intent, flat or grouped by language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExampleSet {
    Flat(Vec<String>),
    ByLanguage(BTreeMap<Language, Vec<String>>),
}

/// Example table row: `{intent, examples: [..] | {lang: [..]}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleEntry {
    pub intent: String,
    pub examples: ExampleSet,
}

impl ExampleEntry {
    pub fn flat(intent: impl Into<String>, examples: &[&str]) -> Self {
        Self {
            intent: intent.into(),
            examples: ExampleSet::Flat(examples.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// (language, example) pairs; flat examples carry no language
    fn iter_examples(&self) -> Vec<(Option<Language>, &str)> {
        match &self.examples {
            ExampleSet::Flat(list) => list.iter().map(|e| (None, e.as_str())).collect(),
            ExampleSet::ByLanguage(map) => map
                .iter()
                .flat_map(|(lang, list)| list.iter().map(move |e| (Some(*lang), e.as_str())))
                .collect(),
        }
    }
}

/// Parse a JSON or YAML example table
pub fn parse_examples(content: &str, json: bool) -> Result<Vec<ExampleEntry>> {
    if json {
        Ok(serde_json::from_str(content)?)
    } else {
        serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("invalid example table: {}", e)))
    }
}

struct IndexedExample {
    intent: String,
    language: Option<Language>,
    text: String,
    vector: Vec<f32>,
}

/// Cosine best-match over embedded examples
pub struct ExampleSemanticMatcher {
    embedder: Arc<dyn Embedder>,
    index: RwLock<Arc<Vec<IndexedExample>>>,
    ready: AtomicBool,
}

impl ExampleSemanticMatcher {
    /// Not ready until `initialize` completes
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: RwLock::new(Arc::new(Vec::new())),
            ready: AtomicBool::new(false),
        }
    }

    /// Embed every example and publish the index
    ///
    /// A failure leaves the previous index (and readiness) untouched.
    pub async fn initialize(&self, entries: &[ExampleEntry]) -> Result<usize> {
        let mut index = Vec::new();
        for entry in entries {
            for (language, text) in entry.iter_examples() {
                let vector = self.embedder.embed(text).await?;
                index.push(IndexedExample {
                    intent: entry.intent.clone(),
                    language,
                    text: text.to_string(),
                    vector,
                });
            }
        }

        let count = index.len();
        *self.index.write() = Arc::new(index);
        self.ready.store(true, Ordering::Release);
        tracing::info!(examples = count, intents = entries.len(), "Semantic index ready");
        Ok(count)
    }

    /// Read an example table file and initialize from it
    pub async fn initialize_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::configuration(format!("cannot read {}: {}", path.display(), e)))?;
        let json = path.extension().map_or(false, |ext| ext == "json");
        let entries = parse_examples(&content, json)?;
        self.initialize(&entries).await
    }

    /// Drop the index and go back to not-ready
    pub fn reset(&self) {
        self.ready.store(false, Ordering::Release);
        *self.index.write() = Arc::new(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}

#[async_trait]
impl SemanticMatcher for ExampleSemanticMatcher {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn find_match(&self, query: &MatchQuery<'_>) -> Result<Option<SemanticMatch>> {
        if !self.is_ready() {
            return Err(Error::ClassifierUnavailable("semantic index not initialized".into()));
        }

        let vector = self.embedder.embed(query.text).await?;
        let index = self.index.read().clone();

        let mut best: Option<(f32, &IndexedExample)> = None;
        for example in index.iter() {
            // Flat examples are language-neutral
            if let (Some(wanted), Some(lang)) = (query.language, example.language) {
                if wanted != lang {
                    continue;
                }
            }
            let score = cosine_similarity(&vector, &example.vector);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, example));
            }
        }

        Ok(best.map(|(score, example)| SemanticMatch {
            intent: example.intent.clone(),
            score: score.clamp(0.0, 1.0),
            matched_example: example.text.clone(),
        }))
    }
}
