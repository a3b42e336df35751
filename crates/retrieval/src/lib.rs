use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use vietgo_core::models::{TourHit, TourRecord};
use vietgo_core::normalize::tokenize;
use walkdir::WalkDir;

/// Hits scoring below this are discarded before callers ever see them.
const SCORE_THRESHOLD: f32 = 0.5;
const KEYWORD_WEIGHT: f32 = 0.65;
const VECTOR_WEIGHT: f32 = 0.35;

pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic signed-hash projection embedder. Not a trained model,
/// but stable across runs and good enough to break keyword ties.
#[derive(Debug, Clone)]
pub struct HashEmbeddingModel {
    dims: usize,
}

impl HashEmbeddingModel {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(32) }
    }
}

impl Default for HashEmbeddingModel {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EmbeddingModel for HashEmbeddingModel {
    fn model_name(&self) -> &'static str {
        "hash-projection"
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0_f32; self.dims];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let index = (hash as usize) % self.dims;
            let sign = if (hash & 1) == 0 { 1.0 } else { -1.0 };
            vec[index] += sign;
        }

        normalize(&mut vec);
        vec
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}

/// Semantic-search port consumed by the agent. The in-process index
/// answers immediately; remote backends can await network IO.
pub trait RetrievalService: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<TourHit>>;
}

struct IndexedTour {
    record: TourRecord,
    text: String,
    keywords: HashSet<String>,
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub tours_indexed: usize,
    pub vector_enabled: bool,
}

/// In-process hybrid index over the tour corpus: token overlap blended
/// with cosine similarity when an embedder is supplied.
pub struct TourIndex {
    tours: Vec<IndexedTour>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
}

impl TourIndex {
    pub fn from_records(
        records: Vec<TourRecord>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Self {
        let tours = records
            .into_iter()
            .map(|record| {
                let text = record.search_text();
                let keywords = tokenize(&text).into_iter().collect::<HashSet<_>>();
                let embedding = embedder.as_ref().map(|model| model.embed(&text));
                IndexedTour {
                    record,
                    text,
                    keywords,
                    embedding,
                }
            })
            .collect();

        Self { tours, embedder }
    }

    pub fn from_data_dir(
        path: impl AsRef<Path>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Result<Self> {
        let records = load_tour_records(path.as_ref())?;
        Ok(Self::from_records(records, embedder))
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            tours_indexed: self.tours.len(),
            vector_enabled: self.embedder.is_some(),
        }
    }

    pub fn search_sync(&self, query: &str, top_k: usize) -> Vec<TourHit> {
        let query_tokens = tokenize(query).into_iter().collect::<HashSet<_>>();
        let query_embedding = self.embedder.as_ref().map(|model| model.embed(query));

        let mut scored = self
            .tours
            .iter()
            .map(|tour| {
                let keyword = keyword_score(&query_tokens, &tour.keywords);
                let vector = match (&query_embedding, &tour.embedding) {
                    (Some(q), Some(c)) => cosine_similarity(q, c).max(0.0),
                    _ => 0.0,
                };

                let score = if query_embedding.is_some() {
                    (KEYWORD_WEIGHT * keyword) + (VECTOR_WEIGHT * vector)
                } else {
                    keyword
                };

                (score, tour)
            })
            .filter(|(score, _)| *score >= SCORE_THRESHOLD)
            .collect::<Vec<_>>();

        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, tour)| TourHit {
                score,
                record: tour.record.clone(),
                text: tour.text.clone(),
            })
            .collect()
    }
}

impl RetrievalService for TourIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<TourHit>> {
        Ok(self.search_sync(query, top_k))
    }
}

/// Loads tour records from every `.json` file under `root`. A file may
/// hold a single record or an array of them.
pub fn load_tour_records(root: &Path) -> Result<Vec<TourRecord>> {
    let mut records = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry.path().extension().and_then(|ext| ext.to_str()) == Some("json")
        })
    {
        let path = entry.path();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading tour file: {}", path.display()))?;

        let parsed: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid tour json: {}", path.display()))?;

        match parsed {
            serde_json::Value::Array(values) => {
                for value in values {
                    let record: TourRecord = serde_json::from_value(value)
                        .with_context(|| format!("invalid tour entry in {}", path.display()))?;
                    records.push(record);
                }
            }
            value => {
                let record: TourRecord = serde_json::from_value(value)
                    .with_context(|| format!("invalid tour entry in {}", path.display()))?;
                records.push(record);
            }
        }
    }

    Ok(records)
}

fn keyword_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }

    let overlap = query_tokens
        .iter()
        .filter(|token| doc_tokens.contains(*token))
        .count() as f32;

    overlap / query_tokens.len() as f32
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;

    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        a_norm += lhs * lhs;
        b_norm += rhs * rhs;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        0.0
    } else {
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, title: &str, description: &str, destination: &str) -> TourRecord {
        TourRecord {
            code: code.into(),
            title: title.into(),
            description: description.into(),
            destination: destination.into(),
            departure: Some("Hà Nội".into()),
            price: "2.000.000 Đồng".into(),
            duration: "3 Ngày".into(),
            max_participants: 20,
        }
    }

    fn index() -> TourIndex {
        TourIndex::from_records(
            vec![
                record("T1", "Tour Đà Nẵng 3 ngày", "Tham quan cầu Rồng", "Đà Nẵng"),
                record("T2", "Tour Hội An phố cổ", "Khám phá ẩm thực", "Hội An"),
            ],
            Some(Arc::new(HashEmbeddingModel::default())),
        )
    }

    #[test]
    fn cosine_sanity() {
        let a = [1.0, 0.0, 1.0];
        let b = [1.0, 0.0, 1.0];
        assert!(cosine_similarity(&a, &b) > 0.99);
    }

    #[test]
    fn embedding_is_deterministic() {
        let model = HashEmbeddingModel::default();
        assert_eq!(model.embed("tour đà nẵng"), model.embed("tour đà nẵng"));
    }

    #[test]
    fn keyword_query_matches_all_tours() {
        let hits = index().search_sync("tour", 30);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.score >= SCORE_THRESHOLD));
    }

    #[test]
    fn diacritic_free_query_still_matches() {
        let hits = index().search_sync("tour da nang", 5);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].record.code, "T1");
    }

    #[test]
    fn low_overlap_is_filtered() {
        let hits = index().search_sync("chuyện hoàn toàn không liên quan gì hết", 5);
        assert!(hits.is_empty());
    }
}
