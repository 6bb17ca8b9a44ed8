use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use studymode_core::{DeckStats, QuizDifficulty};

#[derive(Deserialize)]
pub struct CardIn {
    pub question: String,
    pub answer: String,
}

#[derive(Deserialize)]
pub struct PairIn {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub a: String,
}

#[derive(Deserialize)]
pub struct BulkIn {
    pub pairs: Vec<PairIn>,
}

#[derive(Deserialize)]
pub struct GeneratedIn {
    pub text: String,
}

/// `offered` pairs were complete; `skipped` of those were already stored or
/// repeated in the batch; `dropped` entries had an empty side.
#[derive(Serialize)]
pub struct AddedOut {
    pub added: usize,
    pub offered: usize,
    pub skipped: usize,
    pub dropped: usize,
}

impl AddedOut {
    pub fn new(added: usize, offered: usize, dropped: usize) -> Self {
        Self { added, offered, skipped: offered.saturating_sub(added), dropped }
    }
}

#[derive(Deserialize)]
pub struct ReviewIn {
    pub quality: i32,
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct DueQuery {
    pub limit: Option<usize>,
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct StatsOut {
    #[serde(flatten)]
    pub stats: DeckStats,
    pub quiz_difficulty: QuizDifficulty,
}
