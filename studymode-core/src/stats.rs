use crate::Card;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeckStats {
    pub total: usize,
    pub due: usize,
    pub new: usize,
    pub average_repetitions: f64,
    pub average_ef: f64,
}

impl DeckStats {
    pub fn quiz_difficulty(&self) -> QuizDifficulty {
        QuizDifficulty::from_average_repetitions(self.average_repetitions)
    }
}

/// How hard generated quiz questions should be, judged from deck progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizDifficulty {
    Easier,
    Medium,
    Harder,
}

impl QuizDifficulty {
    pub fn from_average_repetitions(avg: f64) -> Self {
        if avg >= 3.0 {
            QuizDifficulty::Harder
        } else if avg >= 1.0 {
            QuizDifficulty::Medium
        } else {
            QuizDifficulty::Easier
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QuizDifficulty::Easier => "easier",
            QuizDifficulty::Medium => "medium",
            QuizDifficulty::Harder => "harder",
        }
    }
}

pub fn summarize(cards: &[Card], as_of: DateTime<Utc>) -> DeckStats {
    if cards.is_empty() {
        return DeckStats::default();
    }
    let n = cards.len() as f64;
    DeckStats {
        total: cards.len(),
        due: cards.iter().filter(|c| c.is_due(as_of)).count(),
        new: cards.iter().filter(|c| c.is_new()).count(),
        average_repetitions: cards.iter().map(|c| c.repetitions as f64).sum::<f64>() / n,
        average_ef: cards.iter().map(|c| c.ef).sum::<f64>() / n,
    }
}
