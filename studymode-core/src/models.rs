use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

pub type CardId = i64;

pub const EF_MIN: f64 = 1.3;
pub const EF_DEFAULT: f64 = 2.5;

pub const QUALITY_MIN: i32 = 0;
pub const QUALITY_MAX: i32 = 5;
/// Lowest quality that counts as a successful recall.
pub const QUALITY_PASS: i32 = 3;

/// Longest interval the scheduler hands out, about a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// 9999-12-31T23:59:59Z. Review dates are never pushed past this, which keeps
/// persisted timestamps at four-digit years.
const LATEST_REVIEW_TIMESTAMP: i64 = 253_402_300_799;

/// Recall quality of a single review, 0 (blackout) to 5 (perfect).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: i32) -> Result<Self, CoreError> {
        if (QUALITY_MIN..=QUALITY_MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(CoreError::InvalidInput(format!(
                "quality must be between {QUALITY_MIN} and {QUALITY_MAX}, got {value}"
            )))
        }
    }

    pub fn value(self) -> i32 {
        self.0 as i32
    }

    pub fn is_lapse(self) -> bool {
        self.value() < QUALITY_PASS
    }
}

/// Pulls a review date back to the latest one a store can hold.
pub fn clamp_review_date(dt: DateTime<Utc>) -> DateTime<Utc> {
    match DateTime::from_timestamp(LATEST_REVIEW_TIMESTAMP, 0) {
        Some(latest) if dt > latest => latest,
        _ => dt,
    }
}

/// The four fields the scheduler owns.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub ef: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub next_review: DateTime<Utc>,
}

impl Schedule {
    /// State of a card that has never been reviewed: due immediately.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            ef: EF_DEFAULT,
            interval: 0,
            repetitions: 0,
            next_review: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub question: String,
    pub answer: String,

    pub ef: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub next_review: DateTime<Utc>,
}

impl Card {
    pub fn new(
        id: CardId,
        question: impl Into<String>,
        answer: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::with_schedule(id, question, answer, Schedule::initial(now))
    }

    pub fn with_schedule(
        id: CardId,
        question: impl Into<String>,
        answer: impl Into<String>,
        schedule: Schedule,
    ) -> Self {
        Self {
            id,
            question: question.into(),
            answer: answer.into(),
            ef: schedule.ef,
            interval: schedule.interval,
            repetitions: schedule.repetitions,
            next_review: schedule.next_review,
        }
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            ef: self.ef,
            interval: self.interval,
            repetitions: self.repetitions,
            next_review: self.next_review,
        }
    }

    pub fn set_schedule(&mut self, s: Schedule) {
        self.ef = s.ef;
        self.interval = s.interval;
        self.repetitions = s.repetitions;
        self.next_review = s.next_review;
    }

    pub fn is_new(&self) -> bool {
        self.repetitions == 0 && self.interval == 0
    }

    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.next_review <= as_of
    }
}

/// Trims both sides of a question/answer pair and rejects empty text.
pub fn normalize_pair(question: &str, answer: &str) -> Result<(String, String), CoreError> {
    let q = question.trim();
    let a = answer.trim();
    if q.is_empty() {
        return Err(CoreError::Validation("question must not be empty"));
    }
    if a.is_empty() {
        return Err(CoreError::Validation("answer must not be empty"));
    }
    Ok((q.to_string(), a.to_string()))
}

/// Orders cards the way the due queue presents them: longest overdue first.
pub fn sort_due(cards: &mut [Card]) {
    cards.sort_by(|a, b| a.next_review.cmp(&b.next_review).then(a.id.cmp(&b.id)));
}
