//! Deck export/import records.
//!
//! The wire shape is a JSON list of `{q, a, interval, next_review, repetitions, ef}`
//! objects. Ids are not exported; importing assigns fresh ones.

use crate::{clamp_review_date, Card, CardStore, CoreError, Schedule, EF_DEFAULT, EF_MIN, MAX_INTERVAL_DAYS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub q: String,
    pub a: String,
    #[serde(default)]
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default = "default_ef")]
    pub ef: f64,
}

fn default_ef() -> f64 {
    EF_DEFAULT
}

impl ExportRecord {
    pub fn from_card(card: &Card) -> Self {
        Self {
            q: card.question.clone(),
            a: card.answer.clone(),
            interval: card.interval,
            next_review: Some(card.next_review),
            repetitions: card.repetitions,
            ef: card.ef,
        }
    }

    /// Schedule carried by the record; a missing `next_review` means due at `now`.
    /// Out-of-range values are pulled back into the ranges the scheduler produces.
    pub fn to_schedule(&self, now: DateTime<Utc>) -> Schedule {
        let ef = if self.ef.is_finite() { self.ef.max(EF_MIN) } else { EF_DEFAULT };
        Schedule {
            ef,
            interval: self.interval.min(MAX_INTERVAL_DAYS),
            repetitions: self.repetitions,
            next_review: clamp_review_date(self.next_review.unwrap_or(now)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

pub async fn export_records<S: CardStore + ?Sized>(store: &S) -> Result<Vec<ExportRecord>, CoreError> {
    let cards = store.list_cards().await?;
    Ok(cards.iter().map(ExportRecord::from_card).collect())
}

/// Restores records into `store`. Records that are invalid or whose question
/// is already present are skipped; storage failures abort.
pub async fn import_records<S: CardStore + ?Sized>(
    store: &S,
    records: &[ExportRecord],
    now: DateTime<Utc>,
) -> Result<ImportSummary, CoreError> {
    let mut summary = ImportSummary::default();
    for rec in records {
        match store.restore_card(rec, now).await {
            Ok(Some(_)) => summary.imported += 1,
            Ok(None) => summary.skipped += 1,
            Err(CoreError::Validation(why)) => {
                warn!(reason = why, "skipping invalid record");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    info!(imported = summary.imported, skipped = summary.skipped, "import finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default() {
        let rec: ExportRecord =
            serde_json::from_str(r#"{"q":"capital of France?","a":"Paris","interval":3}"#).unwrap();
        assert_eq!(rec.repetitions, 0);
        assert_eq!(rec.ef, EF_DEFAULT);
        assert!(rec.next_review.is_none());
    }

    #[test]
    fn ef_is_floored_on_restore() {
        let rec = ExportRecord {
            q: "q".into(),
            a: "a".into(),
            interval: 1,
            next_review: None,
            repetitions: 0,
            ef: 0.4,
        };
        assert_eq!(rec.to_schedule(Utc::now()).ef, EF_MIN);
    }

    #[test]
    fn oversized_schedule_is_bounded_on_restore() {
        use chrono::TimeZone;
        let rec = ExportRecord {
            q: "q".into(),
            a: "a".into(),
            interval: u32::MAX,
            next_review: Some(Utc.with_ymd_and_hms(20000, 1, 1, 0, 0, 0).unwrap()),
            repetitions: 40,
            ef: 2.5,
        };
        let s = rec.to_schedule(Utc::now());
        assert_eq!(s.interval, MAX_INTERVAL_DAYS);
        assert_eq!(s.next_review, Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap());
    }
}
