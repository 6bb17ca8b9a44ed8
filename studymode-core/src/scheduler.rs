//! SM-2 update rule.
//!
//! Pure: the caller supplies `now`, nothing here reads the clock or touches
//! storage.

use crate::{clamp_review_date, Card, CoreError, Quality, Schedule, EF_MIN, MAX_INTERVAL_DAYS};
use chrono::{DateTime, Duration, Utc};

/// Interval assumed for a card that reaches its third success without ever
/// having been scheduled.
const UNSCHEDULED_PRIOR_INTERVAL: u32 = 6;

fn next_ef(ef: f64, q: Quality) -> f64 {
    let miss = (5 - q.value()) as f64;
    (ef + (0.1 - miss * (0.08 + miss * 0.02))).max(EF_MIN)
}

/// Computes the schedule that follows a review of `quality` at `now`.
///
/// Quality outside `0..=5` is rejected with [`CoreError::InvalidInput`].
/// Intervals stop growing at [`MAX_INTERVAL_DAYS`].
pub fn schedule(current: &Schedule, quality: i32, now: DateTime<Utc>) -> Result<Schedule, CoreError> {
    let q = Quality::new(quality)?;
    let ef = next_ef(current.ef, q);

    let (repetitions, interval) = if q.is_lapse() {
        (0, 1)
    } else {
        let reps = current.repetitions + 1;
        let interval = match reps {
            1 => 1,
            2 => 6,
            _ => {
                let prior = if current.interval == 0 {
                    UNSCHEDULED_PRIOR_INTERVAL
                } else {
                    current.interval
                };
                // half-to-even, so x.5 products land where the reference numbers do
                let next = (prior as f64 * ef).round_ties_even();
                (next.min(MAX_INTERVAL_DAYS as f64) as u32).max(1)
            }
        };
        (reps, interval)
    };

    let next_review = now
        .checked_add_signed(Duration::days(interval as i64))
        .ok_or_else(|| CoreError::InvalidInput(format!("review time {now} is out of range")))?;

    Ok(Schedule {
        ef,
        interval,
        repetitions,
        next_review: clamp_review_date(next_review),
    })
}

/// Runs [`schedule`] on a card and returns it with the new schedule applied.
pub fn apply_quality(mut card: Card, quality: i32, now: DateTime<Utc>) -> Result<Card, CoreError> {
    let next = schedule(&card.schedule(), quality, now)?;
    card.set_schedule(next);
    Ok(card)
}
