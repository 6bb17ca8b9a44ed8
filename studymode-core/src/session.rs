//! A single sitting of reviews over a snapshot of the due queue.

use crate::{Card, CardStore, CoreError, Quality};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub reviewed: usize,
    pub lapses: usize,
    pub skipped: usize,
}

pub struct ReviewSession {
    store: Arc<dyn CardStore>,
    queue: VecDeque<Card>,
    current: Option<Card>,
    summary: SessionSummary,
}

impl ReviewSession {
    /// Snapshots the cards due at `as_of`. Cards that become due later are
    /// not picked up by this session.
    pub async fn start(
        store: Arc<dyn CardStore>,
        as_of: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Self, CoreError> {
        let queue: VecDeque<Card> = store.due_cards(as_of, limit).await?.into();
        debug!(queued = queue.len(), "review session started");
        Ok(Self {
            store,
            queue,
            current: None,
            summary: SessionSummary::default(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }

    /// The card awaiting an answer, pulling the next one off the queue if needed.
    pub fn current(&mut self) -> Option<&Card> {
        if self.current.is_none() {
            self.current = self.queue.pop_front();
        }
        self.current.as_ref()
    }

    /// Records `quality` for the current card and advances.
    ///
    /// An invalid quality leaves the current card in place.
    pub async fn answer(&mut self, quality: i32, as_of: DateTime<Utc>) -> Result<Card, CoreError> {
        let q = Quality::new(quality)?;
        let Some(id) = self.current().map(|c| c.id) else {
            return Err(CoreError::NotFound("no card left in session"));
        };
        let updated = self.store.review_card(id, quality, as_of).await?;
        self.current = None;
        self.summary.reviewed += 1;
        if q.is_lapse() {
            self.summary.lapses += 1;
        }
        Ok(updated)
    }

    pub fn skip(&mut self) {
        if self.current().is_some() {
            self.current = None;
            self.summary.skipped += 1;
        }
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }
}
