use crate::{
    apply_quality, normalize_pair, sort_due, Card, CardId, CoreError, ExportRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Card table plus the id counter, guarded together.
#[derive(Clone, Debug, Default)]
pub struct Cards {
    pub next_id: CardId,
    pub by_id: BTreeMap<CardId, Card>,
}

impl Cards {
    fn allocate_id(&mut self) -> CardId {
        self.next_id = self.next_id.max(self.by_id.keys().last().copied().unwrap_or(0)) + 1;
        self.next_id
    }

    pub fn contains_question(&self, question: &str) -> bool {
        self.by_id.values().any(|c| c.question == question)
    }

    pub fn insert_new(&mut self, question: &str, answer: &str, now: DateTime<Utc>) -> Result<Card, CoreError> {
        let (q, a) = normalize_pair(question, answer)?;
        let card = Card::new(self.allocate_id(), q, a, now);
        self.by_id.insert(card.id, card.clone());
        Ok(card)
    }

    pub fn insert_unique(&mut self, pairs: &[(String, String)], now: DateTime<Utc>) -> usize {
        let mut seen: HashSet<String> = self.by_id.values().map(|c| c.question.clone()).collect();
        let mut added = 0;
        for (question, answer) in pairs {
            let Ok((q, a)) = normalize_pair(question, answer) else {
                debug!("skipping pair with empty question or answer");
                continue;
            };
            if !seen.insert(q.clone()) {
                debug!(question = %q, "skipping duplicate question");
                continue;
            }
            let card = Card::new(self.allocate_id(), q, a, now);
            self.by_id.insert(card.id, card);
            added += 1;
        }
        added
    }

    pub fn due(&self, as_of: DateTime<Utc>, limit: Option<usize>) -> Vec<Card> {
        let mut v: Vec<Card> = self.by_id.values().filter(|c| c.is_due(as_of)).cloned().collect();
        sort_due(&mut v);
        if let Some(n) = limit {
            v.truncate(n);
        }
        v
    }

    pub fn review(&mut self, id: CardId, quality: i32, as_of: DateTime<Utc>) -> Result<Card, CoreError> {
        let Some(card) = self.by_id.get_mut(&id) else {
            return Err(CoreError::NotFound("card"));
        };
        let updated = apply_quality(card.clone(), quality, as_of)?;
        *card = updated.clone();
        Ok(updated)
    }

    pub fn restore(&mut self, record: &ExportRecord, now: DateTime<Utc>) -> Result<Option<Card>, CoreError> {
        let (q, a) = normalize_pair(&record.q, &record.a)?;
        if self.contains_question(&q) {
            return Ok(None);
        }
        let card = Card::with_schedule(self.allocate_id(), q, a, record.to_schedule(now));
        self.by_id.insert(card.id, card.clone());
        Ok(Some(card))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    cards: RwLock<Cards>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl crate::repo::CardStore for MemoryStore {
    async fn add_card(&self, question: &str, answer: &str, now: DateTime<Utc>) -> Result<Card, CoreError> {
        let card = self.cards.write().insert_new(question, answer, now)?;
        debug!(id = card.id, "card added");
        Ok(card)
    }

    async fn bulk_add(&self, pairs: &[(String, String)], now: DateTime<Utc>) -> Result<usize, CoreError> {
        Ok(self.cards.write().insert_unique(pairs, now))
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        self.cards
            .read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self) -> Result<Vec<Card>, CoreError> {
        Ok(self.cards.read().by_id.values().cloned().collect())
    }

    async fn due_cards(&self, as_of: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<Card>, CoreError> {
        Ok(self.cards.read().due(as_of, limit))
    }

    async fn review_card(&self, id: CardId, quality: i32, as_of: DateTime<Utc>) -> Result<Card, CoreError> {
        self.cards.write().review(id, quality, as_of)
    }

    async fn restore_card(&self, record: &ExportRecord, now: DateTime<Utc>) -> Result<Option<Card>, CoreError> {
        self.cards.write().restore(record, now)
    }

    async fn count(&self) -> Result<usize, CoreError> {
        Ok(self.cards.read().by_id.len())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        self.cards.write().by_id.clear();
        Ok(())
    }
}
