use crate::{Card, CardId, CoreError, ExportRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

#[async_trait]
pub trait CardStore: Send + Sync {
    /// Inserts one card with a fresh schedule due at `now`. Not deduplicated.
    async fn add_card(&self, question: &str, answer: &str, now: DateTime<Utc>)
        -> Result<Card, CoreError>;

    /// Inserts every valid pair whose question is not stored yet, first
    /// occurrence winning within the batch. Returns how many were inserted.
    async fn bulk_add(&self, pairs: &[(String, String)], now: DateTime<Utc>)
        -> Result<usize, CoreError>;

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError>;
    async fn list_cards(&self) -> Result<Vec<Card>, CoreError>;

    /// Cards with `next_review <= as_of`, longest overdue first.
    async fn due_cards(&self, as_of: DateTime<Utc>, limit: Option<usize>)
        -> Result<Vec<Card>, CoreError>;

    /// Applies one review. The read-modify-write is atomic per store.
    async fn review_card(&self, id: CardId, quality: i32, as_of: DateTime<Utc>)
        -> Result<Card, CoreError>;

    /// Inserts a card carrying an exported schedule. Skips (returns `None`)
    /// when the question is already stored.
    async fn restore_card(&self, record: &ExportRecord, now: DateTime<Utc>)
        -> Result<Option<Card>, CoreError>;

    async fn count(&self) -> Result<usize, CoreError>;
    async fn clear(&self) -> Result<(), CoreError>;
}
