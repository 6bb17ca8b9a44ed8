use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use studymode_core::{memory::Cards, Card, CardId, CardStore, CoreError, ExportRecord};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, info, warn};

pub mod paths;

const FILE_VERSION: u32 = 1;

#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    next_id: CardId,
    cards: Vec<Card>,
}

impl FileImage {
    fn of(cards: &Cards) -> Self {
        Self {
            version: FILE_VERSION,
            next_id: cards.next_id,
            cards: cards.by_id.values().cloned().collect(),
        }
    }

    fn into_cards(self) -> Cards {
        Cards {
            next_id: self.next_id,
            by_id: self.cards.into_iter().map(|c| (c.id, c)).collect(),
        }
    }
}

pub struct JsonStore {
    path: PathBuf,
    backups_dir: PathBuf,
    max_backups: usize,
    cards: RwLock<Cards>,
    // held across mutate + save so a failed save can be rolled back
    write_gate: Mutex<()>,
}

impl JsonStore {
    pub async fn open_default() -> Result<Self, CoreError> {
        let (file, backups) = paths::default_store_file();
        Self::open_with(file, backups, 10).await
    }

    pub async fn open_with(path: PathBuf, backups_dir: PathBuf, max_backups: usize) -> Result<Self, CoreError> {
        ensure_parent_dirs(&path)?;
        ensure_dir(&backups_dir)?;
        let cards = load_or_init(&path).await?;
        info!(path = %path.display(), cards = cards.by_id.len(), "json store opened");
        Ok(Self {
            path,
            backups_dir,
            max_backups: max_backups.max(1),
            cards: RwLock::new(cards),
            write_gate: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `f` to a copy of the card table and persists it. The copy
    /// replaces the live table only once the file is written, so readers
    /// never observe a change that fails to save.
    async fn commit<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send,
        F: FnOnce(&mut Cards) -> Result<T, CoreError> + Send,
    {
        let _gate = self.write_gate.lock().await;
        let mut next = self.cards.read().clone();
        let out = f(&mut next)?;
        self.save(FileImage::of(&next)).await?;
        *self.cards.write() = next;
        Ok(out)
    }

    async fn save(&self, image: FileImage) -> Result<(), CoreError> {
        let path = self.path.clone();
        let backups = self.backups_dir.clone();
        let keep = self.max_backups;

        task::spawn_blocking(move || write_with_backup(&path, &backups, keep, &image))
            .await
            .map_err(|e| CoreError::storage(format!("save task: {e}")))?
            .map_err(|e| CoreError::storage(format!("write {}: {e}", self.path.display())))
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(path).map_err(|e| CoreError::storage(format!("create {}: {e}", path.display())))
}

async fn load_or_init(path: &Path) -> Result<Cards, CoreError> {
    let p = path.to_path_buf();
    if path.exists() {
        let img = task::spawn_blocking(move || {
            let buf = fs::read_to_string(&p)?;
            let img = serde_json::from_str::<FileImage>(&buf)?;
            Ok::<FileImage, std::io::Error>(img)
        })
        .await
        .map_err(|e| CoreError::storage(format!("load task: {e}")))?
        .map_err(|e| CoreError::storage(format!("read {}: {e}", path.display())))?;
        if img.version != FILE_VERSION {
            return Err(CoreError::storage(format!("unsupported store version {}", img.version)));
        }
        Ok(img.into_cards())
    } else {
        let cards = Cards::default();
        let json = encode(&FileImage::of(&cards))?;
        write_atomic(path, &json).map_err(|e| CoreError::storage(format!("write {}: {e}", path.display())))?;
        Ok(cards)
    }
}

fn encode(img: &FileImage) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec_pretty(img).map_err(|e| CoreError::storage(format!("encode: {e}")))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Replaces the store file, then drops a timestamped copy into `backups_dir`.
/// Only the store file decides success; a failed backup is logged.
fn write_with_backup(path: &Path, backups_dir: &Path, max_backups: usize, img: &FileImage) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(img)?;
    write_atomic(path, &json)?;

    if let Err(e) = write_backup(backups_dir, max_backups, &json) {
        warn!(dir = %backups_dir.display(), error = %e, "backup not written");
    }
    Ok(())
}

fn write_backup(backups_dir: &Path, max_backups: usize, json: &[u8]) -> Result<(), std::io::Error> {
    fs::create_dir_all(backups_dir)?;
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    write_atomic(&backups_dir.join(format!("cards-{ts}.json")), json)?;
    rotate_backups(backups_dir, max_backups)
}

fn rotate_backups(dir: &Path, keep: usize) -> Result<(), std::io::Error> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    entries.sort_by_key(|e| (e.metadata().and_then(|m| m.modified()).ok(), e.file_name()));
    if entries.len() > keep {
        for e in &entries[0..entries.len() - keep] {
            let _ = fs::remove_file(e.path());
        }
    }
    Ok(())
}

use async_trait::async_trait;

#[async_trait]
impl CardStore for JsonStore {
    async fn add_card(&self, question: &str, answer: &str, now: DateTime<Utc>) -> Result<Card, CoreError> {
        let card = self.commit(|cards| cards.insert_new(question, answer, now)).await?;
        debug!(id = card.id, "card added");
        Ok(card)
    }

    async fn bulk_add(&self, pairs: &[(String, String)], now: DateTime<Utc>) -> Result<usize, CoreError> {
        let added = self.commit(|cards| Ok(cards.insert_unique(pairs, now))).await?;
        info!(offered = pairs.len(), added, "bulk insert");
        Ok(added)
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        let cards = self.cards.read();
        cards.by_id.get(&id).cloned().ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self) -> Result<Vec<Card>, CoreError> {
        Ok(self.cards.read().by_id.values().cloned().collect())
    }

    async fn due_cards(&self, as_of: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<Card>, CoreError> {
        Ok(self.cards.read().due(as_of, limit))
    }

    async fn review_card(&self, id: CardId, quality: i32, as_of: DateTime<Utc>) -> Result<Card, CoreError> {
        let card = self.commit(|cards| cards.review(id, quality, as_of)).await?;
        debug!(id, quality, interval = card.interval, "card reviewed");
        Ok(card)
    }

    async fn restore_card(&self, record: &ExportRecord, now: DateTime<Utc>) -> Result<Option<Card>, CoreError> {
        self.commit(|cards| cards.restore(record, now)).await
    }

    async fn count(&self) -> Result<usize, CoreError> {
        Ok(self.cards.read().by_id.len())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        self.commit(|cards| {
            cards.by_id.clear();
            Ok(())
        })
        .await?;
        info!("store cleared");
        Ok(())
    }
}
