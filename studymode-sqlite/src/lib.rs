use chrono::{Datelike, DateTime, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use studymode_core::{
    apply_quality, normalize_pair, Card, CardId, CardStore, CoreError, ExportRecord, Schedule,
    EF_DEFAULT,
};
use tracing::{debug, info};

const CARD_COLUMNS: &str = "id,question,answer,ef,interval,repetitions,next_review";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| CoreError::storage(format!("sqlite connect: {e}")))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        info!(path = %path.as_ref().display(), "sqlite store opened");
        Ok(store)
    }

    pub async fn open_memory() -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CoreError::storage(format!("sqlite options: {e}")))?;
        // every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|e| CoreError::storage(format!("sqlite connect: {e}")))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS cards (
          id           INTEGER PRIMARY KEY AUTOINCREMENT,
          question     TEXT    NOT NULL,
          answer       TEXT    NOT NULL,
          ef           REAL    DEFAULT 2.5,
          interval     INTEGER DEFAULT 0,
          repetitions  INTEGER DEFAULT 0,
          next_review  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_cards_next_review ON cards (next_review);
        CREATE INDEX IF NOT EXISTS idx_cards_question ON cards (question);
        "#;

        // Execute statements one by one for compatibility.
        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| CoreError::storage(format!("sqlite schema: {e}")))?;
        }
        Ok(())
    }

    /// Opens a transaction that already holds the database write lock, so
    /// the read-modify-write that follows cannot interleave with another
    /// writer. Dropping it without commit rolls back.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::storage(format!("tx: {e}")))?;
        sqlx::query("UPDATE cards SET id = id WHERE 0")
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::storage(format!("tx lock: {e}")))?;
        Ok(tx)
    }
}

async fn commit(tx: Transaction<'static, Sqlite>) -> Result<(), CoreError> {
    tx.commit()
        .await
        .map_err(|e| CoreError::storage(format!("tx commit: {e}")))
}

#[async_trait::async_trait]
impl CardStore for SqliteStore {
    async fn add_card(&self, question: &str, answer: &str, now: DateTime<Utc>) -> Result<Card, CoreError> {
        let (q, a) = normalize_pair(question, answer)?;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| CoreError::storage(format!("acquire: {e}")))?;
        let card = insert_card(&mut conn, q, a, Schedule::initial(now)).await?;
        debug!(id = card.id, "card added");
        Ok(card)
    }

    async fn bulk_add(&self, pairs: &[(String, String)], now: DateTime<Utc>) -> Result<usize, CoreError> {
        let mut tx = self.begin_write().await?;
        let added = bulk_insert(&mut tx, pairs, now).await?;
        commit(tx).await?;
        info!(offered = pairs.len(), added, "bulk insert");
        Ok(added)
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id=?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::storage(format!("read card: {e}")))?;
        let row = row.ok_or(CoreError::NotFound("card"))?;
        row_into_card(row)
    }

    async fn list_cards(&self) -> Result<Vec<Card>, CoreError> {
        let rows = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::storage(format!("list cards: {e}")))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn due_cards(&self, as_of: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<Card>, CoreError> {
        // LIMIT -1 means no limit in SQLite
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE next_review <= ? ORDER BY next_review ASC, id ASC LIMIT ?"
        ))
        .bind(dt_to_str(as_of))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::storage(format!("due cards: {e}")))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn review_card(&self, id: CardId, quality: i32, as_of: DateTime<Utc>) -> Result<Card, CoreError> {
        let mut tx = self.begin_write().await?;
        let card = review_in(&mut tx, id, quality, as_of).await?;
        commit(tx).await?;
        debug!(id, quality, interval = card.interval, "card reviewed");
        Ok(card)
    }

    async fn restore_card(&self, record: &ExportRecord, now: DateTime<Utc>) -> Result<Option<Card>, CoreError> {
        let (q, a) = normalize_pair(&record.q, &record.a)?;
        let mut tx = self.begin_write().await?;
        let card = restore_in(&mut tx, q, a, record.to_schedule(now)).await?;
        commit(tx).await?;
        Ok(card)
    }

    async fn count(&self) -> Result<usize, CoreError> {
        let n: i64 = sqlx::query("SELECT COUNT(*) AS n FROM cards")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::storage(format!("count: {e}")))?
            .try_get("n")
            .map_err(|e| decode_err("count", e))?;
        Ok(n as usize)
    }

    async fn clear(&self) -> Result<(), CoreError> {
        let res = sqlx::query("DELETE FROM cards")
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::storage(format!("clear: {e}")))?;
        info!(removed = res.rows_affected(), "store cleared");
        Ok(())
    }
}

async fn insert_card(conn: &mut SqliteConnection, question: String, answer: String, schedule: Schedule)
    -> Result<Card, CoreError>
{
    let schedule = Schedule {
        next_review: schedule.next_review.trunc_subsecs(6),
        ..schedule
    };
    let res = sqlx::query(
        "INSERT INTO cards (question, answer, ef, interval, repetitions, next_review) VALUES (?,?,?,?,?,?)",
    )
    .bind(&question)
    .bind(&answer)
    .bind(schedule.ef)
    .bind(schedule.interval as i64)
    .bind(schedule.repetitions as i64)
    .bind(dt_to_str(schedule.next_review))
    .execute(&mut *conn)
    .await
    .map_err(|e| CoreError::storage(format!("insert card: {e}")))?;
    Ok(Card::with_schedule(res.last_insert_rowid(), question, answer, schedule))
}

async fn question_exists(conn: &mut SqliteConnection, question: &str) -> Result<bool, CoreError> {
    Ok(sqlx::query("SELECT 1 FROM cards WHERE question=? LIMIT 1")
        .bind(question)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| CoreError::storage(format!("read card: {e}")))?
        .is_some())
}

async fn restore_in(conn: &mut SqliteConnection, question: String, answer: String, schedule: Schedule)
    -> Result<Option<Card>, CoreError>
{
    if question_exists(conn, &question).await? {
        return Ok(None);
    }
    insert_card(conn, question, answer, schedule).await.map(Some)
}

async fn bulk_insert(conn: &mut SqliteConnection, pairs: &[(String, String)], now: DateTime<Utc>)
    -> Result<usize, CoreError>
{
    let rows = sqlx::query("SELECT question FROM cards")
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| CoreError::storage(format!("read questions: {e}")))?;
    let mut seen = HashSet::with_capacity(rows.len());
    for r in &rows {
        seen.insert(r.try_get::<String, _>("question").map_err(|e| decode_err("question", e))?);
    }

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
        insert_card(conn, q, a, Schedule::initial(now)).await?;
        added += 1;
    }
    Ok(added)
}

async fn review_in(conn: &mut SqliteConnection, id: CardId, quality: i32, as_of: DateTime<Utc>)
    -> Result<Card, CoreError>
{
    let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id=?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| CoreError::storage(format!("read card: {e}")))?
        .ok_or(CoreError::NotFound("card"))?;
    let card = apply_quality(row_into_card(row)?, quality, as_of.trunc_subsecs(6))?;

    sqlx::query("UPDATE cards SET ef=?, interval=?, repetitions=?, next_review=? WHERE id=?")
        .bind(card.ef)
        .bind(card.interval as i64)
        .bind(card.repetitions as i64)
        .bind(dt_to_str(card.next_review))
        .bind(card.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| CoreError::storage(format!("update card: {e}")))?;
    Ok(card)
}

// ===== Helpers =====

/// Fixed-width so that text comparison in SQL orders timestamps.
fn dt_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339, offset-less ISO-8601 (read as UTC), and the signed
/// five-digit years chrono writes past 9999.
fn dt_from_str(s: &str) -> Result<DateTime<Utc>, CoreError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    wide_year_from_str(s).ok_or_else(|| CoreError::storage(format!("corrupt next_review {s:?}")))
}

fn wide_year_from_str(s: &str) -> Option<DateTime<Utc>> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (year, tail) = rest.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    // 2000 is a leap year, so Feb 29 survives until the real year is set
    let naive = NaiveDateTime::parse_from_str(&format!("2000-{tail}"), "%Y-%m-%dT%H:%M:%S%.fZ").ok()?;
    naive.with_year(sign * year).map(|n| Utc.from_utc_datetime(&n))
}

fn decode_err(column: &str, e: sqlx::Error) -> CoreError {
    CoreError::storage(format!("corrupt {column}: {e}"))
}

fn count_column(row: &SqliteRow, column: &str) -> Result<u32, CoreError> {
    let v: Option<i64> = row.try_get(column).map_err(|e| decode_err(column, e))?;
    u32::try_from(v.unwrap_or(0)).map_err(|_| CoreError::storage(format!("corrupt {column}: {v:?} out of range")))
}

fn row_into_card(row: SqliteRow) -> Result<Card, CoreError> {
    let next_review: Option<String> = row.try_get("next_review").map_err(|e| decode_err("next_review", e))?;
    let next_review = next_review.ok_or_else(|| CoreError::storage("card without next_review"))?;
    let ef: Option<f64> = row.try_get("ef").map_err(|e| decode_err("ef", e))?;
    Ok(Card {
        id: row.try_get::<i64, _>("id").map_err(|e| decode_err("id", e))?,
        question: row.try_get::<String, _>("question").map_err(|e| decode_err("question", e))?,
        answer: row.try_get::<String, _>("answer").map_err(|e| decode_err("answer", e))?,
        ef: ef.unwrap_or(EF_DEFAULT),
        interval: count_column(&row, "interval")?,
        repetitions: count_column(&row, "repetitions")?,
        next_review: dt_from_str(&next_review)?,
    })
}
