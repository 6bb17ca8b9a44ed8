use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::sync::Arc;
use studymode_core::{export_records, import_records, CardStore, CoreError};
use studymode_json::JsonStore;
use tempfile::TempDir;

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 10, 7, 30, 0).unwrap() + Duration::days(n)
}

async fn open(dir: &TempDir) -> JsonStore {
    JsonStore::open_with(dir.path().join("cards.json"), dir.path().join("backups"), 3)
        .await
        .unwrap()
}

#[tokio::test]
async fn creates_file_on_open() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    assert!(store.path().exists());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn cards_and_reviews_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let store = open(&dir).await;
        let c = store.add_card("Boiling point of water?", "100 °C", day(0)).await.unwrap();
        store.review_card(c.id, 5, day(0)).await.unwrap();
        c.id
    };

    let store = open(&dir).await;
    let c = store.get_card(id).await.unwrap();
    assert_eq!(c.question, "Boiling point of water?");
    assert_eq!((c.repetitions, c.interval), (1, 1));
    assert_eq!(c.next_review, day(1));

    let next = store.add_card("another", "one", day(0)).await.unwrap();
    assert!(next.id > id);
}

#[tokio::test]
async fn bulk_add_dedups_against_file_contents() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir).await;
        store.add_card("What is 2+2?", "4", day(0)).await.unwrap();
    }
    let store = open(&dir).await;
    let added = store
        .bulk_add(
            &[
                ("What is 2+2?".to_string(), "Four".to_string()),
                ("What is 3+3?".to_string(), "6".to_string()),
                ("What is 3+3?".to_string(), "six".to_string()),
            ],
            day(0),
        )
        .await
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn due_cards_sorted_and_limited() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let b = store.add_card("b", "2", day(-1)).await.unwrap();
    let a = store.add_card("a", "1", day(-5)).await.unwrap();
    store.add_card("c", "3", day(4)).await.unwrap();

    let due = store.due_cards(day(0), None).await.unwrap();
    assert_eq!(due.iter().map(|c| c.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    assert_eq!(store.due_cards(day(0), Some(1)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn backups_are_rotated() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    for i in 0..5 {
        store.add_card(&format!("q{i}"), "a", day(0)).await.unwrap();
    }
    let backups = fs::read_dir(dir.path().join("backups")).unwrap().count();
    assert!((1..=3).contains(&backups), "{backups} backups");
}

#[tokio::test]
async fn corrupt_file_is_a_storage_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("cards.json"), "{ not json").unwrap();
    let res = JsonStore::open_with(dir.path().join("cards.json"), dir.path().join("backups"), 3).await;
    assert!(matches!(res, Err(CoreError::Storage(_))));
}

#[tokio::test]
async fn missing_card_and_bad_quality() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let c = store.add_card("q", "a", day(0)).await.unwrap();
    assert!(matches!(store.review_card(42, 3, day(0)).await, Err(CoreError::NotFound(_))));
    assert!(matches!(store.review_card(c.id, -1, day(0)).await, Err(CoreError::InvalidInput(_))));
}

#[tokio::test]
async fn clear_is_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir).await;
        store.add_card("q", "a", day(0)).await.unwrap();
        store.clear().await.unwrap();
    }
    let store = open(&dir).await;
    assert_eq!(store.count().await.unwrap(), 0);
    // ids are not reused after a clear
    assert_eq!(store.add_card("q", "a", day(0)).await.unwrap().id, 2);
}

#[tokio::test]
async fn round_trip_through_export_records() {
    let dir = TempDir::new().unwrap();
    let src = open(&dir).await;
    let c = src.add_card("Mitochondria?", "Powerhouse of the cell", day(0)).await.unwrap();
    src.review_card(c.id, 4, day(0)).await.unwrap();
    src.review_card(c.id, 4, day(1)).await.unwrap();

    let records = export_records(&src).await.unwrap();

    let other = TempDir::new().unwrap();
    let dst = open(&other).await;
    let summary = import_records(&dst, &records, day(9)).await.unwrap();
    assert_eq!(summary.imported, 1);

    let got = &dst.list_cards().await.unwrap()[0];
    let want = src.get_card(c.id).await.unwrap();
    assert_eq!((&got.question, &got.answer), (&want.question, &want.answer));
    assert_eq!((got.interval, got.repetitions, got.next_review), (want.interval, want.repetitions, want.next_review));
    assert_eq!(got.ef, want.ef);
}

#[tokio::test]
async fn backup_failure_does_not_fail_the_write() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let backups = dir.path().join("backups");
    fs::remove_dir_all(&backups).unwrap();
    fs::write(&backups, "not a directory").unwrap();

    store.add_card("Largest ocean?", "Pacific", day(0)).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    let reopened = JsonStore::open_with(dir.path().join("cards.json"), dir.path().join("backups-2"), 3)
        .await
        .unwrap();
    assert_eq!(reopened.count().await.unwrap(), 1);
}

#[tokio::test]
async fn failed_save_leaves_table_untouched() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let kept = store.add_card("kept", "yes", day(0)).await.unwrap();

    // a directory in place of the store file makes the rename fail
    let file = dir.path().join("cards.json");
    fs::remove_file(&file).unwrap();
    fs::create_dir(&file).unwrap();

    assert!(matches!(store.add_card("lost", "no", day(0)).await, Err(CoreError::Storage(_))));
    assert!(matches!(store.review_card(kept.id, 5, day(0)).await, Err(CoreError::Storage(_))));
    let cards = store.list_cards().await.unwrap();
    assert_eq!(cards, vec![kept]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reviews_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(&dir).await);
    let c = store.add_card("Square root of 81?", "9", day(0)).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.review_card(c.id, 5, day(0)).await })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    assert_eq!(store.get_card(c.id).await.unwrap().repetitions, 8);
    assert_eq!(open(&dir).await.get_card(c.id).await.unwrap().repetitions, 8);
}
