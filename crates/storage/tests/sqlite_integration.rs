use quiz_core::model::{OptionId, Question, QuestionEntry, QuestionId, QuestionType, SessionId, SessionSnapshot};
use storage::codec;
use storage::repository::{SnapshotStore, Storage};
use storage::sqlite::SqliteRepository;

fn build_question(id: &str) -> Question {
    Question::new(
        QuestionId::new(id),
        format!("Prompt {id}"),
        QuestionType::SingleChoice,
        vec!["a".into(), "b".into(), "c".into()],
        &[2],
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_slot_round_trips_snapshot() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_slot_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.read_raw().await.unwrap(), None);

    let snapshot = SessionSnapshot::empty(SessionId::new("s1"))
        .upsert_current_question(build_question("q1"))
        .update_current_entry(|e| e.with_selection(vec![OptionId::new("C")]))
        .unwrap()
        .update_current_entry(QuestionEntry::submitted)
        .unwrap()
        .upsert_current_question(build_question("q2"));

    repo.write_raw(&codec::serialize(&snapshot).unwrap())
        .await
        .unwrap();
    let raw = repo.read_raw().await.unwrap().expect("stored");
    assert_eq!(codec::parse(&raw), Some(snapshot.clone()));
    assert_eq!(codec::parse(&raw).unwrap().accuracy().correct_count, 1);

    let fresh = SessionSnapshot::empty(SessionId::new("s2"));
    repo.write_raw(&codec::serialize(&fresh).unwrap())
        .await
        .unwrap();
    let raw = repo.read_raw().await.unwrap().expect("stored");
    assert_eq!(codec::parse(&raw), Some(fresh));

    repo.clear_raw().await.unwrap();
    assert_eq!(repo.read_raw().await.unwrap(), None);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate_twice?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    repo.put_slot("other.key", "value").await.unwrap();
    assert_eq!(
        repo.get_slot("other.key").await.unwrap().as_deref(),
        Some("value")
    );
    assert_eq!(repo.read_raw().await.unwrap(), None);
}

#[tokio::test]
async fn storage_sqlite_exposes_snapshot_slot() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage_slot?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    storage.snapshots.write_raw("{}").await.unwrap();
    let raw = storage.snapshots.read_raw().await.unwrap().expect("stored");
    assert!(codec::parse(&raw).is_none());
}
