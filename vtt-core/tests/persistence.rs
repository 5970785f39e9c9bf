//! Saving a table mid-session and resuming it from disk.

mod common;

use std::sync::Arc;
use vtt_core::persist::{list_saves, save_path, SAVE_VERSION};
use vtt_core::testing::{assert_hp, TableHarness};
use vtt_core::{
    AttackEntry, Catalog, Cell, Character, EntityRef, PersistError, SavedTable, StatBlock, Target,
    User,
};

fn skirmish() -> TableHarness {
    common::init_tracing();
    let mut harness = TableHarness::new();
    let alchemist = harness.table.add_character(
        Character::new(1, "alice", StatBlock::new("Alchemist", 12))
            .with_attack(AttackEntry::catalog("acid_spray")),
    );
    let slime = harness.monster(1, "Slime", 10);
    harness.place(alchemist, 0, 0).unwrap();
    harness.place(slime, 6, 6).unwrap();

    harness.script_rolls(vec![2, 1]);
    harness
        .attack(alchemist, 0, Target::Entity(slime))
        .unwrap();
    harness
}

#[tokio::test]
async fn test_resume_after_area_attack() {
    let harness = skirmish();
    let slime = EntityRef::monster(1);
    assert_hp(&harness, slime, 7);

    let dir = tempfile::tempdir().unwrap();
    let path = save_path(dir.path(), harness.table.name());
    SavedTable::capture(&harness.table)
        .save_json(&path)
        .await
        .unwrap();

    let loaded = SavedTable::load_json(&path).await.unwrap();
    let mut table = loaded
        .into_tabletop(Arc::new(Catalog::standard()))
        .unwrap();

    assert_eq!(table.board(), harness.table.board());
    assert_eq!(table.roster(), harness.table.roster());
    assert_eq!(table.chat_log().len(), harness.table.chat_log().len());
    assert_eq!(table.roster().stats(slime).map(|s| s.hp), Some(7));
    assert_eq!(table.board().terrain().len(), 9);

    // The restored table keeps enforcing occupancy and control.
    let alice = User::player("alice");
    assert!(table.move_entity(&alice, slime, Cell::new(6, 7)).is_err());
    assert!(table
        .move_entity(&alice, EntityRef::character(1), Cell::new(6, 6))
        .is_err());
    table
        .move_entity(&alice, EntityRef::character(1), Cell::new(1, 1))
        .unwrap();
    assert_eq!(
        table.board().entity_at(Cell::new(1, 1)),
        Some(EntityRef::character(1))
    );
}

#[tokio::test]
async fn test_list_saves_skips_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();

    let harness = skirmish();
    let mut saved = SavedTable::capture(&harness.table);
    saved.saved_at = "100".to_string();
    saved.save_json(dir.path().join("older.json")).await.unwrap();

    saved.config.name = "Second Table".to_string();
    saved.saved_at = "200".to_string();
    saved.save_json(dir.path().join("newer.json")).await.unwrap();

    tokio::fs::write(dir.path().join("broken.json"), "{ not json")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("notes.txt"), "ignored")
        .await
        .unwrap();

    let saves = list_saves(dir.path()).await.unwrap();
    let names: Vec<_> = saves.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Second Table", harness.table.name()]);

    let info = SavedTable::peek(dir.path().join("newer.json")).await.unwrap();
    assert_eq!(info.saved_at, "200");
}

#[tokio::test]
async fn test_future_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.json");

    let mut saved = SavedTable::capture(&skirmish().table);
    saved.version = SAVE_VERSION + 1;
    saved.save_json(&path).await.unwrap();

    match SavedTable::load_json(&path).await {
        Err(PersistError::VersionMismatch { expected, found }) => {
            assert_eq!(expected, SAVE_VERSION);
            assert_eq!(found, SAVE_VERSION + 1);
        }
        other => panic!("expected a version mismatch, got {other:?}"),
    }
    assert!(SavedTable::peek(&path).await.is_err());
}
