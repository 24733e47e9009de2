//! Integration tests for authority change propagation.

mod common;

use common::{fixture_record, field_text, init_tracing, test_config, MemoryFinder, MemoryStore};
use heading_sync::{
    AuthoritySync, Change, Punctuator, RecentChanges, RecordKind, RecordOutcome, RuleTable, StoreError,
    StoreErrorKind, SyncConfig, SyncError,
};
use std::sync::Arc;
use std::time::Duration;

const AUTHORITY: &str = "100    ‡aAakkula, Immo,‡tcontent";

struct Fixture {
    store: Arc<MemoryStore>,
    finder: Arc<MemoryFinder>,
    sync: AuthoritySync<MemoryStore, MemoryFinder>,
}

fn fixture_with(config: SyncConfig, authority: &[&str]) -> Fixture {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let finder = Arc::new(MemoryFinder::new());
    store.insert("TST10", "90001", fixture_record(authority));
    let recent = Arc::new(RecentChanges::new(config.cooldown()));
    let sync = AuthoritySync::new(Arc::clone(&store), Arc::clone(&finder), Arc::new(config), recent);
    Fixture { store, finder, sync }
}

fn fixture(authority: &[&str]) -> Fixture {
    fixture_with(test_config(), authority)
}

fn change() -> Change {
    Change::new("TST10", "90001")
}

fn link_bib(f: &Fixture, id: &str, lines: &[&str]) {
    f.store.insert("TST01", id, fixture_record(lines));
}

#[tokio::test]
async fn test_unchanged_record_is_not_saved() {
    let f = fixture(&[AUTHORITY]);
    link_bib(&f, "00001", &["100    ‡aAakkula, Immo,‡tcontent"]);
    f.finder.link("TST01", "90001", &["00001"]);

    let report = f.sync.handle_authority_change(&change()).await.unwrap();

    assert_eq!(f.store.save_count(), 0);
    assert_eq!(report.records[0].outcome, RecordOutcome::Unchanged);
}

#[tokio::test]
async fn test_copies_name_to_linked_bib_fields() {
    let f = fixture(&[AUTHORITY]);
    link_bib(
        &f,
        "00001",
        &[
            "100    ‡aAakkula, I,‡tcontent‡0(TST10)90001",
            "700    ‡aAakkula, I,‡tcontent‡0(TST10)90001",
        ],
    );
    f.finder.link("TST01", "90001", &["00001"]);

    f.sync.handle_authority_change(&change()).await.unwrap();

    let saves = f.store.saves();
    assert_eq!(saves.len(), 1);
    let (base, id, record) = &saves[0];
    assert_eq!(base, "TST01");
    assert_eq!(id, "00001");
    assert_eq!(
        field_text(record, "100").unwrap(),
        "100    ‡aAakkula, Immo,‡tcontent.‡0(TST10)90001"
    );
    assert_eq!(
        field_text(record, "700").unwrap(),
        "700    ‡aAakkula, Immo,‡tcontent.‡0(TST10)90001"
    );
}

#[tokio::test]
async fn test_matches_urn_links_padded_and_unpadded() {
    let f = fixture(&[AUTHORITY]);
    link_bib(
        &f,
        "00001",
        &[
            "100    ‡aAakkula, I,‡tcontent‡0http://urn.fi/URN:NBN:fi:au:cn:000090001",
            "700    ‡aAakkula, I,‡tcontent‡0http://urn.fi/URN:NBN:fi:au:cn:90001",
        ],
    );
    f.finder.link("TST01", "90001", &["00001"]);

    f.sync.handle_authority_change(&change()).await.unwrap();

    let (_, _, record) = &f.store.saves()[0];
    assert_eq!(
        field_text(record, "100").unwrap(),
        "100    ‡aAakkula, Immo,‡tcontent.‡0http://urn.fi/URN:NBN:fi:au:cn:000090001"
    );
    assert_eq!(
        field_text(record, "700").unwrap(),
        "700    ‡aAakkula, Immo,‡tcontent.‡0http://urn.fi/URN:NBN:fi:au:cn:90001"
    );
}

#[tokio::test]
async fn test_matches_links_with_trailing_punctuation() {
    let f = fixture(&[AUTHORITY]);
    link_bib(
        &f,
        "00001",
        &[
            "100    ‡aAakkula, I,‡tcontent‡0(TST10)90001,",
            "700    ‡aAakkula, I,‡tcontent‡0(TST10)90001.",
        ],
    );
    f.finder.link("TST01", "90001", &["00001"]);

    f.sync.handle_authority_change(&change()).await.unwrap();

    let (_, _, record) = &f.store.saves()[0];
    assert_eq!(
        field_text(record, "100").unwrap(),
        "100    ‡aAakkula, Immo,‡tcontent.‡0(TST10)90001,"
    );
    assert_eq!(
        field_text(record, "700").unwrap(),
        "700    ‡aAakkula, Immo,‡tcontent.‡0(TST10)90001."
    );
}

#[tokio::test]
async fn test_field_with_links_to_several_bases() {
    let f = fixture(&[AUTHORITY]);
    link_bib(&f, "00001", &["100    ‡aAakkula, I,‡tcontent‡0(FARAWAY)999‡0(TST10)90001"]);
    f.finder.link("TST01", "90001", &["00001"]);

    f.sync.handle_authority_change(&change()).await.unwrap();

    let (_, _, record) = &f.store.saves()[0];
    assert_eq!(
        field_text(record, "100").unwrap(),
        "100    ‡aAakkula, Immo,‡tcontent.‡0(FARAWAY)999‡0(TST10)90001"
    );
}

#[tokio::test]
async fn test_field_with_repeated_link() {
    let f = fixture(&[AUTHORITY]);
    link_bib(&f, "00001", &["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001‡0(TST10)90001"]);
    f.finder.link("TST01", "90001", &["00001"]);

    f.sync.handle_authority_change(&change()).await.unwrap();

    let (_, _, record) = &f.store.saves()[0];
    assert_eq!(
        field_text(record, "100").unwrap(),
        "100    ‡aAakkula, Immo,‡tcontent.‡0(TST10)90001‡0(TST10)90001"
    );
}

#[tokio::test]
async fn test_deleted_authority_is_skipped() {
    let f = fixture(&[AUTHORITY, "STA    ‡aDELETED"]);
    link_bib(&f, "00001", &["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001"]);
    f.finder.link("TST01", "90001", &["00001"]);

    let report = f.sync.handle_authority_change(&change()).await.unwrap();

    assert!(report.authority_deleted);
    assert!(report.records.is_empty());
    assert_eq!(f.store.save_count(), 0);
}

#[tokio::test]
async fn test_deleted_bib_record_is_skipped() {
    let f = fixture(&[AUTHORITY]);
    link_bib(
        &f,
        "00001",
        &["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001", "STA    ‡aDELETED"],
    );
    f.finder.link("TST01", "90001", &["00001"]);

    let report = f.sync.handle_authority_change(&change()).await.unwrap();

    assert_eq!(report.records[0].outcome, RecordOutcome::Deleted);
    assert_eq!(f.store.save_count(), 0);
}

#[tokio::test]
async fn test_updates_multiple_linked_records() {
    let f = fixture(&["100    ‡aAakkula, Immo"]);
    link_bib(&f, "00001", &["100    ‡aAakkula, I,‡etestaaja.‡0(TST10)90001"]);
    link_bib(&f, "00002", &["100    ‡aAakkula, I‡0(TST10)90001"]);
    f.finder.link("TST01", "90001", &["00001", "00002"]);

    f.sync.handle_authority_change(&change()).await.unwrap();

    let saves = f.store.saves();
    assert_eq!(saves.len(), 2);
    assert_eq!(
        field_text(&saves[0].2, "100").unwrap(),
        "100    ‡aAakkula, Immo,‡etestaaja.‡0(TST10)90001"
    );
    assert_eq!(
        field_text(&saves[1].2, "100").unwrap(),
        "100    ‡aAakkula, Immo.‡0(TST10)90001"
    );
}

#[tokio::test]
async fn test_failing_record_does_not_stop_siblings() {
    let f = fixture(&[AUTHORITY]);
    link_bib(
        &f,
        "00001",
        &["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001", "STA    ‡aDELETED"],
    );
    link_bib(&f, "00002", &["100    ‡aAakkula, I,‡Hxxx‡tcontent‡0(TST10)90001"]);
    link_bib(&f, "00003", &["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001"]);
    f.finder.link("TST01", "90001", &["00001", "00002", "00003", "00004"]);

    let report = f.sync.handle_authority_change(&change()).await.unwrap();

    assert_eq!(f.store.save_count(), 1);
    let outcomes: Vec<_> = report.records.iter().map(|r| r.outcome.name()).collect();
    assert_eq!(outcomes, vec!["deleted", "failed", "saved", "failed"]);
    match &report.records[1].outcome {
        RecordOutcome::Failed(message) => assert_eq!(message, "Unknown subfield code H in field 100"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(report.failures().count(), 2);
}

#[tokio::test]
async fn test_system_error_on_linked_record_aborts() {
    let f = fixture(&[AUTHORITY]);
    link_bib(&f, "00002", &["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001"]);
    f.store.fail_load("TST01", "00001", StoreError::new(StoreErrorKind::Connection, "reset"));
    f.finder.link("TST01", "90001", &["00001", "00002"]);

    let err = f.sync.handle_authority_change(&change()).await.unwrap_err();

    assert!(err.is_system());
    assert_eq!(f.store.save_count(), 0);
}

#[tokio::test]
async fn test_authority_with_two_headings_fails_the_change() {
    let f = fixture(&[AUTHORITY, "110    ‡aToinen"]);
    let err = f.sync.handle_authority_change(&change()).await.unwrap_err();
    assert!(matches!(err, SyncError::AmbiguousAuthority { candidates: 2, .. }));
}

#[tokio::test]
async fn test_missing_authority_fails_the_change() {
    let f = fixture(&[AUTHORITY]);
    let err = f
        .sync
        .handle_authority_change(&Change::new("TST10", "404"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Store(ref e) if e.kind == StoreErrorKind::NotFound));
}

#[tokio::test]
async fn test_dry_run_does_not_save() {
    let config = SyncConfig {
        no_operation: true,
        ..test_config()
    };
    let f = fixture_with(config, &[AUTHORITY]);
    link_bib(&f, "00001", &["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001"]);
    f.finder.link("TST01", "90001", &["00001"]);

    let report = f.sync.handle_authority_change(&change()).await.unwrap();

    assert_eq!(report.records[0].outcome, RecordOutcome::DryRun);
    assert_eq!(f.store.save_count(), 0);
}

#[tokio::test]
async fn test_repeated_change_is_suppressed_until_cooldown() {
    let config = SyncConfig {
        recent_change_cooldown_ms: 100,
        ..test_config()
    };
    let f = fixture_with(config, &[AUTHORITY]);
    let original = ["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001"];
    link_bib(&f, "00001", &original);
    f.finder.link("TST01", "90001", &["00001"]);

    f.sync.handle_authority_change(&change()).await.unwrap();
    link_bib(&f, "00001", &original);
    let report = f.sync.handle_authority_change(&change()).await.unwrap();
    assert_eq!(report.records[0].outcome, RecordOutcome::Suppressed);
    assert_eq!(f.store.save_count(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    link_bib(&f, "00001", &original);
    let report = f.sync.handle_authority_change(&change()).await.unwrap();
    assert_eq!(report.records[0].outcome, RecordOutcome::Saved);
    assert_eq!(f.store.save_count(), 2);
}

#[tokio::test]
async fn test_updates_linked_authority_records() {
    let f = fixture(&["100    ‡aAakkula, Immo,‡d1934-1992‡0(TST10)90001"]);
    f.store
        .insert("TST10", "00001", fixture_record(&["500    ‡aAakkula, I.,‡0(TST10)90001"]));
    f.finder.link("TST10", "90001", &["00001"]);

    let report = f.sync.handle_authority_change(&change()).await.unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].base, "TST10");
    let (base, _, record) = &f.store.saves()[0];
    assert_eq!(base, "TST10");
    assert_eq!(
        field_text(record, "500").unwrap(),
        "500    ‡aAakkula, Immo,‡d1934-1992‡0(TST10)90001"
    );
}

#[tokio::test]
async fn test_updates_linked_authority_records_by_urn() {
    let f = fixture(&["100    ‡aAakkula, Immo,‡d1934-1992‡0(TST10)90001"]);
    f.store.insert(
        "TST10",
        "00001",
        fixture_record(&["500    ‡aAakkula, I.,‡0http://urn.fi/URN:NBN:fi:au:cn:000090001"]),
    );
    f.finder.link("TST10", "90001", &["00001"]);

    f.sync.handle_authority_change(&change()).await.unwrap();

    let (_, _, record) = &f.store.saves()[0];
    assert_eq!(
        field_text(record, "500").unwrap(),
        "500    ‡aAakkula, Immo,‡d1934-1992‡0http://urn.fi/URN:NBN:fi:au:cn:000090001"
    );
}

#[tokio::test]
async fn test_linked_authority_tag_follows_heading_kind() {
    let f = fixture(&["110    ‡aAsia joka muuttui henkilöstä yhteisöksi‡0(TST10)90001"]);
    f.store.insert(
        "TST10",
        "00001",
        fixture_record(&["500    ‡aAsia joka on henkilö,‡cnimimerkki‡0(TST10)90001"]),
    );
    f.finder.link("TST10", "90001", &["00001"]);

    f.sync.handle_authority_change(&change()).await.unwrap();

    let (_, _, record) = &f.store.saves()[0];
    assert_eq!(
        field_text(record, "510").unwrap(),
        "510    ‡aAsia joka muuttui henkilöstä yhteisöksi‡0(TST10)90001"
    );
    assert!(record.get_field("500").is_none());
}

#[tokio::test]
async fn test_custom_punctuators_are_used() {
    let Fixture { store, finder, sync } = fixture(&[AUTHORITY]);
    let sync = sync.with_punctuators(
        Punctuator::new(RuleTable::authority(), RecordKind::Authority),
        Punctuator::for_kind(RecordKind::Authority),
    );
    store.insert("TST01", "00001", fixture_record(&["100    ‡aAakkula, I,‡tcontent‡0(TST10)90001"]));
    store.insert("TST01", "00002", fixture_record(&["100    ‡aAakkula, Immo,‡tcontent‡0(TST10)90001"]));
    finder.link("TST01", "90001", &["00001", "00002"]);

    let report = sync.handle_authority_change(&change()).await.unwrap();

    assert_eq!(report.with_outcome(&RecordOutcome::Saved).count(), 1);
    assert_eq!(report.with_outcome(&RecordOutcome::Unchanged).count(), 1);
    let saved = store.get("TST01", "00001").unwrap();
    assert_eq!(
        field_text(&saved, "100").unwrap(),
        "100    ‡aAakkula, Immo,‡tcontent‡0(TST10)90001"
    );
}
