//! Common test helpers and utilities shared across test suite.

#![allow(dead_code)]

use async_trait::async_trait;
use heading_sync::{
    Field, LinkConfig, LinkedRecordFinder, Record, RecordStore, SaveAck, StoreError, StoreErrorKind,
    SyncConfig,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Control fields shared by all fixture records.
pub const FIXTURE_HEADER: &str = "LDR    00533cz  a2200193n  4500
001    115575
005    20160523161656.0
008    011001|n|az|||aab|           | aaa      ";

/// Creates a fixture record with the given data field lines.
pub fn fixture_record(lines: &[&str]) -> Record {
    let mut record = Record::from_text(FIXTURE_HEADER).unwrap();
    for line in lines {
        record.add_field(Field::parse(line).unwrap());
    }
    record
}

/// Text form of the first field with a tag.
pub fn field_text(record: &Record, tag: &str) -> Option<String> {
    record.get_field(tag).map(ToString::to_string)
}

/// Configuration with test bases `TST01` (bibliographic) and `TST10` (authority).
pub fn test_config() -> SyncConfig {
    let pairs = |items: &[(&str, &str)]| {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    };
    let mut config = SyncConfig {
        bib_record_base: "TST01".to_string(),
        agent_record_base: "TST10".to_string(),
        links: LinkConfig {
            base_map: pairs(&[("TST01", "TST01"), ("TST10", "TST10")]),
            urn_base_map: pairs(&[("TST10", "URN:NBN:fi:au:cn:")]),
            urn_resolver_prefix: "http://urn.fi/".to_string(),
        },
        ..SyncConfig::default()
    };
    config.libraries.clear();
    config
        .libraries
        .insert("TST01".to_string(), heading_sync::ChangeHandler::Bibliographic);
    config
        .libraries
        .insert("TST10".to_string(), heading_sync::ChangeHandler::Authority);
    config
}

/// Installs a test log subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// In-memory record store recording every save.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, String), Record>>,
    load_failures: Mutex<HashMap<(String, String), StoreError>>,
    save_failure: Mutex<Option<StoreError>>,
    saves: Mutex<Vec<(String, String, Record)>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record.
    pub fn insert(&self, base: &str, id: &str, record: Record) {
        self.records
            .lock()
            .insert((base.to_string(), id.to_string()), record);
    }

    /// Makes loading one record fail.
    pub fn fail_load(&self, base: &str, id: &str, error: StoreError) {
        self.load_failures
            .lock()
            .insert((base.to_string(), id.to_string()), error);
    }

    /// Makes every save fail.
    pub fn fail_saves(&self, error: StoreError) {
        *self.save_failure.lock() = Some(error);
    }

    /// Saved records in call order.
    pub fn saves(&self) -> Vec<(String, String, Record)> {
        self.saves.lock().clone()
    }

    /// Number of saves.
    pub fn save_count(&self) -> usize {
        self.saves.lock().len()
    }

    /// The current version of a record.
    pub fn get(&self, base: &str, id: &str) -> Option<Record> {
        self.records
            .lock()
            .get(&(base.to_string(), id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load_record(&self, base: &str, id: &str) -> Result<Record, StoreError> {
        let key = (base.to_string(), id.to_string());
        if let Some(error) = self.load_failures.lock().get(&key) {
            return Err(error.clone());
        }
        self.records
            .lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::new(StoreErrorKind::NotFound, format!("{base} / {id}")))
    }

    async fn save_record(&self, base: &str, id: &str, record: &Record) -> Result<SaveAck, StoreError> {
        if let Some(error) = self.save_failure.lock().clone() {
            return Err(error);
        }
        self.saves
            .lock()
            .push((base.to_string(), id.to_string(), record.clone()));
        self.insert(base, id, record.clone());
        Ok(SaveAck::default())
    }
}

/// Linked record lookup backed by a map; unknown keys have no links.
#[derive(Debug, Default)]
pub struct MemoryFinder {
    links: Mutex<HashMap<(String, String), Vec<String>>>,
    failure: Mutex<Option<StoreError>>,
}

impl MemoryFinder {
    /// Creates a finder without links.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the records of `base` linked to `authority_id`.
    pub fn link(&self, base: &str, authority_id: &str, ids: &[&str]) {
        self.links.lock().insert(
            (base.to_string(), authority_id.to_string()),
            ids.iter().map(ToString::to_string).collect(),
        );
    }

    /// Makes every query fail.
    pub fn fail(&self, error: StoreError) {
        *self.failure.lock() = Some(error);
    }
}

#[async_trait]
impl LinkedRecordFinder for MemoryFinder {
    async fn find_linked_records(&self, base: &str, authority_id: &str) -> Result<Vec<String>, StoreError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(self
            .links
            .lock()
            .get(&(base.to_string(), authority_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
