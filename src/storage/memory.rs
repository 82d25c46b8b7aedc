//! In-memory diagnosis key store.
//!
//! Check-then-insert happens under one write lock, which gives the same
//! uniqueness guarantee as the `(origin, batch_tag)` constraint in SQL.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::model::DiagnosisKey;
use crate::pipeline::intake::UploadReport;
use crate::storage::models::{BatchRecord, KeyRecord};
use crate::storage::{DiagnosisKeyStore, InsertOutcome};

#[derive(Debug, Clone)]
struct StoredBatch {
    batch: BatchRecord,
    keys: Vec<KeyRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    batches: RwLock<HashMap<(String, String), StoredBatch>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.read().len()
    }

    /// Total number of stored keys across all batches.
    pub fn key_count(&self) -> usize {
        self.batches.read().values().map(|b| b.keys.len()).sum()
    }

    pub fn keys_for(&self, origin: &str, batch_tag: &str) -> Vec<KeyRecord> {
        self.batches
            .read()
            .get(&(origin.to_string(), batch_tag.to_string()))
            .map(|b| b.keys.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.batches.write().clear();
    }
}

impl DiagnosisKeyStore for InMemoryKeyStore {
    fn exists(&self, origin: &str, batch_tag: &str) -> Result<bool, StoreError> {
        Ok(self
            .batches
            .read()
            .contains_key(&(origin.to_string(), batch_tag.to_string())))
    }

    fn recorded_outcome(
        &self,
        origin: &str,
        batch_tag: &str,
    ) -> Result<Option<UploadReport>, StoreError> {
        let batches = self.batches.read();
        match batches.get(&(origin.to_string(), batch_tag.to_string())) {
            Some(stored) => stored
                .batch
                .decode_report()
                .map(Some)
                .map_err(|e| StoreError::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    fn insert_all(
        &self,
        origin: &str,
        batch_tag: &str,
        keys: &[DiagnosisKey],
        report: &UploadReport,
    ) -> Result<InsertOutcome, StoreError> {
        let batch = BatchRecord::from_report(report).map_err(|e| StoreError::Backend(e.to_string()))?;
        let key_records: Vec<KeyRecord> = keys.iter().map(|k| KeyRecord::from_key(k, batch_tag)).collect();

        let mut batches = self.batches.write();
        let id = (origin.to_string(), batch_tag.to_string());

        if let Some(existing) = batches.get(&id) {
            let previous = existing
                .batch
                .decode_report()
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            return Ok(InsertOutcome::Duplicate(previous));
        }

        batches.insert(
            id,
            StoredBatch {
                batch,
                keys: key_records,
            },
        );
        Ok(InsertOutcome::Inserted)
    }
}
