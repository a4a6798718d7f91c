//! Past analyses, kept outside the core job flow.
//!
//! [`HistoryStore`] is a port: the orchestrator never touches it, callers
//! decide when a finished job is worth recording. Two stores ship with the
//! crate, [`InMemoryHistoryStore`] and [`JsonFileHistoryStore`].

use crate::client::AnalysisClient;
use crate::error::Result;
use crate::geocode::LocationInfo;
use crate::types::{AnalysisParameters, AnalysisResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One finished analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<LocationInfo>,
    pub parameters: AnalysisParameters,
    pub result: AnalysisResult,
}

impl HistoryRecord {
    /// Record `result`, stamped now with a fresh id.
    pub fn new(
        parameters: AnalysisParameters,
        result: AnalysisResult,
        location: Option<LocationInfo>,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: format!("{}-{:08x}", created_at.timestamp_millis(), fastrand::u32(..)),
            created_at,
            location,
            parameters,
            result,
        }
    }

    /// Server-held map artifact of this analysis, if any.
    pub fn map_file_name(&self) -> Option<&str> {
        self.result.map_file_name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Storage for [`HistoryRecord`]s.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert `record`, replacing any record with the same id.
    async fn save(&self, record: HistoryRecord) -> Result<()>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<HistoryRecord>>;

    /// Remove one record. Returns whether it existed.
    async fn remove(&self, id: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;
}

fn upsert(records: &mut Vec<HistoryRecord>, record: HistoryRecord) {
    records.retain(|r| r.id != record.id);
    records.push(record);
}

fn newest_first(mut records: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

/// Process-local history.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: Mutex<Vec<HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, Vec<HistoryRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save(&self, record: HistoryRecord) -> Result<()> {
        upsert(&mut self.records(), record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>> {
        Ok(newest_first(self.records().clone()))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut records = self.records();
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    async fn clear(&self) -> Result<()> {
        self.records().clear();
        Ok(())
    }
}

/// History kept as a single JSON array file.
///
/// The whole file is rewritten on each mutation. A missing file reads as an
/// empty history.
#[derive(Debug)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<HistoryRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, records: &[HistoryRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "history written");
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn save(&self, record: HistoryRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read().await?;
        upsert(&mut records, record);
        self.write(&records).await
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>> {
        let _guard = self.lock.lock().await;
        Ok(newest_first(self.read().await?))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.read().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write(&records).await?;
        Ok(true)
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Remove record `id` and best-effort delete its map artifact.
///
/// Returns whether the record existed.
pub async fn forget(store: &dyn HistoryStore, client: &AnalysisClient, id: &str) -> Result<bool> {
    let Some(record) = store.list().await?.into_iter().find(|r| r.id == id) else {
        return Ok(false);
    };
    if let Some(name) = record.map_file_name() {
        client.delete_map(name).await;
    }
    store.remove(id).await
}

/// Remove every record, best-effort deleting each map artifact first.
///
/// Returns how many records were removed.
pub async fn forget_all(store: &dyn HistoryStore, client: &AnalysisClient) -> Result<usize> {
    let records = store.list().await?;
    for record in &records {
        if let Some(name) = record.map_file_name() {
            client.delete_map(name).await;
        }
    }
    store.clear().await?;
    tracing::info!(removed = records.len(), "history cleared");
    Ok(records.len())
}
