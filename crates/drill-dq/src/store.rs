//! Versioned in-memory dataset store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         TableStore                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  inner: RwLock<StoreInner>                                   │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ entries: id -> Arc<RwLock<DatasetEntry>>               │  │
//! │  │ order:   [id, id, ...]   (insertion order, last=latest)│  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │  persist_dir: Option<PathBuf>   eviction: dyn EvictionPolicy │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Thread Safety
//!
//! The id map sits behind one `parking_lot::RwLock` and every entry has its
//! own lock, so writers on one dataset never block readers of another.
//! Readers receive cloned snapshots and compute without holding any lock.
//! Cloning a `DataFrame` shares the immutable column buffers, so snapshots
//! are cheap and a stored `raw` table can never be mutated through them.

use crate::error::{QualityError, Result};
use crate::table::Table;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// ENTRIES & METADATA
// ============================================================================

/// One uploaded dataset: the immutable raw table plus the latest cleansed copy.
#[derive(Debug, Clone)]
pub struct DatasetEntry {
    pub id: String,
    pub name: String,
    /// Set when the entry was derived from another dataset by an apply.
    pub parent_id: Option<String>,
    pub raw: Table,
    pub clean: Option<Table>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DatasetEntry {
    /// The cleansed table, or the raw one when nothing has been cleansed yet.
    pub fn current(&self) -> &Table {
        self.clean.as_ref().unwrap_or(&self.raw)
    }

    pub fn meta(&self) -> DatasetMeta {
        let current = self.current();
        DatasetMeta {
            id: self.id.clone(),
            name: self.name.clone(),
            parent_id: self.parent_id.clone(),
            rows: current.height(),
            columns: current.width(),
            has_clean: self.clean.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Serializable summary of a stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub rows: usize,
    pub columns: usize,
    pub has_clean: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What happened when the raw table was written to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistStatus {
    /// No persistence directory configured.
    Disabled,
    Written { path: PathBuf },
    /// Writing failed; the dataset is still stored in memory.
    Failed { reason: String },
}

/// Result of [`TableStore::add`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub id: String,
    pub persistence: PersistStatus,
}

// ============================================================================
// EVICTION
// ============================================================================

/// Decides which datasets to drop after an insert.
///
/// Receives ids in insertion order (oldest first, newest last) and returns
/// the ids to evict. The newest id is never evicted even if returned.
pub trait EvictionPolicy: Send + Sync + Debug {
    fn select_victims(&self, order: &[String]) -> Vec<String>;
}

/// Never evicts anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetainAll;

impl EvictionPolicy for RetainAll {
    fn select_victims(&self, _order: &[String]) -> Vec<String> {
        Vec::new()
    }
}

/// Keeps only the `n` most recently added datasets (at least one).
#[derive(Debug, Clone, Copy)]
pub struct KeepLatest(pub usize);

impl EvictionPolicy for KeepLatest {
    fn select_victims(&self, order: &[String]) -> Vec<String> {
        let keep = self.0.max(1);
        if order.len() <= keep {
            return Vec::new();
        }
        order[..order.len() - keep].to_vec()
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, Arc<RwLock<DatasetEntry>>>,
    order: Vec<String>,
}

/// Insertion-ordered map of dataset id to [`DatasetEntry`].
///
/// Constructed once and shared by handle (`Arc<TableStore>`).
#[derive(Debug)]
pub struct TableStore {
    inner: RwLock<StoreInner>,
    persist_dir: Option<PathBuf>,
    eviction: Box<dyn EvictionPolicy>,
}

static_assertions::assert_impl_all!(TableStore: Send, Sync);

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore {
    /// Memory-only store that never evicts.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            persist_dir: None,
            eviction: Box::new(RetainAll),
        }
    }

    /// Write every added raw table as CSV into `dir`.
    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }

    pub fn with_eviction(mut self, policy: impl EvictionPolicy + 'static) -> Self {
        self.eviction = Box::new(policy);
        self
    }

    pub fn persist_dir(&self) -> Option<&Path> {
        self.persist_dir.as_deref()
    }

    /// Store `table` as a new dataset and make it the latest.
    ///
    /// A persistence failure is reported in the outcome and never fails the add.
    pub fn add(&self, table: Table, name: &str) -> AddOutcome {
        let id = self.insert(table, None, name, None);
        let persistence = self.persist(&id, name);
        AddOutcome { id, persistence }
    }

    /// Store a dataset derived from `parent_id` with its cleansed result.
    ///
    /// Used by a non-dry-run apply; the input dataset is left untouched.
    pub fn add_derived(&self, raw: Table, clean: Table, name: &str, parent_id: &str) -> String {
        self.insert(raw, Some(clean), name, Some(parent_id.to_string()))
    }

    fn insert(
        &self,
        raw: Table,
        clean: Option<Table>,
        name: &str,
        parent_id: Option<String>,
    ) -> String {
        let now = Utc::now();
        let mut inner = self.inner.write();

        let mut id = new_dataset_id();
        while inner.entries.contains_key(&id) {
            id = new_dataset_id();
        }

        let entry = DatasetEntry {
            id: id.clone(),
            name: name.to_string(),
            parent_id,
            raw,
            clean,
            created_at: now,
            updated_at: now,
        };
        inner
            .entries
            .insert(id.clone(), Arc::new(RwLock::new(entry)));
        inner.order.push(id.clone());

        let victims = self.eviction.select_victims(&inner.order);
        for victim in victims.iter().filter(|v| **v != id) {
            inner.entries.remove(victim);
            inner.order.retain(|existing| existing != victim);
            debug!("Evicted dataset {}", victim);
        }

        info!("Stored dataset {} ('{}')", id, name);
        id
    }

    fn persist(&self, id: &str, name: &str) -> PersistStatus {
        let Some(dir) = &self.persist_dir else {
            return PersistStatus::Disabled;
        };

        let raw = match self.get_raw(id) {
            Ok(raw) => raw,
            Err(e) => {
                return PersistStatus::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let path = dir.join(persisted_file_name(id, name));
        let result = std::fs::create_dir_all(dir)
            .map_err(QualityError::from)
            .and_then(|_| raw.write_csv(&path));

        match result {
            Ok(()) => {
                debug!("Persisted raw dataset to {}", path.display());
                PersistStatus::Written { path }
            }
            Err(e) => {
                warn!("Could not persist dataset {}: {}", id, e);
                PersistStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn entry(&self, id: &str) -> Result<Arc<RwLock<DatasetEntry>>> {
        self.inner
            .read()
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| QualityError::NotFound(id.to_string()))
    }

    pub fn get_raw(&self, id: &str) -> Result<Table> {
        Ok(self.entry(id)?.read().raw.clone())
    }

    /// The cleansed table, falling back to raw when none has been set.
    pub fn get_clean(&self, id: &str) -> Result<Table> {
        Ok(self.entry(id)?.read().current().clone())
    }

    /// Replace the cleansed table of `id`.
    pub fn set_clean(&self, id: &str, table: Table) -> Result<()> {
        let entry = self.entry(id)?;
        let mut guard = entry.write();
        guard.clean = Some(table);
        guard.updated_at = Utc::now();
        debug!("Updated clean table for {}", id);
        Ok(())
    }

    /// Id of the most recently added dataset.
    pub fn latest_id(&self) -> Result<String> {
        self.inner
            .read()
            .order
            .last()
            .cloned()
            .ok_or(QualityError::Empty)
    }

    /// `get_clean` of the most recently added dataset.
    pub fn get_latest(&self) -> Result<Table> {
        let id = self.latest_id()?;
        self.get_clean(&id)
    }

    /// Resolve an optional id to `(id, clean table)`, defaulting to latest.
    pub fn resolve(&self, id: Option<&str>) -> Result<(String, Table)> {
        let id = match id {
            Some(id) => id.to_string(),
            None => self.latest_id()?,
        };
        let table = self.get_clean(&id)?;
        Ok((id, table))
    }

    /// Snapshot of an entry.
    pub fn entry_snapshot(&self, id: &str) -> Result<DatasetEntry> {
        Ok(self.entry(id)?.read().clone())
    }

    /// Metadata for every dataset in insertion order.
    pub fn list(&self) -> Vec<DatasetMeta> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .map(|entry| entry.read().meta())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn new_dataset_id() -> String {
    format!("{:032x}", rand::thread_rng().r#gen::<u128>())
}

/// `<id>_<name>.csv` with path-unsafe characters replaced.
fn persisted_file_name(id: &str, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.is_empty() { "dataset".to_string() } else { safe };
    if safe.to_ascii_lowercase().ends_with(".csv") {
        format!("{}_{}", id, safe)
    } else {
        format!("{}_{}.csv", id, safe)
    }
}
