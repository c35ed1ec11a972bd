//! LabelStore: cached identifier -> label mapping over durable storage
//!
//! # Cache contract
//! - The snapshot is loaded lazily on the first read and then served from
//!   memory.
//! - Every write goes to durable storage first and then drops the snapshot
//!   (never patches it), so the next read is a fresh load.
//! - Readers always receive copies; the snapshot cannot be mutated from
//!   outside.
//!
//! Concurrent writers from other processes are last-write-wins.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeSet;

use super::backend::KeyValueStore;
use super::record::{normalize_color, LabelInput, LabelMap, LabelRecord};
use crate::error::{Error, Result};
use crate::identifier::Identifier;

/// Key under which the whole mapping is persisted as JSON
pub const STORAGE_KEY: &str = "addrlabel.labels";

/// Current export format version
pub const EXPORT_VERSION: u32 = 1;

// =============================================================================
// Types
// =============================================================================

/// Criteria for `LabelStore::filter`. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFilter {
    /// Match records carrying any of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Match records with exactly this color
    #[serde(default)]
    pub color: Option<String>,
}

/// Portable export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelExport {
    pub version: u32,
    pub labels: LabelMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Drop existing labels and store exactly the imported set
    #[default]
    Replace,
    /// Keep existing labels; imported records win on conflict
    Merge,
}

// =============================================================================
// LabelStore
// =============================================================================

pub struct LabelStore<S: KeyValueStore> {
    backend: S,
    cache: RefCell<Option<LabelMap>>,
    clock: Box<dyn Fn() -> i64>,
}

impl<S: KeyValueStore> LabelStore<S> {
    /// Store using wall-clock time for timestamps
    pub fn new(backend: S) -> Self {
        Self::with_clock(backend, || chrono::Utc::now().timestamp_millis())
    }

    /// Store with an injected millisecond clock
    pub fn with_clock(backend: S, clock: impl Fn() -> i64 + 'static) -> Self {
        Self {
            backend,
            cache: RefCell::new(None),
            clock: Box::new(clock),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// True if a snapshot is currently held
    pub fn is_cached(&self) -> bool {
        self.cache.borrow().is_some()
    }

    /// Drop the snapshot; the next read reloads from storage
    pub fn invalidate(&self) {
        self.cache.borrow_mut().take();
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    async fn load(&self) -> Result<LabelMap> {
        if let Some(map) = self.cache.borrow().as_ref() {
            return Ok(map.clone());
        }
        let raw = self.backend.get(STORAGE_KEY).await?;
        let map: LabelMap = match raw {
            None => LabelMap::new(),
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| Error::storage("load", format!("corrupt label data: {e}")))?,
        };
        *self.cache.borrow_mut() = Some(map.clone());
        log::debug!("[LabelStore] loaded {} labels", map.len());
        Ok(map)
    }

    pub async fn get(&self, id: &str) -> Result<Option<LabelRecord>> {
        Ok(self.load().await?.remove(id))
    }

    /// Copy of the full mapping
    pub async fn get_all(&self) -> Result<LabelMap> {
        self.load().await
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    /// Case-insensitive substring search over name, tags and identifier
    pub async fn search(&self, query: &str) -> Result<LabelMap> {
        let query = query.trim().to_lowercase();
        let mut map = self.load().await?;
        if !query.is_empty() {
            map.retain(|id, rec| rec.matches_query(id, &query));
        }
        Ok(map)
    }

    /// Tag filter is any-of; color filter is exact
    pub async fn filter(&self, filter: &LabelFilter) -> Result<LabelMap> {
        let color = match filter.color.as_deref() {
            Some(c) if !c.trim().is_empty() => Some(normalize_color(c)?),
            _ => None,
        };
        let mut map = self.load().await?;
        map.retain(|_, rec| {
            let tag_ok = filter.tags.is_empty() || rec.tags.iter().any(|t| filter.tags.contains(t));
            let color_ok = color.is_none() || rec.color == color;
            tag_ok && color_ok
        });
        Ok(map)
    }

    /// Sorted distinct tags across all records
    pub async fn all_tags(&self) -> Result<Vec<String>> {
        let tags: BTreeSet<String> = self
            .load()
            .await?
            .into_values()
            .flat_map(|r| r.tags)
            .collect();
        Ok(tags.into_iter().collect())
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    async fn persist(&self, map: &LabelMap) -> Result<()> {
        let json = serde_json::to_string(map)
            .map_err(|e| Error::storage("save", format!("serialize failed: {e}")))?;
        let result = self.backend.set(STORAGE_KEY, json).await;
        self.invalidate();
        result
    }

    /// Create or overwrite the label for `id`. `created_at` survives
    /// overwrites; `updated_at` is bumped.
    pub async fn save(&self, id: &str, input: LabelInput) -> Result<LabelRecord> {
        let id = Identifier::parse(id).ok_or_else(|| Error::InvalidIdentifier(id.to_string()))?;
        let mut map = self.load().await?;
        let now = (self.clock)();
        let created_at = map.get(id.as_str()).map(|r| r.created_at).unwrap_or(now);
        let record = input.into_record(created_at, now)?;
        map.insert(id.to_string(), record.clone());
        self.persist(&map).await?;
        log::info!("[LabelStore] saved label '{}' for {}", record.name, id.elided());
        Ok(record)
    }

    /// Remove the label for `id`; true if one existed
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut map = self.load().await?;
        if map.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(&map).await?;
        log::info!("[LabelStore] deleted label for {}", crate::identifier::elide(id));
        Ok(true)
    }

    /// Remove every label
    pub async fn clear(&self) -> Result<()> {
        let result = self.backend.delete(STORAGE_KEY).await.map(|_| ());
        self.invalidate();
        result
    }

    // -------------------------------------------------------------------------
    // Export / import
    // -------------------------------------------------------------------------

    /// Versioned JSON export of every record, timestamps included
    pub async fn export(&self) -> Result<String> {
        let doc = LabelExport {
            version: EXPORT_VERSION,
            labels: self.load().await?,
        };
        serde_json::to_string_pretty(&doc)
            .map_err(|e| Error::storage("export", format!("serialize failed: {e}")))
    }

    /// Import an export document. Records keep their timestamps. Nothing is
    /// written unless every entry validates. Returns the imported count.
    pub async fn import(&self, json: &str, mode: ImportMode) -> Result<usize> {
        let doc: LabelExport = serde_json::from_str(json)
            .map_err(|e| Error::InvalidLabel(format!("unreadable export: {e}")))?;
        if doc.version != EXPORT_VERSION {
            return Err(Error::InvalidLabel(format!(
                "unsupported export version {}",
                doc.version
            )));
        }
        for (id, rec) in &doc.labels {
            if Identifier::parse(id).map(|p| p.as_str() != id).unwrap_or(true) {
                return Err(Error::InvalidIdentifier(id.clone()));
            }
            if rec.name.trim().is_empty() {
                return Err(Error::InvalidLabel(format!("empty name for {id}")));
            }
            if let Some(c) = &rec.color {
                normalize_color(c)?;
            }
        }

        let count = doc.labels.len();
        let map = match mode {
            ImportMode::Replace => doc.labels,
            ImportMode::Merge => {
                let mut existing = self.load().await?;
                existing.extend(doc.labels);
                existing
            }
        };
        self.persist(&map).await?;
        log::info!("[LabelStore] imported {} labels ({:?})", count, mode);
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
