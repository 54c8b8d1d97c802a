//! Schema provider: hybrid memory + on-disk TTL cache with single-flight
//! `information_schema` fetch (spec §4.7).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gateway_db::ColumnMetadata;
use gateway_error::{GatewayError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::identifiers::parse_table_ref;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnMetadata>,
    pub fetched_at: DateTime<Utc>,
}

impl TableSchema {
    pub fn table_ref(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.table)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key_columns(&self) -> Vec<String> {
        self.columns.iter().filter(|c| c.is_primary_key).map(|c| c.name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    schema: TableSchema,
    cached_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Fetches a table's schema from the warehouse on a cache miss. Kept as a
/// trait so tests can stub it without a real connection.
#[async_trait::async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, table_ref: &str) -> Result<TableSchema>;
}

pub struct SchemaCache {
    cache_dir: PathBuf,
    ttl: Duration,
    memory: Mutex<BTreeMap<String, CacheEntry>>,
}

impl SchemaCache {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl,
            memory: Mutex::new(BTreeMap::new()),
        }
    }

    fn file_path(&self, table_ref: &str) -> Result<PathBuf> {
        let parts = parse_table_ref(table_ref)?;
        Ok(self.cache_dir.join(&parts.catalog).join(format!("{}.{}.json", parts.schema, parts.table)))
    }

    pub fn get(&self, table_ref: &str) -> Option<TableSchema> {
        if let Some(entry) = self.memory.lock().get(table_ref) {
            if !entry.is_expired() {
                return Some(entry.schema.clone());
            }
        }

        let path = self.file_path(table_ref).ok()?;
        let schema = Self::load_from_file(&path)?;
        let age = Utc::now().signed_duration_since(schema.fetched_at);
        if age.num_seconds() >= 0 && (age.num_seconds() as u64) < self.ttl.as_secs() {
            self.memory.lock().insert(
                table_ref.to_string(),
                CacheEntry { schema: schema.clone(), cached_at: Instant::now(), ttl: self.ttl },
            );
            Some(schema)
        } else {
            None
        }
    }

    pub fn put(&self, table_ref: &str, schema: TableSchema) {
        self.memory.lock().insert(
            table_ref.to_string(),
            CacheEntry { schema: schema.clone(), cached_at: Instant::now(), ttl: self.ttl },
        );
        if let Ok(path) = self.file_path(table_ref) {
            let _ = Self::save_to_file(&path, &schema);
        }
    }

    pub fn invalidate(&self, table_ref: &str) {
        self.memory.lock().remove(table_ref);
        if let Ok(path) = self.file_path(table_ref) {
            let _ = std::fs::remove_file(path);
        }
    }

    fn load_from_file(path: &Path) -> Option<TableSchema> {
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Atomic write: write to a sibling `.tmp` file, then rename over the
    /// target, so a concurrent reader never observes a partial file.
    fn save_to_file(path: &Path, schema: &TableSchema) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(schema)?)?;
        std::fs::rename(&tmp_path, path)
    }
}

/// Coalesces concurrent fetches of the same table into one upstream call
/// (spec's single-flight requirement).
pub struct SchemaProvider {
    cache: SchemaCache,
    fetcher: Arc<dyn SchemaFetcher>,
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl SchemaProvider {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            cache: SchemaCache::new(cache_dir, ttl),
            fetcher,
            inflight: DashMap::new(),
        }
    }

    pub async fn get_table_schema(&self, table_ref: &str) -> Result<TableSchema> {
        if let Some(schema) = self.cache.get(table_ref) {
            return Ok(schema);
        }

        let lock = self
            .inflight
            .entry(table_ref.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Double-checked: another waiter may have populated the cache
        // while we queued for the inflight lock.
        if let Some(schema) = self.cache.get(table_ref) {
            return Ok(schema);
        }

        let schema = self.fetcher.fetch(table_ref).await.map_err(|e| GatewayError::MetadataAccess {
            user_message: "Could not load the table schema".to_string(),
            internal_message: e.to_string(),
            table_ref: Some(table_ref.to_string()),
        })?;
        self.cache.put(table_ref, schema.clone());
        Ok(schema)
    }

    /// Filters caller-provided columns to those that actually exist on the
    /// table, dropping unknowns (case-insensitive) rather than failing the
    /// whole request.
    pub async fn validate_columns(&self, table_ref: &str, columns: &[String]) -> Result<Vec<String>> {
        let schema = self.get_table_schema(table_ref).await?;
        let known: std::collections::HashSet<String> =
            schema.column_names().into_iter().map(|c| c.to_lowercase()).collect();
        Ok(columns.iter().filter(|c| known.contains(&c.to_lowercase())).cloned().collect())
    }

    pub fn invalidate_table_schema(&self, table_ref: &str) {
        self.cache.invalidate(table_ref);
        self.inflight.remove(table_ref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SchemaFetcher for CountingFetcher {
        async fn fetch(&self, table_ref: &str) -> Result<TableSchema> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let parts = parse_table_ref(table_ref)?;
            Ok(TableSchema {
                catalog: parts.catalog,
                schema: parts.schema,
                table: parts.table,
                columns: vec![],
                fetched_at: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn repeated_get_within_ttl_hits_cache_once() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0) });
        let provider = SchemaProvider::new(dir.path(), Duration::from_secs(3600), fetcher.clone());

        provider.get_table_schema("main.sales.orders").await.unwrap();
        provider.get_table_schema("main.sales.orders").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0) });
        let provider = SchemaProvider::new(dir.path(), Duration::from_secs(3600), fetcher.clone());

        provider.get_table_schema("main.sales.orders").await.unwrap();
        provider.invalidate_table_schema("main.sales.orders");
        provider.get_table_schema("main.sales.orders").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
