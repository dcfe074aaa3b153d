use std::sync::Arc;

use dashmap::DashMap;
use tm_common::{log_debug, meta::column_info::ColumnInfo};

use crate::sql_connection::SqlConnection;

use super::mssql_meta_fetcher::MssqlMetaFetcher;

/// Memoized table layouts keyed by `catalog.schema.table` (case-insensitive).
///
/// Entries are never refreshed on their own; after a schema change call
/// `invalidate` or `reset`. Only successful lookups are stored, and the first
/// stored entry for a key wins over any concurrent lookup.
#[derive(Default)]
pub struct SchemaCache {
    entries: DashMap<String, Arc<Vec<ColumnInfo>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &self,
        conn: &mut SqlConnection,
        catalog: &str,
        schema: &str,
        tb: &str,
    ) -> anyhow::Result<Arc<Vec<ColumnInfo>>> {
        let key = Self::cache_key(catalog, schema, tb);
        let cached = self.entries.get(&key).map(|entry| entry.value().clone());
        if let Some(cols) = cached {
            return Ok(cols);
        }

        let cols = MssqlMetaFetcher::get_table_info(conn, catalog, schema, tb).await?;
        log_debug!(
            "schema cache miss, loaded {} columns for {}",
            cols.len(),
            key
        );
        let stored = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(cols))
            .value()
            .clone();
        Ok(stored)
    }

    pub fn contains(&self, catalog: &str, schema: &str, tb: &str) -> bool {
        self.entries
            .contains_key(&Self::cache_key(catalog, schema, tb))
    }

    pub fn invalidate(&self, catalog: &str, schema: &str, tb: &str) {
        self.entries.remove(&Self::cache_key(catalog, schema, tb));
    }

    pub fn reset(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cache_key(catalog: &str, schema: &str, tb: &str) -> String {
        format!("{}.{}.{}", catalog, schema, tb).to_lowercase()
    }
}
