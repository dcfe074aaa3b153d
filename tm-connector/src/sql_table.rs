use std::sync::Arc;

use tm_common::{
    config::connection_config::ConnectionConfig,
    meta::{
        bulk_op::BulkOp,
        record_descriptor::{Record, RecordDescriptor},
        record_mapping::RecordMapping,
        sql_value::SqlValue,
    },
    utils::error_sink::{default_error_sink, ErrorSink},
};

use crate::{
    extractor::record_extractor::RecordExtractor,
    meta_fetcher::schema_cache::SchemaCache,
    sinker::bulk_sinker::BulkSinker,
    sql_connection::{SqlConnection, Transaction},
};

/// Bulk reads and writes of one record type against its table.
///
/// Writes return the affected row count, or `-1` when the call failed; reads return
/// `None` on failure. Details of such failures go to the error sink. Configuration
/// errors (for example a table without an identity primary key) are returned as `Err`.
///
/// Every write goes through a transient table type named `{table}_{op}_tvp` in the
/// table's schema. The name is the same for every process, so two writers running the
/// same operation on the same table at the same time share the type and the later one
/// drops it under the earlier one, which then fails with `-1`. Run such writers one at
/// a time.
///
/// ```ignore
/// let config = ConnectionConfig::from_ini("./tvp_mapper.ini")?;
/// let mut users = SqlTable::<User>::mssql(config, Arc::new(SchemaCache::new()));
/// users.connect().await?;
/// let inserted = users.insert(&new_users).await?;
/// let all = users.select().await?;
/// ```
pub struct SqlTable<T: Record> {
    conn: SqlConnection,
    descriptor: RecordDescriptor<T>,
    sinker: BulkSinker,
    extractor: RecordExtractor,
}

impl<T: Record> SqlTable<T> {
    pub fn new(conn: SqlConnection, cache: Arc<SchemaCache>) -> Self {
        let error_sink = default_error_sink();
        Self {
            conn,
            descriptor: T::descriptor(),
            sinker: BulkSinker {
                cache: cache.clone(),
                error_sink: error_sink.clone(),
            },
            extractor: RecordExtractor { cache, error_sink },
        }
    }

    pub fn mssql(config: ConnectionConfig, cache: Arc<SchemaCache>) -> Self {
        Self::new(SqlConnection::mssql(config), cache)
    }

    pub fn with_error_sink(mut self, error_sink: ErrorSink) -> Self {
        self.sinker.error_sink = error_sink.clone();
        self.extractor.error_sink = error_sink;
        self
    }

    pub fn connection(&self) -> &SqlConnection {
        &self.conn
    }

    pub async fn connect(&mut self) -> anyhow::Result<()> {
        self.conn.connect().await
    }

    pub async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.conn.disconnect().await
    }

    pub async fn begin_transaction(&mut self) -> anyhow::Result<Transaction> {
        self.conn.begin_transaction().await
    }

    pub async fn commit(&mut self, tx: &Transaction) -> anyhow::Result<()> {
        self.conn.commit(tx).await
    }

    pub async fn rollback(&mut self, tx: &Transaction) -> anyhow::Result<()> {
        self.conn.rollback(tx).await
    }

    /// The resolved field to column mapping, useful to check a record type up front.
    pub async fn mapping(&mut self) -> anyhow::Result<RecordMapping> {
        self.sinker.resolve(&mut self.conn, &self.descriptor).await
    }

    pub async fn insert(&mut self, records: &[T]) -> anyhow::Result<i64> {
        self.sink(BulkOp::Insert, records, None).await
    }

    pub async fn insert_in_tx(&mut self, records: &[T], tx: &Transaction) -> anyhow::Result<i64> {
        self.sink(BulkOp::Insert, records, Some(tx)).await
    }

    pub async fn update(&mut self, records: &[T]) -> anyhow::Result<i64> {
        self.sink(BulkOp::Update, records, None).await
    }

    pub async fn update_in_tx(&mut self, records: &[T], tx: &Transaction) -> anyhow::Result<i64> {
        self.sink(BulkOp::Update, records, Some(tx)).await
    }

    /// Deletes rows equal to a record on every mapped column, not only on the key.
    pub async fn delete(&mut self, records: &[T]) -> anyhow::Result<i64> {
        self.sink(BulkOp::Delete, records, None).await
    }

    pub async fn delete_in_tx(&mut self, records: &[T], tx: &Transaction) -> anyhow::Result<i64> {
        self.sink(BulkOp::Delete, records, Some(tx)).await
    }

    pub async fn select(&mut self) -> anyhow::Result<Option<Vec<T>>> {
        self.extractor
            .select(&mut self.conn, &self.descriptor, None)
            .await
    }

    pub async fn select_in_tx(&mut self, tx: &Transaction) -> anyhow::Result<Option<Vec<T>>> {
        self.extractor
            .select(&mut self.conn, &self.descriptor, Some(tx))
            .await
    }

    pub async fn select_query(
        &mut self,
        sql: &str,
        binds: &[SqlValue],
    ) -> anyhow::Result<Option<Vec<T>>> {
        self.extractor
            .select_query(&mut self.conn, &self.descriptor, sql, binds, None)
            .await
    }

    pub async fn select_query_in_tx(
        &mut self,
        sql: &str,
        binds: &[SqlValue],
        tx: &Transaction,
    ) -> anyhow::Result<Option<Vec<T>>> {
        self.extractor
            .select_query(&mut self.conn, &self.descriptor, sql, binds, Some(tx))
            .await
    }

    async fn sink(
        &mut self,
        op: BulkOp,
        records: &[T],
        tx: Option<&Transaction>,
    ) -> anyhow::Result<i64> {
        self.sinker
            .sink(&mut self.conn, &self.descriptor, op, records, tx)
            .await
    }
}
