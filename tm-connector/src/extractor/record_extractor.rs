use std::sync::Arc;

use tm_common::{
    error::is_fatal,
    meta::{record_descriptor::RecordDescriptor, sql_value::SqlValue},
    utils::error_sink::ErrorSink,
};

use crate::{
    bulk_query_builder::BulkQueryBuilder,
    meta_fetcher::{schema_cache::SchemaCache, schema_resolver::SchemaResolver},
    sql_connection::{SqlConnection, Transaction},
};

use super::row_materializer::RowMaterializer;

/// Read side of `SqlTable`: runs a select and materializes the rows.
/// Failures are reported to the error sink and returned as `Ok(None)`,
/// configuration errors are returned as `Err`.
pub struct RecordExtractor {
    pub cache: Arc<SchemaCache>,
    pub error_sink: ErrorSink,
}

impl RecordExtractor {
    /// Every mapped column of the record's table.
    pub async fn select<T: Default>(
        &self,
        conn: &mut SqlConnection,
        descriptor: &RecordDescriptor<T>,
        tx: Option<&Transaction>,
    ) -> anyhow::Result<Option<Vec<T>>> {
        if !self.check_call(conn, descriptor, tx) {
            return Ok(None);
        }

        let mapping = match SchemaResolver::resolve(conn, &self.cache, descriptor).await {
            Ok(mapping) => mapping,
            Err(err) if is_fatal(&err) => return Err(err),
            Err(err) => {
                self.report(descriptor, &err);
                return Ok(None);
            }
        };

        let bulk = conn.config().bulk.clone();
        let sql = match BulkQueryBuilder::new(&mapping, &bulk).get_select_sql() {
            Ok(sql) => sql,
            Err(err) => {
                self.report(descriptor, &err);
                return Ok(None);
            }
        };
        Ok(self.fetch_records(conn, descriptor, &sql, &[]).await)
    }

    /// Caller supplied sql, result columns are matched to fields by alias then name.
    pub async fn select_query<T: Default>(
        &self,
        conn: &mut SqlConnection,
        descriptor: &RecordDescriptor<T>,
        sql: &str,
        binds: &[SqlValue],
        tx: Option<&Transaction>,
    ) -> anyhow::Result<Option<Vec<T>>> {
        if !self.check_call(conn, descriptor, tx) {
            return Ok(None);
        }
        Ok(self.fetch_records(conn, descriptor, sql, binds).await)
    }

    async fn fetch_records<T: Default>(
        &self,
        conn: &mut SqlConnection,
        descriptor: &RecordDescriptor<T>,
        sql: &str,
        binds: &[SqlValue],
    ) -> Option<Vec<T>> {
        let result = match conn.fetch(sql, binds).await {
            Ok(rows) => RowMaterializer::materialize(descriptor, rows),
            Err(err) => Err(err),
        };
        match result {
            Ok(records) => Some(records),
            Err(err) => {
                self.report(descriptor, &err);
                None
            }
        }
    }

    fn check_call<T>(
        &self,
        conn: &SqlConnection,
        descriptor: &RecordDescriptor<T>,
        tx: Option<&Transaction>,
    ) -> bool {
        if let Err(err) = conn.check_not_busy() {
            self.report(descriptor, &err);
            return false;
        }
        if let Some(tx) = tx {
            if !conn.is_active(tx) {
                (self.error_sink)(&format!(
                    "select {} failed: transaction {} is not active on this connection",
                    descriptor.type_name,
                    tx.id()
                ));
                return false;
            }
        }
        true
    }

    fn report<T>(&self, descriptor: &RecordDescriptor<T>, err: &anyhow::Error) {
        (self.error_sink)(&format!(
            "select {} failed: {:#}",
            descriptor.type_name, err
        ));
    }
}
