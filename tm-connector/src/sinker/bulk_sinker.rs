use std::sync::Arc;

use anyhow::bail;
use tm_common::{
    error::{is_fatal, Error},
    log_info, log_warn,
    meta::{bulk_op::BulkOp, record_descriptor::RecordDescriptor, record_mapping::RecordMapping},
    utils::error_sink::ErrorSink,
};

use crate::{
    bulk_query_builder::{BulkQueryBuilder, BulkQueryInfo},
    bulk_type_manager::BulkTypeManager,
    meta_fetcher::{schema_cache::SchemaCache, schema_resolver::SchemaResolver},
    sql_connection::{SqlConnection, Transaction},
};

/// Returned by every bulk call that did not complete.
pub const FAILED: i64 = -1;

/// Runs one bulk write as a guarded sequence:
/// resolve, create bulk type, begin (unless supplied), execute, commit or rollback, drop bulk type.
///
/// - the bulk type drop is attempted on every path once creation was attempted,
///   a failed drop turns a success into `FAILED`
/// - an execution failure rolls back the active transaction, owned or supplied
/// - a supplied transaction is never committed here
/// - configuration errors come back as `Err`, every other failure as `Ok(FAILED)`
///   after a message to the error sink
pub struct BulkSinker {
    pub cache: Arc<SchemaCache>,
    pub error_sink: ErrorSink,
}

impl BulkSinker {
    pub async fn sink<T>(
        &self,
        conn: &mut SqlConnection,
        descriptor: &RecordDescriptor<T>,
        op: BulkOp,
        records: &[T],
        tx: Option<&Transaction>,
    ) -> anyhow::Result<i64> {
        if let Err(err) = conn.check_not_busy() {
            self.report(op, descriptor.resolved_table(), &err);
            return Ok(FAILED);
        }
        if records.is_empty() {
            return Ok(0);
        }
        if let Some(tx) = tx {
            if !conn.is_active(tx) {
                self.report_msg(
                    op,
                    descriptor.resolved_table(),
                    &format!("transaction {} is not active on this connection", tx.id()),
                );
                return Ok(FAILED);
            }
        }

        let mapping = match SchemaResolver::resolve(conn, &self.cache, descriptor).await {
            Ok(mapping) => mapping,
            Err(err) if is_fatal(&err) => return Err(err),
            Err(err) => {
                self.report(op, descriptor.resolved_table(), &err);
                return Ok(FAILED);
            }
        };

        // all sql is built before the first statement runs
        let type_name = BulkTypeManager::type_name(&mapping.tb, op);
        let bulk = conn.config().bulk.clone();
        let builder = BulkQueryBuilder::new(&mapping, &bulk);
        let batches = match builder.get_batch_queries(op, &type_name, descriptor, records) {
            Ok(batches) => batches,
            Err(err) => {
                self.report(op, &mapping.tb, &err);
                return Ok(FAILED);
            }
        };

        let columns = mapping.bulk_columns(op);
        let ensured = BulkTypeManager::ensure(conn, &mapping.schema, &type_name, &columns).await;
        let result = match ensured {
            Ok(()) => self.execute_batches(conn, &batches, tx).await,
            Err(err) => Err(err),
        };

        let dropped = BulkTypeManager::drop(conn, &mapping.schema, &type_name).await;
        let affected = match result {
            Ok(affected) => affected,
            Err(err) => {
                self.report(op, &mapping.tb, &err);
                FAILED
            }
        };

        match dropped {
            Ok(()) if affected != FAILED => {
                log_info!(
                    "bulk {} into {}.{} affected {} rows in {} batches",
                    op,
                    mapping.schema,
                    mapping.tb,
                    affected,
                    batches.len()
                );
                Ok(affected)
            }
            Ok(()) => Ok(FAILED),
            Err(err) => {
                log_warn!(
                    "failed to drop bulk type {}.{}: {:#}",
                    mapping.schema,
                    type_name,
                    err
                );
                self.report(op, &mapping.tb, &err);
                Ok(FAILED)
            }
        }
    }

    /// Resolves the mapping without writing anything, exposes configuration errors early.
    pub async fn resolve<T>(
        &self,
        conn: &mut SqlConnection,
        descriptor: &RecordDescriptor<T>,
    ) -> anyhow::Result<RecordMapping> {
        conn.check_not_busy()?;
        SchemaResolver::resolve(conn, &self.cache, descriptor).await
    }

    async fn execute_batches(
        &self,
        conn: &mut SqlConnection,
        batches: &[BulkQueryInfo],
        tx: Option<&Transaction>,
    ) -> anyhow::Result<i64> {
        let owned_tx = match tx {
            Some(_) => None,
            None => Some(conn.begin_transaction().await?),
        };
        let active_tx = match owned_tx.as_ref().or(tx) {
            Some(active_tx) => active_tx,
            None => bail! {Error::Unexpected("no transaction for bulk batches".into())},
        };

        let mut affected = 0;
        for (i, batch) in batches.iter().enumerate() {
            match conn.execute(&batch.sql, &batch.binds).await {
                Ok(n) => affected += n as i64,
                Err(err) => {
                    Self::rollback(conn, active_tx).await;
                    let msg = format!("batch {} of {} failed", i + 1, batches.len());
                    return Err(err.context(Error::ExecutionError(msg)));
                }
            }
        }

        if let Some(owned) = owned_tx.as_ref() {
            if let Err(err) = conn.commit(owned).await {
                Self::rollback(conn, owned).await;
                return Err(err);
            }
        }
        Ok(affected)
    }

    async fn rollback(conn: &mut SqlConnection, tx: &Transaction) {
        if let Err(err) = conn.rollback(tx).await {
            log_warn!("rollback of transaction {} failed: {:#}", tx.id(), err);
        }
    }

    fn report(&self, op: BulkOp, tb: &str, err: &anyhow::Error) {
        self.report_msg(op, tb, &format!("{:#}", err));
    }

    fn report_msg(&self, op: BulkOp, tb: &str, msg: &str) {
        (self.error_sink)(&format!("bulk {} into {} failed: {}", op, tb, msg));
    }
}
