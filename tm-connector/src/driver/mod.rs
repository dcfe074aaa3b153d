pub mod mssql_driver;

#[cfg(test)]
pub mod mock_driver;

use async_trait::async_trait;
use tm_common::meta::{db_row::DbRow, sql_value::SqlValue};

/// Raw command execution against one physical connection.
/// Implementations forward sql text and bound values, nothing else.
#[async_trait]
pub trait SqlDriver: Send {
    async fn connect(&mut self) -> anyhow::Result<()>;

    async fn close(&mut self) -> anyhow::Result<()>;

    /// returns the affected row count
    async fn execute(&mut self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<u64>;

    async fn fetch(&mut self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<Vec<DbRow>>;
}
