use anyhow::bail;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{
    mssql::{Mssql, MssqlArguments, MssqlConnection, MssqlRow},
    query::Query,
    Column, Connection, Executor, Row, TypeInfo, ValueRef,
};
use tm_common::{
    config::connection_config::ConnectionConfig,
    error::Error,
    meta::{db_row::DbRow, sql_value::SqlValue},
};

use super::SqlDriver;

/// `SqlDriver` over a single sqlx `MssqlConnection`.
///
/// Statements without bound values are sent as plain sql batches, so transaction
/// control statements (`BEGIN TRANSACTION`, ...) keep their effect on the session.
/// Statements with bound values go through `sp_executesql` with `@p1..@pN` parameters.
/// The session always starts in the configured catalog.
pub struct MssqlDriver {
    config: ConnectionConfig,
    conn: Option<MssqlConnection>,
}

impl MssqlDriver {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            config: config.clone(),
            conn: None,
        }
    }

    fn conn_mut(&mut self) -> anyhow::Result<&mut MssqlConnection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => bail! {Error::ConnectionClosed("mssql connection is not open".into())},
        }
    }

    fn bind_values<'q>(
        mut query: Query<'q, Mssql, MssqlArguments>,
        binds: &[SqlValue],
    ) -> Query<'q, Mssql, MssqlArguments> {
        for value in binds.iter() {
            query = match value {
                SqlValue::None => query.bind(Option::<String>::None),
                SqlValue::Bool(v) => query.bind(*v),
                // tinyint is unsigned on the server, i8 would wrap
                SqlValue::TinyInt(v) => query.bind(*v as i16),
                SqlValue::SmallInt(v) => query.bind(*v),
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::BigInt(v) => query.bind(*v),
                SqlValue::Real(v) => query.bind(*v),
                SqlValue::Float(v) => query.bind(*v),
                SqlValue::Decimal(v)
                | SqlValue::String(v)
                | SqlValue::DateTime(v)
                | SqlValue::Guid(v) => query.bind(v.clone()),
                // binary values travel as hex text, converted back with CONVERT(varbinary, @p, 2)
                SqlValue::Binary(v) => query.bind(hex::encode_upper(v)),
            };
        }
        query
    }

    fn normalize_row(row: &MssqlRow) -> anyhow::Result<DbRow> {
        let mut db_row = DbRow::default();
        for (i, column) in row.columns().iter().enumerate() {
            db_row.cols.push(column.name().to_string());
            db_row.values.push(Self::decode_col(row, i)?);
        }
        Ok(db_row)
    }

    fn decode_col(row: &MssqlRow, i: usize) -> anyhow::Result<SqlValue> {
        let raw = row.try_get_raw(i).map_err(Error::SqlxError)?;
        if raw.is_null() {
            return Ok(SqlValue::None);
        }
        let type_name = raw.type_info().name().to_string();

        // try_get checks type compatibility first, so the order only matters for speed
        if let Ok(v) = row.try_get::<i64, _>(i) {
            return Ok(SqlValue::BigInt(v));
        }
        if let Ok(v) = row.try_get::<i32, _>(i) {
            return Ok(SqlValue::Int(v));
        }
        if let Ok(v) = row.try_get::<i16, _>(i) {
            return Ok(SqlValue::SmallInt(v));
        }
        if let Ok(v) = row.try_get::<i8, _>(i) {
            return Ok(SqlValue::TinyInt(v as u8));
        }
        if let Ok(v) = row.try_get::<bool, _>(i) {
            return Ok(SqlValue::Bool(v));
        }
        if let Ok(v) = row.try_get::<f64, _>(i) {
            return Ok(SqlValue::Float(v));
        }
        if let Ok(v) = row.try_get::<f32, _>(i) {
            return Ok(SqlValue::Real(v));
        }
        if let Ok(v) = row.try_get::<String, _>(i) {
            return Ok(SqlValue::String(v));
        }

        bail! {Error::UnsupportedType(format!(
            "result column {} has type {} which the driver can not decode, convert it in the query",
            row.columns()[i].name(),
            type_name
        ))}
    }
}

#[async_trait]
impl SqlDriver for MssqlDriver {
    async fn connect(&mut self) -> anyhow::Result<()> {
        if self.conn.is_none() {
            let options = self.config.connect_options()?;
            let conn = MssqlConnection::connect_with(&options)
                .await
                .map_err(Error::SqlxError)?;
            self.conn = Some(conn);
        }
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await.map_err(Error::SqlxError)?;
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<u64> {
        let conn = self.conn_mut()?;
        let result = if binds.is_empty() {
            conn.execute(sql).await
        } else {
            Self::bind_values(sqlx::query(sql), binds)
                .execute(conn)
                .await
        };
        let result = result.map_err(Error::SqlxError)?;
        Ok(result.rows_affected())
    }

    async fn fetch(&mut self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<Vec<DbRow>> {
        let conn = self.conn_mut()?;
        let mut result = Vec::new();
        if binds.is_empty() {
            let mut rows = conn.fetch(sql);
            while let Some(row) = rows.try_next().await.map_err(Error::SqlxError)? {
                result.push(Self::normalize_row(&row)?);
            }
        } else {
            let query = Self::bind_values(sqlx::query(sql), binds);
            let mut rows = query.fetch(conn);
            while let Some(row) = rows.try_next().await.map_err(Error::SqlxError)? {
                result.push(Self::normalize_row(&row)?);
            }
        }
        Ok(result)
    }
}
