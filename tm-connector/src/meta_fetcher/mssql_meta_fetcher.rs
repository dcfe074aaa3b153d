use std::collections::HashMap;

use anyhow::bail;
use tm_common::{
    error::Error,
    meta::{
        column_info::ColumnInfo, foreign_key::ForeignKey, sql_type::SqlType, sql_value::SqlValue,
    },
};

use crate::sql_connection::SqlConnection;

const COLUMN_NAME: &str = "COLUMN_NAME";
const ORDINAL_POSITION: &str = "ORDINAL_POSITION";
const COLUMN_DEFAULT: &str = "COLUMN_DEFAULT";
const IS_NULLABLE: &str = "IS_NULLABLE";
const DATA_TYPE: &str = "DATA_TYPE";
const CHARACTER_MAXIMUM_LENGTH: &str = "CHARACTER_MAXIMUM_LENGTH";
const NUMERIC_PRECISION: &str = "NUMERIC_PRECISION";
const NUMERIC_SCALE: &str = "NUMERIC_SCALE";
const SEED_VALUE: &str = "SEED_VALUE";
const INCREMENT_VALUE: &str = "INCREMENT_VALUE";

/// Reads the column layout of one table from the catalog views.
pub struct MssqlMetaFetcher {}

impl MssqlMetaFetcher {
    /// Any failing step aborts the whole call, nothing partial is returned.
    pub async fn get_table_info(
        conn: &mut SqlConnection,
        catalog: &str,
        schema: &str,
        tb: &str,
    ) -> anyhow::Result<Vec<ColumnInfo>> {
        let mut cols = Self::parse_cols(conn, catalog, schema, tb).await?;
        Self::parse_identity(conn, schema, tb, &mut cols).await?;
        Self::parse_primary_keys(conn, catalog, schema, tb, &mut cols).await?;
        Self::parse_foreign_keys(conn, schema, tb, &mut cols).await?;
        Ok(cols)
    }

    async fn parse_cols(
        conn: &mut SqlConnection,
        catalog: &str,
        schema: &str,
        tb: &str,
    ) -> anyhow::Result<Vec<ColumnInfo>> {
        let sql = "SELECT COLUMN_NAME, ORDINAL_POSITION, COLUMN_DEFAULT, IS_NULLABLE, DATA_TYPE,
                CHARACTER_MAXIMUM_LENGTH,
                CAST(NUMERIC_PRECISION AS INT) AS NUMERIC_PRECISION,
                NUMERIC_SCALE
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_CATALOG = @p1 AND TABLE_SCHEMA = @p2 AND TABLE_NAME = @p3
            ORDER BY ORDINAL_POSITION";
        let rows = conn
            .fetch(sql, &Self::string_binds(&[catalog, schema, tb]))
            .await?;

        let mut cols = Vec::new();
        for row in rows.iter() {
            let name = row.get_string(COLUMN_NAME)?;
            let data_type = row.get_string(DATA_TYPE)?;
            let sql_type = match SqlType::from_type_name(&data_type) {
                Ok(t) => t,
                Err(_) => bail! {Error::UnsupportedType(format!(
                    "column {}.{}.{} has unsupported type: {}",
                    schema, tb, name, data_type
                ))},
            };

            let mut col = ColumnInfo::new(&name, row.get_i64(ORDINAL_POSITION)? as i32, sql_type);
            col.default_value = row.get_optional_string(COLUMN_DEFAULT)?;
            col.is_nullable = row.get_string(IS_NULLABLE)?.eq_ignore_ascii_case("YES");
            col.max_length = row
                .get_optional_i64(CHARACTER_MAXIMUM_LENGTH)?
                .unwrap_or(-1);
            col.precision = Self::get_u8(row.get_optional_i64(NUMERIC_PRECISION)?);
            col.scale = Self::get_u8(row.get_optional_i64(NUMERIC_SCALE)?);
            cols.push(col);
        }

        if cols.is_empty() {
            bail! {Error::MetadataError(format!(
                "failed to get table metadata for: {}.{}.{}, table does not exist",
                catalog, schema, tb
            ))}
        }
        Ok(cols)
    }

    async fn parse_identity(
        conn: &mut SqlConnection,
        schema: &str,
        tb: &str,
        cols: &mut [ColumnInfo],
    ) -> anyhow::Result<()> {
        // seed and increment are sql_variant
        let sql = "SELECT ic.name AS COLUMN_NAME,
                CAST(ic.seed_value AS BIGINT) AS SEED_VALUE,
                CAST(ic.increment_value AS BIGINT) AS INCREMENT_VALUE
            FROM sys.identity_columns ic
            JOIN sys.tables t ON t.object_id = ic.object_id
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            WHERE s.name = @p1 AND t.name = @p2";
        let rows = conn.fetch(sql, &Self::string_binds(&[schema, tb])).await?;

        for row in rows.iter() {
            let name = row.get_string(COLUMN_NAME)?;
            if let Some(col) = Self::find_col(cols, &name) {
                col.is_auto_increment = true;
                col.auto_increment_seed = row.get_optional_i64(SEED_VALUE)?.unwrap_or(1);
                col.auto_increment_step = row.get_optional_i64(INCREMENT_VALUE)?.unwrap_or(1);
            }
        }
        Ok(())
    }

    async fn parse_primary_keys(
        conn: &mut SqlConnection,
        catalog: &str,
        schema: &str,
        tb: &str,
        cols: &mut [ColumnInfo],
    ) -> anyhow::Result<()> {
        let sql = "SELECT kcu.COLUMN_NAME
            FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
            JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
                ON kcu.CONSTRAINT_CATALOG = tc.CONSTRAINT_CATALOG
                AND kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
                AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
            WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
                AND tc.TABLE_CATALOG = @p1 AND tc.TABLE_SCHEMA = @p2 AND tc.TABLE_NAME = @p3
            ORDER BY kcu.ORDINAL_POSITION";
        let rows = conn
            .fetch(sql, &Self::string_binds(&[catalog, schema, tb]))
            .await?;

        for row in rows.iter() {
            let name = row.get_string(COLUMN_NAME)?;
            if let Some(col) = Self::find_col(cols, &name) {
                col.is_primary_key = true;
            }
        }
        Ok(())
    }

    /// Keys referencing this table (it is the parent) and keys declared on it (it is the child).
    async fn parse_foreign_keys(
        conn: &mut SqlConnection,
        schema: &str,
        tb: &str,
        cols: &mut [ColumnInfo],
    ) -> anyhow::Result<()> {
        let sql = "SELECT fk.name AS FK_NAME,
                ps.name AS PARENT_SCHEMA, pt.name AS PARENT_TABLE, pc.name AS PARENT_COLUMN,
                cs.name AS CHILD_SCHEMA, ct.name AS CHILD_TABLE, cc.name AS CHILD_COLUMN
            FROM sys.foreign_key_columns fkc
            JOIN sys.foreign_keys fk ON fk.object_id = fkc.constraint_object_id
            JOIN sys.tables pt ON pt.object_id = fkc.referenced_object_id
            JOIN sys.schemas ps ON ps.schema_id = pt.schema_id
            JOIN sys.columns pc ON pc.object_id = fkc.referenced_object_id
                AND pc.column_id = fkc.referenced_column_id
            JOIN sys.tables ct ON ct.object_id = fkc.parent_object_id
            JOIN sys.schemas cs ON cs.schema_id = ct.schema_id
            JOIN sys.columns cc ON cc.object_id = fkc.parent_object_id
                AND cc.column_id = fkc.parent_column_id
            WHERE (ps.name = @p1 AND pt.name = @p2) OR (cs.name = @p1 AND ct.name = @p2)";
        let rows = conn.fetch(sql, &Self::string_binds(&[schema, tb])).await?;

        let mut keys_by_col: HashMap<String, Vec<ForeignKey>> = HashMap::new();
        for row in rows.iter() {
            let key = ForeignKey {
                name: row.get_string("FK_NAME")?,
                parent_schema: row.get_string("PARENT_SCHEMA")?,
                parent_tb: row.get_string("PARENT_TABLE")?,
                parent_col: row.get_string("PARENT_COLUMN")?,
                child_schema: row.get_string("CHILD_SCHEMA")?,
                child_tb: row.get_string("CHILD_TABLE")?,
                child_col: row.get_string("CHILD_COLUMN")?,
            };
            // a self-referencing key touches two columns of this table
            if key.is_parent(schema, tb) {
                keys_by_col
                    .entry(key.parent_col.to_lowercase())
                    .or_default()
                    .push(key.clone());
            }
            if key.is_child(schema, tb) {
                keys_by_col
                    .entry(key.child_col.to_lowercase())
                    .or_default()
                    .push(key);
            }
        }

        for col in cols.iter_mut() {
            if let Some(keys) = keys_by_col.remove(&col.name.to_lowercase()) {
                col.foreign_keys = keys;
            }
        }
        Ok(())
    }

    fn find_col<'a>(cols: &'a mut [ColumnInfo], name: &str) -> Option<&'a mut ColumnInfo> {
        cols.iter_mut().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn get_u8(value: Option<i64>) -> u8 {
        value.map_or(0, |v| v.clamp(0, u8::MAX as i64) as u8)
    }

    fn string_binds(values: &[&str]) -> Vec<SqlValue> {
        values.iter().map(|v| SqlValue::String(v.to_string())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock_driver::{MockDriver, MockReply};
    use tm_common::{config::connection_config::ConnectionConfig, meta::db_row::DbRow};

    async fn open_conn(driver: &MockDriver) -> SqlConnection {
        let config = ConnectionConfig::with_catalog("mssql://sa@localhost/shop", "shop").unwrap();
        let mut conn = SqlConnection::new(config, Box::new(driver.clone()));
        conn.connect().await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_get_table_info() {
        let driver = MockDriver::new().with_users_table();
        let mut conn = open_conn(&driver).await;

        let cols = MssqlMetaFetcher::get_table_info(&mut conn, "shop", "dbo", "Users")
            .await
            .unwrap();
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Id", "FirstName", "LastName", "Age", "Email", "Avatar"]
        );

        let id = &cols[0];
        assert!(id.is_identity_key());
        assert_eq!(id.auto_increment_seed, 1);
        assert_eq!(id.auto_increment_step, 1);
        assert!(!id.is_nullable);

        assert_eq!(cols[1].sql_type, SqlType::NVarChar);
        assert_eq!(cols[1].max_length, 50);
        assert!(!cols[1].is_primary_key);
        assert_eq!(cols[3].precision, 10);
        assert!(cols[3].is_nullable);
        assert_eq!(cols[5].max_length, -1);

        // every catalog filter is bound, never inlined
        let binds = driver.binds();
        assert_eq!(
            binds[0],
            vec![
                SqlValue::String("shop".into()),
                SqlValue::String("dbo".into()),
                SqlValue::String("Users".into()),
            ]
        );
        let statements = driver.statements();
        assert!(statements.iter().all(|sql| !sql.contains("'Users'")));
    }

    #[tokio::test]
    async fn test_missing_table() {
        let driver = MockDriver::new().with_users_table();
        driver.on("INFORMATION_SCHEMA.COLUMNS", MockReply::Rows(Vec::new()));
        let mut conn = open_conn(&driver).await;

        let err = MssqlMetaFetcher::get_table_info(&mut conn, "shop", "dbo", "Nope")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MetadataError(_))
        ));
        // aborted before the follow-up queries
        assert_eq!(driver.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_type() {
        let driver = MockDriver::new().with_users_table();
        driver.on(
            "INFORMATION_SCHEMA.COLUMNS",
            MockReply::Rows(vec![DbRow::from_pairs(vec![
                ("COLUMN_NAME", SqlValue::String("Shape".into())),
                ("ORDINAL_POSITION", SqlValue::Int(1)),
                ("COLUMN_DEFAULT", SqlValue::None),
                ("IS_NULLABLE", SqlValue::String("YES".into())),
                ("DATA_TYPE", SqlValue::String("geography".into())),
                ("CHARACTER_MAXIMUM_LENGTH", SqlValue::None),
                ("NUMERIC_PRECISION", SqlValue::None),
                ("NUMERIC_SCALE", SqlValue::None),
            ])]),
        );
        let mut conn = open_conn(&driver).await;

        let err = MssqlMetaFetcher::get_table_info(&mut conn, "shop", "dbo", "Places")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn test_step_failure_aborts() {
        let driver = MockDriver::new().with_users_table();
        driver.on("'PRIMARY KEY'", MockReply::Fail("permission denied".into()));
        let mut conn = open_conn(&driver).await;

        assert!(
            MssqlMetaFetcher::get_table_info(&mut conn, "shop", "dbo", "Users")
                .await
                .is_err()
        );
        assert_eq!(driver.count("sys.foreign_key_columns"), 0);
    }

    #[tokio::test]
    async fn test_foreign_keys_on_both_sides() {
        let driver = MockDriver::new().with_users_table();
        let fk_row = |parent_tb: &str, parent_col: &str, child_tb: &str, child_col: &str| {
            DbRow::from_pairs(vec![
                ("FK_NAME", SqlValue::String(format!("FK_{}_{}", child_tb, parent_tb))),
                ("PARENT_SCHEMA", SqlValue::String("dbo".into())),
                ("PARENT_TABLE", SqlValue::String(parent_tb.into())),
                ("PARENT_COLUMN", SqlValue::String(parent_col.into())),
                ("CHILD_SCHEMA", SqlValue::String("dbo".into())),
                ("CHILD_TABLE", SqlValue::String(child_tb.into())),
                ("CHILD_COLUMN", SqlValue::String(child_col.into())),
            ])
        };
        driver.on(
            "sys.foreign_key_columns",
            MockReply::Rows(vec![
                // Orders.UserId -> Users.Id
                fk_row("Users", "Id", "Orders", "UserId"),
                // Users.Email -> Mailboxes.Address
                fk_row("Mailboxes", "Address", "Users", "email"),
            ]),
        );
        let mut conn = open_conn(&driver).await;

        let cols = MssqlMetaFetcher::get_table_info(&mut conn, "shop", "dbo", "Users")
            .await
            .unwrap();
        assert_eq!(cols[0].foreign_keys.len(), 1);
        assert_eq!(cols[0].foreign_keys[0].child_tb, "Orders");
        assert_eq!(cols[4].foreign_keys.len(), 1);
        assert_eq!(cols[4].foreign_keys[0].parent_tb, "Mailboxes");
        assert!(cols[1].foreign_keys.is_empty());
    }
}
