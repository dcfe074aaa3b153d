use anyhow::bail;
use tm_common::{
    error::Error,
    log_debug,
    meta::{bulk_op::BulkOp, record_mapping::MappedColumn, sql_value::SqlValue},
    utils::sql_util::SqlUtil,
};

use crate::sql_connection::SqlConnection;

/// Creates and drops the transient table type that carries the rows of one bulk call.
pub struct BulkTypeManager {}

impl BulkTypeManager {
    /// Not unique per call, concurrent writes of one `op` on one table collide.
    pub fn type_name(tb: &str, op: BulkOp) -> String {
        format!("{}_{}_tvp", tb, op)
    }

    pub fn get_create_sql(
        schema: &str,
        type_name: &str,
        columns: &[&MappedColumn],
    ) -> anyhow::Result<String> {
        if columns.is_empty() {
            bail! {Error::MappingError(format!(
                "bulk type {}.{} would have no columns",
                schema, type_name
            ))}
        }

        let mut col_defs = Vec::new();
        for col in columns.iter() {
            let nullable = if col.column.is_nullable {
                "NULL"
            } else {
                "NOT NULL"
            };
            col_defs.push(format!(
                "{} {} {}",
                SqlUtil::format_identifier(&col.column_name)?,
                col.column.type_declaration(),
                nullable
            ));
        }

        Ok(format!(
            "CREATE TYPE {} AS TABLE ({})",
            SqlUtil::format_qualified(schema, type_name)?,
            col_defs.join(", ")
        ))
    }

    /// Returns the statement with its binds, schema and type name are compared as values.
    pub fn get_drop_sql(schema: &str, type_name: &str) -> anyhow::Result<(String, Vec<SqlValue>)> {
        let sql = format!(
            "IF EXISTS (SELECT 1 FROM sys.types t JOIN sys.schemas s ON s.schema_id = t.schema_id \
             WHERE t.is_table_type = 1 AND s.name = @p1 AND t.name = @p2) DROP TYPE {}",
            SqlUtil::format_qualified(schema, type_name)?
        );
        let binds = vec![
            SqlValue::String(schema.to_string()),
            SqlValue::String(type_name.to_string()),
        ];
        Ok((sql, binds))
    }

    /// Drops any leftover type of the same name, then creates it afresh.
    pub async fn ensure(
        conn: &mut SqlConnection,
        schema: &str,
        type_name: &str,
        columns: &[&MappedColumn],
    ) -> anyhow::Result<()> {
        let create_sql = Self::get_create_sql(schema, type_name, columns)?;
        Self::drop(conn, schema, type_name).await?;
        conn.execute(&create_sql, &[]).await?;
        log_debug!("bulk type created: {}.{}", schema, type_name);
        Ok(())
    }

    /// Safe to repeat, a missing type is not an error.
    pub async fn drop(
        conn: &mut SqlConnection,
        schema: &str,
        type_name: &str,
    ) -> anyhow::Result<()> {
        let (sql, binds) = Self::get_drop_sql(schema, type_name)?;
        conn.execute(&sql, &binds).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock_driver::MockDriver;
    use tm_common::{
        config::connection_config::ConnectionConfig,
        meta::{column_info::ColumnInfo, sql_type::SqlType},
    };

    fn mapped(name: &str, sql_type: SqlType, max_length: i64, nullable: bool) -> MappedColumn {
        let mut column = ColumnInfo::new(name, 1, sql_type);
        column.max_length = max_length;
        column.is_nullable = nullable;
        MappedColumn {
            field_index: 0,
            field_name: name.to_lowercase(),
            column_name: name.to_string(),
            column,
        }
    }

    #[test]
    fn test_type_name() {
        // every caller derives the same name
        assert_eq!(
            BulkTypeManager::type_name("Users", BulkOp::Insert),
            "Users_insert_tvp"
        );
        assert_eq!(
            BulkTypeManager::type_name("Users", BulkOp::Delete),
            "Users_delete_tvp"
        );
    }

    #[test]
    fn test_get_create_sql() {
        let mut price = mapped("Price", SqlType::Decimal, -1, true);
        price.column.precision = 18;
        price.column.scale = 4;
        let cols = vec![
            mapped("Id", SqlType::Int, -1, false),
            mapped("Name", SqlType::NVarChar, 50, false),
            mapped("Notes", SqlType::NVarChar, -1, true),
            mapped("Photo", SqlType::Image, 2147483647, true),
            price,
            mapped("Key", SqlType::Char, 3, true),
        ];
        let refs: Vec<&MappedColumn> = cols.iter().collect();

        let sql = BulkTypeManager::get_create_sql("dbo", "Items_update_tvp", &refs).unwrap();
        assert_eq!(
            sql,
            "CREATE TYPE dbo.Items_update_tvp AS TABLE (Id int NOT NULL, \
             Name nvarchar(50) NOT NULL, Notes nvarchar(max) NULL, Photo image NULL, \
             Price decimal(18,4) NULL, [Key] char(3) NULL)"
        );
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let cols = vec![mapped("Name); DROP TABLE x; --", SqlType::Int, -1, true)];
        let refs: Vec<&MappedColumn> = cols.iter().collect();
        let create = BulkTypeManager::get_create_sql("dbo", "t_insert_tvp", &refs);
        assert!(create.is_err());
        let drop = BulkTypeManager::get_drop_sql("dbo]", "t_insert_tvp");
        assert!(drop.is_err());
    }

    #[tokio::test]
    async fn test_ensure_drops_first() {
        let driver = MockDriver::new();
        let config = ConnectionConfig::with_catalog("mssql://sa@localhost/shop", "shop").unwrap();
        let mut conn = SqlConnection::new(config, Box::new(driver.clone()));
        conn.connect().await.unwrap();

        let cols = vec![mapped("Id", SqlType::Int, -1, false)];
        let refs: Vec<&MappedColumn> = cols.iter().collect();
        BulkTypeManager::ensure(&mut conn, "dbo", "Users_delete_tvp", &refs)
            .await
            .unwrap();

        let statements = driver.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("IF EXISTS"));
        assert!(statements[0].ends_with("DROP TYPE dbo.Users_delete_tvp"));
        assert_eq!(
            statements[1],
            "CREATE TYPE dbo.Users_delete_tvp AS TABLE (Id int NOT NULL)"
        );
        assert_eq!(
            driver.binds()[0],
            vec![
                SqlValue::String("dbo".into()),
                SqlValue::String("Users_delete_tvp".into())
            ]
        );
    }
}
