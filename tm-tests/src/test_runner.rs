use std::{
    fs::{self, File},
    io::{BufRead, BufReader},
    sync::{Arc, Once},
};

use tm_common::{
    config::connection_config::ConnectionConfig,
    meta::{db_row::DbRow, record_descriptor::Record},
    utils::log_util::LogUtil,
};
use tm_connector::{
    meta_fetcher::schema_cache::SchemaCache, sql_connection::SqlConnection, sql_table::SqlTable,
};

use crate::test_config_util::TestConfigUtil;

static LOG4RS_INIT: Once = Once::new();

const COUNT_BULK_TYPES_SQL: &str =
    "SELECT COUNT(*) AS CNT FROM sys.types WHERE is_table_type = 1 AND name LIKE '%[_]tvp'";

/// Prepares the tables of one test dir on a live server and hands out `SqlTable`s
/// sharing a single schema cache.
pub struct SqlTableTestRunner {
    pub test_dir: String,
    pub config: ConnectionConfig,
    pub cache: Arc<SchemaCache>,
    conn: SqlConnection,
    clean_sqls: Vec<String>,
}

impl SqlTableTestRunner {
    pub async fn new(relative_test_dir: &str) -> anyhow::Result<Self> {
        let test_dir = TestConfigUtil::get_absolute_path(relative_test_dir)?;
        let config = TestConfigUtil::load_connection_config()?;
        LOG4RS_INIT.call_once(|| {
            if let Err(err) = LogUtil::init_log4rs(&config.runtime) {
                println!("log4rs not initialized: {}", err);
            }
        });

        let mut conn = SqlConnection::mssql(config.clone());
        conn.connect().await?;

        let prepare_sqls = Self::load_sql_file(&format!("{}/prepare.sql", test_dir));
        let clean_sqls = Self::load_sql_file(&format!("{}/clean.sql", test_dir));
        // leftovers of an aborted run
        for sql in clean_sqls.iter().chain(prepare_sqls.iter()) {
            conn.execute(sql, &[]).await?;
        }

        Ok(Self {
            test_dir,
            config,
            cache: Arc::new(SchemaCache::new()),
            conn,
            clean_sqls,
        })
    }

    pub async fn table<T: Record>(&self) -> anyhow::Result<SqlTable<T>> {
        let mut table = SqlTable::<T>::mssql(self.config.clone(), self.cache.clone());
        table.connect().await?;
        Ok(table)
    }

    pub async fn fetch_rows(&mut self, sql: &str) -> anyhow::Result<Vec<DbRow>> {
        self.conn.fetch(sql, &[]).await
    }

    pub async fn execute_sqls(&mut self, sqls: &[&str]) -> anyhow::Result<()> {
        for sql in sqls.iter() {
            self.conn.execute(sql, &[]).await?;
        }
        Ok(())
    }

    /// Transient bulk types currently present in the catalog.
    pub async fn count_bulk_types(&mut self) -> anyhow::Result<i64> {
        let rows = self.fetch_rows(COUNT_BULK_TYPES_SQL).await?;
        match rows.first() {
            Some(row) => row.get_i64("CNT"),
            None => Ok(0),
        }
    }

    pub async fn count_rows(&mut self, tb: &str) -> anyhow::Result<i64> {
        let rows = self
            .fetch_rows(&format!("SELECT COUNT(*) AS CNT FROM {}", tb))
            .await?;
        match rows.first() {
            Some(row) => row.get_i64("CNT"),
            None => Ok(0),
        }
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        for sql in self.clean_sqls.iter() {
            self.conn.execute(sql, &[]).await?;
        }
        self.conn.disconnect().await
    }

    fn load_sql_file(sql_file: &str) -> Vec<String> {
        /* one statement per line, or a multi-line statement fenced by ```:
        -- comment
        DROP TABLE IF EXISTS dbo.Users;
        ```
        CREATE TABLE dbo.Users (
            Id int IDENTITY(1,1) PRIMARY KEY)
        ```
        */
        let mut sqls = Vec::new();
        let mut in_block = false;
        let mut multi_line_sql = String::new();

        for line in Self::load_file(sql_file).iter() {
            let line = line.trim();
            if line.starts_with("```") {
                if in_block && !multi_line_sql.is_empty() {
                    sqls.push(multi_line_sql.trim_end().to_string());
                    multi_line_sql.clear();
                }
                in_block = !in_block;
                continue;
            }
            if line.is_empty() || line.starts_with("--") {
                continue;
            }

            if in_block {
                multi_line_sql.push_str(line);
                multi_line_sql.push('\n');
            } else {
                sqls.push(line.to_string());
            }
        }
        sqls
    }

    fn load_file(file_path: &str) -> Vec<String> {
        if fs::metadata(file_path).is_err() {
            return Vec::new();
        }
        let file = match File::open(file_path) {
            Ok(file) => file,
            Err(_) => return Vec::new(),
        };
        BufReader::new(file).lines().map_while(Result::ok).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_sql_drops_every_bulk_type() {
        let test_dir = TestConfigUtil::get_absolute_path("sql_table/basic_test").unwrap();
        let prepare_sqls = SqlTableTestRunner::load_sql_file(&format!("{}/prepare.sql", test_dir));
        let clean_sqls = SqlTableTestRunner::load_sql_file(&format!("{}/clean.sql", test_dir));

        // only tables with an identity column ever get a bulk type
        let tables: Vec<String> = prepare_sqls
            .iter()
            .filter(|sql| sql.starts_with("CREATE TABLE"))
            .filter(|sql| sql.contains("IDENTITY"))
            .filter_map(|sql| sql["CREATE TABLE".len()..].split('(').next())
            .map(|tb| tb.trim().to_string())
            .collect();
        assert_eq!(tables, vec!["dbo.Users", "dbo.Contacts", "dbo.Documents"]);

        for tb in tables.iter() {
            for op in ["insert", "update", "delete"] {
                let drop = format!("DROP TYPE {}_{}_tvp;", tb, op);
                assert!(
                    clean_sqls.iter().any(|sql| sql.ends_with(&drop)),
                    "clean.sql misses {}",
                    drop
                );
            }
        }
    }
}
