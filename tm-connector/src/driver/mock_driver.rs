use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;
use tm_common::{
    error::Error,
    meta::{db_row::DbRow, sql_value::SqlValue},
};

use super::SqlDriver;

#[derive(Debug, Clone)]
pub enum MockReply {
    Rows(Vec<DbRow>),
    Affected(u64),
    Fail(String),
    /// never completes, used to drop a call mid-flight
    Hang,
}

#[derive(Default)]
pub struct MockState {
    pub connected: bool,
    pub fail_connect: bool,
    pub statements: Vec<(String, Vec<SqlValue>)>,
    /// the latest matching rule wins
    rules: Vec<MockRule>,
}

struct MockRule {
    pattern: String,
    reply: MockReply,
    /// only the nth (1-based) statement containing the pattern
    nth: Option<usize>,
}

/// Scripted driver: records every statement and answers with the reply of the
/// latest rule whose pattern is a substring of the sql. Unmatched statements
/// affect 0 rows and fetch nothing.
#[derive(Clone, Default)]
pub struct MockDriver {
    pub state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, pattern: &str, reply: MockReply) -> &Self {
        self.add_rule(pattern, reply, None)
    }

    pub fn on_nth(&self, pattern: &str, nth: usize, reply: MockReply) -> &Self {
        self.add_rule(pattern, reply, Some(nth))
    }

    fn add_rule(&self, pattern: &str, reply: MockReply, nth: Option<usize>) -> &Self {
        self.state.lock().unwrap().rules.push(MockRule {
            pattern: pattern.to_string(),
            reply,
            nth,
        });
        self
    }

    pub fn fail_connect(&self) {
        self.state.lock().unwrap().fail_connect = true;
    }

    pub fn statements(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .statements
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn binds(&self) -> Vec<Vec<SqlValue>> {
        self.state
            .lock()
            .unwrap()
            .statements
            .iter()
            .map(|(_, binds)| binds.clone())
            .collect()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.statements()
            .iter()
            .filter(|sql| sql.contains(pattern))
            .count()
    }

    pub fn clear_statements(&self) {
        self.state.lock().unwrap().statements.clear();
    }

    /// Catalog answers for the table used across the connector tests:
    ///
    /// ```text
    /// CREATE TABLE dbo.Users (
    ///     Id int IDENTITY(1,1) PRIMARY KEY,
    ///     FirstName nvarchar(50) NOT NULL,
    ///     LastName nvarchar(50) NOT NULL,
    ///     Age int NULL,
    ///     Email nvarchar(100) NULL,
    ///     Avatar varbinary(max) NULL)
    /// ```
    pub fn with_users_table(self) -> Self {
        let column = |name: &str, ordinal: i32, nullable: &str, data_type: &str, len: Option<i32>| {
            DbRow::from_pairs(vec![
                ("COLUMN_NAME", SqlValue::String(name.into())),
                ("ORDINAL_POSITION", SqlValue::Int(ordinal)),
                ("COLUMN_DEFAULT", SqlValue::None),
                ("IS_NULLABLE", SqlValue::String(nullable.into())),
                ("DATA_TYPE", SqlValue::String(data_type.into())),
                (
                    "CHARACTER_MAXIMUM_LENGTH",
                    len.map_or(SqlValue::None, SqlValue::Int),
                ),
                (
                    "NUMERIC_PRECISION",
                    if data_type == "int" {
                        SqlValue::Int(10)
                    } else {
                        SqlValue::None
                    },
                ),
                (
                    "NUMERIC_SCALE",
                    if data_type == "int" {
                        SqlValue::Int(0)
                    } else {
                        SqlValue::None
                    },
                ),
            ])
        };

        self.on(
            "INFORMATION_SCHEMA.COLUMNS",
            MockReply::Rows(vec![
                column("Id", 1, "NO", "int", None),
                column("FirstName", 2, "NO", "nvarchar", Some(50)),
                column("LastName", 3, "NO", "nvarchar", Some(50)),
                column("Age", 4, "YES", "int", None),
                column("Email", 5, "YES", "nvarchar", Some(100)),
                column("Avatar", 6, "YES", "varbinary", Some(-1)),
            ]),
        )
        .on(
            "sys.identity_columns",
            MockReply::Rows(vec![DbRow::from_pairs(vec![
                ("COLUMN_NAME", SqlValue::String("Id".into())),
                ("SEED_VALUE", SqlValue::BigInt(1)),
                ("INCREMENT_VALUE", SqlValue::BigInt(1)),
            ])]),
        )
        .on(
            "'PRIMARY KEY'",
            MockReply::Rows(vec![DbRow::from_pairs(vec![(
                "COLUMN_NAME",
                SqlValue::String("Id".into()),
            )])]),
        )
        .on("sys.foreign_key_columns", MockReply::Rows(Vec::new()));
        self
    }

    fn reply(&self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<MockReply> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            bail! {Error::ConnectionClosed("mock driver is not connected".into())}
        }
        state.statements.push((sql.to_string(), binds.to_vec()));
        let seen = |pattern: &str| {
            state
                .statements
                .iter()
                .filter(|(s, _)| s.contains(pattern))
                .count()
        };
        let reply = state
            .rules
            .iter()
            .rev()
            .filter(|rule| sql.contains(rule.pattern.as_str()))
            .find(|rule| match rule.nth {
                Some(nth) => seen(&rule.pattern) == nth,
                None => true,
            })
            .map(|rule| rule.reply.clone());
        Ok(reply.unwrap_or(MockReply::Affected(0)))
    }
}

#[async_trait]
impl SqlDriver for MockDriver {
    async fn connect(&mut self) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            bail! {Error::Unexpected("mock connect refused".into())}
        }
        state.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.state.lock().unwrap().connected = false;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<u64> {
        match self.reply(sql, binds)? {
            MockReply::Affected(n) => Ok(n),
            MockReply::Rows(rows) => Ok(rows.len() as u64),
            MockReply::Fail(msg) => bail! {Error::ExecutionError(msg)},
            MockReply::Hang => {
                futures::future::pending::<()>().await;
                Ok(0)
            }
        }
    }

    async fn fetch(&mut self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<Vec<DbRow>> {
        match self.reply(sql, binds)? {
            MockReply::Rows(rows) => Ok(rows),
            MockReply::Affected(_) => Ok(Vec::new()),
            MockReply::Fail(msg) => bail! {Error::ExecutionError(msg)},
            MockReply::Hang => {
                futures::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}
