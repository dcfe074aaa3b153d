use anyhow::bail;
use strum::Display;
use tm_common::{
    config::connection_config::ConnectionConfig,
    error::Error,
    log_debug, log_sql,
    meta::{db_row::DbRow, sql_value::SqlValue},
};

use crate::driver::{mssql_driver::MssqlDriver, SqlDriver};

const BEGIN_TRANSACTION: &str = "BEGIN TRANSACTION";
const COMMIT_TRANSACTION: &str = "COMMIT TRANSACTION";
const ROLLBACK_TRANSACTION: &str = "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    /// created, never opened
    Idle,
    Connecting,
    Open,
    Executing,
    Fetching,
    Closed,
}

impl ConnectionState {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Connecting | Self::Executing | Self::Fetching)
    }
}

/// Handle of the transaction currently open on a `SqlConnection`.
/// Only valid on the connection that started it and only until committed or rolled back.
#[derive(Debug, PartialEq, Eq)]
pub struct Transaction {
    id: u64,
}

impl Transaction {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// One logical server connection with an explicit state.
///
/// Calls are sequential (`&mut self`). A call whose future is dropped before completion
/// leaves the connection in its busy state, every later call then fails fast with
/// `Error::ConnectionBusy` instead of reusing a session in an unknown state.
pub struct SqlConnection {
    config: ConnectionConfig,
    driver: Box<dyn SqlDriver>,
    state: ConnectionState,
    active_tx: Option<u64>,
    next_tx_id: u64,
}

impl SqlConnection {
    pub fn new(config: ConnectionConfig, driver: Box<dyn SqlDriver>) -> Self {
        Self {
            config,
            driver,
            state: ConnectionState::Idle,
            active_tx: None,
            next_tx_id: 1,
        }
    }

    pub fn mssql(config: ConnectionConfig) -> Self {
        let driver = MssqlDriver::new(&config);
        Self::new(config, Box::new(driver))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn check_not_busy(&self) -> anyhow::Result<()> {
        if self.state.is_busy() {
            bail! {Error::ConnectionBusy(format!(
                "connection to catalog {} is {}, \
                 concurrent calls on one connection are not allowed",
                self.config.catalog, self.state
            ))}
        }
        Ok(())
    }

    fn check_open(&self) -> anyhow::Result<()> {
        self.check_not_busy()?;
        if self.state != ConnectionState::Open {
            bail! {Error::ConnectionClosed(format!(
                "connection to catalog {} is {}, call connect first",
                self.config.catalog, self.state
            ))}
        }
        Ok(())
    }

    pub async fn connect(&mut self) -> anyhow::Result<()> {
        self.check_not_busy()?;
        if self.state == ConnectionState::Open {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        match self.driver.connect().await {
            Ok(()) => {
                log_debug!("connected to catalog: {}", self.config.catalog);
                self.state = ConnectionState::Open;
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Closed;
                Err(err)
            }
        }
    }

    /// An open transaction is abandoned, the server rolls it back with the session.
    pub async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.check_not_busy()?;
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Closed) {
            self.state = ConnectionState::Closed;
            return Ok(());
        }

        self.active_tx = None;
        self.state = ConnectionState::Closed;
        self.driver.close().await
    }

    pub async fn execute(&mut self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<u64> {
        self.check_open()?;
        log_sql!("{}", sql);

        self.state = ConnectionState::Executing;
        let result = self.driver.execute(sql, binds).await;
        self.state = ConnectionState::Open;
        result
    }

    pub async fn fetch(&mut self, sql: &str, binds: &[SqlValue]) -> anyhow::Result<Vec<DbRow>> {
        self.check_open()?;
        log_sql!("{}", sql);

        self.state = ConnectionState::Fetching;
        let result = self.driver.fetch(sql, binds).await;
        self.state = ConnectionState::Open;
        result
    }

    pub fn has_active_transaction(&self) -> bool {
        self.active_tx.is_some()
    }

    pub fn is_active(&self, tx: &Transaction) -> bool {
        self.active_tx == Some(tx.id)
    }

    pub async fn begin_transaction(&mut self) -> anyhow::Result<Transaction> {
        self.check_open()?;
        if let Some(id) = self.active_tx {
            bail! {Error::TransactionError(format!(
                "transaction {} is still active, nested transactions are not supported",
                id
            ))}
        }

        self.execute(BEGIN_TRANSACTION, &[]).await?;
        let tx = Transaction {
            id: self.next_tx_id,
        };
        self.next_tx_id += 1;
        self.active_tx = Some(tx.id);
        Ok(tx)
    }

    /// On failure the transaction stays active, roll it back explicitly.
    pub async fn commit(&mut self, tx: &Transaction) -> anyhow::Result<()> {
        self.check_tx(tx)?;
        self.execute(COMMIT_TRANSACTION, &[]).await?;
        self.active_tx = None;
        Ok(())
    }

    /// The handle is released even if the rollback statement fails.
    pub async fn rollback(&mut self, tx: &Transaction) -> anyhow::Result<()> {
        self.check_tx(tx)?;
        let result = self.execute(ROLLBACK_TRANSACTION, &[]).await;
        self.active_tx = None;
        result.map(|_| ())
    }

    fn check_tx(&self, tx: &Transaction) -> anyhow::Result<()> {
        if !self.is_active(tx) {
            bail! {Error::TransactionError(format!(
                "transaction {} is not active on this connection",
                tx.id
            ))}
        }
        Ok(())
    }
}
