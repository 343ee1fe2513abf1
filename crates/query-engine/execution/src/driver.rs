//! The narrow contract this crate needs from a database driver.
//!
//! A pool hands out transactions and sends batches; a transaction sends
//! batches and is finished exactly once. Pool sizing, connection lifecycle and
//! the wire protocol stay behind these traits.

use async_trait::async_trait;
use query_engine_sql::sql::string::SQL;

use crate::error::DriverError;

/// How the driver should run a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// The statement returns rows.
    Query,
    /// The statement only reports how many rows it affected.
    Exec,
}

/// One statement of a batch, with positional placeholders and bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: SQL,
    pub kind: StatementKind,
}

/// The raw result of one statement.
#[derive(Debug)]
pub struct StatementOutcome<R> {
    /// Returned rows. Always empty for [`StatementKind::Exec`].
    pub rows: Vec<R>,
    /// Rows affected, or returned for queries.
    pub rows_affected: u64,
}

impl<R> StatementOutcome<R> {
    pub fn rows(rows: Vec<R>) -> Self {
        StatementOutcome {
            rows_affected: rows.len() as u64,
            rows,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        StatementOutcome {
            rows: vec![],
            rows_affected,
        }
    }
}

/// A shared pool of database connections.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// The raw row type handed to row decoders.
    type Row: Send + 'static;
    type Transaction: Transaction<Row = Self::Row>;

    async fn begin(&self) -> Result<Self::Transaction, DriverError>;

    /// Check out a connection and exchange an empty request with the server.
    async fn ping(&self) -> Result<(), DriverError>;

    /// Send `statements` in one round trip on a single connection. Outcomes
    /// come back in request order. The first failing statement aborts the
    /// rest of the batch and is reported with its index.
    async fn send_batch(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<StatementOutcome<Self::Row>>, DriverError>;
}

/// An open database transaction.
#[async_trait]
pub trait Transaction: Send + 'static {
    type Row: Send + 'static;

    /// Same contract as [`ConnectionPool::send_batch`], inside the transaction.
    async fn send_batch(
        &mut self,
        statements: &[Statement],
    ) -> Result<Vec<StatementOutcome<Self::Row>>, DriverError>;

    async fn commit(self) -> Result<(), DriverError>;

    async fn rollback(self) -> Result<(), DriverError>;
}
