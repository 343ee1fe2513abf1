//! The PostgreSQL driver, backed by tokio-postgres.
//!
//! A batch is pipelined: every statement is written to the connection before
//! any response is read, and the responses are consumed in request order.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{join3, join_all, OptionFuture};
use futures_util::TryStreamExt;
use query_engine_sql::sql::string::Param;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Config};

use crate::batch::Batch;
use crate::context::Context;
use crate::driver::{ConnectionPool, Statement, StatementKind, StatementOutcome, Transaction};
use crate::error::DriverError;
use crate::pool::{Pool, PoolOptions, PooledClient, Tls};
use crate::typed_query::TypedQuery;

pub use tokio_postgres::Row as PgRow;

/// A request context for the PostgreSQL driver.
pub type PgContext = Context<PostgresTransaction>;
/// A query decoding PostgreSQL rows.
pub type PgQuery<T> = TypedQuery<T, PgRow>;
/// A batch of PostgreSQL statements.
pub type PgBatch = Batch<PgRow>;

/// A shared connection pool.
#[derive(Clone, Debug)]
pub struct PostgresPool(Arc<Pool>);

impl PostgresPool {
    /// A pool that opens connections on first use.
    pub fn new(config: Config, tls: Tls, options: PoolOptions) -> Self {
        PostgresPool(Arc::new(Pool::new(config, tls, options)))
    }

    /// A pool with its first connections already open.
    pub async fn connect(config: Config, tls: Tls, options: PoolOptions) -> Result<Self, DriverError> {
        let pool = PostgresPool::new(config, tls, options);
        pool.0.fill().await?;
        Ok(pool)
    }

    /// Close idle connections and refuse new checkouts. Connections in use
    /// are closed when they are released.
    pub fn close(&self) {
        self.0.close();
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Connections waiting to be reused.
    pub fn idle_connections(&self) -> usize {
        self.0.idle_count()
    }

    /// Run a script of semicolon-separated statements without parameters,
    /// e.g. a schema or seed file.
    pub async fn batch_execute(&self, script: &str) -> Result<(), DriverError> {
        let mut connection = self.0.acquire().await?;
        connection.set_clean(false);
        connection
            .client()?
            .batch_execute(script)
            .await
            .map_err(DriverError::connection)?;
        connection.set_clean(true);
        Ok(())
    }
}

/// An open transaction, holding its connection until finished.
pub struct PostgresTransaction(PooledClient);

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PostgresTransaction")
    }
}

impl PostgresTransaction {
    async fn finish(mut self, command: &str) -> Result<(), DriverError> {
        self.0
            .client()?
            .batch_execute(command)
            .await
            .map_err(DriverError::connection)?;
        self.0.set_clean(true);
        Ok(())
    }
}

#[async_trait]
impl ConnectionPool for PostgresPool {
    type Row = PgRow;
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction, DriverError> {
        let mut connection = self.0.acquire().await?;
        connection.set_clean(false);
        connection
            .client()?
            .batch_execute("BEGIN")
            .await
            .map_err(DriverError::connection)?;
        Ok(PostgresTransaction(connection))
    }

    async fn ping(&self) -> Result<(), DriverError> {
        self.batch_execute(";").await
    }

    async fn send_batch(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<StatementOutcome<PgRow>>, DriverError> {
        let mut connection = self.0.acquire().await?;
        connection.set_clean(false);
        // several statements run as one unit, as they would inside a transaction
        let outcomes = pipeline(connection.client()?, statements, statements.len() > 1).await;
        connection.set_clean(true);
        outcomes
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    type Row = PgRow;

    async fn send_batch(
        &mut self,
        statements: &[Statement],
    ) -> Result<Vec<StatementOutcome<PgRow>>, DriverError> {
        pipeline(self.0.client()?, statements, false).await
    }

    async fn commit(self) -> Result<(), DriverError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), DriverError> {
        self.finish("ROLLBACK").await
    }
}

/// Write every statement, then read the results in request order. With
/// `atomic`, the statements are wrapped in BEGIN and COMMIT so a failure
/// undoes the ones before it; a failed transaction commits as a rollback.
///
/// tokio-postgres writes a request on the first poll of its future, and the
/// joins poll in order, so requests leave in batch order before any response
/// is awaited.
async fn pipeline(
    client: &Client,
    statements: &[Statement],
    atomic: bool,
) -> Result<Vec<StatementOutcome<PgRow>>, DriverError> {
    let begin: OptionFuture<_> = atomic.then(|| client.batch_execute("BEGIN")).into();
    let sent = join_all(statements.iter().map(|statement| run(client, statement)));
    let commit: OptionFuture<_> = atomic.then(|| client.batch_execute("COMMIT")).into();

    let (begun, results, committed) = join3(begin, sent, commit).await;

    if let Some(Err(error)) = begun {
        return Err(DriverError::connection(error));
    }
    let mut outcomes = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
        outcomes.push(result.map_err(|error| {
            if error.is_closed() {
                DriverError::connection(error)
            } else {
                DriverError::statement(index, error)
            }
        })?);
    }
    if let Some(Err(error)) = committed {
        return Err(DriverError::connection(error));
    }
    Ok(outcomes)
}

async fn run(
    client: &Client,
    statement: &Statement,
) -> Result<StatementOutcome<PgRow>, tokio_postgres::Error> {
    let stream = client
        .query_typed_raw(&statement.sql.sql, typed_params(&statement.sql.params))
        .await?;
    let mut stream = std::pin::pin!(stream);
    let mut rows = Vec::new();
    while let Some(row) = stream.try_next().await? {
        rows.push(row);
    }
    Ok(match statement.kind {
        StatementKind::Query => StatementOutcome::rows(rows),
        StatementKind::Exec => {
            StatementOutcome::affected(stream.rows_affected().unwrap_or(rows.len() as u64))
        }
    })
}

static NULL: Option<&str> = None;

/// Pair each parameter with its wire type. Types are sent with the statement,
/// so nothing is prepared ahead of the batch.
fn typed_params(params: &[Param]) -> Vec<(&(dyn ToSql + Sync), Type)> {
    params.iter().map(typed_param).collect()
}

fn typed_param(param: &Param) -> (&(dyn ToSql + Sync), Type) {
    match param {
        // resolved by the server from the surrounding expression
        Param::Null => (&NULL, Type::UNKNOWN),
        Param::Bool(b) => (b, Type::BOOL),
        Param::Int(i) => (i, Type::INT8),
        Param::Float(f) => (f, Type::FLOAT8),
        Param::String(s) => (s, Type::TEXT),
        Param::StringArray(values) => (values, Type::TEXT_ARRAY),
        Param::Uuid(id) => (id, Type::UUID),
        Param::Json(value) => (value, Type::JSONB),
    }
}
