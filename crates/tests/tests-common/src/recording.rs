//! An in-memory connection pool that answers from a script and records what
//! it was asked to do.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use query_engine_execution::driver::{
    ConnectionPool, Statement, StatementKind, StatementOutcome, Transaction,
};
use query_engine_execution::error::{BoxError, DriverError};
use query_engine_sql::sql::string::SQL;

/// Rows are plain JSON values.
pub type Row = serde_json::Value;

type Responder = dyn Fn(&Statement) -> Result<StatementOutcome<Row>, BoxError> + Send + Sync;

/// Something the pool was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Begin,
    Ping,
    Send {
        transactional: bool,
        statements: Vec<Statement>,
    },
    Commit,
    Rollback,
}

/// A [`ConnectionPool`] whose statements are answered by a closure.
#[derive(Clone)]
pub struct RecordingPool {
    inner: Arc<Inner>,
}

struct Inner {
    respond: Box<Responder>,
    events: Mutex<Vec<Event>>,
    latency: Option<Duration>,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    hang_rollback: AtomicBool,
}

impl RecordingPool {
    /// A pool answering every statement with `respond`. The first statement
    /// it fails aborts the rest of its batch.
    pub fn new(
        respond: impl Fn(&Statement) -> Result<StatementOutcome<Row>, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self::build(Box::new(respond), None)
    }

    /// Queries return one `null` row, exec statements affect one row.
    pub fn succeeding() -> Self {
        Self::new(|statement| {
            Ok(match statement.kind {
                StatementKind::Query => StatementOutcome::rows(vec![Row::Null]),
                StatementKind::Exec => StatementOutcome::affected(1),
            })
        })
    }

    /// Like [`RecordingPool::new`], but every batch takes `latency` to answer.
    pub fn slow(
        latency: Duration,
        respond: impl Fn(&Statement) -> Result<StatementOutcome<Row>, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self::build(Box::new(respond), Some(latency))
    }

    fn build(respond: Box<Responder>, latency: Option<Duration>) -> Self {
        RecordingPool {
            inner: Arc::new(Inner {
                respond,
                events: Mutex::new(vec![]),
                latency,
                fail_begin: AtomicBool::new(false),
                fail_commit: AtomicBool::new(false),
                fail_rollback: AtomicBool::new(false),
                hang_rollback: AtomicBool::new(false),
            }),
        }
    }

    pub fn fail_begin(self) -> Self {
        self.inner.fail_begin.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_commit(self) -> Self {
        self.inner.fail_commit.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_rollback(self) -> Self {
        self.inner.fail_rollback.store(true, Ordering::SeqCst);
        self
    }

    /// Rollbacks are recorded but never answer.
    pub fn hang_rollback(self) -> Self {
        self.inner.hang_rollback.store(true, Ordering::SeqCst);
        self
    }

    /// Everything recorded so far, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.inner.events().clone()
    }

    /// The SQL of every batch sent so far, one entry per batch.
    pub fn sent(&self) -> Vec<Vec<String>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Send { statements, .. } => Some(
                    statements
                        .into_iter()
                        .map(|statement| statement.sql.sql)
                        .collect(),
                ),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|event| *event == wanted).count()
    }
}

impl Inner {
    fn events(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: Event) {
        self.events().push(event);
    }

    async fn send(
        &self,
        transactional: bool,
        statements: &[Statement],
    ) -> Result<Vec<StatementOutcome<Row>>, DriverError> {
        self.record(Event::Send {
            transactional,
            statements: statements.to_vec(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        statements
            .iter()
            .enumerate()
            .map(|(index, statement)| {
                (self.respond)(statement).map_err(|error| DriverError::Statement {
                    index,
                    source: error,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ConnectionPool for RecordingPool {
    type Row = Row;
    type Transaction = RecordingTransaction;

    async fn begin(&self) -> Result<RecordingTransaction, DriverError> {
        if self.inner.fail_begin.load(Ordering::SeqCst) {
            return Err(DriverError::connection("connection refused"));
        }
        self.inner.record(Event::Begin);
        Ok(RecordingTransaction {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Answered by the responder as an exec statement `;`.
    async fn ping(&self) -> Result<(), DriverError> {
        self.inner.record(Event::Ping);
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
        let ping = Statement {
            sql: SQL::positional(";", vec![]),
            kind: StatementKind::Exec,
        };
        (self.inner.respond)(&ping)
            .map(drop)
            .map_err(DriverError::Connection)
    }

    async fn send_batch(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<StatementOutcome<Row>>, DriverError> {
        self.inner.send(false, statements).await
    }
}

/// A transaction handed out by [`RecordingPool`].
pub struct RecordingTransaction {
    inner: Arc<Inner>,
}

#[async_trait]
impl Transaction for RecordingTransaction {
    type Row = Row;

    async fn send_batch(
        &mut self,
        statements: &[Statement],
    ) -> Result<Vec<StatementOutcome<Row>>, DriverError> {
        self.inner.send(true, statements).await
    }

    async fn commit(self) -> Result<(), DriverError> {
        self.inner.record(Event::Commit);
        if self.inner.fail_commit.load(Ordering::SeqCst) {
            return Err(DriverError::connection("connection reset during commit"));
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), DriverError> {
        self.inner.record(Event::Rollback);
        if self.inner.hang_rollback.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.inner.fail_rollback.load(Ordering::SeqCst) {
            return Err(DriverError::connection("connection reset during rollback"));
        }
        Ok(())
    }
}
