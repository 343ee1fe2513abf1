//! Declarative, reusable descriptions of a single statement.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use enum_iterator::Sequence;
use query_engine_sql::sql::helpers::compact;
use query_engine_sql::sql::string::Arguments;

use crate::batch::{Batch, ResultSink};
use crate::driver::{Statement, StatementKind, StatementOutcome};
use crate::error::{BoxError, Error};

/// How many rows the author of a query expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Sequence)]
pub enum ResultExpectation {
    /// Any number of rows, including zero.
    Many,
    /// Exactly one row.
    One,
    /// An INSERT/UPDATE/DELETE without RETURNING.
    Exec,
    /// An INSERT/UPDATE/DELETE that must affect exactly one row.
    ExecOneRow,
}

impl fmt::Display for ResultExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultExpectation::Many => "many rows",
            ResultExpectation::One => "one row",
            ResultExpectation::Exec => "no rows",
            ResultExpectation::ExecOneRow => "one affected row",
        };
        f.write_str(name)
    }
}

/// Turns one raw row into a value.
pub type RowDecoder<R, T> = fn(&R) -> Result<T, BoxError>;

/// A statement together with its arguments, the shape of result it expects
/// and how to decode its rows.
///
/// Queueing methods check that they match the declared expectation and fail
/// before anything is sent if they don't.
pub struct TypedQuery<T, R> {
    pub sql: String,
    pub args: Arguments,
    /// Required for [`ResultExpectation::One`] and [`ResultExpectation::Many`],
    /// and rejected for the exec expectations.
    pub decode: Option<RowDecoder<R, T>>,
    pub expect: ResultExpectation,
}

impl<T, R> Clone for TypedQuery<T, R> {
    fn clone(&self) -> Self {
        TypedQuery {
            sql: self.sql.clone(),
            args: self.args.clone(),
            decode: self.decode,
            expect: self.expect,
        }
    }
}

impl<T, R> fmt::Debug for TypedQuery<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedQuery")
            .field("sql", &compact(&self.sql))
            .field("args", &self.args)
            .field("expect", &self.expect)
            .finish_non_exhaustive()
    }
}

impl<T, R> TypedQuery<T, R> {
    pub fn one(sql: impl Into<String>, args: impl Into<Arguments>, decode: RowDecoder<R, T>) -> Self {
        TypedQuery {
            sql: sql.into(),
            args: args.into(),
            decode: Some(decode),
            expect: ResultExpectation::One,
        }
    }

    pub fn many(sql: impl Into<String>, args: impl Into<Arguments>, decode: RowDecoder<R, T>) -> Self {
        TypedQuery {
            sql: sql.into(),
            args: args.into(),
            decode: Some(decode),
            expect: ResultExpectation::Many,
        }
    }
}

impl<R> TypedQuery<(), R> {
    pub fn exec(sql: impl Into<String>, args: impl Into<Arguments>) -> Self {
        TypedQuery {
            sql: sql.into(),
            args: args.into(),
            decode: None,
            expect: ResultExpectation::Exec,
        }
    }

    pub fn exec_one_row(sql: impl Into<String>, args: impl Into<Arguments>) -> Self {
        TypedQuery {
            sql: sql.into(),
            args: args.into(),
            decode: None,
            expect: ResultExpectation::ExecOneRow,
        }
    }
}

impl<T, R> TypedQuery<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Queue the query expecting exactly one row. `dst` is filled once the
    /// batch resolves. Fails unless the query expects [`ResultExpectation::One`].
    pub fn queue(&self, batch: &mut Batch<R>, dst: &Slot<T>) -> Result<(), Error> {
        let decode = self.decoder("queue", ResultExpectation::One)?;
        let statement = self.statement(StatementKind::Query)?;
        batch.queue(
            statement,
            Box::new(OneSink {
                decode,
                dst: dst.clone(),
                staged: None,
            }),
        )
    }

    /// Queue the query expecting zero or more rows. `dst` is filled once the
    /// batch resolves. Fails unless the query expects [`ResultExpectation::Many`].
    pub fn queue_many(&self, batch: &mut Batch<R>, dst: &Slot<Vec<T>>) -> Result<(), Error> {
        let decode = self.decoder("queue_many", ResultExpectation::Many)?;
        let statement = self.statement(StatementKind::Query)?;
        batch.queue(
            statement,
            Box::new(ManySink {
                decode,
                dst: dst.clone(),
                staged: None,
            }),
        )
    }

    /// Queue a statement that returns no rows. Fails unless the query expects
    /// one of the exec expectations.
    pub fn queue_exec(&self, batch: &mut Batch<R>) -> Result<(), Error> {
        self.queue_exec_inner(batch, None)
    }

    /// Like [`TypedQuery::queue_exec`], also reporting the number of affected rows.
    pub fn queue_exec_into(&self, batch: &mut Batch<R>, rows_affected: &Slot<u64>) -> Result<(), Error> {
        self.queue_exec_inner(batch, Some(rows_affected.clone()))
    }

    fn queue_exec_inner(&self, batch: &mut Batch<R>, dst: Option<Slot<u64>>) -> Result<(), Error> {
        if !matches!(
            self.expect,
            ResultExpectation::Exec | ResultExpectation::ExecOneRow
        ) {
            return Err(Error::ExpectationMismatch {
                method: "queue_exec",
                required: "no rows or one affected row",
                actual: self.expect,
            });
        }
        if self.decode.is_some() {
            return Err(Error::UnexpectedDecoder(self.expect));
        }
        let statement = self.statement(StatementKind::Exec)?;
        batch.queue(
            statement,
            Box::new(ExecSink {
                exactly_one: self.expect == ResultExpectation::ExecOneRow,
                dst,
                staged: None,
            }),
        )
    }

    fn decoder(
        &self,
        method: &'static str,
        required: ResultExpectation,
    ) -> Result<RowDecoder<R, T>, Error> {
        if self.expect != required {
            return Err(Error::ExpectationMismatch {
                method,
                required: match required {
                    ResultExpectation::One => "one row",
                    _ => "many rows",
                },
                actual: self.expect,
            });
        }
        self.decode.ok_or(Error::MissingDecoder(self.expect))
    }

    fn statement(&self, kind: StatementKind) -> Result<Statement, Error> {
        let sql = self.args.bind(&self.sql)?;
        tracing::debug!(query = %compact(&sql.sql), expect = %self.expect, "queue statement");
        Ok(Statement { sql, kind })
    }
}

/// A destination for the result of a queued statement.
///
/// Slots are cheap to clone; every clone refers to the same value. A slot is
/// filled only after every statement of its batch resolved successfully.
pub struct Slot<T>(Arc<Mutex<Option<T>>>);

impl<T> Slot<T> {
    pub fn new() -> Self {
        Slot(Arc::new(Mutex::new(None)))
    }

    /// Move the value out, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_filled(&self) -> bool {
        self.lock().is_some()
    }

    pub(crate) fn fill(&self, value: T) {
        *self.lock() = Some(value);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Slot<T> {
    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot(Arc::clone(&self.0))
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&*self.lock()).finish()
    }
}

struct OneSink<T, R> {
    decode: RowDecoder<R, T>,
    dst: Slot<T>,
    staged: Option<T>,
}

impl<T: Send, R> ResultSink<R> for OneSink<T, R> {
    fn apply(&mut self, outcome: StatementOutcome<R>) -> Result<(), Error> {
        let row = outcome.rows.first().ok_or(Error::NoRows)?;
        let value = (self.decode)(row).map_err(Error::Decode)?;
        // the row is already decoded, but a second row means the caller's
        // invariant does not hold
        if outcome.rows.len() > 1 {
            return Err(Error::TooManyRows);
        }
        self.staged = Some(value);
        Ok(())
    }

    fn publish(self: Box<Self>) {
        if let Some(value) = self.staged {
            self.dst.fill(value);
        }
    }
}

struct ManySink<T, R> {
    decode: RowDecoder<R, T>,
    dst: Slot<Vec<T>>,
    staged: Option<Vec<T>>,
}

impl<T: Send, R> ResultSink<R> for ManySink<T, R> {
    fn apply(&mut self, outcome: StatementOutcome<R>) -> Result<(), Error> {
        let values = outcome
            .rows
            .iter()
            .map(self.decode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::Decode)?;
        self.staged = Some(values);
        Ok(())
    }

    fn publish(self: Box<Self>) {
        if let Some(values) = self.staged {
            self.dst.fill(values);
        }
    }
}

struct ExecSink {
    exactly_one: bool,
    dst: Option<Slot<u64>>,
    staged: Option<u64>,
}

impl<R> ResultSink<R> for ExecSink {
    fn apply(&mut self, outcome: StatementOutcome<R>) -> Result<(), Error> {
        if self.exactly_one && outcome.rows_affected != 1 {
            return Err(Error::RowsAffected(outcome.rows_affected));
        }
        self.staged = Some(outcome.rows_affected);
        Ok(())
    }

    fn publish(self: Box<Self>) {
        if let (Some(dst), Some(rows_affected)) = (self.dst, self.staged) {
            dst.fill(rows_affected);
        }
    }
}
