//! Errors for query execution.

use query_engine_sql::sql::string::ArgumentError;
use thiserror::Error;

use crate::typed_query::ResultExpectation;

/// A boxed error from a driver or a row decoder.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by a connection pool or transaction.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The transaction was already committed or rolled back.
    #[error("transaction is closed")]
    TxClosed,
    /// A statement of a batch failed on the server.
    #[error("statement {index}: {source}")]
    Statement { index: usize, source: BoxError },
    /// Acquiring a connection or talking to the server failed.
    #[error("{0}")]
    Connection(BoxError),
}

impl DriverError {
    pub fn connection(error: impl Into<BoxError>) -> Self {
        DriverError::Connection(error.into())
    }

    pub fn statement(index: usize, error: impl Into<BoxError>) -> Self {
        DriverError::Statement {
            index,
            source: error.into(),
        }
    }
}

/// Errors raised while queueing, sending or resolving a batch.
#[derive(Debug, Error)]
pub enum Error {
    // usage errors, raised before anything is sent
    #[error("{method} requires a query expecting {required}, but it expects {actual}")]
    ExpectationMismatch {
        method: &'static str,
        required: &'static str,
        actual: ResultExpectation,
    },
    #[error("a query expecting {0} needs a row decoder")]
    MissingDecoder(ResultExpectation),
    #[error("a query expecting {0} must not have a row decoder")]
    UnexpectedDecoder(ResultExpectation),
    #[error("bind arguments: {0}")]
    Arguments(#[from] ArgumentError),
    #[error("batch has already been sent")]
    BatchSent,

    // result shape errors
    #[error("no rows in result set")]
    NoRows,
    #[error("too many rows")]
    TooManyRows,
    #[error("expected exactly one affected row, got {0}")]
    RowsAffected(u64),
    #[error("expected {expected} results, got {actual}")]
    ResultCount { expected: usize, actual: usize },
    #[error("decode row: {0}")]
    Decode(BoxError),
    /// A result shape error, tagged with the position of the statement in its batch.
    #[error("statement {index}: {source}")]
    Statement { index: usize, source: Box<Error> },

    // driver errors
    #[error("begin transaction: {0}")]
    Begin(DriverError),
    #[error("send batch: {0}")]
    Send(DriverError),
    #[error("commit transaction: {0}")]
    Commit(DriverError),
    /// The original failure, with the error of the rollback that followed it.
    #[error("{cause}; rollback transaction: {rollback}")]
    Rollback {
        cause: Box<Error>,
        rollback: DriverError,
    },
    #[error("deadline exceeded while waiting to {0}")]
    DeadlineExceeded(&'static str),

    /// Errors raised by caller code inside a queue callback.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// The failure that started it all, looking through statement tags and
    /// joined rollback errors.
    pub fn root(&self) -> &Error {
        match self {
            Error::Statement { source, .. } => source.root(),
            Error::Rollback { cause, .. } => cause.root(),
            other => other,
        }
    }
}
