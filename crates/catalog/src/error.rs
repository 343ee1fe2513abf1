use thiserror::Error;
use uuid::Uuid;

use query_engine_execution::error::Error as ExecutionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("exercise {0} not found")]
    NotFound(Uuid),
    /// A category, equipment, muscle or tag code without a lookup row.
    #[error("unknown {kind} {code:?}")]
    UnknownCode { kind: &'static str, code: String },
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
