//! Check that the database is reachable.

use std::time::Duration;

use query_engine_sql::sql::string::SQL;
use thiserror::Error;
use tokio::time::Instant;

use crate::context::Context;
use crate::driver::{ConnectionPool, Statement, StatementKind};
use crate::error::DriverError;

/// How long to keep trying when the context carries no deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// The wait after the n-th failed attempt is n times this.
const BACKOFF_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("database unreachable after {attempts} attempts: {last}")]
    Unreachable { attempts: u32, last: DriverError },
    /// The deadline passed. `last` is the error of the previous failed ping.
    #[error("no answer from the database after {attempts} attempts{}", last_error(.last.as_ref()))]
    Timeout {
        attempts: u32,
        last: Option<DriverError>,
    },
    #[error("health check query failed: {0}")]
    Query(DriverError),
    #[error("health check returned {0} rows, expected 1")]
    UnexpectedRows(usize),
}

fn last_error(last: Option<&DriverError>) -> String {
    last.map(|error| format!(" (last error: {error})"))
        .unwrap_or_default()
}

/// Ping until the database answers or the deadline of `ctx` (or
/// [`DEFAULT_TIMEOUT`]) passes, backing off linearly between attempts. Then
/// run `SELECT TRUE`, which a ping alone does not exercise.
pub async fn status_check<P: ConnectionPool>(
    ctx: &Context<P::Transaction>,
    pool: &P,
) -> Result<(), HealthCheckError> {
    let deadline = ctx
        .deadline()
        .unwrap_or_else(|| Instant::now() + DEFAULT_TIMEOUT);

    let mut attempts = 0;
    let mut last = None;
    loop {
        attempts += 1;
        let error = match tokio::time::timeout_at(deadline, pool.ping()).await {
            Err(_) => return Err(HealthCheckError::Timeout { attempts, last }),
            Ok(Ok(())) => break,
            Ok(Err(error)) => error,
        };

        tracing::warn!(attempt = attempts, %error, "health check ping failed");

        let wake = Instant::now() + BACKOFF_STEP * attempts;
        if wake >= deadline {
            return Err(HealthCheckError::Unreachable {
                attempts,
                last: error,
            });
        }
        last = Some(error);
        tokio::time::sleep_until(wake).await;
    }

    let query = [Statement {
        sql: SQL::positional("SELECT TRUE", vec![]),
        kind: StatementKind::Query,
    }];
    let outcomes = match tokio::time::timeout_at(deadline, pool.send_batch(&query)).await {
        Err(_) => return Err(HealthCheckError::Timeout { attempts, last }),
        Ok(Err(error)) => return Err(HealthCheckError::Query(error)),
        Ok(Ok(outcomes)) => outcomes,
    };
    let rows = outcomes.first().map_or(0, |outcome| outcome.rows.len());
    if rows == 1 {
        Ok(())
    } else {
        Err(HealthCheckError::UnexpectedRows(rows))
    }
}
