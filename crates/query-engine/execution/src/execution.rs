//! Send a batch of queued statements and resolve their results.

use std::future::Future;
use std::time::Duration;

use tracing::{field, info_span, Instrument, Span};

use crate::batch::Batch;
use crate::context::{with_transaction, within, within_grace, Context, TxHandle};
use crate::driver::{ConnectionPool, Statement, Transaction};
use crate::error::{DriverError, Error};

/// Queue statements with `queue`, send them to `pool` in one round trip and
/// resolve every destination in queue order.
///
/// The batch is sent outside of any transaction, even if `ctx` carries one.
/// If `queue` fails nothing is sent and its error is returned unchanged.
pub async fn run_batch<P, F>(ctx: &Context<P::Transaction>, pool: &P, queue: F) -> Result<(), Error>
where
    P: ConnectionPool,
    F: FnOnce(&Context<P::Transaction>, &mut Batch<P::Row>) -> Result<(), Error>,
{
    let span = info_span!("run_batch", statements = field::Empty);
    async {
        let mut batch = Batch::new();
        queue(ctx, &mut batch)?;

        let Some(statements) = seal(&mut batch) else {
            return Ok(());
        };
        Span::current().record("statements", statements.len());

        let outcomes = within(ctx, "send batch", pool.send_batch(&statements))
            .await?
            .map_err(Error::Send)?;
        batch.resolve(outcomes)
    }
    .instrument(span)
    .await
}

/// Like [`run_batch`], but inside the transaction carried by `ctx`, or a new
/// one if there is none.
///
/// A transaction begun here is committed on success and rolled back on any
/// failure. A transaction found in `ctx` is left for its owner to finish.
pub async fn run_batch_in_transaction<P, F>(
    ctx: &Context<P::Transaction>,
    pool: &P,
    queue: F,
) -> Result<(), Error>
where
    P: ConnectionPool,
    F: FnOnce(&Context<P::Transaction>, &mut Batch<P::Row>) -> Result<(), Error>,
{
    let span = info_span!("run_batch_in_transaction", statements = field::Empty);
    transact(ctx, pool, |ctx, tx| async move {
        let mut batch = Batch::new();
        queue(&ctx, &mut batch)?;

        let Some(statements) = seal(&mut batch) else {
            return Ok(());
        };
        Span::current().record("statements", statements.len());

        let outcomes = within(&ctx, "send batch", tx.send_batch(&statements))
            .await?
            .map_err(Error::Send)?;
        batch.resolve(outcomes)
    })
    .instrument(span)
    .await
}

/// Run `body` with a context carrying a transaction, beginning one if `ctx`
/// has none. Use it to group several calls into one transaction:
///
/// ```ignore
/// in_transaction(&ctx, &pool, |ctx| async move {
///     run_batch_in_transaction(&ctx, &pool, |_, batch| insert.queue_exec(batch)).await?;
///     run_batch_in_transaction(&ctx, &pool, |_, batch| select.queue(batch, &row)).await
/// })
/// .await?;
/// ```
///
/// Calls made with the derived context reuse the transaction, which is
/// committed once `body` succeeds, or rolled back if it fails, by whichever
/// call began it.
pub async fn in_transaction<P, F, Fut, T>(
    ctx: &Context<P::Transaction>,
    pool: &P,
    body: F,
) -> Result<T, Error>
where
    P: ConnectionPool,
    F: FnOnce(Context<P::Transaction>) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    transact(ctx, pool, |ctx, _| body(ctx)).await
}

async fn transact<P, F, Fut, T>(ctx: &Context<P::Transaction>, pool: &P, body: F) -> Result<T, Error>
where
    P: ConnectionPool,
    F: FnOnce(Context<P::Transaction>, TxHandle<P::Transaction>) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let owner = ctx.transaction().is_none();
    let (tx, ctx) = with_transaction(ctx, pool).await?;

    let result = body(ctx.clone(), tx.clone()).await;

    if !owner {
        return result;
    }

    match result {
        Ok(value) => {
            commit(&ctx, &tx).await?;
            Ok(value)
        }
        Err(cause) => Err(rollback(&ctx, &tx, cause).await),
    }
}

async fn commit<Tx: Transaction>(ctx: &Context<Tx>, tx: &TxHandle<Tx>) -> Result<(), Error> {
    match within(ctx, "commit transaction", tx.commit()).await? {
        // someone further down already finished it
        Ok(()) | Err(DriverError::TxClosed) => Ok(()),
        Err(error) => Err(Error::Commit(error)),
    }
}

/// How long a rollback may take once the deadline has passed.
const ROLLBACK_GRACE: Duration = Duration::from_secs(1);

/// Roll back after `cause`, returning the error to report. The rollback gets
/// until the deadline, or [`ROLLBACK_GRACE`] from now if that is later. A
/// rollback abandoned on timeout drops the transaction, which closes its
/// connection.
async fn rollback<Tx: Transaction>(ctx: &Context<Tx>, tx: &TxHandle<Tx>, cause: Error) -> Error {
    tracing::warn!(error = %cause, "rolling back transaction");
    let result = within_grace(ctx, ROLLBACK_GRACE, "roll back transaction", tx.rollback())
        .await
        .unwrap_or_else(|timeout| Err(DriverError::connection(timeout)));
    match result {
        Ok(()) | Err(DriverError::TxClosed) => cause,
        Err(rollback) => Error::Rollback {
            cause: Box::new(cause),
            rollback,
        },
    }
}

/// Close the batch for queueing and return its statements, or `None` if there
/// is nothing to send.
fn seal<R>(batch: &mut Batch<R>) -> Option<Vec<Statement>> {
    batch.mark_sent();
    if batch.is_empty() {
        None
    } else {
        Some(batch.statements())
    }
}
