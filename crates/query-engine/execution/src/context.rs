//! Propagate an open transaction through nested calls.
//!
//! A [`Context`] is passed explicitly down a call chain. The first caller that
//! asks for a transaction opens one and receives a derived context carrying
//! its handle; callers further down discover that handle and reuse it. Only
//! the frame that opened the transaction may commit or roll it back.
//!
//! A context may also carry a deadline which bounds every network call made
//! on its behalf.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::driver::{ConnectionPool, Statement, StatementOutcome, Transaction};
use crate::error::{DriverError, Error};

/// Request-scoped state: the ambient transaction, if any, and a deadline.
pub struct Context<Tx> {
    tx: Option<TxHandle<Tx>>,
    deadline: Option<Instant>,
}

impl<Tx> Context<Tx> {
    /// A context with no transaction and no deadline.
    pub fn new() -> Self {
        Context {
            tx: None,
            deadline: None,
        }
    }

    /// A child context carrying `tx`. The deadline is inherited.
    pub fn derive(&self, tx: TxHandle<Tx>) -> Self {
        Context {
            tx: Some(tx),
            deadline: self.deadline,
        }
    }

    /// A child context that expires at `deadline`, or earlier if the parent does.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Context {
            tx: self.tx.clone(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The transaction carried by this context.
    pub fn transaction(&self) -> Option<&TxHandle<Tx>> {
        self.tx.as_ref()
    }
}

impl<Tx> Default for Context<Tx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tx> Clone for Context<Tx> {
    fn clone(&self) -> Self {
        Context {
            tx: self.tx.clone(),
            deadline: self.deadline,
        }
    }
}

impl<Tx> fmt::Debug for Context<Tx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("transaction", &self.tx.is_some())
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// The transaction carried by `ctx`, if any.
pub fn lookup<Tx>(ctx: &Context<Tx>) -> Option<&TxHandle<Tx>> {
    ctx.transaction()
}

/// A shared handle to an open transaction. Once committed or rolled back the
/// handle is closed and every further operation fails with
/// [`DriverError::TxClosed`].
pub struct TxHandle<Tx>(Arc<Mutex<Option<Tx>>>);

impl<Tx> Clone for TxHandle<Tx> {
    fn clone(&self) -> Self {
        TxHandle(Arc::clone(&self.0))
    }
}

impl<Tx> TxHandle<Tx> {
    /// Whether both handles refer to the same transaction.
    pub fn same_as(&self, other: &TxHandle<Tx>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<Tx: Transaction> TxHandle<Tx> {
    pub fn new(tx: Tx) -> Self {
        TxHandle(Arc::new(Mutex::new(Some(tx))))
    }

    pub async fn send_batch(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<StatementOutcome<Tx::Row>>, DriverError> {
        match self.0.lock().await.as_mut() {
            Some(tx) => tx.send_batch(statements).await,
            None => Err(DriverError::TxClosed),
        }
    }

    pub async fn commit(&self) -> Result<(), DriverError> {
        let tx = self.0.lock().await.take();
        match tx {
            Some(tx) => tx.commit().await,
            None => Err(DriverError::TxClosed),
        }
    }

    pub async fn rollback(&self) -> Result<(), DriverError> {
        let tx = self.0.lock().await.take();
        match tx {
            Some(tx) => tx.rollback().await,
            None => Err(DriverError::TxClosed),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.0.lock().await.is_none()
    }
}

/// Return the transaction carried by `ctx` together with `ctx` itself, or
/// begin a new transaction on `pool` and return it with a derived context.
///
/// The caller owns the transaction only in the second case, which it can tell
/// by checking [`Context::transaction`] beforehand.
pub async fn with_transaction<P: ConnectionPool>(
    ctx: &Context<P::Transaction>,
    pool: &P,
) -> Result<(TxHandle<P::Transaction>, Context<P::Transaction>), Error> {
    if let Some(tx) = ctx.transaction() {
        return Ok((tx.clone(), ctx.clone()));
    }

    let tx = within(ctx, "begin transaction", pool.begin())
        .await?
        .map_err(Error::Begin)?;
    let tx = TxHandle::new(tx);
    let ctx = ctx.derive(tx.clone());

    Ok((tx, ctx))
}

/// Await `future`, giving up once the deadline of `ctx` has passed.
pub(crate) async fn within<Tx, F: Future>(
    ctx: &Context<Tx>,
    what: &'static str,
    future: F,
) -> Result<F::Output, Error> {
    until(ctx.deadline(), what, future).await
}

/// Like [`within`], but leaves at least `grace` from now. For cleanup that
/// must still be attempted when the deadline is what failed.
pub(crate) async fn within_grace<Tx, F: Future>(
    ctx: &Context<Tx>,
    grace: Duration,
    what: &'static str,
    future: F,
) -> Result<F::Output, Error> {
    let deadline = ctx
        .deadline()
        .map(|deadline| deadline.max(Instant::now() + grace));
    until(deadline, what, future).await
}

async fn until<F: Future>(
    deadline: Option<Instant>,
    what: &'static str,
    future: F,
) -> Result<F::Output, Error> {
    match deadline {
        None => Ok(future.await),
        Some(deadline) => tokio::time::timeout_at(deadline, future)
            .await
            .map_err(|_| Error::DeadlineExceeded(what)),
    }
}
