//! An ordered collection of statements sent in one round trip.

use std::fmt;

use crate::driver::{Statement, StatementOutcome};
use crate::error::Error;

/// Receives the raw result of one queued statement.
///
/// Resolution happens in two phases: every sink first checks and decodes its
/// result with [`ResultSink::apply`], and only once all of them succeeded are
/// the decoded values handed to their destinations with
/// [`ResultSink::publish`]. A failing batch therefore leaves every
/// destination untouched.
pub trait ResultSink<R>: Send {
    fn apply(&mut self, outcome: StatementOutcome<R>) -> Result<(), Error>;

    fn publish(self: Box<Self>);
}

/// Statements queued for a single round trip, each paired with the sink that
/// handles its result. Statements are sent and resolved in queue order.
pub struct Batch<R> {
    queued: Vec<(Statement, Box<dyn ResultSink<R>>)>,
    sent: bool,
}

impl<R> Batch<R> {
    pub fn new() -> Self {
        Batch {
            queued: vec![],
            sent: false,
        }
    }

    /// Append a statement. Fails once the batch has been sent.
    pub fn queue(&mut self, statement: Statement, sink: Box<dyn ResultSink<R>>) -> Result<(), Error> {
        if self.sent {
            return Err(Error::BatchSent);
        }
        self.queued.push((statement, sink));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// The queued statements, in queue order.
    pub fn statements(&self) -> Vec<Statement> {
        self.queued
            .iter()
            .map(|(statement, _)| statement.clone())
            .collect()
    }

    pub(crate) fn mark_sent(&mut self) {
        self.sent = true;
    }

    /// Feed `outcomes` to the sinks in queue order and publish the results
    /// once every statement resolved successfully.
    pub(crate) fn resolve(&mut self, outcomes: Vec<StatementOutcome<R>>) -> Result<(), Error> {
        let queued = std::mem::take(&mut self.queued);

        if outcomes.len() != queued.len() {
            return Err(Error::ResultCount {
                expected: queued.len(),
                actual: outcomes.len(),
            });
        }

        let mut sinks = Vec::with_capacity(queued.len());
        for (index, ((_, mut sink), outcome)) in queued.into_iter().zip(outcomes).enumerate() {
            sink.apply(outcome).map_err(|source| Error::Statement {
                index,
                source: Box::new(source),
            })?;
            sinks.push(sink);
        }

        for sink in sinks {
            sink.publish();
        }
        Ok(())
    }
}

impl<R> Default for Batch<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Batch<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("statements", &self.queued.len())
            .field("sent", &self.sent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use query_engine_sql::sql::string::SQL;

    use super::*;
    use crate::driver::StatementKind;

    /// Records the order in which sinks are applied and published.
    struct RecordingSink {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl ResultSink<()> for RecordingSink {
        fn apply(&mut self, _: StatementOutcome<()>) -> Result<(), Error> {
            self.log.lock().unwrap().push(format!("apply {}", self.name));
            if self.fail {
                Err(Error::NoRows)
            } else {
                Ok(())
            }
        }

        fn publish(self: Box<Self>) {
            self.log.lock().unwrap().push(format!("publish {}", self.name));
        }
    }

    fn statement(sql: &str) -> Statement {
        Statement {
            sql: SQL::positional(sql, vec![]),
            kind: StatementKind::Exec,
        }
    }

    fn recording_sink(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Box<RecordingSink> {
        Box::new(RecordingSink {
            name,
            log: log.clone(),
            fail,
        })
    }

    #[test]
    fn sinks_are_applied_in_order_then_published() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut batch = Batch::new();
        batch.queue(statement("a"), recording_sink("a", &log, false)).unwrap();
        batch.queue(statement("b"), recording_sink("b", &log, false)).unwrap();

        batch
            .resolve(vec![StatementOutcome::affected(0), StatementOutcome::affected(0)])
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["apply a", "apply b", "publish a", "publish b"]
        );
    }

    #[test]
    fn a_failing_sink_stops_resolution_and_nothing_is_published() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut batch = Batch::new();
        batch.queue(statement("a"), recording_sink("a", &log, false)).unwrap();
        batch.queue(statement("b"), recording_sink("b", &log, true)).unwrap();
        batch.queue(statement("c"), recording_sink("c", &log, false)).unwrap();

        let result = batch.resolve(vec![
            StatementOutcome::affected(0),
            StatementOutcome::affected(0),
            StatementOutcome::affected(0),
        ]);

        assert!(matches!(result, Err(Error::Statement { index: 1, .. })));
        assert_eq!(*log.lock().unwrap(), vec!["apply a", "apply b"]);
    }

    #[test]
    fn outcome_count_must_match() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut batch = Batch::new();
        batch.queue(statement("a"), recording_sink("a", &log, false)).unwrap();

        let result = batch.resolve(vec![]);

        assert!(matches!(
            result,
            Err(Error::ResultCount {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn a_sent_batch_rejects_new_statements() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut batch = Batch::new();
        batch.mark_sent();

        let result = batch.queue(statement("a"), recording_sink("a", &log, false));

        assert!(matches!(result, Err(Error::BatchSent)));
        assert!(batch.is_empty());
    }
}
