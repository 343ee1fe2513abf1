use std::fmt;
use std::sync::{Arc, Mutex};

use query_engine_execution::driver::{Statement, StatementKind, StatementOutcome};
use query_engine_execution::error::BoxError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Id, Record};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

pub use tests_common::recording::{Event, RecordingPool, Row};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub category: String,
}

pub fn exercise(row: &Row) -> Result<Exercise, BoxError> {
    Ok(serde_json::from_value(row.clone())?)
}

pub fn count(row: &Row) -> Result<i64, BoxError> {
    row.get("count")
        .and_then(Value::as_i64)
        .ok_or_else(|| "column \"count\" is not an integer".into())
}

pub fn exercise_row(name: &str, category: &str) -> Row {
    json!({ "name": name, "category": category })
}

/// Answers by statement text:
/// - `SELECT exercises` returns two exercises
/// - `SELECT one` returns a single exercise
/// - `SELECT count` returns `{"count": 2}`
/// - `SELECT broken` returns a row no decoder accepts
/// - `FAIL` is rejected by the server
/// - any exec statement affects as many rows as its first parameter says, or one
pub fn scripted_pool() -> RecordingPool {
    RecordingPool::new(respond)
}

pub fn respond(statement: &Statement) -> Result<StatementOutcome<Row>, BoxError> {
    if statement.sql.sql == "FAIL" {
        return Err("syntax error at or near \"FAIL\"".into());
    }
    if statement.kind == StatementKind::Exec {
        let affected = match statement.sql.params.first() {
            Some(query_engine_sql::sql::string::Param::Int(n)) => u64::try_from(*n)?,
            _ => 1,
        };
        return Ok(StatementOutcome::affected(affected));
    }
    match statement.sql.sql.as_str() {
        "SELECT exercises" => Ok(StatementOutcome::rows(vec![
            exercise_row("Air Squat", "strength"),
            exercise_row("Rowing", "cardio"),
        ])),
        "SELECT one" => Ok(StatementOutcome::rows(vec![exercise_row(
            "Air Squat", "strength",
        )])),
        "SELECT count" => Ok(StatementOutcome::rows(vec![json!({ "count": 2 })])),
        "SELECT broken" => Ok(StatementOutcome::rows(vec![json!({ "oops": true })])),
        other => Err(format!("unexpected statement: {other}").into()),
    }
}

/// Collects the fields recorded on spans after they were created, as
/// `(span name, "field=value")`.
#[derive(Clone, Default)]
pub struct SpanRecorder(Arc<Mutex<Vec<(&'static str, String)>>>);

impl SpanRecorder {
    pub fn recorded(&self) -> Vec<(&'static str, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl<S> Layer<S> for SpanRecorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = FieldText::default();
        values.record(&mut fields);
        self.0.lock().unwrap().push((span.name(), fields.0));
    }
}

#[derive(Default)]
struct FieldText(String);

impl Visit for FieldText {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.push_str(&format!("{}={value:?}", field.name()));
    }
}
