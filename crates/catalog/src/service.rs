//! List, fetch and create library exercises.

use query_engine_execution::error::Error as ExecutionError;
use query_engine_execution::execution::{run_batch, run_batch_in_transaction};
use query_engine_execution::health::{status_check, HealthCheckError};
use query_engine_execution::postgres::{PgContext, PgQuery, PostgresPool};
use query_engine_execution::typed_query::Slot;
use query_engine_metadata::metadata::{Exercise, ExerciseFilter, NewExercise, Page};
use query_engine_translation::translation::exercises::{
    exercise_by_id_query, exercises_query, insert_exercise_query, link_query, Link,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;
use crate::rows::{decode_exercise, decode_result_row};

/// One page of search results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExercisePage {
    pub exercises: Vec<Exercise>,
    /// Matches over all pages.
    pub total: i64,
}

#[derive(Clone, Debug)]
pub struct ExerciseService {
    pool: PostgresPool,
}

impl ExerciseService {
    pub fn new(pool: PostgresPool) -> Self {
        ExerciseService { pool }
    }

    pub fn pool(&self) -> &PostgresPool {
        &self.pool
    }

    /// Search the library. An empty page reports a total of zero.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn exercises(
        &self,
        ctx: &PgContext,
        filter: &ExerciseFilter,
        page: Page,
    ) -> Result<ExercisePage, Error> {
        let (sql, args) = exercises_query(filter, page);
        let query = PgQuery::<(Exercise, i64)>::many(sql, args, decode_result_row);
        let rows = Slot::new();

        run_batch(ctx, &self.pool, |_, batch| query.queue_many(batch, &rows)).await?;

        let rows = rows.take().unwrap_or_default();
        let total = rows.first().map_or(0, |(_, total)| *total);
        Ok(ExercisePage {
            exercises: rows.into_iter().map(|(exercise, _)| exercise).collect(),
            total,
        })
    }

    pub async fn exercise(&self, ctx: &PgContext, id: Uuid) -> Result<Exercise, Error> {
        let (sql, args) = exercise_by_id_query(id);
        let query = PgQuery::<Exercise>::one(sql, args, decode_exercise);
        let exercise = Slot::new();

        run_batch(ctx, &self.pool, |_, batch| query.queue(batch, &exercise))
            .await
            .map_err(|error| match error.root() {
                ExecutionError::NoRows => Error::NotFound(id),
                _ => Error::from(error),
            })?;

        exercise.take().ok_or(Error::NotFound(id))
    }

    /// Insert an exercise with its links and read it back, all in one round
    /// trip. Runs inside the transaction carried by `ctx` if there is one.
    ///
    /// Every code must name an existing lookup row, otherwise nothing is
    /// inserted and [`Error::UnknownCode`] names the first offender.
    #[tracing::instrument(skip_all, fields(name = %exercise.name))]
    pub async fn create_exercise(
        &self,
        ctx: &PgContext,
        exercise: &NewExercise,
    ) -> Result<Exercise, Error> {
        let id = Uuid::new_v4();
        let statements = create_statements(id, exercise);
        let (sql, args) = exercise_by_id_query(id);
        let select = PgQuery::<Exercise>::one(sql, args, decode_exercise);
        let created = Slot::new();

        run_batch_in_transaction(ctx, &self.pool, |_, batch| {
            for (_, _, query) in &statements {
                query.queue_exec(batch)?;
            }
            select.queue(batch, &created)
        })
        .await
        .map_err(|error| unknown_code(&statements, error))?;

        created.take().ok_or(Error::NotFound(id))
    }

    pub async fn status_check(&self, ctx: &PgContext) -> Result<(), HealthCheckError> {
        status_check(ctx, &self.pool).await
    }
}

/// The statements that create an exercise, each with the lookup kind and code
/// that make it insert nothing when unknown.
fn create_statements(id: Uuid, exercise: &NewExercise) -> Vec<(&'static str, String, PgQuery<()>)> {
    let (sql, args) = insert_exercise_query(id, exercise);
    let mut statements = vec![(
        "category",
        exercise.category.clone(),
        PgQuery::<()>::exec_one_row(sql, args),
    )];

    let links = [
        ("equipment type", Link::EquipmentType, &exercise.equipment_types),
        ("primary muscle", Link::PrimaryMuscle, &exercise.primary_muscles),
        ("tag", Link::Tag, &exercise.tags),
    ];
    for (kind, link, codes) in links {
        let mut seen: Vec<&String> = vec![];
        for code in codes {
            // a repeated link would violate the primary key
            if seen.contains(&code) {
                continue;
            }
            seen.push(code);
            let (sql, args) = link_query(link, id, code);
            statements.push((kind, code.clone(), PgQuery::<()>::exec_one_row(sql, args)));
        }
    }

    statements
}

/// Translate a statement that affected no rows into the code it was about.
fn unknown_code(statements: &[(&'static str, String, PgQuery<()>)], error: ExecutionError) -> Error {
    if let ExecutionError::Statement { index, source } = &error {
        if let (ExecutionError::RowsAffected(0), Some((kind, code, _))) =
            (source.as_ref(), statements.get(*index))
        {
            return Error::UnknownCode {
                kind,
                code: code.clone(),
            };
        }
    }
    Error::Execution(error)
}
