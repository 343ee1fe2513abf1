//! Row shapes returned by the exercise statements.

use query_engine_execution::error::BoxError;
use query_engine_execution::postgres::PgRow;
use query_engine_metadata::metadata::Exercise;
use time::OffsetDateTime;
use uuid::Uuid;

/// One row of the aggregated exercise data.
#[derive(Debug, Clone)]
pub struct ExerciseRow {
    pub external_id: Uuid,
    pub name: String,
    pub category_code: String,
    pub description: Option<String>,
    pub instructions: Vec<String>,
    pub equipment_types: Vec<String>,
    pub primary_muscles: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A search result row: the exercise plus the number of matches overall.
#[derive(Debug, Clone)]
pub struct ExerciseResultRow {
    pub exercise: ExerciseRow,
    pub total_count: i64,
}

impl TryFrom<&PgRow> for ExerciseRow {
    type Error = BoxError;

    fn try_from(row: &PgRow) -> Result<Self, BoxError> {
        Ok(ExerciseRow {
            external_id: row.try_get("external_id")?,
            name: row.try_get("name")?,
            category_code: row.try_get("category_code")?,
            description: row.try_get("description")?,
            instructions: row.try_get("instructions")?,
            equipment_types: row.try_get("equipment_types")?,
            primary_muscles: row.try_get("primary_muscles")?,
            tags: row.try_get("tags")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<&PgRow> for ExerciseResultRow {
    type Error = BoxError;

    fn try_from(row: &PgRow) -> Result<Self, BoxError> {
        Ok(ExerciseResultRow {
            exercise: ExerciseRow::try_from(row)?,
            total_count: row.try_get("total_count")?,
        })
    }
}

impl From<ExerciseRow> for Exercise {
    fn from(row: ExerciseRow) -> Self {
        Exercise {
            id: row.external_id,
            name: row.name,
            category: row.category_code,
            description: row.description,
            instructions: row.instructions,
            equipment_types: row.equipment_types,
            primary_muscles: row.primary_muscles,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub fn decode_exercise(row: &PgRow) -> Result<Exercise, BoxError> {
    Ok(ExerciseRow::try_from(row)?.into())
}

pub fn decode_result_row(row: &PgRow) -> Result<(Exercise, i64), BoxError> {
    let row = ExerciseResultRow::try_from(row)?;
    Ok((row.exercise.into(), row.total_count))
}
