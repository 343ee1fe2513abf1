//! Exercise library records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A standardized training movement from the exercise library. Library
/// exercises are static templates that users browse and clone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub instructions: Vec<String>,
    pub equipment_types: Vec<String>,
    pub primary_muscles: Vec<String>,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Search criteria for the exercise library.
///
/// Every field is optional and `None` means "no constraint". A present field
/// always constrains the result, so `Some(vec![])` for a list field matches
/// nothing rather than everything.
///
/// List fields use set-overlap semantics: an exercise matches when it shares
/// at least one element with the list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseFilter {
    /// Case-insensitive substring of the exercise name.
    pub name: Option<String>,
    /// Exact category code.
    pub category: Option<String>,
    pub equipment_types: Option<Vec<String>>,
    pub primary_muscles: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

impl ExerciseFilter {
    pub fn is_empty(&self) -> bool {
        self == &ExerciseFilter::default()
    }
}

/// The data needed to add an exercise to the library.
///
/// Category, equipment, muscle and tag values are codes of existing lookup
/// rows; an unknown code makes the insert fail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExercise {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub equipment_types: Vec<String>,
    #[serde(default)]
    pub primary_muscles: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}
