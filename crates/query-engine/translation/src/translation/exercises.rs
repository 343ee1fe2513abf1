//! Statements over the exercise library.
//!
//! The search query is assembled from a sparse [`ExerciseFilter`]: each present
//! field contributes one `AND`-ed predicate and absent fields contribute
//! nothing. Array fields are matched with the `&&` (overlap) operator. Every
//! row carries a `total_count` window column so callers can report the number
//! of matches without a second round trip; the count is computed per fetch.

use query_engine_metadata::metadata::{ExerciseFilter, NewExercise, Page};
use query_engine_sql::sql::string::NamedArgs;
use uuid::Uuid;

/// One row per exercise with its lookup codes aggregated into sorted arrays.
const EXERCISE_DATA: &str = "
    SELECT
        e.external_id,
        e.name,
        c.code AS category_code,
        e.description,
        e.instructions,
        COALESCE(
            ARRAY_AGG(DISTINCT et.code) FILTER (WHERE et.code IS NOT NULL),
            ARRAY[]::text[]
        ) AS equipment_types,
        COALESCE(
            ARRAY_AGG(DISTINCT pm.code) FILTER (WHERE pm.code IS NOT NULL),
            ARRAY[]::text[]
        ) AS primary_muscles,
        COALESCE(
            ARRAY_AGG(DISTINCT tag.code) FILTER (WHERE tag.code IS NOT NULL),
            ARRAY[]::text[]
        ) AS tags,
        e.created_at,
        e.updated_at
    FROM repbatch.exercises e
    LEFT JOIN repbatch.exercise_categories c ON e.category_id = c.id
    LEFT JOIN repbatch.exercise_equipment ee ON e.id = ee.exercise_id
    LEFT JOIN repbatch.equipment_types et ON ee.equipment_type_id = et.id
    LEFT JOIN repbatch.exercise_primary_muscles epm ON e.id = epm.exercise_id
    LEFT JOIN repbatch.primary_muscles pm ON epm.primary_muscle_id = pm.id
    LEFT JOIN repbatch.exercise_exercise_tags eet ON e.id = eet.exercise_id
    LEFT JOIN repbatch.exercise_tags tag ON eet.exercise_tag_id = tag.id
    GROUP BY e.id, c.code";

/// Natural sort on the name, with the external id breaking ties so that
/// pages never overlap.
const ORDER_BY: &str = "
    ORDER BY exercise_data.name COLLATE repbatch.natsort, exercise_data.external_id";

/// Build the paginated search over the exercise library.
///
/// The statement uses named placeholders; the returned arguments hold exactly
/// the names the statement mentions.
pub fn exercises_query(filter: &ExerciseFilter, page: Page) -> (String, NamedArgs) {
    let mut sql = String::from("SELECT *, COUNT(*) OVER() AS total_count FROM (");
    sql.push_str(EXERCISE_DATA);
    sql.push_str("\n) AS exercise_data");

    let mut args = NamedArgs::new();
    let predicates = filter_predicates(filter, &mut args);

    if !predicates.is_empty() {
        sql.push_str("\nWHERE ");
        sql.push_str(&predicates.join("\n    AND "));
    }

    sql.push_str(ORDER_BY);
    sql.push_str("\nLIMIT @limit OFFSET @offset");

    args.insert("limit", page.limit());
    args.insert("offset", page.offset());

    (sql, args)
}

/// One predicate per present filter field, in a fixed order.
fn filter_predicates(filter: &ExerciseFilter, args: &mut NamedArgs) -> Vec<&'static str> {
    let mut predicates = vec![];

    if let Some(name) = &filter.name {
        predicates.push("exercise_data.name ILIKE @name");
        args.insert("name", format!("%{name}%"));
    }

    if let Some(category) = &filter.category {
        predicates.push("exercise_data.category_code = @category");
        args.insert("category", category.as_str());
    }

    if let Some(equipment_types) = &filter.equipment_types {
        predicates.push("exercise_data.equipment_types && @equipmentTypes");
        args.insert("equipmentTypes", equipment_types.as_slice());
    }

    if let Some(primary_muscles) = &filter.primary_muscles {
        predicates.push("exercise_data.primary_muscles && @primaryMuscles");
        args.insert("primaryMuscles", primary_muscles.as_slice());
    }

    if let Some(tags) = &filter.tags {
        predicates.push("exercise_data.tags && @tags");
        args.insert("tags", tags.as_slice());
    }

    predicates
}

/// Select a single exercise by its external id.
pub fn exercise_by_id_query(id: Uuid) -> (String, NamedArgs) {
    let mut sql = String::from("SELECT * FROM (");
    sql.push_str(EXERCISE_DATA);
    sql.push_str("\n) AS exercise_data\nWHERE exercise_data.external_id = @id");

    (sql, NamedArgs::from([("id", id)]))
}

/// Insert the exercise row itself. The category is resolved by code inside the
/// statement, so an unknown category inserts nothing.
pub fn insert_exercise_query(id: Uuid, exercise: &NewExercise) -> (String, NamedArgs) {
    let sql = "
        INSERT INTO repbatch.exercises (external_id, name, category_id, description, instructions)
        SELECT @id, @name, c.id, @description, @instructions
        FROM repbatch.exercise_categories c
        WHERE c.code = @category";

    let mut args = NamedArgs::new();
    args.insert("id", id);
    args.insert("name", exercise.name.as_str());
    args.insert("category", exercise.category.as_str());
    args.insert("description", exercise.description.clone());
    args.insert("instructions", exercise.instructions.as_slice());

    (sql.to_string(), args)
}

/// The lookup tables an exercise is linked to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    EquipmentType,
    PrimaryMuscle,
    Tag,
}

impl Link {
    /// (link table, link column, lookup table)
    fn tables(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Link::EquipmentType => (
                "repbatch.exercise_equipment",
                "equipment_type_id",
                "repbatch.equipment_types",
            ),
            Link::PrimaryMuscle => (
                "repbatch.exercise_primary_muscles",
                "primary_muscle_id",
                "repbatch.primary_muscles",
            ),
            Link::Tag => (
                "repbatch.exercise_exercise_tags",
                "exercise_tag_id",
                "repbatch.exercise_tags",
            ),
        }
    }
}

/// Link an exercise to one lookup row by code. An unknown code inserts nothing.
pub fn link_query(link: Link, id: Uuid, code: &str) -> (String, NamedArgs) {
    let (link_table, link_column, lookup_table) = link.tables();
    let sql = format!(
        "
        INSERT INTO {link_table} (exercise_id, {link_column})
        SELECT e.id, l.id
        FROM repbatch.exercises e, {lookup_table} l
        WHERE e.external_id = @id AND l.code = @code"
    );

    let mut args = NamedArgs::new();
    args.insert("id", id);
    args.insert("code", code);

    (sql, args)
}
