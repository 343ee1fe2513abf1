//! Build the SQL statements of the exercise library.

pub mod translation;
