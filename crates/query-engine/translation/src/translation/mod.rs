//! Translate exercise library requests into parameterized SQL.

pub mod exercises;
