//! SQL text and parameter representation shared by the query engine crates.

pub mod sql;
