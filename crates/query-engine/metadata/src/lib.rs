//! Domain types exchanged between the query engine and its callers.

pub mod metadata;
