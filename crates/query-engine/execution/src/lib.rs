//! Typed, batched query execution against a PostgreSQL-compatible database.
//!
//! Statements are described by [`typed_query::TypedQuery`] values, queued
//! onto a [`batch::Batch`] together with the [`typed_query::Slot`] that will
//! receive their decoded result, and sent in one round trip by the runners in
//! [`execution`]. Transactions travel with a [`context::Context`] so nested
//! callers reuse the outermost transaction instead of opening their own.

pub mod batch;
pub mod context;
pub mod driver;
pub mod error;
pub mod execution;
pub mod health;
pub mod pool;
pub mod postgres;
pub mod typed_query;
