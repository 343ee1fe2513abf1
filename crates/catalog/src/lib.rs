//! The exercise library, read and written through batched queries.

pub mod error;
pub mod rows;
pub mod service;

pub use error::Error;
pub use service::{ExercisePage, ExerciseService};
