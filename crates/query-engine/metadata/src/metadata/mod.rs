//! Exercise library records, search filters and pagination.

pub mod exercise;
pub mod page;

// re-export without modules
pub use exercise::*;
pub use page::*;
