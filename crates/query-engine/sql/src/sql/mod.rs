//! Low-level SQL strings, bound parameters and small text helpers.

pub mod helpers;
pub mod string;
