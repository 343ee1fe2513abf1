//! Pagination.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// A 1-indexed page of results. Both fields are positive by construction;
/// raw input is validated by whoever builds the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub size: NonZeroU32,
    pub number: NonZeroU32,
}

impl Page {
    pub fn new(size: NonZeroU32, number: NonZeroU32) -> Self {
        Page { size, number }
    }

    /// The first page holding `size` rows.
    pub fn first(size: NonZeroU32) -> Self {
        Page {
            size,
            number: NonZeroU32::MIN,
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size.get())
    }

    /// `(number - 1) * size`, saturating at `i64::MAX`.
    pub fn offset(&self) -> i64 {
        (i64::from(self.number.get()) - 1).saturating_mul(i64::from(self.size.get()))
    }
}
