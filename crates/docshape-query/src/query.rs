use serde::{Deserialize, Serialize};

use crate::filter::FilterGroup;
use crate::sort::Sort;

/// A cursor read. `batch_size` is a hint for how many documents the backend
/// fetches per round trip; it never changes the result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    pub filter: FilterGroup,
    pub sort: Vec<Sort>,
    pub take: Option<usize>,
    pub batch_size: Option<u32>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(filter: FilterGroup) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}
