//! Picks the denormalization strategy and sizes every chunk and window.
//!
//! Chunk sizes grow with the record count and shrink with the estimated
//! record size, so the bytes held per chunk stay under a fixed budget.

use std::fmt;

use tracing::{info, warn};

use crate::error::Error;

/// Estimated serialized sizes, in bytes.
pub const COMPANY_BYTES: usize = 192;
pub const PERSON_BYTES: usize = 128;
pub const EMBEDDED_PERSON_BYTES: usize = 320;
pub const EMPLOYEE_BYTES: usize = 112;

/// Largest document the store accepts.
pub const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    InMemory,
    Streaming,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::InMemory => write!(f, "in-memory"),
            Strategy::Streaming => write!(f, "streaming"),
        }
    }
}

/// Volumes above which the streaming strategy is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub companies: usize,
    pub persons: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            companies: 10_000,
            persons: 100_000,
        }
    }
}

impl Thresholds {
    pub fn strategy(&self, companies: usize, persons: usize) -> Strategy {
        if companies > self.companies || persons > self.persons {
            Strategy::Streaming
        } else {
            Strategy::InMemory
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizing {
    /// Bytes one chunk may hold.
    pub budget_bytes: usize,
    pub max_chunk: usize,
}

impl Default for BatchSizing {
    fn default() -> Self {
        Self {
            budget_bytes: 16 * 1024 * 1024,
            max_chunk: 50_000,
        }
    }
}

impl BatchSizing {
    /// `clamp(min(total / divisor, budget / record_bytes), 1, max_chunk)`.
    pub fn chunk(&self, total: usize, divisor: usize, record_bytes: usize) -> usize {
        let by_volume = total / divisor.max(1);
        let by_budget = self.budget_bytes / record_bytes.max(1);
        by_volume.min(by_budget).clamp(1, self.max_chunk.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub companies: usize,
    pub persons: usize,
    pub persons_embedded: usize,
    pub companies_embedded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopulationConfig {
    pub companies: usize,
    pub persons: usize,
    pub thresholds: Thresholds,
    pub sizing: BatchSizing,
    /// Forces a strategy instead of deriving it from the thresholds.
    pub strategy: Option<Strategy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationPlan {
    pub companies: usize,
    pub persons: usize,
    pub strategy: Strategy,
    pub chunks: ChunkPlan,
}

struct Divisors {
    companies: usize,
    persons: usize,
    persons_embedded: usize,
    companies_embedded: usize,
}

impl Strategy {
    fn divisors(self) -> Divisors {
        match self {
            Strategy::InMemory => Divisors {
                companies: 1,
                persons: 1,
                persons_embedded: 1,
                companies_embedded: 10,
            },
            Strategy::Streaming => Divisors {
                companies: 100,
                persons: 1000,
                persons_embedded: 40,
                companies_embedded: 100,
            },
        }
    }
}

impl PopulationPlan {
    pub fn new(config: &PopulationConfig) -> Result<Self, Error> {
        if config.persons > 0 && config.companies == 0 {
            return Err(Error::Config(format!(
                "cannot generate {} persons without any company to reference",
                config.persons
            )));
        }

        let strategy = config
            .strategy
            .unwrap_or_else(|| config.thresholds.strategy(config.companies, config.persons));
        let divisors = strategy.divisors();
        let sizing = config.sizing;

        let avg_employees = config.persons.div_ceil(config.companies.max(1));
        let company_doc_bytes =
            COMPANY_BYTES.saturating_add(avg_employees.saturating_mul(EMPLOYEE_BYTES));
        if company_doc_bytes > MAX_DOCUMENT_BYTES {
            warn!(
                estimated_bytes = company_doc_bytes,
                limit = MAX_DOCUMENT_BYTES,
                avg_employees,
                "embedded company documents may exceed the document size limit"
            );
        }

        let chunks = ChunkPlan {
            companies: sizing.chunk(config.companies, divisors.companies, COMPANY_BYTES),
            persons: sizing.chunk(config.persons, divisors.persons, PERSON_BYTES),
            persons_embedded: sizing.chunk(
                config.persons,
                divisors.persons_embedded,
                EMBEDDED_PERSON_BYTES,
            ),
            companies_embedded: sizing.chunk(
                config.companies,
                divisors.companies_embedded,
                company_doc_bytes,
            ),
        };

        let plan = Self {
            companies: config.companies,
            persons: config.persons,
            strategy,
            chunks,
        };
        info!(
            companies = plan.companies,
            persons = plan.persons,
            strategy = %plan.strategy,
            company_chunk = chunks.companies,
            person_chunk = chunks.persons,
            persons_embedded_window = chunks.persons_embedded,
            companies_embedded_window = chunks.companies_embedded,
            "population planned"
        );
        Ok(plan)
    }
}
