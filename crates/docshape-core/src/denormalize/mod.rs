//! Builds the embedded models from Model R.
//!
//! Both strategies write the same documents. A person whose company cannot
//! be resolved is skipped and counted under [`DenormalizeReport::dangling`];
//! no document is ever written with a missing company.

pub mod in_memory;
pub mod streaming;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bson::oid::ObjectId;
use tracing::{info, warn};

use crate::loader::{LoadStats, SkippedRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenormalizeReport {
    pub target: &'static str,
    pub written: usize,
    /// Unresolvable company id -> number of persons skipped because of it.
    pub dangling: BTreeMap<ObjectId, usize>,
    pub rejected: Vec<SkippedRecord>,
    pub windows: usize,
    pub elapsed: Duration,
}

impl DenormalizeReport {
    pub fn dangling_persons(&self) -> usize {
        self.dangling.values().sum()
    }

    fn finish(stats: LoadStats, dangling: BTreeMap<ObjectId, usize>, started: Instant) -> Self {
        let report = Self {
            target: stats.collection,
            written: stats.inserted,
            dangling,
            rejected: stats.skipped,
            windows: stats.chunks,
            elapsed: started.elapsed(),
        };
        if !report.dangling.is_empty() {
            warn!(
                target_collection = report.target,
                persons = report.dangling_persons(),
                companies = report.dangling.len(),
                "skipped persons whose company does not exist"
            );
        }
        info!(
            target_collection = report.target,
            written = report.written,
            windows = report.windows,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "denormalized"
        );
        report
    }
}

fn batch_hint(window: usize) -> u32 {
    u32::try_from(window).unwrap_or(u32::MAX)
}
