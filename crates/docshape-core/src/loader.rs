//! Chunked, partial-success bulk loading with optional id backfill.

use std::time::{Duration, Instant};

use bson::Bson;
use bson::oid::ObjectId;
use docshape_store::{Collection, Schema, Store, WriteFailureKind};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::model::Indexed;

/// What the loader hands back besides counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backfill {
    #[default]
    None,
    /// Store-assigned ids of the inserted records, in insertion order.
    Ids,
    /// Ids plus the inserted records themselves, for in-memory joins.
    Records,
}

/// A record the store rejected. `index` is its position in the whole input
/// stream, not within its chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub index: usize,
    pub kind: WriteFailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadStats {
    pub collection: &'static str,
    pub inserted: usize,
    pub skipped: Vec<SkippedRecord>,
    pub chunks: usize,
    pub elapsed: Duration,
}

impl LoadStats {
    pub fn submitted(&self) -> usize {
        self.inserted + self.skipped.len()
    }
}

#[derive(Debug, Clone)]
pub struct LoadReport<T> {
    pub stats: LoadStats,
    /// Filled for `Backfill::Ids` and `Backfill::Records`.
    pub ids: Vec<ObjectId>,
    /// Filled for `Backfill::Records`; the caller drains it.
    pub retained: Vec<(ObjectId, T)>,
}

pub struct BulkLoader<'s, S: ?Sized, M> {
    collection: Collection<'s, S, M>,
    chunk_size: usize,
    backfill: Backfill,
}

impl<'s, S: Store + ?Sized, M: Indexed> BulkLoader<'s, S, M> {
    pub fn new(store: &'s S, chunk_size: usize) -> Self {
        Self {
            collection: Collection::new(store),
            chunk_size: chunk_size.max(1),
            backfill: Backfill::None,
        }
    }

    pub fn backfill(mut self, backfill: Backfill) -> Self {
        self.backfill = backfill;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Creates the collection's indexes and opens a session for
    /// caller-driven chunks.
    pub fn begin(&self, expected_chunks: usize) -> Result<LoadSession<'_, 's, S, M>, Error> {
        self.collection.create_indexes(&M::indexes())?;
        debug!(collection = M::NAME, "indexes ready");
        Ok(LoadSession {
            loader: self,
            report: LoadReport {
                stats: LoadStats {
                    collection: M::NAME,
                    ..LoadStats::default()
                },
                ids: Vec::new(),
                retained: Vec::new(),
            },
            offset: 0,
            expected_chunks,
            started: Instant::now(),
        })
    }

    /// Generates and inserts `total` records one chunk at a time; at most one
    /// chunk is alive at once.
    pub fn load_generated<F>(
        &self,
        total: usize,
        mut generate: F,
    ) -> Result<LoadReport<M::Insert>, Error>
    where
        F: FnMut(usize) -> Vec<M::Insert>,
    {
        let mut session = self.begin(total.div_ceil(self.chunk_size))?;
        let mut remaining = total;
        while remaining > 0 {
            let count = remaining.min(self.chunk_size);
            session.insert_chunk(generate(count))?;
            remaining -= count;
        }
        Ok(session.finish())
    }

    /// Slices `records` into chunks and inserts them in order.
    pub fn load_from<I>(&self, records: I) -> Result<LoadReport<M::Insert>, Error>
    where
        I: IntoIterator<Item = M::Insert>,
    {
        let mut records = records.into_iter();
        let mut session = self.begin(records.size_hint().0.div_ceil(self.chunk_size))?;
        loop {
            let chunk: Vec<M::Insert> = records.by_ref().take(self.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            session.insert_chunk(chunk)?;
        }
        Ok(session.finish())
    }
}

pub struct LoadSession<'l, 's, S: ?Sized, M: Schema> {
    loader: &'l BulkLoader<'s, S, M>,
    report: LoadReport<M::Insert>,
    offset: usize,
    expected_chunks: usize,
    started: Instant,
}

fn object_id(id: &Bson) -> Result<ObjectId, Error> {
    id.as_object_id()
        .ok_or_else(|| Error::Decode(format!("expected an ObjectId _id, got {id}")))
}

impl<S: Store + ?Sized, M: Indexed> LoadSession<'_, '_, S, M> {
    /// Inserts one chunk. Duplicate and validation rejections are recorded;
    /// any other store error aborts the load.
    pub fn insert_chunk(&mut self, chunk: Vec<M::Insert>) -> Result<(), Error> {
        if chunk.is_empty() {
            return Ok(());
        }
        let len = chunk.len();
        let result = self.loader.collection.insert_many(&chunk)?;
        let stats = &mut self.report.stats;
        stats.chunks += 1;
        stats.inserted += result.inserted_count();

        if !result.failures.is_empty() {
            warn!(
                collection = M::NAME,
                chunk = stats.chunks,
                rejected = result.failures.len(),
                "records rejected"
            );
        }
        for failure in result.failures {
            debug!(
                collection = M::NAME,
                index = self.offset + failure.index,
                kind = ?failure.kind,
                message = %failure.message,
                "record skipped"
            );
            stats.skipped.push(SkippedRecord {
                index: self.offset + failure.index,
                kind: failure.kind,
                message: failure.message,
            });
        }

        match self.loader.backfill {
            Backfill::None => {}
            Backfill::Ids => {
                for (_, id) in &result.inserted_ids {
                    self.report.ids.push(object_id(id)?);
                }
            }
            Backfill::Records => {
                let mut slots: Vec<Option<M::Insert>> = chunk.into_iter().map(Some).collect();
                for (position, id) in &result.inserted_ids {
                    let id = object_id(id)?;
                    self.report.ids.push(id);
                    if let Some(record) = slots.get_mut(*position).and_then(Option::take) {
                        self.report.retained.push((id, record));
                    }
                }
            }
        }

        self.offset += len;
        debug!(
            collection = M::NAME,
            chunk = self.report.stats.chunks,
            of = self.expected_chunks,
            inserted = self.report.stats.inserted,
            skipped = self.report.stats.skipped.len(),
            "chunk loaded"
        );
        Ok(())
    }

    pub fn finish(mut self) -> LoadReport<M::Insert> {
        self.report.stats.elapsed = self.started.elapsed();
        let stats = &self.report.stats;
        info!(
            collection = stats.collection,
            inserted = stats.inserted,
            skipped = stats.skipped.len(),
            chunks = stats.chunks,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "load finished"
        );
        self.report
    }
}
