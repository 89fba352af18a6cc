//! Generate-and-persist batcher.

use chrono::{NaiveDateTime, SubsecRound, Utc};
use persistence::{InsertOutcome, NamePoolProvider, PersistenceError, RecordStore};
use rand::Rng;
use roster_core::{ConfigError, NamePool, PlayerRecord, ValidationError};
use roster_gen::generate_player;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Batch size used when a request does not name one.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Number of leading records kept in a summary.
pub const PREVIEW_LEN: usize = 5;

/// How generated records reach the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// One insert per record; identities captured immediately.
    #[default]
    Single,
    /// Multi-row inserts of `batch_size` records.
    Bulk,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Input of [`Engine::generate_and_persist`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub count: usize,
    pub owner_id: i64,
    #[serde(default)]
    pub mode: InsertMode,
    /// Rows per flush; bulk mode only.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Overrides the engine's name source for this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pool: Option<NamePool>,
}

impl GenerationRequest {
    pub fn single(count: usize, owner_id: i64) -> Self {
        Self {
            count,
            owner_id,
            mode: InsertMode::Single,
            batch_size: DEFAULT_BATCH_SIZE,
            name_pool: None,
        }
    }

    pub fn bulk(count: usize, owner_id: i64, batch_size: usize) -> Self {
        Self {
            count,
            owner_id,
            mode: InsertMode::Bulk,
            batch_size,
            name_pool: None,
        }
    }

    pub fn with_name_pool(mut self, pool: NamePool) -> Self {
        self.name_pool = Some(pool);
        self
    }
}

/// A previewed record and the identity the store gave it, if known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreviewEntry {
    pub identity: Option<i64>,
    #[serde(flatten)]
    pub record: PlayerRecord,
}

/// Result of one generation call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub total_generated: usize,
    pub total_inserted: usize,
    /// The first [`PREVIEW_LEN`] generated records.
    pub preview: Vec<PreviewEntry>,
    /// Store identities, when the store reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_ids: Option<Vec<i64>>,
    pub mode: InsertMode,
}

impl GenerationSummary {
    fn new(mode: InsertMode) -> Self {
        Self {
            total_generated: 0,
            total_inserted: 0,
            preview: Vec::new(),
            inserted_ids: None,
            mode,
        }
    }

    /// Rows still missing relative to `requested`.
    pub fn shortfall(&self, requested: usize) -> usize {
        requested.saturating_sub(self.total_inserted)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A generated record failed validation. Earlier rows stay committed.
    #[error("generated record failed validation after {} rows: {source}", .partial.total_inserted)]
    Invalid {
        source: ValidationError,
        partial: Box<GenerationSummary>,
    },
    /// A write failed. Rows committed before it stay committed; `partial`
    /// describes them.
    #[error("persistence failed after {} of {requested} rows: {source}", .partial.total_inserted)]
    Persistence {
        source: PersistenceError,
        requested: usize,
        partial: Box<GenerationSummary>,
    },
}

impl GenerationError {
    /// Summary of the work done before the failure. `None` only when the
    /// call failed before generating anything.
    pub fn partial(&self) -> Option<&GenerationSummary> {
        match self {
            GenerationError::Persistence { partial, .. }
            | GenerationError::Invalid { partial, .. } => Some(partial),
            GenerationError::Config(_) => None,
        }
    }
}

/// Preview rows still waiting for an identity, oldest first.
///
/// The preview holds the first rows of the call, so a row's generation index
/// is also its preview slot. Flushes cover consecutive row ranges; each one
/// settles every queued row that falls inside its range.
#[derive(Debug, Default)]
struct PendingIdentities {
    queue: VecDeque<usize>,
    next_row: usize,
}

impl PendingIdentities {
    fn push(&mut self, row: usize) {
        self.queue.push_back(row);
    }

    /// Settle the rows of a flush of `batch_len` rows. With `ids`, queued
    /// rows receive the identity at their offset in the batch; without, they
    /// are dropped and keep `None`.
    fn settle(&mut self, batch_len: usize, ids: Option<&[i64]>, preview: &mut [PreviewEntry]) {
        let start = self.next_row;
        let end = start + batch_len;
        while let Some(&row) = self.queue.front() {
            if row >= end {
                break;
            }
            self.queue.pop_front();
            let id = ids.and_then(|ids| ids.get(row - start)).copied();
            if let Some(entry) = preview.get_mut(row) {
                entry.identity = id;
            }
        }
        self.next_row = end;
    }
}

/// Generation engine over a record store, a name source and a random source.
pub struct Engine<S, P, R> {
    store: S,
    names: P,
    rng: R,
}

impl<S, P, R> Engine<S, P, R>
where
    S: RecordStore,
    P: NamePoolProvider,
    R: Rng,
{
    pub fn new(store: S, names: P, rng: R) -> Self {
        Self { store, names, rng }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (S, P, R) {
        (self.store, self.names, self.rng)
    }

    /// Generate `request.count` players and write them to the store.
    ///
    /// The name pool is resolved before anything is generated, so a
    /// configuration error never leaves partial work behind. A failing
    /// write stops the call; see [`GenerationError::Persistence`].
    pub fn generate_and_persist(
        &mut self,
        request: &GenerationRequest,
    ) -> Result<GenerationSummary, GenerationError> {
        if request.mode == InsertMode::Bulk && request.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize.into());
        }
        let loaded;
        let pool = match &request.name_pool {
            Some(pool) => pool,
            None => {
                loaded = self.names.load()?;
                &loaded
            }
        };
        info!(
            count = request.count,
            owner_id = request.owner_id,
            mode = ?request.mode,
            "generating players"
        );

        let summary = match request.mode {
            InsertMode::Single => self.run_single(request, pool)?,
            InsertMode::Bulk => self.run_bulk(request, pool)?,
        };
        info!(
            generated = summary.total_generated,
            inserted = summary.total_inserted,
            "generation finished"
        );
        Ok(summary)
    }

    fn generate(
        &mut self,
        owner_id: i64,
        pool: &NamePool,
    ) -> Result<PlayerRecord, ValidationError> {
        let player = generate_player(owner_id, pool, &mut self.rng, now())?;
        trace!(name = %player.name, grade = %player.overall_grade, "player generated");
        Ok(player)
    }

    fn run_single(
        &mut self,
        request: &GenerationRequest,
        pool: &NamePool,
    ) -> Result<GenerationSummary, GenerationError> {
        let mut summary = GenerationSummary::new(InsertMode::Single);
        let mut ids = Vec::with_capacity(request.count);
        for _ in 0..request.count {
            let record = match self.generate(request.owner_id, pool) {
                Ok(record) => record,
                Err(source) => {
                    summary.inserted_ids = Some(ids);
                    return Err(rejected(source, summary));
                }
            };
            summary.total_generated += 1;
            let id = match self.store.insert_one(&record) {
                Ok(id) => id,
                Err(source) => {
                    summary.inserted_ids = Some(ids);
                    return Err(failure(source, request, summary));
                }
            };
            summary.total_inserted += 1;
            ids.push(id);
            if summary.preview.len() < PREVIEW_LEN {
                summary.preview.push(PreviewEntry {
                    identity: Some(id),
                    record,
                });
            }
        }
        summary.inserted_ids = Some(ids);
        Ok(summary)
    }

    fn run_bulk(
        &mut self,
        request: &GenerationRequest,
        pool: &NamePool,
    ) -> Result<GenerationSummary, GenerationError> {
        let mut summary = GenerationSummary::new(InsertMode::Bulk);
        let mut pending = PendingIdentities::default();
        let mut batch = Vec::with_capacity(request.batch_size.min(request.count));
        for row in 0..request.count {
            let record = match self.generate(request.owner_id, pool) {
                Ok(record) => record,
                Err(source) => return Err(rejected(source, summary)),
            };
            summary.total_generated += 1;
            if summary.preview.len() < PREVIEW_LEN {
                pending.push(row);
                summary.preview.push(PreviewEntry {
                    identity: None,
                    record: record.clone(),
                });
            }
            batch.push(record);
            if batch.len() >= request.batch_size {
                if let Err(source) = self.flush(&mut batch, &mut pending, &mut summary) {
                    return Err(failure(source, request, summary));
                }
            }
        }
        if !batch.is_empty() {
            if let Err(source) = self.flush(&mut batch, &mut pending, &mut summary) {
                return Err(failure(source, request, summary));
            }
        }
        Ok(summary)
    }

    fn flush(
        &mut self,
        batch: &mut Vec<PlayerRecord>,
        pending: &mut PendingIdentities,
        summary: &mut GenerationSummary,
    ) -> Result<(), PersistenceError> {
        let rows = batch.len();
        match self.store.insert_many(batch)? {
            InsertOutcome::Ids(ids) => {
                if ids.len() != rows {
                    warn!(rows, returned = ids.len(), "store returned a mismatched identity count");
                }
                summary.total_inserted += ids.len();
                pending.settle(rows, Some(ids.as_slice()), &mut summary.preview);
                summary.inserted_ids.get_or_insert_with(Vec::new).extend(ids);
            }
            InsertOutcome::Affected(n) => {
                summary.total_inserted += usize::try_from(n).unwrap_or(rows);
                pending.settle(rows, None, &mut summary.preview);
            }
        }
        debug!(rows, total_inserted = summary.total_inserted, "batch flushed");
        batch.clear();
        Ok(())
    }
}

fn failure(
    source: PersistenceError,
    request: &GenerationRequest,
    partial: GenerationSummary,
) -> GenerationError {
    warn!(
        error = %source,
        inserted = partial.total_inserted,
        requested = request.count,
        "aborting generation; committed rows are kept"
    );
    GenerationError::Persistence {
        source,
        requested: request.count,
        partial: Box::new(partial),
    }
}

fn rejected(source: ValidationError, partial: GenerationSummary) -> GenerationError {
    warn!(
        error = %source,
        inserted = partial.total_inserted,
        "aborting generation on an invalid record; committed rows are kept"
    );
    GenerationError::Invalid {
        source,
        partial: Box::new(partial),
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}
