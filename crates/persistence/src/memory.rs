use crate::{IdentityReturn, InsertOutcome, PersistenceError, RecordStore};
use roster_core::PlayerRecord;
use tracing::debug;

/// In-memory [`RecordStore`] with sequential identities.
///
/// Used for dry runs and to exercise partial-completion paths: a store built
/// with `fail_flush_after(n)` accepts `n` multi-row inserts and rejects the
/// next one.
#[derive(Debug)]
pub struct MemoryStore {
    rows: Vec<(i64, PlayerRecord)>,
    next_id: i64,
    identities: IdentityReturn,
    fail_insert_after: Option<usize>,
    fail_flush_after: Option<usize>,
    inserts: usize,
    flushes: usize,
}

impl MemoryStore {
    pub fn new(identities: IdentityReturn) -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
            identities,
            fail_insert_after: None,
            fail_flush_after: None,
            inserts: 0,
            flushes: 0,
        }
    }

    /// Reject every single-row insert after the first `n`.
    pub fn fail_insert_after(mut self, n: usize) -> Self {
        self.fail_insert_after = Some(n);
        self
    }

    /// Reject every multi-row insert after the first `n`.
    pub fn fail_flush_after(mut self, n: usize) -> Self {
        self.fail_flush_after = Some(n);
        self
    }

    /// Committed rows with their identities, in insertion order.
    pub fn rows(&self) -> &[(i64, PlayerRecord)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of accepted multi-row inserts.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    fn push(&mut self, record: &PlayerRecord) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push((id, record.clone()));
        id
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(IdentityReturn::default())
    }
}

impl RecordStore for MemoryStore {
    fn insert_one(&mut self, record: &PlayerRecord) -> Result<i64, PersistenceError> {
        if self.fail_insert_after.is_some_and(|n| self.inserts >= n) {
            return Err(PersistenceError::Rejected(format!(
                "insert #{} refused",
                self.inserts + 1
            )));
        }
        self.inserts += 1;
        Ok(self.push(record))
    }

    fn insert_many(&mut self, records: &[PlayerRecord]) -> Result<InsertOutcome, PersistenceError> {
        if self.fail_flush_after.is_some_and(|n| self.flushes >= n) {
            return Err(PersistenceError::Rejected(format!(
                "flush #{} refused",
                self.flushes + 1
            )));
        }
        self.flushes += 1;
        let ids: Vec<i64> = records.iter().map(|r| self.push(r)).collect();
        debug!(rows = ids.len(), flush = self.flushes, "memory flush");
        Ok(match self.identities {
            IdentityReturn::Ids => InsertOutcome::Ids(ids),
            IdentityReturn::AffectedCount => InsertOutcome::Affected(ids.len() as u64),
        })
    }
}
