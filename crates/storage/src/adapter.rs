//! Result-returning storage adapter
//!
//! Browser local storage can be missing, full, or tampered with by
//! other scripts; in private-browsing contexts every access throws.
//! Call sites therefore never touch the key-value store directly;
//! they go through [`ConsentStorage`] and treat any `Err` as degraded
//! storage, never as a fatal condition.

use crate::kv::{KvError, KvStore};
use crate::record::{QueuedSubmission, StoredConsentRecord, QUEUE_KEY, RECORD_KEY};
use parking_lot::Mutex;
use std::sync::Arc;

/// Result type for storage adapter operations
pub type Result<T> = std::result::Result<T, KvError>;

/// Uniform access to the persisted consent record and pending queue
pub trait ConsentStorage: Send + Sync {
    /// Load the persisted consent record, if any
    fn load_record(&self) -> Result<Option<StoredConsentRecord>>;

    /// Persist the consent record
    fn save_record(&self, record: &StoredConsentRecord) -> Result<()>;

    /// Remove the persisted consent record
    fn clear_record(&self) -> Result<()>;

    /// Load the pending-submission queue (empty when absent)
    fn load_queue(&self) -> Result<Vec<QueuedSubmission>>;

    /// Persist the pending-submission queue; an empty queue removes the key
    fn save_queue(&self, queue: &[QueuedSubmission]) -> Result<()>;

    /// Remove the pending-submission queue
    fn clear_queue(&self) -> Result<()>;

    /// Append a submission unless an equal payload is already queued
    ///
    /// Returns true when the submission was added.
    fn enqueue(&self, submission: QueuedSubmission) -> Result<bool> {
        let mut queue = self.load_queue()?;
        if queue.contains(&submission) {
            return Ok(false);
        }
        queue.push(submission);
        self.save_queue(&queue)?;
        Ok(true)
    }
}

/// Sled-backed adapter, the production implementation
pub struct SledConsentStorage {
    kv: Arc<KvStore>,
}

impl SledConsentStorage {
    /// Wrap an opened key-value store
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }
}

impl ConsentStorage for SledConsentStorage {
    fn load_record(&self) -> Result<Option<StoredConsentRecord>> {
        self.kv.get(RECORD_KEY)
    }

    fn save_record(&self, record: &StoredConsentRecord) -> Result<()> {
        self.kv.set(RECORD_KEY, record)
    }

    fn clear_record(&self) -> Result<()> {
        self.kv.remove(RECORD_KEY)?;
        Ok(())
    }

    fn load_queue(&self) -> Result<Vec<QueuedSubmission>> {
        Ok(self.kv.get(QUEUE_KEY)?.unwrap_or_default())
    }

    fn save_queue(&self, queue: &[QueuedSubmission]) -> Result<()> {
        if queue.is_empty() {
            self.kv.remove(QUEUE_KEY)?;
            Ok(())
        } else {
            self.kv.set(QUEUE_KEY, &queue)
        }
    }

    fn clear_queue(&self) -> Result<()> {
        self.kv.remove(QUEUE_KEY)?;
        Ok(())
    }
}

/// In-memory adapter for tests and ephemeral embeddings
#[derive(Default)]
pub struct MemoryConsentStorage {
    record: Mutex<Option<StoredConsentRecord>>,
    queue: Mutex<Vec<QueuedSubmission>>,
}

impl MemoryConsentStorage {
    /// Create an empty in-memory adapter
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsentStorage for MemoryConsentStorage {
    fn load_record(&self) -> Result<Option<StoredConsentRecord>> {
        Ok(self.record.lock().clone())
    }

    fn save_record(&self, record: &StoredConsentRecord) -> Result<()> {
        *self.record.lock() = Some(record.clone());
        Ok(())
    }

    fn clear_record(&self) -> Result<()> {
        *self.record.lock() = None;
        Ok(())
    }

    fn load_queue(&self) -> Result<Vec<QueuedSubmission>> {
        Ok(self.queue.lock().clone())
    }

    fn save_queue(&self, queue: &[QueuedSubmission]) -> Result<()> {
        *self.queue.lock() = queue.to_vec();
        Ok(())
    }

    fn clear_queue(&self) -> Result<()> {
        self.queue.lock().clear();
        Ok(())
    }
}

/// Adapter that fails every operation
///
/// Models storage access throwing in private-browsing contexts, so the
/// "storage unavailable" degradation paths stay testable.
#[derive(Debug, Default)]
pub struct UnavailableStorage;

impl UnavailableStorage {
    /// Create the always-failing adapter
    pub fn new() -> Self {
        Self
    }

    fn unavailable<T>() -> Result<T> {
        Err(KvError::Unavailable("storage access denied".to_string()))
    }
}

impl ConsentStorage for UnavailableStorage {
    fn load_record(&self) -> Result<Option<StoredConsentRecord>> {
        Self::unavailable()
    }

    fn save_record(&self, _record: &StoredConsentRecord) -> Result<()> {
        Self::unavailable()
    }

    fn clear_record(&self) -> Result<()> {
        Self::unavailable()
    }

    fn load_queue(&self) -> Result<Vec<QueuedSubmission>> {
        Self::unavailable()
    }

    fn save_queue(&self, _queue: &[QueuedSubmission]) -> Result<()> {
        Self::unavailable()
    }

    fn clear_queue(&self) -> Result<()> {
        Self::unavailable()
    }
}
