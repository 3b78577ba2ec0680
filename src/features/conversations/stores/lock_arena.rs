use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Arena size at which idle entries are dropped
const PRUNE_THRESHOLD: usize = 1024;

/// One async lock per conversation id.
///
/// The std mutex only guards the map and is never held across an await.
/// Operations on different conversations never contend.
#[derive(Debug, Default)]
pub struct LockArena {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl LockArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one conversation
    pub async fn acquire(&self, conversation_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() >= PRUNE_THRESHOLD {
                // Held or awaited locks have a second reference
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(conversation_id).or_default())
        };

        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
