// ── Endpoint lock manager ──
//
// One async mutex per BMC address, created on first use and kept for the
// life of the process. Holding the guard is what serializes
// reconciliations; dropping it (on any exit path) releases the endpoint.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace};

use crate::model::EndpointKey;

static GLOBAL: LazyLock<EndpointLocks> = LazyLock::new(EndpointLocks::default);

/// Registry of per-endpoint locks. Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct EndpointLocks {
    inner: Arc<DashMap<EndpointKey, Arc<Mutex<()>>>>,
}

impl EndpointLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance shared by every orchestrator that does
    /// not bring its own.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Wait until `key` is free and take it.
    pub async fn acquire(&self, key: &EndpointKey) -> EndpointGuard {
        let mutex = self.mutex_for(key);
        trace!(endpoint = %key, "waiting for endpoint lock");
        let guard = mutex.lock_owned().await;
        debug!(endpoint = %key, "endpoint lock acquired");
        EndpointGuard {
            key: key.clone(),
            _guard: guard,
        }
    }

    /// Take `key` only if nobody holds it.
    pub fn try_acquire(&self, key: &EndpointKey) -> Option<EndpointGuard> {
        let mutex = self.mutex_for(key);
        let guard = mutex.try_lock_owned().ok()?;
        debug!(endpoint = %key, "endpoint lock acquired");
        Some(EndpointGuard {
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Number of endpoints ever locked through this registry.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    // The map shard guard must be gone before anyone awaits the mutex.
    fn mutex_for(&self, key: &EndpointKey) -> Arc<Mutex<()>> {
        let entry = self
            .inner
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }
}

/// Exclusive hold on one endpoint. Released on drop.
#[derive(Debug)]
pub struct EndpointGuard {
    key: EndpointKey,
    _guard: OwnedMutexGuard<()>,
}

impl EndpointGuard {
    pub fn key(&self) -> &EndpointKey {
        &self.key
    }
}

impl Drop for EndpointGuard {
    fn drop(&mut self) {
        debug!(endpoint = %self.key, "endpoint lock released");
    }
}
