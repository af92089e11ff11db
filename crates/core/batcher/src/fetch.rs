use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use courier_models::v0::DirectoryEntry;
use courier_result::{create_error, create_transport_error, Result};
use tokio::sync::Mutex;

use crate::CanonicalKey;

/// Options forwarded verbatim to the directory service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Include every registered variant of each entry in the response
    pub include_all_variants: bool,
}

/// Boundary to the directory service's "get many" endpoint
///
/// Implementations return only the keys that resolved; keys without an
/// entry are silently omitted. An `Err` means the whole call failed and
/// nothing resolved. No sub-batching is performed at this boundary.
#[async_trait]
pub trait AbstractDirectory: Sync + Send {
    /// Resolve a set of canonical keys to their directory entries
    async fn fetch_entries(
        &self,
        keys: &[CanonicalKey],
        options: &FetchOptions,
    ) -> Result<Vec<(CanonicalKey, DirectoryEntry)>>;
}

/// In-memory directory used for testing
///
/// Records every batch it receives and can be told to fail or delay the
/// next call, which is enough to exercise the batcher's windowing logic.
#[derive(Default)]
pub struct ReferenceDirectory {
    entries: Mutex<HashMap<CanonicalKey, DirectoryEntry>>,
    requests: Mutex<Vec<Vec<CanonicalKey>>>,
    fail_next: AtomicBool,
    latency_ms: AtomicU64,
}

impl ReferenceDirectory {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register an entry under the given raw identifier
    pub async fn insert(&self, raw_id: &str, entry: DirectoryEntry) {
        let key = CanonicalKey::normalize(raw_id);
        self.entries.lock().await.insert(key, entry);
    }

    /// Make the next `fetch_entries` call return a transport error
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Delay every `fetch_entries` call by the given duration
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of `fetch_entries` calls received so far
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Key sets of every `fetch_entries` call received so far
    pub async fn requests(&self) -> Vec<Vec<CanonicalKey>> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl AbstractDirectory for ReferenceDirectory {
    async fn fetch_entries(
        &self,
        keys: &[CanonicalKey],
        _options: &FetchOptions,
    ) -> Result<Vec<(CanonicalKey, DirectoryEntry)>> {
        self.requests.lock().await.push(keys.to_vec());

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(create_transport_error!("fetch_entries"));
        }

        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|entry| (key.clone(), entry.clone())))
            .collect())
    }
}
