use std::{collections::HashMap, mem, sync::Arc};

use courier_models::v0::DirectoryEntry;
use courier_result::Result;
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::{AbstractDirectory, BatcherConfig, CanonicalKey, FetchOptions};

/// Outcome delivered through a slot: the entry, or `None` for not found
type Outcome = Option<Arc<DirectoryEntry>>;

/// Delivery slot for one key in one window, written to exactly once
type Slot = watch::Sender<Option<Outcome>>;

/// Current phase of the batch window
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum WindowState {
    /// No pending keys, no timer running
    Idle,
    /// Timer running, new keys may still join this window
    Accumulating,
    /// Queue snapshotted and handed to the directory service
    Flushing,
}

/// State shared between callers and the dispatch task
///
/// Only ever touched while holding the lock; none of the critical
/// sections perform I/O or wait on a timer.
struct Inner {
    state: WindowState,
    pending: Vec<CanonicalKey>,
    slots: HashMap<CanonicalKey, Slot>,
    deadline: Instant,
    window_cap: Instant,
}

/// Coalesces concurrent point lookups into batched directory service calls
///
/// Lookups issued within one debounce window are merged into a single
/// "get many" call, while every caller keeps the illusion of an
/// independent blocking lookup. Construct one batcher per logical
/// resource type and share it freely, cloning is cheap.
#[derive(Clone)]
pub struct DirectoryBatcher {
    config: BatcherConfig,
    directory: Arc<dyn AbstractDirectory>,
    inner: Arc<Mutex<Inner>>,
    flush: Arc<Notify>,
}

impl DirectoryBatcher {
    pub fn new(config: BatcherConfig, directory: Arc<dyn AbstractDirectory>) -> Self {
        Self {
            config,
            directory,
            inner: Arc::new(Mutex::new(Inner {
                state: WindowState::Idle,
                pending: Vec::new(),
                slots: HashMap::new(),
                deadline: Instant::now(),
                window_cap: Instant::now(),
            })),
            flush: Arc::new(Notify::new()),
        }
    }

    /// Resolve a single identifier through the current batch window
    ///
    /// Blocks until the window this key joined has been dispatched and its
    /// results distributed, then returns the entry or `None` if it does
    /// not exist. A directory service failure on this path is
    /// indistinguishable from not found.
    pub async fn coalesced_get(&self, raw_id: &str) -> Option<Arc<DirectoryEntry>> {
        let key = CanonicalKey::normalize(raw_id);

        let mut receiver = {
            let mut inner = self.inner.lock().await;

            let receiver = match inner.slots.get(&key) {
                // Someone already asked for this key in the current window,
                // share their slot rather than orphaning it
                Some(sender) => sender.subscribe(),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    inner.slots.insert(key.clone(), sender);
                    inner.pending.push(key.clone());
                    receiver
                }
            };

            let now = Instant::now();
            match inner.state {
                WindowState::Idle => {
                    inner.state = WindowState::Accumulating;
                    inner.window_cap = now + self.config.max_batch_wait;
                    inner.deadline = (now + self.config.debounce_window).min(inner.window_cap);

                    debug!("Arming a new batch window for {key}");
                    tokio::spawn(self.clone().dispatch());
                }
                WindowState::Accumulating => {
                    // Extend the debounce, but never past the window cap
                    inner.deadline = (now + self.config.debounce_window).min(inner.window_cap);
                }
                // Too late for the in-flight window, the key stays queued
                // until the next one is armed
                WindowState::Flushing => {}
            }

            if inner.pending.len() >= self.config.max_batch_size {
                self.flush.notify_one();
            }

            receiver
        };

        let result = match receiver.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone().unwrap(),
            // The sender was dropped without a write, treat as not found
            Err(_) => None,
        };
        result
    }

    /// Resolve a set of identifiers immediately, bypassing the window
    ///
    /// Performs exactly one directory service call regardless of how many
    /// identifiers are given and returns whichever subset resolved, in no
    /// guaranteed order. Unlike [`coalesced_get`](Self::coalesced_get),
    /// a directory service failure is propagated to the caller.
    pub async fn direct_batch_get(&self, raw_ids: &[String]) -> Result<Vec<DirectoryEntry>> {
        if raw_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut keys = raw_ids
            .iter()
            .map(|raw_id| CanonicalKey::normalize(raw_id))
            .collect::<Vec<_>>();

        keys.sort();
        keys.dedup();

        let entries = self
            .directory
            .fetch_entries(&keys, &self.fetch_options())
            .await?;

        Ok(entries.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Number of keys waiting in the current window
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Whether no window is currently accumulating or flushing
    pub async fn is_idle(&self) -> bool {
        self.inner.lock().await.state == WindowState::Idle
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            include_all_variants: self.config.include_all_variants,
        }
    }

    /// Dispatch routine, one instance per active window
    ///
    /// Waits out the debounce, snapshots the accumulated queue, resolves
    /// it through the directory service and fans the results out. If new
    /// keys arrived in the meantime, the same task re-arms itself as the
    /// next window's dispatch routine.
    async fn dispatch(self) {
        loop {
            let deadline = self.inner.lock().await.deadline;

            tokio::select! {
                _ = sleep_until(deadline) => {},
                _ = self.flush.notified() => {},
            }

            // Snapshot the window, if it is actually due
            let slots = {
                let mut inner = self.inner.lock().await;

                let full = inner.pending.len() >= self.config.max_batch_size;
                if !full && Instant::now() < inner.deadline {
                    // The debounce was extended while we slept, wait again
                    continue;
                }

                inner.state = WindowState::Flushing;

                let batch = mem::take(&mut inner.pending);
                if batch.is_empty() {
                    // Windows are only armed by callers that have already
                    // queued a key, so this should never happen
                    inner.state = WindowState::Idle;
                    return;
                }

                batch
                    .iter()
                    .filter_map(|key| inner.slots.remove_entry(key))
                    .collect::<HashMap<_, _>>()
            };

            let keys = slots.keys().cloned().collect::<Vec<_>>();
            debug!("Flushing a window of {} directory lookups", keys.len());

            let mut resolved: HashMap<CanonicalKey, Arc<DirectoryEntry>> = HashMap::new();
            for chunk in keys.chunks(self.config.max_batch_size.max(1)) {
                match self.directory.fetch_entries(chunk, &self.fetch_options()).await {
                    Ok(entries) => {
                        for (key, entry) in entries {
                            resolved.insert(key, Arc::new(entry));
                        }
                    }
                    // Callers in this chunk will observe not found, there
                    // is no error channel on the coalesced path
                    Err(error) => {
                        warn!("Failed to fetch a directory batch: {error:?}");
                    }
                }
            }

            // Fan the results out, one write per slot, then drop the senders
            for (key, sender) in slots {
                let outcome = resolved.remove(&key);
                sender.send_modify(|slot| {
                    slot.replace(outcome);
                });
            }

            {
                let mut inner = self.inner.lock().await;

                if inner.pending.is_empty() {
                    inner.state = WindowState::Idle;
                    return;
                }

                // Keys arrived while we were flushing, give them a fresh
                // window with a full debounce
                let now = Instant::now();
                inner.state = WindowState::Accumulating;
                inner.window_cap = now + self.config.max_batch_wait;
                inner.deadline = (now + self.config.debounce_window).min(inner.window_cap);
            }
        }
    }
}
