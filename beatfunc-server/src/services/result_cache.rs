//! Bounded on-disk cache of beat analyses, keyed by content fingerprint
//!
//! The index lives in memory behind one mutex that is never held across an
//! `.await`. Each entry points at a serialized [`BeatAnalysis`] on disk through
//! a shared [`BackingFile`] handle; the file is deleted when the last handle
//! drops. Eviction therefore removes the index entry immediately, while a
//! reader that already holds the handle finishes its read before the file goes.
//!
//! Concurrent misses for one fingerprint are coalesced: a single caller runs
//! the computation and every waiter receives the same result.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use beatfunc_common::Fingerprint;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::engine::BeatAnalysis;

/// Cache I/O and serialization errors
///
/// Never fatal to a request: callers log them and carry on without the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Cache task failed: {0}")]
    Task(String),
}

/// How [`ResultCache::get_or_compute`] produced its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Read from a cached artifact
    Hit,
    /// Computed by this caller
    Computed,
    /// Computed by a concurrent caller for the same fingerprint
    Shared,
}

/// Runtime counters
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub corrupt_entries: u64,
    pub store_failures: u64,
}

/// Serialized artifact on disk, deleted when the last handle drops
#[derive(Debug)]
struct BackingFile {
    fingerprint: Fingerprint,
    path: PathBuf,
}

impl Drop for BackingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(
                fingerprint = %self.fingerprint,
                path = %self.path.display(),
                "Cache: deleted backing file"
            ),
            Err(e) => tracing::info!(
                fingerprint = %self.fingerprint,
                path = %self.path.display(),
                error = %e,
                "Cache: backing file could not be deleted"
            ),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    file: Arc<BackingFile>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<Fingerprint, CacheEntry>,
    /// Monotonic access clock for LRU ordering
    clock: u64,
    stats: CacheStats,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn least_recently_used(&self) -> Option<Fingerprint> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(fp, _)| *fp)
    }
}

type InFlight = Arc<OnceCell<Arc<BeatAnalysis>>>;

/// Content-addressed LRU cache of beat analyses
pub struct ResultCache {
    dir: PathBuf,
    capacity: usize,
    state: Mutex<CacheState>,
    in_flight: Mutex<HashMap<Fingerprint, InFlight>>,
}

impl ResultCache {
    /// Create a cache storing artifacts under `dir`, holding at most `capacity`
    /// entries (minimum 1)
    pub fn new(dir: impl Into<PathBuf>, capacity: usize) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<Fingerprint, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.state().entries.contains_key(&fingerprint)
    }

    /// Backing file of a cached entry, without touching recency
    pub fn backing_path(&self, fingerprint: Fingerprint) -> Option<PathBuf> {
        self.state()
            .entries
            .get(&fingerprint)
            .map(|entry| entry.file.path.clone())
    }

    pub fn stats(&self) -> CacheStats {
        self.state().stats.clone()
    }

    /// Look up and deserialize a cached analysis
    ///
    /// A hit becomes the most recently used entry. An artifact that cannot be
    /// read back is dropped from the cache and reported as a miss.
    pub async fn lookup(&self, fingerprint: Fingerprint) -> Option<BeatAnalysis> {
        let found = self.fetch(fingerprint).await;
        if found.is_none() {
            self.state().stats.misses += 1;
            tracing::info!(fingerprint = %fingerprint, "Cache: miss");
        }
        found
    }

    /// Lookup without counting a miss
    async fn fetch(&self, fingerprint: Fingerprint) -> Option<BeatAnalysis> {
        let file = {
            let mut state = self.state();
            let now = state.tick();
            let entry = state.entries.get_mut(&fingerprint)?;
            entry.last_used = now;
            Arc::clone(&entry.file)
        };

        // The handle travels with the read so eviction cannot delete the file
        // under us; on success it is released on the blocking thread too
        let read = tokio::task::spawn_blocking(move || match read_artifact(&file.path) {
            Ok(analysis) => Ok(analysis),
            Err(e) => Err((file, e)),
        })
        .await;

        match read {
            Ok(Ok(analysis)) => {
                self.state().stats.hits += 1;
                tracing::info!(fingerprint = %fingerprint, "Cache: hit");
                Some(analysis)
            }
            Ok(Err((file, e))) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    error = %e,
                    "Cache: failed to load entry, falling through to miss"
                );
                let removed = self.discard(fingerprint, &file);
                release((removed, file)).await;
                None
            }
            Err(e) => {
                tracing::error!(fingerprint = %fingerprint, error = %e, "Cache: read task failed");
                None
            }
        }
    }

    /// Unindex `fingerprint` if it still refers to `file`
    fn discard(&self, fingerprint: Fingerprint, file: &Arc<BackingFile>) -> Option<CacheEntry> {
        let mut state = self.state();
        let same = state
            .entries
            .get(&fingerprint)
            .is_some_and(|entry| Arc::ptr_eq(&entry.file, file));
        if same {
            state.stats.corrupt_entries += 1;
            state.entries.remove(&fingerprint)
        } else {
            None
        }
    }

    /// Serialize `analysis` to a fresh backing file and index it as most
    /// recently used, evicting the least recently used entry when full
    pub async fn store(
        &self,
        fingerprint: Fingerprint,
        analysis: Arc<BeatAnalysis>,
    ) -> Result<(), CacheError> {
        let path = self.dir.join(format!("{}-{}.beats", fingerprint, Uuid::new_v4()));

        let write_path = path.clone();
        let written = tokio::task::spawn_blocking(move || write_artifact(&write_path, &analysis))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?;
        if let Err(e) = written {
            // Best effort: never leave a partial artifact behind
            let _ = tokio::fs::remove_file(&path).await;
            self.state().stats.store_failures += 1;
            return Err(e);
        }

        let file = Arc::new(BackingFile {
            fingerprint,
            path,
        });

        let released = {
            let mut state = self.state();
            let now = state.tick();
            let mut released = Vec::new();

            if !state.entries.contains_key(&fingerprint) && state.entries.len() >= self.capacity {
                if let Some(victim) = state.least_recently_used() {
                    if let Some(entry) = state.entries.remove(&victim) {
                        state.stats.evictions += 1;
                        tracing::info!(
                            fingerprint = %victim,
                            path = %entry.file.path.display(),
                            "Cache: evicting"
                        );
                        released.push(entry);
                    }
                }
            }

            if let Some(previous) = state.entries.insert(
                fingerprint,
                CacheEntry {
                    file,
                    last_used: now,
                },
            ) {
                released.push(previous);
            }

            tracing::info!(
                fingerprint = %fingerprint,
                entries = state.entries.len(),
                "Cache: stored"
            );
            released
        };
        if !released.is_empty() {
            release(released).await;
        }

        Ok(())
    }

    /// Resolve the analysis for `fingerprint`, computing it at most once
    /// across concurrent callers
    ///
    /// On a miss the computed value is stored before any waiter is released.
    /// A failed store is logged and the in-memory value is still returned.
    /// A failed computation is returned to its caller; waiters then retry.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        fingerprint: Fingerprint,
        compute: F,
    ) -> Result<(Arc<BeatAnalysis>, Resolution), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BeatAnalysis, E>>,
    {
        if let Some(analysis) = self.lookup(fingerprint).await {
            return Ok((Arc::new(analysis), Resolution::Hit));
        }

        let flight = {
            let mut in_flight = self.in_flight();
            let cell = in_flight.entry(fingerprint).or_default();
            FlightGuard {
                cache: self,
                fingerprint,
                cell: Arc::clone(cell),
            }
        };
        let cell = Arc::clone(&flight.cell);

        let mut resolution = Resolution::Shared;
        let outcome = {
            let resolution = &mut resolution;
            cell.get_or_try_init(move || async move {
                // A previous flight may have finished between our miss and now
                if let Some(analysis) = self.fetch(fingerprint).await {
                    *resolution = Resolution::Hit;
                    return Ok::<_, E>(Arc::new(analysis));
                }

                *resolution = Resolution::Computed;
                tracing::info!(fingerprint = %fingerprint, "Cache: computing analysis");
                let analysis = Arc::new(compute().await?);

                if let Err(e) = self.store(fingerprint, Arc::clone(&analysis)).await {
                    tracing::warn!(
                        fingerprint = %fingerprint,
                        error = %e,
                        "Cache: store failed, continuing with in-memory analysis"
                    );
                }
                Ok::<_, E>(analysis)
            })
            .await
            .map(Arc::clone)
        };

        drop(flight);

        outcome.map(|analysis| (analysis, resolution))
    }
}

/// Drop backing-file handles on the blocking pool
///
/// The last handle to go deletes its file, which must not happen on a runtime
/// worker. Waits for the deletion so callers observe it.
async fn release<T: Send + 'static>(handles: T) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(handles)).await {
        tracing::error!(error = %e, "Cache: release task failed");
    }
}

/// Unregisters an in-flight cell when its caller finishes or is dropped
struct FlightGuard<'a> {
    cache: &'a ResultCache,
    fingerprint: Fingerprint,
    cell: InFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.cache.in_flight();
        // A later flight may already own the slot
        if in_flight
            .get(&self.fingerprint)
            .is_some_and(|current| Arc::ptr_eq(current, &self.cell))
        {
            in_flight.remove(&self.fingerprint);
        }
    }
}

fn write_artifact(path: &Path, analysis: &BeatAnalysis) -> Result<(), CacheError> {
    let bytes = bincode::serialize(analysis)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn read_artifact(path: &Path) -> Result<BeatAnalysis, CacheError> {
    let bytes = std::fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}
