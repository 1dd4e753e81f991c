//! Process-wide sample cache.
//!
//! Loading the same bank into several synth instances must not duplicate
//! its sample block in memory. The cache keys loaded blocks by file
//! identity (path, modification time, byte size) and hands out
//! reference-counted handles; the block is freed when the last handle
//! drops. All bookkeeping happens under one mutex, so a racing load of
//! the same key blocks and then hits the freshly inserted entry.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::SystemTime;

use log::{error, warn};

use crate::error::Result;

/// Identity of a cached sample block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheKey {
    pub path: PathBuf,
    /// Modification time at load; `None` when the file could not be
    /// stat'ed (memory-backed banks, vanished files).
    pub mtime: Option<SystemTime>,
    /// Size of the block in bytes, as declared by the bank.
    pub size: u64,
}

impl CacheKey {
    /// Key for `path` with the file's current modification time.
    pub fn for_file(path: &Path, size: u64) -> CacheKey {
        let mtime = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(t) => Some(t),
            Err(err) => {
                warn!("unable to read modification time of {}: {}", path.display(), err);
                None
            }
        };
        CacheKey {
            path: path.to_path_buf(),
            mtime,
            size,
        }
    }
}

struct Entry {
    key: CacheKey,
    data: Arc<[i16]>,
    refs: usize,
    pinned: bool,
}

/// Reference-counted cache of loaded sample blocks.
pub struct SampleCache {
    entries: Mutex<Vec<Entry>>,
}

impl SampleCache {
    pub fn new() -> Arc<SampleCache> {
        Arc::new(SampleCache {
            entries: Mutex::new(Vec::new()),
        })
    }

    /// The process-wide instance shared by all loaders.
    pub fn global() -> Arc<SampleCache> {
        static GLOBAL: OnceLock<Arc<SampleCache>> = OnceLock::new();
        GLOBAL.get_or_init(SampleCache::new).clone()
    }

    /// Look up `key`, calling `read` to produce the block on a miss.
    ///
    /// `pin` asks for the block to be locked into physical memory;
    /// failure to pin is logged and otherwise ignored. An entry whose
    /// path and mtime match but whose size does not is evidence the
    /// file changed underneath an open bank: it is reported and the
    /// lookup treated as a miss.
    pub fn acquire(
        self: &Arc<Self>,
        key: CacheKey,
        pin: bool,
        read: &mut dyn FnMut() -> Result<Vec<i16>>,
    ) -> Result<CachedSample> {
        let mut entries = self.lock();

        for entry in entries.iter_mut() {
            if entry.key.path != key.path || entry.key.mtime != key.mtime {
                continue;
            }
            if entry.key.size != key.size {
                error!(
                    "cached sample block for {} has a different size, expected {} but cached {}",
                    key.path.display(),
                    key.size,
                    entry.key.size
                );
                continue;
            }
            entry.refs += 1;
            if pin && !entry.pinned {
                entry.pinned = pin_block(&entry.data);
            }
            return Ok(CachedSample {
                cache: self.clone(),
                key: entry.key.clone(),
                data: entry.data.clone(),
            });
        }

        // miss: read while holding the lock, so concurrent loads of the
        // same bank produce exactly one physical read
        let data: Arc<[i16]> = read()?.into();
        let pinned = pin && pin_block(&data);
        entries.push(Entry {
            key: key.clone(),
            data: data.clone(),
            refs: 1,
            pinned,
        });
        Ok(CachedSample {
            cache: self.clone(),
            key,
            data,
        })
    }

    /// Number of live entries, for diagnostics.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain(&self, key: &CacheKey) {
        let mut entries = self.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.key == *key) {
            entry.refs += 1;
        }
    }

    fn release(&self, key: &CacheKey) {
        let mut entries = self.lock();
        if let Some(pos) = entries.iter().position(|e| e.key == *key) {
            entries[pos].refs -= 1;
            if entries[pos].refs == 0 {
                let entry = entries.swap_remove(pos);
                if entry.pinned {
                    unpin_block(&entry.data);
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A reference-counted handle on a cached sample block.
pub struct CachedSample {
    cache: Arc<SampleCache>,
    key: CacheKey,
    data: Arc<[i16]>,
}

impl CachedSample {
    pub fn data(&self) -> &Arc<[i16]> {
        &self.data
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Clone for CachedSample {
    fn clone(&self) -> Self {
        self.cache.retain(&self.key);
        CachedSample {
            cache: self.cache.clone(),
            key: self.key.clone(),
            data: self.data.clone(),
        }
    }
}

impl Drop for CachedSample {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

#[cfg(unix)]
fn pin_block(data: &Arc<[i16]>) -> bool {
    let len = std::mem::size_of_val(&data[..]);
    // mlock needs the raw range; the Arc keeps it stable until unpin
    let ret = unsafe { libc::mlock(data.as_ptr().cast(), len) };
    if ret != 0 {
        warn!("failed to pin sample memory, data will be swappable");
    }
    ret == 0
}

#[cfg(unix)]
fn unpin_block(data: &Arc<[i16]>) {
    let len = std::mem::size_of_val(&data[..]);
    unsafe {
        libc::munlock(data.as_ptr().cast(), len);
    }
}

#[cfg(not(unix))]
fn pin_block(_data: &Arc<[i16]>) -> bool {
    true
}

#[cfg(not(unix))]
fn unpin_block(_data: &Arc<[i16]>) {}

/// Tracks voices still reading a bank's sample block, so its cache
/// handle can be released only once the last voice finishes.
#[derive(Clone, Default)]
pub struct SampleUse {
    inner: Arc<UseInner>,
}

#[derive(Default)]
struct UseInner {
    state: Mutex<UseState>,
}

#[derive(Default)]
struct UseState {
    count: usize,
    pending: Option<CachedSample>,
}

impl SampleUse {
    pub fn new() -> SampleUse {
        SampleUse::default()
    }

    /// Hand out a guard for a voice that starts reading sample data.
    pub fn begin(&self) -> SampleUseGuard {
        self.lock().count += 1;
        SampleUseGuard {
            inner: self.inner.clone(),
        }
    }

    /// Number of voices currently reading.
    pub fn in_use(&self) -> usize {
        self.lock().count
    }

    /// Release `block` once no voice is reading; immediately when idle.
    pub fn defer_release(&self, block: CachedSample) {
        let mut state = self.lock();
        if state.count == 0 {
            drop(state);
            drop(block);
        } else {
            state.pending = Some(block);
        }
    }

    fn lock(&self) -> MutexGuard<'_, UseState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Held by a voice for as long as it reads sample data. Dropping the
/// last guard performs any release deferred in the meantime.
pub struct SampleUseGuard {
    inner: Arc<UseInner>,
}

impl Clone for SampleUseGuard {
    fn clone(&self) -> Self {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner()).count += 1;
        SampleUseGuard {
            inner: self.inner.clone(),
        }
    }
}

impl Drop for SampleUseGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.count -= 1;
        let pending = if state.count == 0 {
            state.pending.take()
        } else {
            None
        };
        // release the cache reference outside the lock
        drop(state);
        drop(pending);
    }
}
