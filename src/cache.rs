//! In-memory mirror of the store, reloaded lazily by modification time.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::db;
use crate::error::Result;
use crate::models::Record;
use crate::search::SearchKeys;

pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(2);

/// Absolute distance between two timestamps.
pub fn drift(a: SystemTime, b: SystemTime) -> Duration {
    match a.duration_since(b) {
        Ok(d) => d,
        Err(e) => e.duration(),
    }
}

#[derive(Debug)]
struct Cache {
    records: Vec<Record>,
    keys: Vec<SearchKeys>,
}

impl Cache {
    fn new(records: Vec<Record>) -> Self {
        let keys = records.iter().map(SearchKeys::for_record).collect();
        Self { records, keys }
    }
}

/// Owns the cached records for one store file.
#[derive(Debug)]
pub struct CacheManager {
    path: PathBuf,
    tolerance: Duration,
    cache: Option<Cache>,
    /// Store mtime observed at the last successful load or commit. `None` means
    /// whatever is cached must not be served.
    last_synced: Option<SystemTime>,
    reloads: u64,
}

impl CacheManager {
    pub fn new(path: impl Into<PathBuf>, tolerance: Duration) -> Self {
        Self {
            path: path.into(),
            tolerance,
            cache: None,
            last_synced: None,
            reloads: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_synced(&self) -> Option<SystemTime> {
        self.last_synced
    }

    /// Number of full reloads performed so far.
    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    pub fn is_fresh(&self) -> bool {
        self.cache.is_some() && self.last_synced.is_some()
    }

    /// Reload from the store unless the cache is within tolerance of its mtime.
    pub fn sync(&mut self) -> Result<()> {
        let current = match db::modified(&self.path) {
            Ok(t) => t,
            Err(e) => {
                self.last_synced = None;
                return Err(e);
            }
        };

        if let (Some(_), Some(last)) = (&self.cache, self.last_synced) {
            if drift(current, last) < self.tolerance {
                debug!(path = %self.path.display(), "store unchanged");
                return Ok(());
            }
        }

        self.reload(current)
    }

    fn reload(&mut self, observed: SystemTime) -> Result<()> {
        debug!(path = %self.path.display(), "reloading store");
        match db::load(&self.path) {
            Ok(records) => {
                debug!(records = records.len(), "store loaded");
                self.cache = Some(Cache::new(records));
                self.last_synced = Some(observed);
                self.reloads += 1;
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store reload failed");
                self.last_synced = None;
                Err(e)
            }
        }
    }

    /// Make sure something valid is cached without re-checking freshness.
    pub fn ensure_loaded(&mut self) -> Result<()> {
        if self.is_fresh() {
            return Ok(());
        }
        self.sync()
    }

    /// Records after an implicit `sync()`.
    pub fn snapshot(&mut self) -> Result<&[Record]> {
        self.sync()?;
        Ok(self.records())
    }

    /// Records and their search keys after an implicit `sync()`.
    pub fn indexed(&mut self) -> Result<(&[Record], &[SearchKeys])> {
        self.sync()?;
        match (&self.cache, self.last_synced) {
            (Some(cache), Some(_)) => Ok((cache.records.as_slice(), cache.keys.as_slice())),
            _ => Ok((&[][..], &[][..])),
        }
    }

    /// Cached records without syncing. Empty when nothing valid is cached.
    pub fn records(&self) -> &[Record] {
        match (&self.cache, self.last_synced) {
            (Some(cache), Some(_)) => cache.records.as_slice(),
            _ => &[][..],
        }
    }

    /// Force the next `sync()` to reload.
    pub fn invalidate(&mut self) {
        if self.cache.take().is_some() {
            debug!(path = %self.path.display(), "cache invalidated");
        }
        self.last_synced = None;
    }

    /// Take over records that were just written, stamped with the store's
    /// post-write mtime.
    pub(crate) fn adopt(&mut self, records: Vec<Record>, written_at: SystemTime) {
        self.cache = Some(Cache::new(records));
        self.last_synced = Some(written_at);
    }
}
