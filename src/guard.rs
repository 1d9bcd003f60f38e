//! Detects edits made to the store by someone else (typically a person with
//! the file open in another program) between our last read and a write.

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::warn;

use crate::cache::drift;
use crate::db;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Safe,
    Conflict {
        last_synced: SystemTime,
        current: SystemTime,
    },
}

/// How a caller wants a detected conflict handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    #[default]
    Abort,
    Overwrite,
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictGuard {
    tolerance: Duration,
}

impl ConflictGuard {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// Compare the store's mtime to the one we last synced at. Nothing synced
    /// yet means there is nothing to conflict with.
    pub fn check(&self, path: &Path, last_synced: Option<SystemTime>) -> Result<Freshness> {
        let Some(last_synced) = last_synced else {
            return Ok(Freshness::Safe);
        };
        let current = db::modified(path)?;
        if drift(current, last_synced) >= self.tolerance {
            warn!(
                path = %path.display(),
                drift_ms = drift(current, last_synced).as_millis() as u64,
                "store modified externally since last read"
            );
            return Ok(Freshness::Conflict {
                last_synced,
                current,
            });
        }
        Ok(Freshness::Safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touched(dir: &TempDir, at: SystemTime) -> std::path::PathBuf {
        let path = dir.path().join("applications.db");
        let file = File::create(&path).unwrap();
        file.set_modified(at).unwrap();
        path
    }

    #[test]
    fn test_nothing_synced_is_safe() {
        let dir = TempDir::new().unwrap();
        let path = touched(&dir, SystemTime::now());
        let guard = ConflictGuard::new(Duration::from_secs(2));
        assert_eq!(guard.check(&path, None).unwrap(), Freshness::Safe);
    }

    #[test]
    fn test_tolerance_boundary() {
        let dir = TempDir::new().unwrap();
        let synced = SystemTime::now() - Duration::from_secs(3600);
        let guard = ConflictGuard::new(Duration::from_secs(2));

        let path = touched(&dir, synced + Duration::from_millis(1999));
        assert_eq!(guard.check(&path, Some(synced)).unwrap(), Freshness::Safe);

        let path = touched(&dir, synced + Duration::from_secs(2));
        assert!(matches!(
            guard.check(&path, Some(synced)).unwrap(),
            Freshness::Conflict { .. }
        ));

        let path = touched(&dir, synced - Duration::from_secs(5));
        assert!(matches!(
            guard.check(&path, Some(synced)).unwrap(),
            Freshness::Conflict { .. }
        ));
    }

    #[test]
    fn test_missing_store_is_io_failure() {
        let dir = TempDir::new().unwrap();
        let guard = ConflictGuard::new(Duration::from_secs(2));
        let err = guard
            .check(&dir.path().join("gone.db"), Some(SystemTime::now()))
            .unwrap_err();
        assert!(err.is_io_failure());
    }
}
