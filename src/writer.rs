use std::path::{Path, PathBuf};
use tracing::info;

use crate::cache::CacheManager;
use crate::db;
use crate::error::Result;
use crate::models::Record;

/// Writes mutated record sets back to the store.
#[derive(Debug, Clone, Default)]
pub struct PersistenceWriter {
    backup_dir: Option<PathBuf>,
}

impl PersistenceWriter {
    pub fn new(backup_dir: Option<PathBuf>) -> Self {
        Self { backup_dir }
    }

    /// Write `records` to the store behind `cache`, then hand them to the cache
    /// stamped with the post-write mtime so our own write never reads as an
    /// external change.
    ///
    /// The write is not atomic beyond what SQLite's transaction gives. On
    /// failure the cache is invalidated and the next operation reloads.
    pub fn commit(&self, cache: &mut CacheManager, records: Vec<Record>) -> Result<()> {
        let path = cache.path().to_path_buf();
        match self.write(&path, &records) {
            Ok(written_at) => {
                info!(path = %path.display(), records = records.len(), "store committed");
                cache.adopt(records, written_at);
                Ok(())
            }
            Err(e) => {
                cache.invalidate();
                Err(e)
            }
        }
    }

    fn write(&self, path: &Path, records: &[Record]) -> Result<std::time::SystemTime> {
        if let Some(dir) = &self.backup_dir {
            let backup = db::backup_copy(path, dir)?;
            info!(backup = %backup.display(), "store backed up");
        }
        db::write(path, records)?;
        db::modified(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_TOLERANCE;
    use crate::models::Status;
    use tempfile::TempDir;

    fn record(company: &str) -> Record {
        Record {
            company: company.to_string(),
            location: "Remote".to_string(),
            job_title: "Engineer".to_string(),
            code: None,
            work_type: None,
            link: None,
            applied_date: None,
            processed_date: None,
            result_date: None,
            status: Status::Offer,
        }
    }

    #[test]
    fn test_commit_adopts_written_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("applications.db");
        db::create(&path).unwrap();
        let mut cache = CacheManager::new(&path, DEFAULT_TOLERANCE);
        cache.sync().unwrap();

        PersistenceWriter::default()
            .commit(&mut cache, vec![record("Acme")])
            .unwrap();

        assert_eq!(cache.last_synced(), Some(db::modified(&path).unwrap()));
        assert_eq!(cache.records().len(), 1);
        assert_eq!(db::load(&path).unwrap(), vec![record("Acme")]);

        // the commit itself must not trigger a reload
        cache.sync().unwrap();
        assert_eq!(cache.reloads(), 1);
    }

    #[test]
    fn test_commit_writes_backup_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("applications.db");
        db::create(&path).unwrap();
        db::write(&path, &[record("Acme")]).unwrap();
        let mut cache = CacheManager::new(&path, DEFAULT_TOLERANCE);
        cache.sync().unwrap();

        let backups = dir.path().join("backups");
        PersistenceWriter::new(Some(backups.clone()))
            .commit(&mut cache, vec![])
            .unwrap();

        let copies: Vec<_> = std::fs::read_dir(&backups).unwrap().collect();
        assert_eq!(copies.len(), 1);
        let copy = copies[0].as_ref().unwrap().path();
        assert_eq!(db::load(&copy).unwrap(), vec![record("Acme")]);
        assert!(db::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_failed_commit_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("applications.db");
        db::create(&path).unwrap();
        let mut cache = CacheManager::new(&path, DEFAULT_TOLERANCE);
        cache.sync().unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = PersistenceWriter::default()
            .commit(&mut cache, vec![record("Acme")])
            .unwrap_err();
        assert!(err.is_io_failure());
        assert!(!cache.is_fresh());
        assert!(!path.exists());
    }
}
