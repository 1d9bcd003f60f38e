//! The operations front ends call: search, add, mark, summarize, delete.
//!
//! Reads sync the cache first. Writes go through one path, `Tracker::write`:
//! conflict check, sync, mutate a working copy, commit.

use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::CacheManager;
use crate::config::Config;
use crate::db;
use crate::error::{Result, TrackerError};
use crate::guard::{ConflictGuard, ConflictPolicy, Freshness};
use crate::models::{Candidate, Entry, Record, RowRef, Status, Summary, WORK_TYPES};
use crate::search::{self, duplicate_key};
use crate::status;
use crate::writer::PersistenceWriter;

/// Explicit answers to the questions a write may raise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confirm {
    /// Add even if an equivalent application is already recorded.
    pub duplicate: bool,
    /// Write even if the store changed externally since it was last read.
    pub overwrite: bool,
}

impl Confirm {
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Default::default()
        }
    }

    fn conflict_policy(&self) -> ConflictPolicy {
        if self.overwrite {
            ConflictPolicy::Overwrite
        } else {
            ConflictPolicy::Abort
        }
    }
}

pub struct Tracker {
    cache: CacheManager,
    guard: ConflictGuard,
    writer: PersistenceWriter,
}

impl Tracker {
    /// Does not touch the store; the first operation loads it.
    pub fn open(config: &Config) -> Result<Self> {
        let tolerance = config.tolerance().map_err(|reason| TrackerError::Config {
            path: config.store_path.clone(),
            reason,
        })?;
        Ok(Self {
            cache: CacheManager::new(&config.store_path, tolerance),
            guard: ConflictGuard::new(tolerance),
            writer: PersistenceWriter::new(config.backup_dir.clone()),
        })
    }

    /// Create the store if needed, then open it.
    pub fn create(config: &Config) -> Result<Self> {
        db::create(&config.store_path)?;
        Self::open(config)
    }

    pub fn path(&self) -> &Path {
        self.cache.path()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn search(&mut self, query: &str) -> Result<Vec<Entry>> {
        let (records, keys) = self.cache.indexed()?;
        Ok(search::search(keys, query)
            .into_iter()
            .map(|i| entry(records, i))
            .collect())
    }

    pub fn get(&mut self, row: RowRef) -> Result<Entry> {
        let records = self.cache.snapshot()?;
        match row.index().filter(|i| *i < records.len()) {
            Some(i) => Ok(entry(records, i)),
            None => Err(TrackerError::NotFound(format!("row {}", row))),
        }
    }

    pub fn get_last(&mut self) -> Result<Entry> {
        let records = self.cache.snapshot()?;
        match records.len().checked_sub(1) {
            Some(i) => Ok(entry(records, i)),
            None => Err(TrackerError::NotFound("last record".to_string())),
        }
    }

    pub fn summary(&mut self) -> Result<Summary> {
        Ok(Summary::from_records(self.cache.snapshot()?))
    }

    pub fn add_record(&mut self, candidate: Candidate, confirm: Confirm) -> Result<Entry> {
        let record = validate(candidate, today())?;
        let key = duplicate_key(&record.company, &record.job_title);

        self.write(confirm.conflict_policy(), |records| {
            if !confirm.duplicate {
                let existing = records
                    .iter()
                    .position(|r| duplicate_key(&r.company, &r.job_title) == key);
                if let Some(i) = existing {
                    return Err(TrackerError::DuplicateEntry {
                        row: RowRef::from_index(i),
                        existing: Box::new(records[i].clone()),
                    });
                }
            }
            records.push(record);
            Ok(entry(records, records.len() - 1))
        })
    }

    pub fn mark_status(&mut self, row: RowRef, to: Status, confirm: Confirm) -> Result<Entry> {
        let today = today();
        self.write(confirm.conflict_policy(), |records| {
            let i = row
                .index()
                .filter(|i| *i < records.len())
                .ok_or_else(|| TrackerError::NotFound(format!("row {}", row)))?;
            status::transition(&mut records[i], to, today);
            info!(row = row.0, status = %to, "status updated");
            Ok(entry(records, i))
        })
    }

    /// Remove the most recently added record.
    pub fn delete_last(&mut self, confirm: Confirm) -> Result<Record> {
        self.write(confirm.conflict_policy(), |records| {
            records
                .pop()
                .ok_or_else(|| TrackerError::NotFound("last record".to_string()))
        })
    }

    /// Drop the cache; the next operation reloads from disk.
    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    /// Move a store with the wrong columns aside and start a fresh one.
    /// Returns where the old file went.
    pub fn recreate_store(&mut self) -> Result<PathBuf> {
        let backup = db::backup_and_recreate(self.cache.path())?;
        self.cache.invalidate();
        info!(backup = %backup.display(), "store recreated");
        Ok(backup)
    }

    fn write<T>(
        &mut self,
        policy: ConflictPolicy,
        mutate: impl FnOnce(&mut Vec<Record>) -> Result<T>,
    ) -> Result<T> {
        self.cache.ensure_loaded()?;

        match self.guard.check(self.cache.path(), self.cache.last_synced())? {
            Freshness::Safe => self.cache.sync()?,
            Freshness::Conflict {
                last_synced,
                current,
            } => {
                if policy == ConflictPolicy::Abort {
                    return Err(TrackerError::write_conflict(last_synced, current));
                }
                warn!(path = %self.cache.path().display(), "overwriting external changes");
            }
        }

        let mut records = self.cache.records().to_vec();
        let out = mutate(&mut records)?;
        self.writer.commit(&mut self.cache, records)?;
        Ok(out)
    }
}

fn entry(records: &[Record], i: usize) -> Entry {
    Entry {
        row: RowRef::from_index(i),
        record: records[i].clone(),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TrackerError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turn a candidate into a new record applied `today`.
fn validate(candidate: Candidate, today: NaiveDate) -> Result<Record> {
    let work_type = match optional(candidate.work_type) {
        None => None,
        Some(t) => match WORK_TYPES.iter().find(|w| w.eq_ignore_ascii_case(&t)) {
            Some(w) => Some(w.to_string()),
            None => {
                return Err(TrackerError::Validation(format!(
                    "Type must be one of {} or blank, got '{}'",
                    WORK_TYPES.join(", "),
                    t
                )));
            }
        },
    };

    Ok(Record {
        company: required(&candidate.company, "Company")?,
        location: required(&candidate.location, "Location")?,
        job_title: required(&candidate.job_title, "Job Title")?,
        code: optional(candidate.code),
        work_type,
        link: optional(candidate.link),
        applied_date: Some(today),
        processed_date: None,
        result_date: None,
        status: Status::None,
    })
}
