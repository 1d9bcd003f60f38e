//! The SQLite file that holds the application table.
//!
//! Every function opens its own connection: nothing is held between calls, so a
//! store that was replaced on disk is always read fresh.
//!
//! Cell text lives in `applications`. Cell fills live apart from it in
//! `cell_fills`, keyed by the row's `rowid` and the column name, the way a
//! spreadsheet keeps formatting apart from values. Only the `Status` fill is
//! read; text typed into the `Status` cell carries no meaning.

use chrono::{Local, NaiveDate};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row, params};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;

use crate::error::{Result, TrackerError};
use crate::models::{Record, RowRef};
use crate::status;

pub const TABLE: &str = "applications";

/// Fill layer for cells of [`TABLE`].
pub const FILLS_TABLE: &str = "cell_fills";

/// Required columns, in the order they are created and selected.
pub const COLUMNS: [&str; 10] = [
    "Status",
    "Company",
    "Location",
    "Job Title",
    "Code",
    "Type",
    "Applied Date",
    "Processed Date",
    "Result Date",
    "Link",
];

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const STATUS: &str = COLUMNS[0];

/// Index of the `Status` fill in a row returned by [`select_sql`].
const FILL_IDX: usize = COLUMNS.len();

/// Create an empty store at `path` (and its parent directories).
/// Existing tables are left untouched.
pub fn create(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    let columns = COLUMNS
        .iter()
        .map(|c| format!("\"{}\" TEXT", c))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({});\n{}",
        TABLE,
        columns,
        create_fills_sql()
    ))?;
    Ok(())
}

fn create_fills_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            row_id INTEGER NOT NULL,
            column_name TEXT NOT NULL,
            argb TEXT NOT NULL,
            PRIMARY KEY (row_id, column_name)
        );",
        FILLS_TABLE
    )
}

/// Last modification time of the store.
///
/// A store in WAL mode keeps committed changes in `<db>-wal` until they are
/// checkpointed, leaving the main file's mtime alone. The later of the two
/// mtimes is the store's; a missing `-wal` file is ignored.
pub fn modified(path: &Path) -> Result<SystemTime> {
    let main = fs::metadata(path)?.modified()?;
    match fs::metadata(wal_path(path)) {
        Ok(meta) => Ok(main.max(meta.modified()?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(main),
        Err(e) => Err(e.into()),
    }
}

/// `<db>-wal`, next to the store.
pub fn wal_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push("-wal");
    PathBuf::from(name)
}

/// Column names of the application table, in table order. Empty if the table
/// does not exist.
pub fn columns(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", TABLE))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

pub fn validate_schema(conn: &Connection) -> Result<()> {
    let found = columns(conn)?;
    let found_set: BTreeSet<&str> = found.iter().map(String::as_str).collect();
    let required_set: BTreeSet<&str> = COLUMNS.iter().copied().collect();
    if found_set != required_set || found.len() != COLUMNS.len() {
        return Err(TrackerError::SchemaMismatch {
            required: COLUMNS.iter().map(|c| c.to_string()).collect(),
            found,
        });
    }
    Ok(())
}

fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn quoted(columns: &[&str], prefix: &str) -> String {
    columns
        .iter()
        .map(|c| format!("{}\"{}\"", prefix, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every column plus the `Status` fill. A store without a fill layer reads as
/// unfilled.
fn select_sql(with_fills: bool) -> String {
    let columns = quoted(&COLUMNS, "a.");
    if with_fills {
        format!(
            "SELECT {}, f.argb FROM {} AS a
             LEFT JOIN {} AS f ON f.row_id = a.rowid AND f.column_name = '{}'
             ORDER BY a.rowid",
            columns, TABLE, FILLS_TABLE, STATUS
        )
    } else {
        format!("SELECT {}, NULL FROM {} AS a ORDER BY a.rowid", columns, TABLE)
    }
}

/// Inserts every column except `Status`, whose cell text stays empty.
fn insert_sql() -> String {
    let values = &COLUMNS[1..];
    let placeholders = (1..=values.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        TABLE,
        quoted(values, ""),
        placeholders
    )
}

/// Read every record, in row order. Fails on a missing file, a schema
/// mismatch, or a cell that cannot be interpreted.
pub fn load(path: &Path) -> Result<Vec<Record>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    validate_schema(&conn)?;

    let mut stmt = conn.prepare(&select_sql(has_table(&conn, FILLS_TABLE)?))?;
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let row_ref = RowRef::from_index(records.len());
        records.push(row_to_record(row, row_ref)?);
    }
    Ok(records)
}

/// Replace the table contents and their fills with `records`, in order, in one
/// transaction.
pub fn write(path: &Path, records: &[Record]) -> Result<()> {
    let mut conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    validate_schema(&conn)?;

    let tx = conn.transaction()?;
    tx.execute_batch(&create_fills_sql())?;
    tx.execute(&format!("DELETE FROM {}", TABLE), [])?;
    tx.execute(&format!("DELETE FROM {}", FILLS_TABLE), [])?;
    {
        let mut insert = tx.prepare(&insert_sql())?;
        let mut fill = tx.prepare(&format!(
            "INSERT INTO {} (row_id, column_name, argb) VALUES (?1, ?2, ?3)",
            FILLS_TABLE
        ))?;
        for record in records {
            insert.execute(params![
                record.company,
                record.location,
                record.job_title,
                record.code,
                record.work_type,
                format_date(record.applied_date),
                format_date(record.processed_date),
                format_date(record.result_date),
                record.link,
            ])?;
            if let Some(argb) = status::encode_cell(record.status) {
                fill.execute(params![tx.last_insert_rowid(), STATUS, argb])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Move the store aside as `<stem>_<timestamp>_bak.<ext>` and create a fresh
/// empty one in its place. Returns the backup path.
pub fn backup_and_recreate(path: &Path) -> Result<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let backup = unused_name(dir, path, &format!("{}_bak", timestamp()));
    fs::rename(path, &backup)?;
    info!(from = %path.display(), to = %backup.display(), "moved store aside");
    create(path)?;
    Ok(backup)
}

/// Snapshot the store into `dir` as `<stem>_backup_<timestamp>.<ext>`. An
/// existing backup is never replaced; a name already taken gets a counter.
///
/// The copy goes through SQLite so changes still sitting in `-wal` are
/// included.
pub fn backup_copy(path: &Path, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let target = unused_name(dir, path, &format!("backup_{}", timestamp()));
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.execute(
        "VACUUM INTO ?1",
        params![target.to_string_lossy().into_owned()],
    )?;
    Ok(target)
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// First `<dir>/<stem>_<label>[_N].<ext>` that does not exist yet.
fn unused_name(dir: &Path, path: &Path, label: &str) -> PathBuf {
    let mut target = dir.join(name_with_suffix(path, label));
    let mut n = 1;
    while target.exists() {
        target = dir.join(name_with_suffix(path, &format!("{}_{}", label, n)));
        n += 1;
    }
    target
}

fn name_with_suffix(path: &Path, suffix: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

/// Any cell as text; hand-edited stores may hold numbers where text belongs.
fn text(row: &Row, idx: usize) -> rusqlite::Result<Option<String>> {
    let value = match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Blob(_) => None,
    };
    Ok(value.filter(|v| !v.trim().is_empty()))
}

fn required(row: &Row, idx: usize, row_ref: RowRef) -> Result<String> {
    text(row, idx)?.ok_or_else(|| TrackerError::Corrupt {
        row: row_ref,
        column: COLUMNS[idx],
        reason: "required cell is blank".to_string(),
    })
}

fn date(row: &Row, idx: usize, row_ref: RowRef) -> Result<Option<NaiveDate>> {
    match text(row, idx)? {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map(Some)
            .map_err(|e| TrackerError::Corrupt {
                row: row_ref,
                column: COLUMNS[idx],
                reason: format!("'{}' is not a {} date: {}", raw, DATE_FORMAT, e),
            }),
    }
}

fn row_to_record(row: &Row, row_ref: RowRef) -> Result<Record> {
    Ok(Record {
        status: status::decode_cell(text(row, FILL_IDX)?.as_deref()),
        company: required(row, 1, row_ref)?,
        location: required(row, 2, row_ref)?,
        job_title: required(row, 3, row_ref)?,
        code: text(row, 4)?,
        work_type: text(row, 5)?,
        applied_date: date(row, 6, row_ref)?,
        processed_date: date(row, 7, row_ref)?,
        result_date: date(row, 8, row_ref)?,
        link: text(row, 9)?,
    })
}
