use anyhow::{Context, Result};
use applied::{Candidate, Config, Confirm, Entry, RowRef, Status, Summary, Tracker, TrackerError};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::Level;

#[derive(Parser)]
#[command(name = "applied")]
#[command(about = "Track job applications in a store you can also edit by hand")]
struct Cli {
    /// Path to the application store (overrides the config file)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store
    Init {
        /// Move a store with the wrong columns aside and start a new one
        #[arg(long)]
        recreate: bool,
    },

    /// Open the store in the system's default application
    Open,

    /// Record a new application
    Add {
        company: String,
        location: String,
        title: String,

        /// Requisition / job code
        #[arg(long)]
        code: Option<String>,

        /// Onsite, Hybrid or Remote
        #[arg(long = "type")]
        work_type: Option<String>,

        /// Link to the posting
        #[arg(long)]
        link: Option<String>,

        /// Add even if the same company and title are already recorded
        #[arg(long)]
        force: bool,

        /// Write even if the store changed externally
        #[arg(long)]
        overwrite: bool,
    },

    /// Search by company, initials or job title
    Search {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Show one application by row number
    Show {
        row: usize,

        #[arg(long)]
        json: bool,
    },

    /// Show the most recently added application
    Last {
        /// Delete it
        #[arg(long)]
        delete: bool,

        /// Write even if the store changed externally
        #[arg(long)]
        overwrite: bool,

        #[arg(long)]
        json: bool,
    },

    /// Set the status of an application (processing, rejected, offer, none)
    Mark {
        row: usize,

        status: Status,

        /// Write even if the store changed externally
        #[arg(long)]
        overwrite: bool,
    },

    /// Counts and rates across all applications
    Summary {
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    match cli.command {
        Commands::Init { recreate } => {
            let mut tracker = Tracker::create(&config).with_context(|| {
                format!("Failed to create store at {}", config.store_path.display())
            })?;
            match tracker.summary() {
                Ok(summary) => {
                    println!(
                        "Store ready at {} ({} applications)",
                        tracker.path().display(),
                        summary.total
                    );
                }
                Err(TrackerError::SchemaMismatch { required, found }) if recreate => {
                    let backup = tracker.recreate_store()?;
                    println!("Columns were {:?}, expected {:?}.", found, required);
                    println!("Old store moved to {}", backup.display());
                    println!("Created new store at {}", tracker.path().display());
                }
                Err(e @ TrackerError::SchemaMismatch { .. }) => {
                    return Err(e)
                        .context("Run 'applied init --recreate' to back up and replace the store");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Open => {
            let tracker = Tracker::open(&config)?;
            let path = tracker.path();
            if !path.exists() {
                anyhow::bail!(
                    "No store at {}. Run 'applied init' first",
                    path.display()
                );
            }
            let status = opener(path)
                .status()
                .with_context(|| format!("Failed to launch an opener for {}", path.display()))?;
            if !status.success() {
                anyhow::bail!("Opener exited with {} for {}", status, path.display());
            }
            println!("Opened {}", path.display());
            println!("Changes saved there are picked up on the next command.");
        }

        Commands::Add {
            company,
            location,
            title,
            code,
            work_type,
            link,
            force,
            overwrite,
        } => {
            let mut tracker = Tracker::open(&config)?;
            let candidate = Candidate {
                company,
                location,
                job_title: title,
                code,
                work_type,
                link,
            };
            let confirm = Confirm {
                duplicate: force,
                overwrite,
            };
            match tracker.add_record(candidate, confirm) {
                Ok(entry) => {
                    println!("Added application {}", entry.row);
                    print_entries(&[entry]);
                }
                Err(TrackerError::DuplicateEntry { row, existing }) => {
                    println!("Already recorded:");
                    print_entries(&[Entry {
                        row,
                        record: *existing,
                    }]);
                    println!("\nUse --force to add it anyway.");
                }
                Err(e) => return Err(conflict_hint(e)),
            }
        }

        Commands::Search { query, json } => {
            let mut tracker = Tracker::open(&config)?;
            let entries = tracker.search(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No applications match '{}'.", query);
            } else {
                print_entries(&entries);
            }
        }

        Commands::Show { row, json } => {
            let mut tracker = Tracker::open(&config)?;
            let entry = tracker.get(RowRef(row))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_details(&entry);
            }
        }

        Commands::Last {
            delete,
            overwrite,
            json,
        } => {
            let mut tracker = Tracker::open(&config)?;
            let entry = tracker.get_last()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_details(&entry);
            }
            if delete {
                let confirm = Confirm {
                    overwrite,
                    ..Default::default()
                };
                let removed = tracker.delete_last(confirm).map_err(conflict_hint)?;
                println!("\nDeleted {} - {}", removed.company, removed.job_title);
            }
        }

        Commands::Mark {
            row,
            status,
            overwrite,
        } => {
            let mut tracker = Tracker::open(&config)?;
            let confirm = Confirm {
                overwrite,
                ..Default::default()
            };
            let entry = tracker
                .mark_status(RowRef(row), status, confirm)
                .map_err(conflict_hint)?;
            println!("Row {} marked as {}.", entry.row, entry.record.status);
            print_entries(&[entry]);
        }

        Commands::Summary { json } => {
            let mut tracker = Tracker::open(&config)?;
            let summary = tracker.summary()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
    }

    Ok(())
}

fn conflict_hint(e: TrackerError) -> anyhow::Error {
    match e {
        e @ TrackerError::WriteConflict { .. } => {
            anyhow::Error::new(e)
                .context("Nothing written. Re-run with --overwrite to replace the external changes")
        }
        e => e.into(),
    }
}

/// The platform's "open with default application" command for `path`.
fn opener(path: &Path) -> Command {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };
    command.arg(path);
    command
}

fn print_entries(entries: &[Entry]) {
    println!(
        "{:<6} {:<3} {:<24} {:<30} {:<18} {:<10}",
        "ROW", "", "COMPANY", "TITLE", "LOCATION", "APPLIED"
    );
    println!("{}", "-".repeat(94));
    for entry in entries {
        let r = &entry.record;
        println!(
            "{:<6} {:<3} {:<24} {:<30} {:<18} {:<10}",
            entry.row.0,
            r.status.symbol(),
            truncate(&r.company, 22),
            truncate(&r.job_title, 28),
            truncate(&r.location, 16),
            date_or_dash(r.applied_date)
        );
    }
}

fn print_details(entry: &Entry) {
    let r = &entry.record;
    println!("Application {}", entry.row);
    println!("Company: {}", r.company);
    println!("Location: {}", r.location);
    println!("Job Title: {}", r.job_title);
    if let Some(code) = &r.code {
        println!("Code: {}", code);
    }
    if let Some(work_type) = &r.work_type {
        println!("Type: {}", work_type);
    }
    println!("Status: {} {}", r.status, r.status.symbol());
    println!("Applied: {}", date_or_dash(r.applied_date));
    println!("Processed: {}", date_or_dash(r.processed_date));
    println!("Result: {}", date_or_dash(r.result_date));
    if let Some(link) = &r.link {
        println!("Link: {}", link);
    }
}

fn print_summary(summary: &Summary) {
    println!("Application Summary:");
    println!("Total Applications: {}", summary.total);
    println!("Rejected: {}", summary.rejected);
    println!("Processing: {}", summary.processing);
    println!("Offers: {}", summary.offer);
    println!("Rejection Rate: {:.1}%", summary.rejection_rate * 100.0);
    println!("Processing Rate: {:.1}%", summary.processing_rate * 100.0);
    println!("Offer Rate: {:.1}% (offers/processing)", summary.offer_rate * 100.0);
}

fn date_or_dash(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format(applied::db::DATE_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
