use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

use library_ledger::settings::Settings;
use library_ledger::{catalog, ledger, reports, telemetry, ReturnError, ReturnReceipt, Store};

#[derive(Debug, Parser)]
#[command(name = "library-ledger", about = "Library catalog and rental ledger")]
struct Cli {
    /// Database file, overrides `database.path` from configuration.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the schema and load the seed data.
    Init {
        /// Delete the database file first.
        #[arg(long)]
        fresh: bool,
    },
    /// Run a read-only report.
    Report {
        #[command(subcommand)]
        report: Report,
    },
    /// Return a rented instance.
    Return {
        #[arg(long)]
        reader: i64,
        #[arg(long)]
        instance: i64,
        /// Return date, YYYY-MM-DD.
        #[arg(long)]
        date: NaiveDate,
    },
    /// Rent out an available instance.
    Checkout {
        #[arg(long)]
        reader: i64,
        #[arg(long)]
        instance: i64,
        /// Rental date, YYYY-MM-DD.
        #[arg(long)]
        date: NaiveDate,
    },
}

#[derive(Debug, Subcommand)]
enum Report {
    /// Book / author pairs.
    Books,
    /// Author, nationality, title and publication year.
    Details,
    /// Authors with all their titles.
    Authors,
    /// Authors credited on exactly N books.
    AuthorsWithCount { count: u32 },
    /// Instances currently rented out.
    CheckedOut,
    /// Rentals that have been returned.
    Returned,
    /// Who rented a given copy and when.
    History {
        #[arg(long)]
        title: String,
        #[arg(long)]
        instance: i64,
    },
    /// Stored statuses that disagree with open rentals.
    Drift,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = Settings::load().with_context(|| "failed to load settings")?;
    telemetry::init(&settings.telemetry);

    if let Some(db) = cli.db {
        settings.database.path = db;
    }
    let fresh = matches!(cli.command, Command::Init { fresh: true });
    if (fresh || settings.database.reset_on_start) && settings.database.path.exists() {
        tracing::info!(path = %settings.database.path.display(), "removing existing database");
        std::fs::remove_file(&settings.database.path).with_context(|| {
            format!("failed to remove {}", settings.database.path.display())
        })?;
    }

    let mut store = library_ledger::open_store(&settings.database.path)
        .with_context(|| format!("failed to open {}", settings.database.path.display()))?;

    match cli.command {
        Command::Init { .. } => {
            let stats =
                catalog::initialize(&mut store).with_context(|| "catalog initialization failed")?;
            print(cli.json, &format!("{stats:?}"), &stats)?;
        }
        Command::Report { report } => run_report(&store, report, cli.json)?,
        Command::Return {
            reader,
            instance,
            date,
        } => {
            let outcome = ledger::return_book(&mut store, reader, instance, date);
            match &outcome {
                Ok(receipt) => print(
                    cli.json,
                    &format!(
                        "reader {reader} returned instance {instance} (rental {}), {} still open",
                        receipt.rental_id, receipt.remaining_open
                    ),
                    receipt,
                )?,
                Err(err) => eprintln!("return failed: {err}"),
            }
            return Ok(ExitCode::from(return_status(&outcome)));
        }
        Command::Checkout {
            reader,
            instance,
            date,
        } => {
            let rental = ledger::check_out(&mut store, reader, instance, date)
                .with_context(|| "check-out failed")?;
            print(
                cli.json,
                &format!("rental {rental} opened for reader {reader} on instance {instance}"),
                &serde_json::json!({ "rental_id": rental }),
            )?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Exit status of `return`: 0 committed, 2 nothing to return, 1 store failure.
fn return_status(outcome: &Result<ReturnReceipt, ReturnError>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(err) if err.is_precondition() => 2,
        Err(_) => 1,
    }
}

fn run_report(store: &Store, report: Report, json: bool) -> anyhow::Result<()> {
    match report {
        Report::Books => print_rows(json, &reports::book_authors(store)?, |r| {
            format!("{} by {}", r.title, r.author)
        }),
        Report::Details => print_rows(json, &reports::book_author_details(store)?, |r| {
            format!(
                "{} ({}): {}, {}",
                r.author,
                r.nationality.as_deref().unwrap_or("-"),
                r.title,
                r.publication_year
            )
        }),
        Report::Authors => print_rows(json, &reports::authors_with_titles(store)?, |r| {
            format!("{}: {}", r.author, r.titles)
        }),
        Report::AuthorsWithCount { count } => {
            print_rows(json, &reports::authors_with_book_count(store, count)?, |r| {
                format!("{}: {}", r.author, r.titles)
            })
        }
        Report::CheckedOut => print_rows(json, &reports::checked_out(store)?, |r| {
            format!(
                "{} #{}: {}, since {}",
                r.title, r.instance_number, r.reader, r.date_rented
            )
        }),
        Report::Returned => print_rows(json, &reports::returned(store)?, |r| {
            format!(
                "{} #{}: {}, {} .. {}",
                r.title, r.instance_number, r.reader, r.date_rented, r.date_returned
            )
        }),
        Report::History { title, instance } => {
            print_rows(json, &reports::rental_history(store, &title, instance)?, |r| {
                match r.date_returned {
                    Some(returned) => format!("{}: {} .. {}", r.reader, r.date_rented, returned),
                    None => format!("{}: {} .. (open)", r.reader, r.date_rented),
                }
            })
        }
        Report::Drift => {
            print_rows(json, &reports::status_drift(store)?, |d| {
                format!(
                    "instance {} ({} #{}): stored {:?}, derived {:?}",
                    d.instance, d.title, d.instance_number, d.stored, d.derived
                )
            })?;
            print_rows(json, &reports::reader_status_drift(store)?, |d| {
                format!(
                    "reader {} ({}): stored {:?} with {} open rentals",
                    d.reader, d.name, d.stored, d.open_rentals
                )
            })
        }
    }
}

fn print_rows<T: Serialize>(
    json: bool,
    rows: &[T],
    line: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if rows.is_empty() {
        println!("(no rows)");
    } else {
        for row in rows {
            println!("{}", line(row));
        }
    }
    Ok(())
}

fn print<T: Serialize + ?Sized>(json: bool, text: &str, value: &T) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use library_ledger::StorageError;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seeded() -> Store {
        let mut store = library_ledger::open_memory().unwrap();
        catalog::seed(&mut store).unwrap();
        store
    }

    #[test]
    fn committed_return_exits_zero() {
        let mut store = seeded();
        let outcome = ledger::return_book(&mut store, 1, 1, date("2024-02-10"));
        assert_eq!(return_status(&outcome), 0);
    }

    #[test]
    fn nothing_to_return_exits_two() {
        let mut store = seeded();
        let outcome = ledger::return_book(&mut store, 1, 9, date("2024-02-10"));
        assert_eq!(return_status(&outcome), 2);

        let refused: Result<ReturnReceipt, ReturnError> =
            Err(ReturnError::NoOpenRental { reader: 3, instance: 4 });
        assert_eq!(return_status(&refused), 2);
    }

    #[test]
    fn storage_failure_exits_one() {
        let mut store = seeded();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reader_locked BEFORE UPDATE ON Reader
                 BEGIN SELECT RAISE(ABORT, 'reader row is locked'); END;",
            )
            .unwrap();
        let outcome = ledger::return_book(&mut store, 1, 1, date("2024-02-10"));
        assert_eq!(return_status(&outcome), 1);

        let failed: Result<ReturnReceipt, ReturnError> =
            Err(StorageError::Constraint("boom".into()).into());
        assert_eq!(return_status(&failed), 1);
    }

    #[test]
    fn return_arguments_parse() {
        let cli = Cli::try_parse_from([
            "library-ledger",
            "return",
            "--reader",
            "1",
            "--instance",
            "9",
            "--date",
            "2024-02-10",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Return { reader: 1, instance: 9, .. }
        ));
    }
}
