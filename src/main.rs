// Module declarations
mod cli;
mod config;
mod engine;
mod error;
mod extract;
mod normalize;
mod notify;
mod runner;
mod store;
mod types;
mod util;

// Modules share one namespace through crate-root re-exports.
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use config::*;
#[allow(unused_imports)]
pub(crate) use engine::*;
#[allow(unused_imports)]
pub(crate) use error::*;
#[allow(unused_imports)]
pub(crate) use extract::*;
#[allow(unused_imports)]
pub(crate) use normalize::*;
#[allow(unused_imports)]
pub(crate) use notify::*;
#[allow(unused_imports)]
pub(crate) use runner::*;
#[allow(unused_imports)]
pub(crate) use store::*;
#[allow(unused_imports)]
pub(crate) use types::*;
#[allow(unused_imports)]
pub(crate) use util::*;

use clap::Parser;

fn print_report(report: &RunReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let prefix = if report.dry_run { "dry run: " } else { "" };
    println!(
        "{prefix}{} for {} ({})",
        report.decision.label(),
        format_birth_date(report.birth_date_epoch),
        report.birth_date_epoch
    );
    if let Some(announcement) = &report.announcement {
        println!("Announced: {}", announcement.message);
        if let Some(err) = &announcement.notification_error {
            println!("Announcement transport failed: {err}");
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::resolve(load_file_config(&cli.config)?)?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    match cli.command {
        Command::Run { json, dry_run } => {
            let runner = Runner::from_settings(settings);
            let report = runner.run_once(dry_run)?;
            print_report(&report, json)
        }

        Command::Watch {
            max_runs,
            interval_minutes,
        } => {
            if let Some(minutes) = interval_minutes {
                settings.poll_interval = poll_interval_from_minutes("--interval-minutes", minutes)?;
            }
            tracing::info!(
                interval_secs = settings.poll_interval.as_secs(),
                threshold = settings.threshold,
                "watching"
            );
            let runner = Runner::from_settings(settings);
            let results = runner.watch(max_runs);
            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                eprintln!("{failed} of {} runs failed", results.len());
            }
            Ok(())
        }

        Command::History { json } => {
            let store = SqliteStore::open_read_only(&settings.db_path)?;
            let rows = store.list_known_birthdates()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                println!("No birth dates recorded in {}", settings.db_path.display());
                return Ok(());
            }
            println!("{:<20} {:>14} {:>10} {:>9}", "birth date", "epoch", "times seen", "announced");
            for row in rows {
                println!(
                    "{:<20} {:>14} {:>10} {:>9}",
                    format_birth_date(row.birth_date_epoch),
                    row.birth_date_epoch,
                    row.times_seen,
                    if row.tweeted { "yes" } else { "no" }
                );
            }
            Ok(())
        }

        Command::Init => {
            SqliteStore::open_or_create(&settings.db_path)?;
            println!("History database ready at {}", settings.db_path.display());
            Ok(())
        }

        Command::CheckSource { json } => {
            let source = WikipediaSource::new(settings.source_url.clone(), settings.http_timeout);
            let raw = source.fetch_candidate()?;
            let candidate = normalize_candidate(raw, &settings.source_url)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&candidate)?);
            } else {
                println!("Name:       {}", clean_person_name(&candidate.name));
                println!("Country:    {}", candidate.country);
                println!("Born:       {} ({})", candidate.birth_date_raw, candidate.birth_date_epoch);
                println!("Profile:    {}", candidate.profile_link);
            }
            Ok(())
        }
    }
}
