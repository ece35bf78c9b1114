use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use twt_cli::commands::{events, report, tasks, track, util};
use twt_cli::{Cli, Commands, Config, Marker};
use twt_core::{EventKind, ReportRequest};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(twt_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = twt_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let tz = config.timezone()?;
    let calendar = config.calendar()?;
    // One clock reading per command
    let now = Utc::now();
    let at = |marker: &Marker| {
        marker
            .at
            .as_deref()
            .map_or(Ok(now), |at| util::parse_datetime(at, tz, now))
    };

    let mut stdout = io::stdout().lock();
    match command {
        Commands::Start { task, marker } => {
            track::start(&mut stdout, &mut db, tz, &task, at(&marker)?, marker.note)?;
        }
        Commands::Stop { task, marker } => {
            let when = at(&marker)?;
            track::transition(
                &mut stdout,
                &mut db,
                tz,
                EventKind::End,
                task.as_deref(),
                when,
                marker.note,
            )?;
        }
        Commands::Pause { task, marker } => {
            let when = at(&marker)?;
            track::transition(
                &mut stdout,
                &mut db,
                tz,
                EventKind::Pause,
                task.as_deref(),
                when,
                marker.note,
            )?;
        }
        Commands::Resume { task, marker } => {
            let when = at(&marker)?;
            track::transition(
                &mut stdout,
                &mut db,
                tz,
                EventKind::Resume,
                task.as_deref(),
                when,
                marker.note,
            )?;
        }
        Commands::Tasks { json } => {
            tasks::run(&mut stdout, &db, tz, json)?;
        }
        Commands::Deactivate { task } => {
            tasks::set_active(&mut stdout, &mut db, &task, false)?;
        }
        Commands::Activate { task } => {
            tasks::set_active(&mut stdout, &mut db, &task, true)?;
        }
        Commands::Events { selection, json } => {
            let now = now.with_timezone(&tz);
            events::run(
                &mut stdout,
                &db,
                &calendar,
                selection.range,
                selection.unit,
                now,
                json,
            )?;
        }
        Commands::Report {
            selection,
            grouping,
            json,
        } => {
            let request = ReportRequest {
                range: selection.range,
                unit: selection.unit,
                grouping,
            };
            let now = now.with_timezone(&tz);
            report::run(&mut stdout, &db, &calendar, request, now, json)?;
        }
    }
    stdout.flush()?;

    Ok(())
}
