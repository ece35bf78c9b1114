//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use twt_core::{Grouping, Range, Unit};

/// Work time tracker.
///
/// Records when you start, pause, resume and stop work on tasks, and sums
/// the time per task over days, weeks, months or years.
#[derive(Debug, Parser)]
#[command(name = "twt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start working on a task, creating it if needed.
    Start {
        /// Task name.
        task: String,

        #[command(flatten)]
        marker: Marker,
    },

    /// Stop running or paused tasks.
    Stop {
        /// Only stop this task.
        task: Option<String>,

        #[command(flatten)]
        marker: Marker,
    },

    /// Pause running tasks.
    Pause {
        /// Only pause this task.
        task: Option<String>,

        #[command(flatten)]
        marker: Marker,
    },

    /// Resume paused tasks.
    Resume {
        /// Only resume this task.
        task: Option<String>,

        #[command(flatten)]
        marker: Marker,
    },

    /// List tasks and whether they are running.
    Tasks {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Hide a task from tracking. Its past events still count in reports.
    Deactivate {
        /// Task name.
        task: String,
    },

    /// Allow tracking a deactivated task again.
    Activate {
        /// Task name.
        task: String,
    },

    /// List the events of a time range.
    Events {
        #[command(flatten)]
        selection: Selection,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sum the time per task over a time range.
    Report {
        #[command(flatten)]
        selection: Selection,

        /// How to group the sums: none, by-task, by-task-per-day,
        /// by-task-per-week or by-task-per-month.
        #[arg(short, long, default_value = "by-task")]
        grouping: Grouping,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// When and why an event happened.
#[derive(Debug, Clone, Args)]
pub struct Marker {
    /// When the event happened (ISO 8601 or relative, e.g. '15 minutes ago').
    #[arg(long)]
    pub at: Option<String>,

    /// Free-text note stored with the event.
    #[arg(short, long)]
    pub note: Option<String>,
}

/// Which time range to look at.
#[derive(Debug, Clone, Copy, Args)]
pub struct Selection {
    /// last, current, last-and-current or all-data.
    #[arg(short, long, default_value = "current")]
    pub range: Range,

    /// day, week, month or year.
    #[arg(short, long, default_value = "week")]
    pub unit: Unit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_defaults_to_current_week_by_task() {
        let cli = Cli::try_parse_from(["twt", "report"]).unwrap();
        let Some(Commands::Report {
            selection,
            grouping,
            json,
        }) = cli.command
        else {
            panic!("expected report command");
        };
        assert_eq!(selection.range, Range::Current);
        assert_eq!(selection.unit, Unit::Week);
        assert_eq!(grouping, Grouping::ByTask);
        assert!(!json);
    }

    #[test]
    fn report_parses_selection() {
        let cli = Cli::try_parse_from([
            "twt",
            "report",
            "--range",
            "last-and-current",
            "--unit",
            "month",
            "--grouping",
            "by-task-per-week",
            "--json",
        ])
        .unwrap();
        let Some(Commands::Report {
            selection,
            grouping,
            json,
        }) = cli.command
        else {
            panic!("expected report command");
        };
        assert_eq!(selection.range, Range::LastAndCurrent);
        assert_eq!(selection.unit, Unit::Month);
        assert_eq!(grouping, Grouping::ByTaskPerWeek);
        assert!(json);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let err = Cli::try_parse_from(["twt", "report", "--unit", "fortnight"]).unwrap_err();
        assert!(err.to_string().contains("fortnight"));
    }

    #[test]
    fn deactivate_takes_task() {
        let cli = Cli::try_parse_from(["twt", "deactivate", "ops"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Deactivate { task }) if task == "ops"));
    }

    #[test]
    fn start_takes_task_and_marker() {
        let cli =
            Cli::try_parse_from(["twt", "start", "dev", "--at", "1 hour ago", "-n", "review"])
                .unwrap();
        let Some(Commands::Start { task, marker }) = cli.command else {
            panic!("expected start command");
        };
        assert_eq!(task, "dev");
        assert_eq!(marker.at.as_deref(), Some("1 hour ago"));
        assert_eq!(marker.note.as_deref(), Some("review"));
    }
}
