use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "koyomi",
    version,
    about = "Koyomi: personal task-and-calendar CLI",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render a month grid with its event lanes.
    Month {
        /// Month as YYYY-MM; defaults to the current month.
        month: Option<String>,
    },
    /// List one day's tasks and events.
    Agenda {
        /// Date as YYYY-MM-DD; defaults to today.
        date: Option<String>,
    },
    /// Add a calendar event.
    AddEvent {
        title: String,

        /// Start instant, e.g. 2024-03-15T09:00 or 2024-03-15.
        #[arg(long)]
        start: String,

        /// End instant; omit for a single-instant event.
        #[arg(long)]
        end: Option<String>,

        /// Tag the event as coming from an external account.
        #[arg(long)]
        external: bool,
    },
    /// Add a task.
    AddTask {
        title: String,

        /// Due instant, e.g. 2024-03-15T09:00 or 2024-03-15.
        #[arg(long)]
        due: Option<String>,
    },
    /// Mark a task completed by uuid (unique prefix allowed).
    Done { uuid: String },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
