//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Emergency shutoff used for the current run (for JSON details).
pub static LAST_SHUTOFF: OnceLock<f64> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln controller CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/kiln.toml")]
    pub config: PathBuf,

    /// Optional calibration CSV (strict header `temp,offset`)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Print results and logs as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fire a schedule profile (or wait for an interrupted run to resume)
    Run {
        /// Profile name, loaded from `<restart.profiles_dir>/<NAME>.json`
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Start this many minutes into the schedule
        #[arg(long, value_name = "MIN", default_value_t = 0.0)]
        start_at: f64,
        /// Stop (outcome ABORTED) after this many control cycles
        #[arg(long, value_name = "N")]
        max_cycles: Option<u64>,
        /// Keep recording cooldown samples after the schedule completes
        #[arg(long, action = ArgAction::SetTrue)]
        follow_cooldown: bool,
    },
    /// List recorded sessions, newest first
    Sessions {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one session
    Session {
        /// Session id
        id: String,
    },
    /// Print the samples of a session as JSON lines
    Samples {
        /// Session id
        id: String,
        /// Only samples at or after this unix second
        #[arg(long, value_name = "T")]
        from: Option<i64>,
        /// Only samples at or before this unix second
        #[arg(long, value_name = "T")]
        to: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Replace the notes of a session
    Notes {
        /// Session id
        id: String,
        /// New notes; an empty string clears them
        text: String,
    },
    /// Quick health check (config, store, thermocouple, heating element)
    SelfCheck,
}
