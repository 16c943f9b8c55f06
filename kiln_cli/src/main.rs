#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod backend;
mod cli;
mod error_fmt;
mod firing;
mod sessions;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use kiln_core::error::KilnError;
use kiln_core::hw_error::map_hw_error;
use kiln_core::Calibration;
use kiln_store::KilnStore;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::firing::{FireParams, build_oven, run_firing};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(&cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: &Cli) -> Result<()> {
    let cfg = kiln_config::load_file(&cli.config)?;
    init_tracing(cli, &cfg.logging);
    cfg.validate()
        .map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let mut out = std::io::stdout().lock();
    match &cli.cmd {
        Commands::Run {
            profile,
            start_at,
            max_cycles,
            follow_cooldown,
        } => {
            let calibration = load_calibration(cli, &cfg)?;
            let store = Arc::new(KilnStore::open(&cfg.storage.db_path)?);
            let backend = backend::build(&cfg)?;
            let (oven, sensor) = build_oven(&cfg, calibration, store, backend)?;

            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;

            let params = FireParams {
                profile: profile.as_deref(),
                start_at_minutes: *start_at,
                max_cycles: *max_cycles,
                follow_cooldown: *follow_cooldown,
            };
            let result = run_firing(&cfg, oven, &params, &shutdown);
            drop(sensor);
            let summary = result?;

            if cli.json {
                println!("{}", summary.to_json());
            } else {
                println!(
                    "firing {}: profile={} session={} cycles={} runtime={:.0}s cost={:.2} {} temp={:.1}",
                    summary.outcome.to_ascii_lowercase(),
                    summary.profile.as_deref().unwrap_or("-"),
                    summary.session_id.as_deref().unwrap_or("-"),
                    summary.cycles,
                    summary.runtime_s,
                    summary.cost,
                    summary.currency,
                    summary.temperature,
                );
            }
        }
        Commands::Sessions { limit, offset } => {
            let store = KilnStore::open(&cfg.storage.db_path)?;
            sessions::list(&store, *limit, *offset, cli.json, &mut out)?;
        }
        Commands::Session { id } => {
            let store = KilnStore::open(&cfg.storage.db_path)?;
            sessions::show(&store, id, cli.json, &mut out)?;
        }
        Commands::Samples {
            id,
            from,
            to,
            limit,
        } => {
            let store = KilnStore::open(&cfg.storage.db_path)?;
            sessions::samples(&store, id, *from, *to, *limit, &mut out)?;
        }
        Commands::Notes { id, text } => {
            let store = KilnStore::open(&cfg.storage.db_path)?;
            sessions::notes(&store, id, text, cli.json, &mut out)?;
        }
        Commands::SelfCheck => self_check(cli, &cfg)?,
    }
    Ok(())
}

fn load_calibration(cli: &Cli, cfg: &kiln_config::Config) -> Result<Calibration> {
    Ok(match &cli.calibration {
        Some(path) => {
            let rows = kiln_config::load_calibration_csv(path)?;
            tracing::info!(rows = rows.len(), path = %path.display(), "calibration table loaded");
            Calibration::Table(rows)
        }
        None => Calibration::from(&cfg.calibration),
    })
}

/// Read the thermocouple once, turn the element off and open the store.
fn self_check(cli: &Cli, cfg: &kiln_config::Config) -> Result<()> {
    let calibration = load_calibration(cli, cfg)?;
    let mut backend = backend::build(cfg)?;
    let reading = backend
        .thermocouple
        .read()
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
    if reading.any_fault() {
        let mut faults = Vec::new();
        if reading.no_connection {
            faults.push("no connection");
        }
        if reading.short_to_ground {
            faults.push("short to ground");
        }
        if reading.short_to_vcc {
            faults.push("short to vcc");
        }
        if reading.unknown_error {
            faults.push("unknown error");
        }
        return Err(KilnError::HardwareFault(format!(
            "thermocouple reports: {}",
            faults.join(", ")
        ))
        .into());
    }
    backend
        .element
        .off()
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
    let store = KilnStore::open(&cfg.storage.db_path)?;
    let schema = store.schema_version()?;
    let corrected = calibration.corrected(reading.temperature);

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "backend": backend.kind,
                "temperature": reading.temperature,
                "corrected": corrected,
                "schema_version": schema,
            })
        );
    } else {
        println!(
            "self-check OK: backend={} temperature={:.1} corrected={:.1} store schema v{}",
            backend.kind, reading.temperature, corrected, schema
        );
    }
    Ok(())
}

/// Console logs go to stderr (stdout carries command output); `[logging].file`
/// adds a JSON-lines file with optional rotation.
fn init_tracing(cli: &Cli, logging: &kiln_config::Logging) {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if cli.json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "kiln.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, &name),
            "hourly" => tracing_appender::rolling::hourly(dir, &name),
            _ => tracing_appender::rolling::never(dir, &name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let level = logging.level.as_deref().unwrap_or("info");
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(level))
                .boxed(),
        );
    }

    let _ = tracing_subscriber::registry().with(layers).try_init();
}
