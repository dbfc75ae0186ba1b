//! Wavesync Replay - run declarative waveform scenarios without a browser
//!
//! Mounts a synchronizer over the headless engine, runs the scenario's
//! steps against it and prints the engine calls and callbacks of each step.
//!
//! ## Usage
//!
//! ```text
//! wavesync-replay <scenario.yaml> [--strict] [--settings <sync.yaml>]
//! ```
//!
//! - `--strict`: stop at the first failing step and exit non-zero
//! - `--settings`: synchronizer settings file (default: `<config dir>/wavesync/sync.yaml`)

mod runner;
mod scenario;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use wavesync_core::config::{default_config_path, load_config, SyncSettings};

use runner::Report;
use scenario::Scenario;

struct Args {
    scenario: PathBuf,
    strict: bool,
    settings: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut scenario = None;
    let mut strict = false;
    let mut settings = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--strict" => strict = true,
            "--settings" => {
                let path = iter.next().context("--settings needs a path")?;
                settings = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("Unknown flag {}", flag),
            path => {
                if scenario.replace(PathBuf::from(path)).is_some() {
                    bail!("Only one scenario file can be replayed at a time");
                }
            }
        }
    }

    Ok(Args {
        scenario: scenario.context("Usage: wavesync-replay <scenario.yaml> [--strict] [--settings <sync.yaml>]")?,
        strict,
        settings,
    })
}

fn print_report(report: &Report) {
    println!("mount");
    for call in &report.mount_calls {
        println!("    call  {:?}", call);
    }
    for step in &report.steps {
        println!("[{}] {}", step.index, step.label);
        for call in &step.calls {
            println!("    call  {:?}", call);
        }
        for slot in &step.fired {
            println!("    fired {}", slot);
        }
        if let Some(e) = &step.error {
            println!("    error {}", e);
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(&args)?;
    let scenario = Scenario::load(&args.scenario)?;

    let settings = match &scenario.settings {
        Some(settings) => settings.clone(),
        None => {
            let path = args
                .settings
                .clone()
                .unwrap_or_else(|| default_config_path("sync.yaml"));
            load_config::<SyncSettings>(&path)
        }
    };

    log::info!(
        "wavesync-replay: {} step(s) from {:?}",
        scenario.steps.len(),
        args.scenario
    );
    let report = runner::run(&scenario, settings, args.strict)
        .with_context(|| format!("Failed to mount scenario {:?}", args.scenario))?;
    print_report(&report);

    let errors = report.errors();
    if args.strict && errors > 0 {
        bail!("{} step(s) failed", errors);
    }
    if errors > 0 {
        log::warn!("wavesync-replay: {} step(s) failed", errors);
    }
    Ok(())
}
