use std::{path::PathBuf, process::ExitCode};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use event_board::config::{AppConfig, ConfigStore, DEFAULT_LOG_FILTER};
use event_board::db::Store;
use event_board::utils;
use event_board::{check_candidates, import_candidates, read_submissions, CandidateOutcome};

const USAGE: &str = "usage: event-board <command>

commands:
  check <file.json>        validate submissions without storing them
  import <file.json>       validate and store submissions
  list                     print stored events
  seed                     add sample events to an empty database
  config                   print the effective configuration
  config time-zone <zone>  set the zone used for naive datetimes";

fn main() -> ExitCode {
    let config_path = utils::config_path();
    let (config_store, load_error) = match ConfigStore::open(config_path.clone()) {
        Ok(store) => (store, None),
        Err(err) => (ConfigStore::with_defaults(config_path), Some(err)),
    };
    let config = config_store.effective();
    init_tracing(&config);
    if let Some(err) = load_error {
        warn!(path = ?config_store.path(), "ignoring unreadable config: {err}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&config_store, &config, &args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_new(config.log_filter())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns `Ok(false)` when the command ran but some candidates were rejected.
fn run(config_store: &ConfigStore, config: &AppConfig, args: &[String]) -> Result<bool> {
    let command = args.first().map(String::as_str);
    match command {
        Some("check") => {
            let path = file_arg(args)?;
            let candidates = read_submissions(&path, config.time_zone()?)?;
            let store = open_store(config)?;
            let outcomes = check_candidates(&store, &candidates)?;
            for outcome in &outcomes {
                print_outcome(outcome);
            }
            Ok(outcomes.iter().all(CandidateOutcome::is_accepted))
        }
        Some("import") => {
            let path = file_arg(args)?;
            let candidates = read_submissions(&path, config.time_zone()?)?;
            let mut store = open_store(config)?;
            let report = import_candidates(&mut store, &candidates)?;
            for event in &report.imported {
                println!("imported {}", event.summary_line());
            }
            for outcome in &report.rejected {
                print_outcome(outcome);
            }
            println!(
                "{} imported, {} rejected",
                report.imported.len(),
                report.rejected.len()
            );
            Ok(report.rejected.is_empty())
        }
        Some("list") => {
            let store = open_store(config)?;
            for event in store.list()? {
                println!("{}", event.summary_line());
            }
            Ok(true)
        }
        Some("seed") => {
            let mut store = open_store(config)?;
            let added = store.seed_if_empty()?;
            println!("{added} sample events added");
            Ok(true)
        }
        Some("config") => match args.get(1).map(String::as_str) {
            None => {
                println!("config file: {}", config_store.path().display());
                println!("{}", serde_json::to_string_pretty(config)?);
                println!("database: {}", config.database_path().display());
                Ok(true)
            }
            Some("time-zone") => {
                let zone = args
                    .get(2)
                    .ok_or_else(|| anyhow!("config time-zone needs a zone name"))?;
                let updated = config_store
                    .update(|cfg| cfg.time_zone = Some(zone.clone()))
                    .context("failed to save config")?;
                println!("time zone set to {}", updated.time_zone()?);
                Ok(true)
            }
            Some(other) => bail!("unknown config option: {other}\n\n{USAGE}"),
        },
        Some(other) => bail!("unknown command: {other}\n\n{USAGE}"),
        None => bail!("{USAGE}"),
    }
}

fn file_arg(args: &[String]) -> Result<PathBuf> {
    args.get(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("{} needs a JSON file\n\n{USAGE}", args[0]))
}

fn open_store(config: &AppConfig) -> Result<Store> {
    let path = config.database_path();
    Store::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}

fn print_outcome(outcome: &CandidateOutcome) {
    let label = outcome.name.as_deref().unwrap_or("<unnamed>");
    if outcome.is_accepted() {
        println!("#{} {label}: ok", outcome.index);
        return;
    }
    println!("#{} {label}: rejected", outcome.index);
    for violation in &outcome.violations {
        println!("    {violation}");
    }
}
