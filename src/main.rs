//! Binary entry point: a session (`run`) loads the remote snapshots, hands the
//! store to the terminal UI, and publishes both collections when the operator
//! quits. The other subcommands expose each step on its own.
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mouse_records_manager::error::error_chain;
use mouse_records_manager::logging::init_logging;
use mouse_records_manager::session::{bootstrap_from_remote, publish, PublishOutcome};
use mouse_records_manager::{
    run_app, write_csv, App, Collection, Column, Config, Outcome, RecordStore,
};

#[derive(Parser)]
#[command(name = "mouse-records", version, about = "Track laboratory mouse records")]
struct Cli {
    /// Config file (defaults to ~/.mouse-records/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap from remote snapshots, run the UI, then publish
    Run {
        /// Skip downloading snapshots and keep the local records
        #[arg(long)]
        offline: bool,
        /// Skip committing and pushing the collections on exit
        #[arg(long)]
        no_publish: bool,
    },
    /// Run the UI against the local store only
    Ui,
    /// Replace both collections with the remote snapshots
    Bootstrap,
    /// Export both collections to the sync checkout, commit, and push
    Publish,
    /// Print a collection as CSV, optionally filtered by one column
    List {
        collection: Collection,
        #[arg(long, requires = "value")]
        column: Option<Column>,
        #[arg(long, requires = "column")]
        value: Option<String>,
    },
    /// Copy a live record into the deceased collection
    Migrate { identifier: String },
    /// Write a collection to a CSV file
    Export { collection: Collection, path: PathBuf },
    /// Replace a collection with the rows of a CSV file
    Import { collection: Collection, path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let command = cli.command.unwrap_or(Command::Run {
        offline: false,
        no_publish: false,
    });

    let interactive = matches!(command, Command::Run { .. } | Command::Ui);
    let _log_guard = init_logging(&config.logging, !interactive)?;

    let store = RecordStore::open(config.store.clone()).context("failed to open record store")?;

    match command {
        Command::Run {
            offline,
            no_publish,
        } => run_session(&config, store, offline, no_publish),
        Command::Ui => {
            let mut app = App::new(store)?;
            run_app(&mut app)
        }
        Command::Bootstrap => {
            let report = bootstrap_from_remote(&store, &config.sync);
            for line in report.summary_lines() {
                println!("{line}");
            }
            if report.all_loaded() {
                Ok(())
            } else {
                anyhow::bail!("one or more snapshots could not be loaded")
            }
        }
        Command::Publish => {
            let report = publish(&store, &config.sync).context("failed to publish collections")?;
            println!("{}", report.summary());
            match report.outcome {
                PublishOutcome::CommittedNotPushed(_) => anyhow::bail!("push failed"),
                _ => Ok(()),
            }
        }
        Command::List {
            collection,
            column,
            value,
        } => {
            let records = match (column, value) {
                (Some(column), Some(value)) => store.filter(collection, column, &value)?,
                _ => store.fetch(collection)?,
            };
            write_csv(&records, io::stdout().lock())?;
            Ok(())
        }
        Command::Migrate { identifier } => match store.migrate(&identifier)? {
            Outcome::Applied => {
                println!("Copied {identifier} to the deceased collection.");
                Ok(())
            }
            Outcome::NotFound => anyhow::bail!("record {identifier} is not in the live collection"),
        },
        Command::Export { collection, path } => {
            let rows = store.export_to_path(collection, &path)?;
            println!("Exported {rows} {collection} records to {}.", path.display());
            Ok(())
        }
        Command::Import { collection, path } => {
            let rows = store
                .import_from_path(collection, &path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            println!("Loaded {rows} {collection} records from {}.", path.display());
            Ok(())
        }
    }
}

/// Bootstrap, hand control to the UI, then publish. Bootstrap and publish
/// failures are reported but never stop the session.
fn run_session(config: &Config, store: RecordStore, offline: bool, no_publish: bool) -> Result<()> {
    let mut startup = Vec::new();
    let mut startup_failed = false;
    if offline {
        startup.push("Offline: using local records.".to_string());
    } else {
        let report = bootstrap_from_remote(&store, &config.sync);
        startup_failed = !report.all_loaded();
        startup.extend(report.summary_lines());
    }

    let mut app = App::new(store.clone())?.with_status(startup.join(" "), startup_failed);
    run_app(&mut app)?;

    if no_publish {
        return Ok(());
    }
    match publish(&store, &config.sync) {
        Ok(report) => {
            eprintln!("{}", report.summary());
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %error_chain(&err), "publish failed");
            eprintln!("Publish failed: {}", error_chain(&err));
            Ok(())
        }
    }
}
