mod alloc;
mod cli;
mod report;

use std::error::Error;

use clap::Parser;
use docshape_core::dispatch::{PopulationConfig, PopulationPlan};
use docshape_core::harness::{self, HarnessConfig};
use docshape_core::{populate, populate_observed};
use docshape_fake::FakeProvider;
use docshape_store::{MemoryStore, MongoConfig, MongoStore, Store};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::alloc::{AllocObserver, TrackingAllocator};
use crate::cli::{Backend, Cli, Command, Volume};

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = try_main() {
        eprintln!("docshape: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = open_store(&cli)?;

    match &cli.command {
        Command::Populate(volume) => run_populate(&cli, store.as_ref(), *volume),
        Command::Queries => {
            if cli.backend == Backend::Memory {
                return Err(
                    "the memory backend starts empty on every run; use `run` instead".into(),
                );
            }
            run_queries(&cli, store.as_ref())
        }
        Command::Run(volume) => {
            run_populate(&cli, store.as_ref(), *volume)?;
            run_queries(&cli, store.as_ref())
        }
        Command::Clean => {
            store.drop_database()?;
            info!(database = %cli.database, "database dropped");
            Ok(())
        }
    }
}

fn open_store(cli: &Cli) -> Result<Box<dyn Store>, Box<dyn Error>> {
    Ok(match cli.backend {
        Backend::Memory => Box::new(MemoryStore::new()),
        Backend::Mongodb => {
            let config = MongoConfig {
                uri: cli.uri.clone(),
                database: cli.database.clone(),
                max_pool_size: cli.pool_size,
                ..MongoConfig::default()
            };
            Box::new(MongoStore::connect(&config)?)
        }
    })
}

fn run_populate(cli: &Cli, store: &dyn Store, volume: Volume) -> Result<(), Box<dyn Error>> {
    let plan = PopulationPlan::new(&PopulationConfig {
        companies: volume.companies,
        persons: volume.persons,
        strategy: cli.strategy.map(Into::into),
        ..PopulationConfig::default()
    })?;
    let mut provider = match cli.seed {
        Some(seed) => FakeProvider::seeded(seed),
        None => FakeProvider::from_entropy(),
    };
    let today = chrono::Utc::now().date_naive();

    if cli.track_alloc {
        let mut observer = AllocObserver::default();
        let report = populate_observed(store, &mut provider, &plan, today, &mut observer)?;
        report::print_population(&report);
        report::print_allocations(&observer.phases);
    } else {
        let report = populate(store, &mut provider, &plan, today)?;
        report::print_population(&report);
    }
    Ok(())
}

/// Prints the full report first; failed queries then fail the process.
fn run_queries(cli: &Cli, store: &dyn Store) -> Result<(), Box<dyn Error>> {
    let config = HarnessConfig {
        sample_size: cli.sample_size,
        ..HarnessConfig::default()
    };
    let report = harness::run_all(store, &config);
    report::print_bench(&report);
    match report::failure_summary(&report) {
        Some(summary) => Err(summary.into()),
        None => Ok(()),
    }
}
