use clap::{Args, Parser, Subcommand, ValueEnum};
use docshape_core::dispatch::Strategy;

/// Populate and benchmark three document models of companies and persons.
#[derive(Parser, Debug)]
#[command(name = "docshape", version)]
pub struct Cli {
    /// MongoDB connection string.
    #[arg(
        long,
        env = "MONGODB_URI",
        default_value = "mongodb://localhost:27017",
        global = true
    )]
    pub uri: String,

    /// Database holding the model collections.
    #[arg(
        long = "db",
        env = "DOCSHAPE_DB",
        default_value = "docshape",
        global = true
    )]
    pub database: String,

    #[arg(long, value_enum, default_value_t = Backend::Mongodb, global = true)]
    pub backend: Backend,

    /// Seed for repeatable datasets; random when omitted.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Rows printed per read query.
    #[arg(long, default_value_t = 3, global = true)]
    pub sample_size: usize,

    /// Maximum connections in the driver pool.
    #[arg(long, default_value_t = 50, global = true)]
    pub pool_size: u32,

    /// Report peak heap usage per population phase.
    #[arg(long, global = true)]
    pub track_alloc: bool,

    /// Force a denormalization strategy instead of picking one by volume.
    #[arg(long, value_enum, global = true)]
    pub strategy: Option<StrategyArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum, Eq, PartialEq)]
#[value(rename_all = "kebab_case")]
pub enum Backend {
    Mongodb,
    Memory,
}

#[derive(Clone, Copy, Debug, ValueEnum, Eq, PartialEq)]
#[value(rename_all = "kebab_case")]
pub enum StrategyArg {
    InMemory,
    Streaming,
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::InMemory => Strategy::InMemory,
            StrategyArg::Streaming => Strategy::Streaming,
        }
    }
}

#[derive(Args, Debug, Clone, Copy)]
pub struct Volume {
    #[arg(long, default_value_t = 5)]
    pub companies: usize,

    #[arg(long, default_value_t = 50_000)]
    pub persons: usize,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drop and rebuild all three models.
    Populate(Volume),
    /// Run the query benchmark against existing data.
    Queries,
    /// Populate, then run the query benchmark.
    Run(Volume),
    /// Drop the whole database.
    Clean,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn populate_flags_parse() {
        let cli = Cli::try_parse_from([
            "docshape",
            "--backend",
            "memory",
            "populate",
            "--companies",
            "10",
            "--persons",
            "200",
            "--strategy",
            "streaming",
        ])
        .unwrap();
        assert_eq!(cli.backend, Backend::Memory);
        assert_eq!(cli.strategy, Some(StrategyArg::Streaming));
        let Command::Populate(volume) = cli.command else {
            panic!("expected populate");
        };
        assert_eq!((volume.companies, volume.persons), (10, 200));
    }
}
