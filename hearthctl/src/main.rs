use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "hearthctl", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema and print its version
    Migrate(commands::migrate::MigrateArgs),
    /// Load a YAML fixture of landlords, properties and tenants
    Seed(commands::seed::SeedArgs),
    /// Mint a session token for ops use
    Token(commands::token::TokenArgs),
    /// Render the platform rollup for a month
    Stats(commands::stats::StatsArgs),
    /// Print version and exit
    Version,
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Migrate(args) => commands::migrate::run(args),
        Commands::Seed(args) => commands::seed::run(args),
        Commands::Token(args) => commands::token::run(args),
        Commands::Stats(args) => commands::stats::run(args),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
