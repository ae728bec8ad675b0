mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use qqwry::validation::ValidationLevel;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use commands::{cmd_inspect, cmd_query, cmd_validate};

#[derive(Parser)]
#[command(name = "qqwry")]
#[command(
    about = "Look up IPv4 addresses in QQWry (CZ88) geolocation databases",
    long_about = "qqwry - Fast, panic-free reader for QQWry (纯真) IPv4 geolocation databases\n\n\
    Resolves IPv4 addresses to country, province, city, district and ISP using a\n\
    qqwry.dat file. Private and loopback addresses are answered without the database.\n\n\
    Examples:\n\
      qqwry query qqwry.dat 114.114.114.114\n\
      qqwry query qqwry.dat --input addresses.txt --format text\n\
      cat access.log.ips | qqwry query qqwry.dat --input -\n\
      qqwry inspect qqwry.dat\n\
      qqwry validate qqwry.dat --level strict\n\n\
    Set RUST_LOG (e.g. RUST_LOG=qqwry=debug) for diagnostic logging on stderr."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one or more IPv4 addresses
    Query {
        /// Path to the QQWry database (.dat, optionally .gz)
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Addresses to resolve (a.b.c.d, optionally with :port)
        #[arg(value_name = "IP")]
        ips: Vec<String>,

        /// Read additional addresses from a file, one per line ("-" for stdin)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output format: json (default) or text
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Quiet mode - no output, only exit code (0 = all resolved, 1 = otherwise)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show database layout, size and release label
    Inspect {
        /// Path to the QQWry database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Validate a database file for safety and correctness
    Validate {
        /// Path to the QQWry database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Validation level: standard (default) or strict
        #[arg(short, long, default_value = "standard")]
        level: ValidationLevel,

        /// Output results as JSON
        #[arg(short, long)]
        json: bool,

        /// Show detailed information (warnings and info messages)
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            database,
            ips,
            input,
            format,
            quiet,
        } => cmd_query(database, ips, input, format, quiet),
        Commands::Inspect { database, json } => cmd_inspect(database, json),
        Commands::Validate {
            database,
            level,
            json,
            verbose,
        } => cmd_validate(database, level, json, verbose),
    }
}
