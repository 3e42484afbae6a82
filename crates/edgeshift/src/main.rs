//! EdgeShift - analyze API proxy bundles and migrate them to Apigee X.

mod commands;
mod config;

use clap::{ArgGroup, Parser, Subcommand};
use config::{Overrides, Settings};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "edgeshift")]
#[command(
    author,
    version,
    about = "Score API proxy migration complexity and run the migration pipeline"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// YAML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a proxy upload and write analysis.json
    Analyze {
        /// Proxy descriptor (.xml, .json) or bundle (.zip)
        #[arg(long)]
        file: PathBuf,

        /// Output directory
        #[arg(long, short, default_value = ".")]
        out: PathBuf,
    },

    /// Analyze and migrate a proxy, following the pipeline until it ends
    Migrate {
        /// Proxy descriptor (.xml, .json) or bundle (.zip)
        #[arg(long)]
        file: PathBuf,

        /// Credentials file (YAML or JSON)
        #[arg(long)]
        credentials: PathBuf,

        /// Output directory
        #[arg(long, short, default_value = ".")]
        out: PathBuf,

        /// Skip the simulated step delays
        #[arg(long)]
        instant: bool,
    },

    /// Print the known policy mappings
    Mappings,

    /// Check a stored record against its JSON schema
    #[command(group(ArgGroup::new("record").required(true).args(["analysis", "execution"])))]
    ValidateRecord {
        /// Analysis record
        #[arg(long)]
        analysis: Option<PathBuf>,

        /// Migration execution record
        #[arg(long)]
        execution: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init();
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply(&cli.overrides);

    match cli.command {
        Commands::Analyze { file, out } => {
            settings.log_summary();
            commands::analyze(&settings, &file, &out).await?;
        }

        Commands::Migrate {
            file,
            credentials,
            out,
            instant,
        } => {
            settings.log_summary();
            commands::migrate(&settings, &file, &credentials, &out, instant).await?;
        }

        Commands::Mappings => commands::mappings(),

        Commands::ValidateRecord {
            analysis,
            execution,
        } => commands::validate_record(analysis.as_deref(), execution.as_deref())?,
    }

    Ok(())
}
