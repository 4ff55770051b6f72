//! # rusty-exporter CLI Entry Point

use anyhow::Context;
use clap::Parser;
use rusty_exporter::Config;
use rusty_exporter::Exporter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exports spreadsheet tables to JSON and generates C# declarations from their schemas.
#[derive(Parser, Debug)]
#[command(name = "rusty-exporter", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Export every workbook to JSON.
    Data {
        /// Path of the JSON config file
        config: PathBuf,
    },
    /// Generate C# declarations from the schema documents.
    Code {
        /// Path of the JSON config file
        config: PathBuf,
    },
    /// Export data, then generate code.
    All {
        /// Path of the JSON config file
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let (config_path, data, code) = match cli.command {
        Commands::Data { config } => (config, true, false),
        Commands::Code { config } => (config, false, true),
        Commands::All { config } => (config, true, true),
    };

    let config = Config::load(&config_path).with_context(|| format!("Cannot load '{}'", config_path.display()))?;
    let exporter = Exporter::new(config);

    // Code is still generated when some tables fail to export.
    let data_result = if data { exporter.export_data().map(|_| ()) } else { Ok(()) };
    let code_result = if code { exporter.export_code().map(|_| ()) } else { Ok(()) };
    data_result.context("Data export failed")?;
    code_result.context("Code generation failed")?;
    Ok(())
}
