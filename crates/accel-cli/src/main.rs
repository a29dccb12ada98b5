use accel_api::*;
use accel_core::config::{default_config_path, LoaderConfig};
use accel_loader::Loader;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

mod check;
mod query;

#[derive(Parser)]
#[command(name = "accel")]
#[command(about = "Accelerator loader - drivers, devices and dispatch configuration")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to the system loader.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the loader and list drivers and devices
    Info {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration (file plus environment overrides)
    Config,

    /// Create and destroy objects on every device through the full dispatch path
    Check {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<String>) -> LoaderConfig {
    let path = path.unwrap_or_else(default_config_path);
    info!("using configuration {}", path);
    let mut config = LoaderConfig::load_or_default(&path);
    config.apply_env();
    config
}

fn start(config: &LoaderConfig) -> anyhow::Result<(Loader, DdiTables)> {
    let loader = Loader::from_config(config).context("failed to configure the loader")?;
    if loader.driver_count() == 0 {
        anyhow::bail!("no drivers configured. Add [[drivers]] to loader.toml or set ACCEL_ENABLE_NULL_DRIVER=1");
    }
    let tables = loader
        .build_all_tables(loader.api_version())
        .context("failed to build dispatch tables")?;
    query::entry(&tables.global.init, "zeInit")?(InitFlags::empty())
        .check()
        .context("no driver initialized")?;
    Ok((loader, tables))
}

fn main() -> anyhow::Result<()> {
    accel_common::init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config);

    match cli.command {
        Commands::Info { json } => {
            let (loader, tables) = start(&config)?;
            let report = query::collect(&loader, &tables)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                query::print_report(&report);
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }

        Commands::Check { json } => {
            let (_loader, tables) = start(&config)?;
            let results = check::run_checks(&tables);
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                check::print_results(&results);
            }
            if check::any_failed(&results) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
