// src/main.rs

//! ppkg - CLI entry point.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(name = "ppkg")]
#[command(version)]
#[command(about = "Minimalist source-to-binary package manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create all directories under the base
    Init,

    /// Execute the full build pipeline for a recipe
    Run {
        /// Path to the recipe file
        recipe: PathBuf,
    },

    /// Install a package archive into the target root
    Install {
        /// Package path, absolute or relative to the packages directory
        package: String,
    },

    /// Remove an installed package
    Remove {
        /// Registered package name
        name: String,
    },

    /// Re-package the current stage tree without rebuilding
    Pack,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ppkg::Config::from_env();

    let result = match cli.command {
        Commands::Init => commands::cmd_init(&config),
        Commands::Run { recipe } => commands::cmd_run(&config, &recipe),
        Commands::Install { package } => commands::cmd_install(&config, &package),
        Commands::Remove { name } => commands::cmd_remove(&config, &name),
        Commands::Pack => commands::cmd_pack(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\x1b[31merror:\x1b[0m {err:#}");
            let code = err
                .downcast_ref::<ppkg::Error>()
                .map(|e| e.exit_code())
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}
