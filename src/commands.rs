// src/commands.rs

//! Command implementations for the CLI entry point.

use anyhow::Result;
use std::path::Path;
use tracing::{error, info};

use ppkg::config::Config;
use ppkg::pipeline::{self, BuildRun};
use ppkg::recipe::Recipe;
use ppkg::report::LogReporter;
use ppkg::{install, remove};

/// `init`: create all directories under the base.
pub fn cmd_init(config: &Config) -> Result<()> {
    config.ensure_layout()?;
    info!("initialized layout under {}", config.base.display());
    Ok(())
}

/// `run <recipe>`: execute the full build pipeline.
pub fn cmd_run(config: &Config, recipe_path: &Path) -> Result<()> {
    // Validate the recipe before touching the filesystem, so a broken
    // recipe leaves no build tree behind.
    let recipe = Recipe::load(recipe_path)?;
    config.ensure_layout()?;

    let recipe_dir = recipe_path.parent().unwrap_or_else(|| Path::new("."));
    let mut run = BuildRun::new(config, &recipe, recipe_dir)?;
    match run.execute(&LogReporter) {
        Ok(path) => {
            info!("package ready: {}", path.display());
            Ok(())
        }
        Err(e) => {
            error!("build failed; log at {}", run.log_path().display());
            Err(e.into())
        }
    }
}

/// `install <pkg>`: unpack a package into the target root and register it.
pub fn cmd_install(config: &Config, package: &str) -> Result<()> {
    config.ensure_layout()?;
    let meta = install::install(config, package, &LogReporter)?;
    info!("installed {}", meta.nvr());
    Ok(())
}

/// `remove <name>`: remove a registered package from the target root.
pub fn cmd_remove(config: &Config, name: &str) -> Result<()> {
    remove::remove(config, name, &LogReporter)?;
    info!("removed {name}");
    Ok(())
}

/// `pack`: re-package the current stage tree without rebuilding.
pub fn cmd_pack(config: &Config) -> Result<()> {
    config.ensure_layout()?;
    let path = pipeline::pack(config, &LogReporter)?;
    info!("package ready: {}", path.display());
    Ok(())
}
