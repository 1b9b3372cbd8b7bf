// src/pipeline.rs

//! The staged build pipeline.
//!
//! `run` drives a recipe through fetch → verify → extract → patch →
//! prepare → build → check → package → strip → archive, producing a
//! `.ppkg` in the packages directory. The pipeline is fail-fast: the
//! first hard error aborts and no archive is emitted.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::package::{self, Meta};
use crate::phase::{self, BuildLog, PhaseContext, PhaseKind};
use crate::recipe::{source_filename, Recipe};
use crate::report::Reporter;
use crate::strip::strip_tree;

/// One build of one recipe. Owns the stage tree and the canonical source
/// directory for its lifetime; both are cleared when the run starts.
pub struct BuildRun<'a> {
    config: &'a Config,
    recipe: &'a Recipe,
    /// Directory the recipe file came from; relative patch and hook
    /// paths resolve against it.
    recipe_dir: PathBuf,
    log: BuildLog,
}

impl<'a> BuildRun<'a> {
    pub fn new(config: &'a Config, recipe: &'a Recipe, recipe_dir: &Path) -> Result<Self> {
        let log = BuildLog::create(&config.logs_dir(), &recipe.name)?;

        // The build and stage trees belong to this run alone.
        let source_dir = config.build_dir().join(recipe.source_dir_name());
        if source_dir.exists() {
            fs::remove_dir_all(&source_dir)?;
        }
        fs::create_dir_all(config.build_dir())?;

        let stage = config.stage_dir();
        if stage.exists() {
            fs::remove_dir_all(&stage)?;
        }
        fs::create_dir_all(&stage)?;

        Ok(Self {
            config,
            recipe,
            recipe_dir: recipe_dir.to_path_buf(),
            log,
        })
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Execute the full pipeline and return the archive path.
    pub fn execute(&mut self, reporter: &dyn Reporter) -> Result<PathBuf> {
        let recipe = self.recipe;
        let config = self.config;
        info!("building {}", recipe.nvr());

        let post_remove = self.resolve_post_remove()?;
        write_stage_state(config, &Meta::from_recipe(recipe, &config.prefix), post_remove.as_deref())?;

        // Fetch and verify every source.
        reporter.step(&format!("fetching {} source(s)", recipe.sources.len()));
        let fetcher = Fetcher::new(config.download_retries)?;
        let mut archives = Vec::with_capacity(recipe.sources.len());
        for (i, url) in recipe.sources.iter().enumerate() {
            let dest = config.sources_dir().join(source_filename(url));
            fetcher.fetch(url, &dest, recipe.hash_for(i))?;
            archives.push(dest);
        }

        // Expand everything into the build area and find the source tree.
        reporter.step("extracting sources");
        for archive_path in &archives {
            archive::extract(archive_path, &config.build_dir())?;
        }
        let source_dir =
            archive::locate_source_dir(&config.build_dir(), &recipe.name, &recipe.version)?;
        debug!("source directory: {}", source_dir.display());

        let patches: Vec<PathBuf> = recipe
            .patches
            .iter()
            .map(|p| self.resolve_local(p))
            .collect();
        archive::apply_patches(&source_dir, &patches)?;

        // The four phases, under the toolchain environment contract.
        let stage = config.stage_dir();
        let env = phase_env(config, &stage);
        for kind in PhaseKind::ALL {
            reporter.step(&format!("{} {}", kind, recipe.nvr()));
            let mut ctx = PhaseContext {
                source_dir: &source_dir,
                stage_dir: &stage,
                prefix: &config.prefix,
                jobs: config.jobs,
                env: &env,
                log: &mut self.log,
            };
            phase::run(kind, &recipe.action(kind), &mut ctx)?;
        }

        if config.strip {
            reporter.step("stripping staged binaries");
            strip_tree(&stage);
        }

        reporter.step("assembling package archive");
        let meta = Meta::from_recipe(recipe, &config.prefix);
        let out = package::build_archive(
            &meta,
            &stage,
            post_remove.as_deref(),
            &config.packages_dir(),
            config.compression,
        )?;

        reporter.done(&format!("built {}", out.display()));
        Ok(out)
    }

    fn resolve_local(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.recipe_dir.join(path)
        }
    }

    fn resolve_post_remove(&self) -> Result<Option<PathBuf>> {
        match &self.recipe.post_remove {
            None => Ok(None),
            Some(path) => {
                let resolved = self.resolve_local(path);
                if !resolved.is_file() {
                    return Err(Error::Recipe(format!(
                        "post_remove script not found: {}",
                        resolved.display()
                    )));
                }
                Ok(Some(resolved))
            }
        }
    }
}

/// Re-package the current stage tree without rebuilding.
pub fn pack(config: &Config, reporter: &dyn Reporter) -> Result<PathBuf> {
    let (meta, post_remove) = read_stage_state(config)?;
    reporter.step(&format!("re-packaging staged {}", meta.nvr()));
    let out = package::build_archive(
        &meta,
        &config.stage_dir(),
        post_remove.as_deref(),
        &config.packages_dir(),
        config.compression,
    )?;
    reporter.done(&format!("packaged {}", out.display()));
    Ok(out)
}

/// Build the environment contract exported to every phase: CC, CXX, AR,
/// RANLIB, CFLAGS, LDFLAGS, JOBS, PREFIX, STAGEDIR. Toolchain defaults
/// apply only where the user environment leaves a key unset.
fn phase_env(config: &Config, stage: &Path) -> Vec<(String, String)> {
    let mut vars = Vec::with_capacity(9);
    for (key, default) in config.toolchain.tool_defaults() {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        vars.push((key.to_string(), value));
    }
    for key in ["CFLAGS", "LDFLAGS"] {
        vars.push((key.to_string(), env::var(key).unwrap_or_default()));
    }
    vars.push(("JOBS".to_string(), config.jobs.to_string()));
    vars.push(("PREFIX".to_string(), config.prefix.clone()));
    vars.push(("STAGEDIR".to_string(), stage.display().to_string()));
    vars
}

/// Persist what the stage tree holds so `pack` can re-package it in a
/// later invocation.
fn write_stage_state(config: &Config, meta: &Meta, post_remove: Option<&Path>) -> Result<()> {
    fs::create_dir_all(config.state_dir())?;
    fs::write(config.stage_meta_path(), meta.render())?;

    let hook_copy = config.state_dir().join("stage.post-remove");
    match post_remove {
        Some(hook) => {
            fs::copy(hook, &hook_copy)?;
        }
        None => {
            if hook_copy.exists() {
                fs::remove_file(&hook_copy)?;
            }
        }
    }
    Ok(())
}

fn read_stage_state(config: &Config) -> Result<(Meta, Option<PathBuf>)> {
    let meta_path = config.stage_meta_path();
    if !meta_path.is_file() {
        return Err(Error::Usage(
            "no staged build to package; run a recipe first".into(),
        ));
    }
    let meta = Meta::parse(&fs::read_to_string(meta_path)?)?;
    let hook = config.state_dir().join("stage.post-remove");
    let hook = hook.is_file().then_some(hook);
    Ok((meta, hook))
}
