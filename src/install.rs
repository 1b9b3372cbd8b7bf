// src/install.rs

//! Package installation into a target root.
//!
//! Install is not atomic across files: a failure mid-unpack leaves the
//! root partially populated and no registry entry. Such a package is not
//! removable through the registry and must be cleaned up manually.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::package::{self, Meta};
use crate::registry::Registry;
use crate::report::Reporter;

/// Install a package archive. `pkg_arg` is an absolute path or a name
/// resolved against the packages directory.
pub fn install(config: &Config, pkg_arg: &str, reporter: &dyn Reporter) -> Result<Meta> {
    let pkg_path = resolve_package(config, pkg_arg)?;
    info!("installing {}", pkg_path.display());

    // CONTROL is read out of a private temporary directory; the payload
    // streams from the archive itself.
    let temp = TempDir::new()?;
    package::extract_control(&pkg_path, temp.path())?;

    let control = temp.path().join(package::CONTROL_DIR);
    let meta_text = fs::read_to_string(control.join("meta"))
        .map_err(|_| Error::Pack(format!("{} has no CONTROL/meta", pkg_path.display())))?;
    let meta = Meta::parse(&meta_text)?;
    reporter.step(&format!("installing {} into {}", meta.nvr(), config.root.display()));

    package::unpack_payload(&pkg_path, &config.root)?;

    let manifest = fs::read_to_string(control.join("manifest"))
        .map_err(|_| Error::Pack(format!("{} has no CONTROL/manifest", pkg_path.display())))?;
    let hook = control.join("post-remove");
    let hook = hook.is_file().then_some(hook.as_path());

    let registry = Registry::new(&config.state_dir());
    registry.register(&meta, &manifest, hook)?;
    registry.log_install(&meta.nvr());

    run_ldconfig(&config.root);

    drop(temp);
    reporter.done(&format!("installed {}", meta.nvr()));
    Ok(meta)
}

fn resolve_package(config: &Config, pkg_arg: &str) -> Result<PathBuf> {
    let direct = Path::new(pkg_arg);
    let path = if direct.is_absolute() {
        direct.to_path_buf()
    } else {
        config.packages_dir().join(pkg_arg)
    };
    if !path.is_file() {
        return Err(Error::Usage(format!(
            "package archive not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Refresh the dynamic linker cache, best-effort. Skipped for non-`/`
/// roots, where it would touch the host instead of the target.
pub fn run_ldconfig(root: &Path) {
    if root != Path::new("/") {
        debug!("skipping ldconfig for target root {}", root.display());
        return;
    }
    if let Ok(ldconfig) = which::which("ldconfig") {
        if let Err(e) = Command::new(ldconfig).status() {
            debug!("ldconfig failed: {e}");
        }
    }
}
