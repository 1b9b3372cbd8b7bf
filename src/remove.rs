// src/remove.rs

//! Package removal from a target root.
//!
//! Files are unlinked in reverse manifest order, then the directory
//! prefixes are pruned innermost-first with plain `rmdir` semantics, so a
//! directory still holding files from another package survives.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::install::run_ldconfig;
use crate::registry::Registry;
use crate::report::Reporter;

/// Remove an installed package by name.
pub fn remove(config: &Config, name: &str, reporter: &dyn Reporter) -> Result<()> {
    let registry = Registry::new(&config.state_dir());
    if !registry.contains(name) {
        return Err(Error::NotInstalled(name.to_string()));
    }

    let manifest = registry.manifest(name)?;
    info!("removing {} ({} entries)", name, manifest.len());
    reporter.step(&format!("removing {} from {}", name, config.root.display()));

    // Unlink in reverse order; a path that is already gone, or that
    // refuses to go, is not an error.
    for line in manifest.iter().rev() {
        let path = resolve_entry(&config.root, line);
        match path.symlink_metadata() {
            Ok(_) => {
                if let Err(e) = fs::remove_file(&path) {
                    debug!("could not unlink {}: {e}", path.display());
                }
            }
            Err(_) => debug!("{} already absent", path.display()),
        }
    }

    prune_directories(&config.root, &manifest);

    // Global hook first, then the hook the package shipped.
    let global_hook = config.hooks_dir().join("post-remove").join(name);
    run_hook(&global_hook, name, &config.root);
    if let Some(pkg_hook) = registry.post_remove_hook(name) {
        run_hook(&pkg_hook, name, &config.root);
    }

    registry.unregister(name)?;
    run_ldconfig(&config.root);

    reporter.done(&format!("removed {name}"));
    Ok(())
}

fn resolve_entry(root: &Path, line: &str) -> PathBuf {
    root.join(line.trim_start_matches("./"))
}

/// Attempt to rmdir every directory prefix of the manifest, deepest
/// first. Non-empty directories are silently kept.
fn prune_directories(root: &Path, manifest: &[String]) {
    let mut prefixes: BTreeSet<PathBuf> = BTreeSet::new();
    for line in manifest {
        let rel = Path::new(line.trim_start_matches("./"));
        let mut parent = rel.parent();
        while let Some(dir) = parent {
            if !dir.as_os_str().is_empty() {
                prefixes.insert(dir.to_path_buf());
            }
            parent = dir.parent();
        }
    }

    // Reverse lexicographic order removes children before their parents.
    for dir in prefixes.iter().rev() {
        let path = root.join(dir);
        if fs::remove_dir(&path).is_ok() {
            debug!("pruned {}", path.display());
        }
    }
}

/// Run a post-remove hook with `(name, root)` if it exists and is
/// executable. Hook failures are logged, not fatal: the files are
/// already gone.
fn run_hook(hook: &Path, name: &str, root: &Path) {
    if !is_executable(hook) {
        return;
    }
    info!("running post-remove hook {}", hook.display());
    match Command::new(hook).arg(name).arg(root).output() {
        Ok(out) if !out.status.success() => warn!(
            "post-remove hook {} exited {:?}: {}",
            hook.display(),
            out.status.code(),
            String::from_utf8_lossy(&out.stderr).trim()
        ),
        Ok(_) => {}
        Err(e) => warn!("post-remove hook {} failed to run: {e}", hook.display()),
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
