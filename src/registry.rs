// src/registry.rs

//! On-disk database of installed packages.
//!
//! A directory per package under `<state>/pkgs/<name>/`, holding a copy of
//! the package `meta` and `manifest` plus the optional `post-remove` hook.
//! Whole files are written to a temporary path and moved into place, so a
//! crash never leaves a half-written record. There is no cross-package
//! locking; concurrent operations on the same name are undefined.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::package::Meta;

pub struct Registry {
    state_dir: PathBuf,
}

impl Registry {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
        }
    }

    fn pkgs_dir(&self) -> PathBuf {
        self.state_dir.join("pkgs")
    }

    /// The registry directory for one package.
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.pkgs_dir().join(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.package_dir(name).is_dir()
    }

    /// Record an installed package: `meta`, `manifest`, and optionally the
    /// packaged post-remove hook.
    pub fn register(
        &self,
        meta: &Meta,
        manifest: &str,
        post_remove: Option<&Path>,
    ) -> Result<()> {
        let dir = self.package_dir(&meta.name);
        fs::create_dir_all(&dir)?;

        write_file_atomic(&dir.join("meta"), meta.render().as_bytes())?;
        write_file_atomic(&dir.join("manifest"), manifest.as_bytes())?;

        if let Some(hook) = post_remove {
            use std::os::unix::fs::PermissionsExt;
            let dest = dir.join("post-remove");
            fs::copy(hook, &dest)?;
            let mut perms = fs::metadata(&dest)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&dest, perms)?;
        }

        debug!("registered {} in {}", meta.nvr(), dir.display());
        Ok(())
    }

    /// The stored manifest lines for a package.
    pub fn manifest(&self, name: &str) -> Result<Vec<String>> {
        let path = self.package_dir(name).join("manifest");
        if !path.is_file() {
            return Err(Error::NotInstalled(name.to_string()));
        }
        Ok(fs::read_to_string(path)?
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn meta(&self, name: &str) -> Result<Meta> {
        let path = self.package_dir(name).join("meta");
        if !path.is_file() {
            return Err(Error::NotInstalled(name.to_string()));
        }
        Meta::parse(&fs::read_to_string(path)?)
    }

    /// The package's own post-remove hook, when present and executable.
    pub fn post_remove_hook(&self, name: &str) -> Option<PathBuf> {
        let path = self.package_dir(name).join("post-remove");
        if is_executable(&path) {
            Some(path)
        } else {
            None
        }
    }

    /// Drop the registry entry. The package is no longer installed once
    /// this returns.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let dir = self.package_dir(name);
        if !dir.is_dir() {
            return Err(Error::NotInstalled(name.to_string()));
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    /// Enumerate installed packages: a sorted directory listing.
    pub fn installed(&self) -> Result<Vec<String>> {
        let pkgs = self.pkgs_dir();
        if !pkgs.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(pkgs)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Append to the install log. Best-effort: a write failure is logged
    /// and otherwise ignored.
    pub fn log_install(&self, nvr: &str) {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let result = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.state_dir.join("installed.index"))
            .and_then(|mut f| writeln!(f, "{stamp} {nvr}"));
        if let Err(e) = result {
            warn!("could not update installed.index: {e}");
        }
    }
}

fn write_file_atomic(dest: &Path, content: &[u8]) -> Result<()> {
    let tmp = dest.with_extension("tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, dest)?;
    Ok(())
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
