// src/recipe.rs

//! Recipe files: loading, defaults, validation.
//!
//! A recipe is a TOML file describing how to produce a package from
//! upstream sources. Only `name`, `version`, and at least one entry in
//! `sources` are required; everything else has a default.
//!
//! ```toml
//! name = "hello"
//! version = "2.12"
//! sources = ["https://ftp.gnu.org/gnu/hello/hello-2.12.tar.gz"]
//! hashes = ["cf04af86dc085268c5f4470fbae49b18afbc221b78096aab842d934a76bad0ab"]
//!
//! [phases]
//! build = "./configure --prefix=$PREFIX && make -j$JOBS"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hash::is_sha256_hex;
use crate::phase::{PhaseAction, PhaseKind};

fn default_release() -> u32 {
    1
}

fn host_arch() -> String {
    std::env::consts::ARCH.to_string()
}

/// A complete recipe, validated after deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct Recipe {
    /// Package name, lowercase.
    #[serde(default)]
    pub name: String,

    /// Upstream version string.
    #[serde(default)]
    pub version: String,

    /// Release number for rebuilds of the same version.
    #[serde(default = "default_release")]
    pub release: u32,

    /// Architecture tag; defaults to the host machine.
    #[serde(default = "host_arch")]
    pub arch: String,

    /// Source URLs, fetched in order. At least one.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Local patch files, applied in order with strip level 1.
    #[serde(default)]
    pub patches: Vec<PathBuf>,

    /// Hex SHA-256 digests aligned positionally with `sources`.
    /// Empty list means every source is unverified; an empty string
    /// leaves that one source unverified.
    #[serde(default)]
    pub hashes: Vec<String>,

    /// Local script shipped in the archive as `CONTROL/post-remove`.
    #[serde(default)]
    pub post_remove: Option<PathBuf>,

    /// Phase overrides; unset phases run their defaults.
    #[serde(default)]
    pub phases: Phases,
}

/// User-supplied shell actions per phase.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Phases {
    pub prepare: Option<String>,
    pub build: Option<String>,
    pub check: Option<String>,
    pub package: Option<String>,
}

impl Recipe {
    /// Load and validate a recipe file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Recipe(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_str(&text)
    }

    /// Parse and validate recipe text.
    pub fn from_str(text: &str) -> Result<Self> {
        let recipe: Recipe = toml::from_str(text).map_err(|e| Error::Recipe(e.to_string()))?;
        recipe.validate()?;
        Ok(recipe)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Recipe("missing required field: name".into()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '_' | '.'))
        {
            return Err(Error::Recipe(format!(
                "name {:?} must be lowercase (a-z, 0-9, +-_.)",
                self.name
            )));
        }
        if self.version.is_empty() {
            return Err(Error::Recipe("missing required field: version".into()));
        }
        if self.release == 0 {
            return Err(Error::Recipe("release must be a positive integer".into()));
        }
        if self.sources.is_empty() {
            return Err(Error::Recipe("missing required field: sources".into()));
        }
        if !self.hashes.is_empty() && self.hashes.len() != self.sources.len() {
            return Err(Error::Recipe(format!(
                "hashes ({}) must align with sources ({})",
                self.hashes.len(),
                self.sources.len()
            )));
        }
        for hash in &self.hashes {
            if !hash.is_empty() && !is_sha256_hex(hash) {
                return Err(Error::Recipe(format!("not a hex SHA-256 digest: {:?}", hash)));
            }
        }
        Ok(())
    }

    /// The expected hash for the i-th source, if one was declared.
    pub fn hash_for(&self, index: usize) -> Option<&str> {
        self.hashes
            .get(index)
            .map(String::as_str)
            .filter(|h| !h.is_empty())
    }

    /// `name-version-release`, the package identity.
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }

    /// Canonical source directory name after extraction.
    pub fn source_dir_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// The action bound to a phase: user-supplied if the recipe defines
    /// one, otherwise the built-in default.
    pub fn action(&self, kind: PhaseKind) -> PhaseAction {
        let script = match kind {
            PhaseKind::Prepare => &self.phases.prepare,
            PhaseKind::Build => &self.phases.build,
            PhaseKind::Check => &self.phases.check,
            PhaseKind::Package => &self.phases.package,
        };
        match script {
            Some(s) => PhaseAction::Script(s.clone()),
            None => PhaseAction::Default,
        }
    }
}

/// The filename component of a source URL.
pub fn source_filename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
