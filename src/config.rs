// src/config.rs

//! Runtime configuration and on-disk layout.
//!
//! A single base directory determines every derived path. Configuration is
//! resolved once from `PPKG_*` environment variables into an explicit
//! [`Config`] value that is passed to the engine; nothing is global.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compression::Compression;
use crate::error::Result;
use tracing::warn;

/// Toolchain profile selecting default compiler tools.
///
/// Defaults are applied only for keys absent from the user environment;
/// user overrides always win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolchainProfile {
    #[default]
    System,
    Llvm,
    Musl,
}

impl ToolchainProfile {
    pub fn from_config(token: &str) -> Self {
        match token {
            "llvm" => Self::Llvm,
            "musl" => Self::Musl,
            "system" | "" => Self::System,
            other => {
                warn!("unknown toolchain profile {:?}, using system", other);
                Self::System
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Llvm => "llvm",
            Self::Musl => "musl",
        }
    }

    /// Default tool assignments for this profile.
    pub fn tool_defaults(&self) -> [(&'static str, &'static str); 4] {
        match self {
            Self::System => [("CC", "cc"), ("CXX", "c++"), ("AR", "ar"), ("RANLIB", "ranlib")],
            Self::Llvm => [
                ("CC", "clang"),
                ("CXX", "clang++"),
                ("AR", "llvm-ar"),
                ("RANLIB", "llvm-ranlib"),
            ],
            Self::Musl => [
                ("CC", "musl-gcc"),
                ("CXX", "c++"),
                ("AR", "ar"),
                ("RANLIB", "ranlib"),
            ],
        }
    }
}

impl std::fmt::Display for ToolchainProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all storage.
    pub base: PathBuf,
    /// Target root for install/remove.
    pub root: PathBuf,
    /// Installation prefix baked into package metadata.
    pub prefix: String,
    /// Parallelism handed to build phases.
    pub jobs: u32,
    /// Compression for package archives.
    pub compression: Compression,
    /// Toolchain profile for phase environments.
    pub toolchain: ToolchainProfile,
    /// Run the ELF strip pass over the stage tree.
    pub strip: bool,
    /// Maximum fetch attempts per source.
    pub download_retries: u32,
}

impl Config {
    /// Resolve configuration from `PPKG_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let base = env::var("PPKG_BASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join("mbuild")
            });

        let jobs = env::var("PPKG_JOBS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|p| p.get() as u32)
                    .unwrap_or(1)
            });

        let download_retries = env::var("PPKG_DOWNLOAD_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(3);

        Self {
            base,
            root: env::var("PPKG_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/")),
            prefix: env::var("PPKG_PREFIX").unwrap_or_else(|_| "/usr".to_string()),
            jobs,
            compression: Compression::from_config(
                &env::var("PPKG_PKG_COMP").unwrap_or_else(|_| "zst".to_string()),
            ),
            toolchain: ToolchainProfile::from_config(
                &env::var("PPKG_TOOLCHAIN").unwrap_or_default(),
            ),
            strip: env::var("PPKG_STRIP").map(|v| v != "0").unwrap_or(true),
            download_retries,
        }
    }

    /// Shared download cache, content-addressed by filename.
    pub fn sources_dir(&self) -> PathBuf {
        self.base.join("sources")
    }

    /// Build area; each run owns `<build>/<name>-<version>` inside it.
    pub fn build_dir(&self) -> PathBuf {
        self.base.join("build")
    }

    /// Staging tree (the DESTDIR analog), owned by the current build.
    pub fn stage_dir(&self) -> PathBuf {
        self.base.join("stage")
    }

    /// Finished package archives.
    pub fn packages_dir(&self) -> PathBuf {
        self.base.join("packages")
    }

    /// Per-build logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    /// Persistent state (installed-package registry, stage metadata).
    pub fn state_dir(&self) -> PathBuf {
        self.base.join("state")
    }

    /// Recipe files.
    pub fn recipes_dir(&self) -> PathBuf {
        self.base.join("recipes")
    }

    /// Global hooks (`<hooks>/post-remove/<name>`).
    pub fn hooks_dir(&self) -> PathBuf {
        self.base.join("hooks")
    }

    /// Metadata describing what the current stage tree holds.
    pub fn stage_meta_path(&self) -> PathBuf {
        self.state_dir().join("stage.meta")
    }

    /// Create every directory under the base. Idempotent.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.sources_dir(),
            self.build_dir(),
            self.stage_dir(),
            self.packages_dir(),
            self.logs_dir(),
            self.state_dir().join("pkgs"),
            self.recipes_dir(),
            self.hooks_dir().join("post-remove"),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// A config rooted at an arbitrary base with library defaults.
    /// The environment is not consulted.
    pub fn with_base(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            root: PathBuf::from("/"),
            prefix: "/usr".to_string(),
            jobs: 1,
            compression: Compression::default(),
            toolchain: ToolchainProfile::default(),
            strip: true,
            download_retries: 3,
        }
    }
}
