// src/archive.rs

//! Source archive extraction and patch application.
//!
//! Extraction shells out to the system `tar` (and `unzip` for zip files),
//! dispatching on the archive suffix. Package archives are a separate
//! concern handled by the `package` module.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Extract an archive into `dest`, dispatching on the filename suffix.
///
/// Supports `.tar.{gz,bz2,xz,zst}`, `.tgz`, `.tbz2`, `.txz`, `.tzst`,
/// `.zip`, and falls back to plain `tar` for anything else.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let filename = archive.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if filename.ends_with(".zip") {
        return extract_zip(archive, dest);
    }

    let flag = if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        "-xzf"
    } else if filename.ends_with(".tar.bz2") || filename.ends_with(".tbz2") {
        "-xjf"
    } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
        "-xJf"
    } else if filename.ends_with(".tar.zst") || filename.ends_with(".tzst") {
        return extract_zstd(archive, dest);
    } else {
        "-xf"
    };

    debug!("extracting {} into {}", archive.display(), dest.display());
    run_tar(archive, dest, &[flag])
}

fn run_tar(archive: &Path, dest: &Path, flags: &[&str]) -> Result<()> {
    let output = Command::new("tar")
        .args(flags)
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output()
        .map_err(|e| Error::Extract {
            archive: archive.display().to_string(),
            reason: format!("failed to run tar: {e}"),
        })?;

    if !output.status.success() {
        return Err(Error::Extract {
            archive: archive.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Zstd archives: try tar's native support first, then pipe through a
/// standalone `zstd` decompressor for archivers that lack it.
fn extract_zstd(archive: &Path, dest: &Path) -> Result<()> {
    if run_tar(archive, dest, &["--zstd", "-xf"]).is_ok() {
        return Ok(());
    }

    let zstd = which::which("zstd").map_err(|_| Error::Extract {
        archive: archive.display().to_string(),
        reason: "tar lacks zstd support and no standalone zstd decompressor found".into(),
    })?;

    debug!("falling back to {} pipe for {}", zstd.display(), archive.display());

    let mut decomp = Command::new(&zstd)
        .arg("-dc")
        .arg(archive)
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Extract {
            archive: archive.display().to_string(),
            reason: format!("failed to run zstd: {e}"),
        })?;

    let stdout = decomp.stdout.take().expect("stdout was piped");
    let status = Command::new("tar")
        .args(["-xf", "-", "-C"])
        .arg(dest)
        .stdin(Stdio::from(stdout))
        .status()
        .map_err(|e| Error::Extract {
            archive: archive.display().to_string(),
            reason: format!("failed to run tar: {e}"),
        })?;
    let decomp_status = decomp.wait()?;

    if !status.success() || !decomp_status.success() {
        return Err(Error::Extract {
            archive: archive.display().to_string(),
            reason: "zstd pipeline failed".into(),
        });
    }
    Ok(())
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let unzip = which::which("unzip").map_err(|_| Error::Extract {
        archive: archive.display().to_string(),
        reason: "unzip not found".into(),
    })?;

    let output = Command::new(unzip)
        .arg("-q")
        .arg(archive)
        .arg("-d")
        .arg(dest)
        .output()
        .map_err(|e| Error::Extract {
            archive: archive.display().to_string(),
            reason: format!("failed to run unzip: {e}"),
        })?;

    if !output.status.success() {
        return Err(Error::Extract {
            archive: archive.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Locate the source directory after extraction.
///
/// The canonical location is `<build>/<name>-<version>`; some upstreams
/// unpack to a different top-level directory, so fall back to the first
/// child whose name starts with the package name.
pub fn locate_source_dir(build_dir: &Path, name: &str, version: &str) -> Result<PathBuf> {
    let canonical = build_dir.join(format!("{name}-{version}"));
    if canonical.is_dir() {
        return Ok(canonical);
    }

    let mut children: Vec<PathBuf> = std::fs::read_dir(build_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(name))
                .unwrap_or(false)
        })
        .collect();
    children.sort();

    children
        .into_iter()
        .next()
        .ok_or_else(|| Error::SourceDirMissing(build_dir.to_path_buf()))
}

/// Apply the recipe's patches against the source directory in order,
/// each with strip level 1. Missing patch files are skipped; a patch
/// that fails to apply aborts.
pub fn apply_patches(source_dir: &Path, patches: &[PathBuf]) -> Result<()> {
    for patch in patches {
        if !patch.exists() {
            debug!("patch {} not present, skipping", patch.display());
            continue;
        }
        info!("applying patch {}", patch.display());
        apply_patch(source_dir, patch)?;
    }
    Ok(())
}

fn apply_patch(source_dir: &Path, patch: &Path) -> Result<()> {
    let input = File::open(patch)?;
    let output = Command::new("patch")
        .args(["-N", "-p1"])
        .current_dir(source_dir)
        .stdin(Stdio::from(input))
        .output()
        .map_err(|e| Error::Patch {
            patch: patch.display().to_string(),
            reason: format!("failed to run patch: {e}"),
        })?;

    if !output.status.success() {
        warn!("patch output: {}", String::from_utf8_lossy(&output.stdout).trim());
        return Err(Error::Patch {
            patch: patch.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
