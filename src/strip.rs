// src/strip.rs

//! Post-stage ELF stripping.
//!
//! Walks the stage tree and applies `strip --strip-unneeded` to files that
//! look like executables or shared objects. The whole pass is best-effort:
//! a missing `strip` skips it entirely and per-file failures are swallowed.

use std::path::Path;
use std::process::Command;

use tracing::{debug, trace};
use walkdir::WalkDir;

/// Strip eligible files under `stage`.
pub fn strip_tree(stage: &Path) {
    let strip = match which::which("strip") {
        Ok(path) => path,
        Err(_) => {
            debug!("strip not found, skipping post-stage pass");
            return;
        }
    };
    let file_probe = which::which("file").ok();

    let mut stripped = 0u32;
    for entry in WalkDir::new(stage).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !has_exec_bit(entry.path()) {
            continue;
        }

        // With the type probe available, only touch ELF executables and
        // shared objects. Without it, strip is attempted on every
        // executable file and failures are swallowed.
        if let Some(probe) = &file_probe {
            if !probe_says_elf(probe, entry.path()) {
                continue;
            }
        }

        let status = Command::new(&strip)
            .arg("--strip-unneeded")
            .arg(entry.path())
            .output();
        match status {
            Ok(out) if out.status.success() => {
                trace!("stripped {}", entry.path().display());
                stripped += 1;
            }
            _ => trace!("could not strip {}", entry.path().display()),
        }
    }
    debug!("stripped {} file(s) under {}", stripped, stage.display());
}

fn has_exec_bit(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn probe_says_elf(probe: &Path, path: &Path) -> bool {
    Command::new(probe)
        .arg("--brief")
        .arg(path)
        .output()
        .map(|out| {
            let desc = String::from_utf8_lossy(&out.stdout).to_lowercase();
            desc.contains("executable") || desc.contains("shared object")
        })
        .unwrap_or(false)
}
