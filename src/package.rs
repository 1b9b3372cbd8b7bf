// src/package.rs

//! The `.ppkg` archive format: control metadata, manifest, payload.
//!
//! A package is a compressed tar whose root holds a `CONTROL` directory
//! (`meta`, `manifest`, optional `post-remove`) next to the payload, which
//! is unpacked verbatim into the target root at install time.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::compression::{open_decoded, Compression};
use crate::error::{Error, Result};
use crate::recipe::Recipe;

pub const CONTROL_DIR: &str = "CONTROL";

/// Parsed `CONTROL/meta` contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub name: String,
    pub version: String,
    pub release: u32,
    pub arch: String,
    pub prefix: String,
}

impl Meta {
    pub fn from_recipe(recipe: &Recipe, prefix: &str) -> Self {
        Self {
            name: recipe.name.clone(),
            version: recipe.version.clone(),
            release: recipe.release,
            arch: recipe.arch.clone(),
            prefix: prefix.to_string(),
        }
    }

    /// `name-version-release`.
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }

    /// The archive filename: `<name>-<version>-<release>.<arch>.ppkg`.
    pub fn archive_name(&self) -> String {
        format!("{}.{}.ppkg", self.nvr(), self.arch)
    }

    /// Render as newline-delimited `key=value` with exactly the keys
    /// `name`, `version`, `release`, `arch`, `prefix`.
    pub fn render(&self) -> String {
        format!(
            "name={}\nversion={}\nrelease={}\narch={}\nprefix={}\n",
            self.name, self.version, self.release, self.arch, self.prefix
        )
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut name = None;
        let mut version = None;
        let mut release = None;
        let mut arch = None;
        let mut prefix = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::Pack(format!("malformed meta line: {line:?}")))?;
            match key {
                "name" => name = Some(value.to_string()),
                "version" => version = Some(value.to_string()),
                "release" => {
                    release = Some(value.parse::<u32>().map_err(|_| {
                        Error::Pack(format!("invalid release in meta: {value:?}"))
                    })?)
                }
                "arch" => arch = Some(value.to_string()),
                "prefix" => prefix = Some(value.to_string()),
                other => return Err(Error::Pack(format!("unknown meta key: {other:?}"))),
            }
        }

        let missing = |key: &str| Error::Pack(format!("meta missing key: {key}"));
        Ok(Self {
            name: name.ok_or_else(|| missing("name"))?,
            version: version.ok_or_else(|| missing("version"))?,
            release: release.ok_or_else(|| missing("release"))?,
            arch: arch.ok_or_else(|| missing("arch"))?,
            prefix: prefix.ok_or_else(|| missing("prefix"))?,
        })
    }
}

/// Compute the package manifest from a stage tree: every regular file and
/// symlink, one `./`-prefixed path per entry.
///
/// The walk is depth-first pre-order with children sorted by file name,
/// so the manifest is reproducible across platforms and filesystems.
pub fn compute_manifest(stage: &Path) -> Result<Vec<String>> {
    let mut manifest = Vec::new();
    for entry in WalkDir::new(stage).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Pack(format!("walking stage tree: {e}")))?;
        let kind = entry.file_type();
        if !kind.is_file() && !kind.is_symlink() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(stage)
            .map_err(|e| Error::Pack(format!("walking stage tree: {e}")))?;
        manifest.push(format!("./{}", rel.display()));
    }
    Ok(manifest)
}

/// Assemble a package archive from the stage tree.
///
/// Writes `CONTROL/meta`, `CONTROL/manifest`, the optional post-remove
/// hook, and the payload into `<out_dir>/<nvr>.<arch>.ppkg` with the
/// configured compression.
pub fn build_archive(
    meta: &Meta,
    stage: &Path,
    post_remove: Option<&Path>,
    out_dir: &Path,
    compression: Compression,
) -> Result<PathBuf> {
    if !stage.is_dir() {
        return Err(Error::Pack(format!(
            "stage tree {} does not exist; nothing to package",
            stage.display()
        )));
    }

    let manifest = compute_manifest(stage)?;
    debug!("manifest holds {} entries", manifest.len());

    fs::create_dir_all(out_dir)?;
    let out_path = out_dir.join(meta.archive_name());
    let part = out_path.with_extension("ppkg.part");

    let encoder = compression.encoder(File::create(&part)?)?;
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    append_control_file(&mut builder, "meta", meta.render().as_bytes(), 0o644)?;
    let mut manifest_text = manifest.join("\n");
    if !manifest_text.is_empty() {
        manifest_text.push('\n');
    }
    append_control_file(&mut builder, "manifest", manifest_text.as_bytes(), 0o644)?;

    if let Some(hook) = post_remove {
        let content = fs::read(hook)
            .map_err(|e| Error::Pack(format!("cannot read post-remove script {}: {e}", hook.display())))?;
        append_control_file(&mut builder, "post-remove", &content, 0o755)?;
    }

    // Payload: every top-level stage entry, in sorted order.
    let mut entries: Vec<_> = fs::read_dir(stage)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            builder.append_dir_all(&name, entry.path())?;
        } else {
            builder.append_path_with_name(entry.path(), &name)?;
        }
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;
    fs::rename(&part, &out_path)?;

    info!(
        "packaged {} ({} files, {} compression)",
        out_path.display(),
        manifest.len(),
        compression
    );
    Ok(out_path)
}

fn append_control_file<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    content: &[u8],
    mode: u32,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(mode);
    header.set_size(content.len() as u64);
    header.set_cksum();
    builder.append_data(&mut header, format!("{CONTROL_DIR}/{name}"), content)?;
    Ok(())
}

/// True when an archive entry path lies inside `CONTROL`, tolerating a
/// leading `./`.
pub fn is_control_path(path: &Path) -> bool {
    path.components()
        .find_map(|c| match c {
            Component::Normal(n) => Some(n),
            _ => None,
        })
        == Some(OsStr::new(CONTROL_DIR))
}

/// Extract only the `CONTROL` entries of a package archive into `dest`.
pub fn extract_control(pkg: &Path, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(open_decoded(File::open(pkg)?)?);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let wanted = is_control_path(&entry.path()?);
        if wanted {
            entry.unpack_in(dest)?;
        }
    }
    Ok(())
}

/// Stream every payload entry (everything but `CONTROL`) into `root`,
/// preserving attributes. Entries that would escape the root are refused
/// by the contained unpack.
pub fn unpack_payload(pkg: &Path, root: &Path) -> Result<()> {
    fs::create_dir_all(root)?;
    let mut archive = tar::Archive::new(open_decoded(File::open(pkg)?)?);
    archive.set_preserve_permissions(true);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let skip = is_control_path(&entry.path()?);
        if skip {
            continue;
        }
        entry.unpack_in(root)?;
    }
    Ok(())
}
