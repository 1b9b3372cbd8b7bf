// tests/common/mod.rs

//! Shared fixtures for integration tests.

use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use ppkg::compression::Compression;
use ppkg::config::Config;
use ppkg::package::{build_archive, Meta};
use tempfile::TempDir;

/// A config rooted in a temp dir, installing into `<temp>/root`.
/// Strip is off so builds do not depend on host binutils.
pub fn test_config(temp: &TempDir) -> Config {
    let mut config = Config::with_base(&temp.path().join("mbuild"));
    config.root = temp.path().join("root");
    config.compression = Compression::Gzip;
    config.strip = false;
    config.ensure_layout().unwrap();
    fs::create_dir_all(&config.root).unwrap();
    config
}

pub fn sample_meta(name: &str) -> Meta {
    Meta {
        name: name.to_string(),
        version: "1.0".to_string(),
        release: 1,
        arch: "x86_64".to_string(),
        prefix: "/usr".to_string(),
    }
}

/// Stage tree with a binary, a doc file, and a symlink.
pub fn populate_stage(stage: &Path) {
    fs::create_dir_all(stage.join("usr/bin")).unwrap();
    fs::create_dir_all(stage.join("usr/share/doc/sample")).unwrap();
    fs::write(stage.join("usr/bin/sample"), "#!/bin/sh\necho sample\n").unwrap();
    let mut perms = fs::metadata(stage.join("usr/bin/sample")).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(stage.join("usr/bin/sample"), perms).unwrap();
    fs::write(stage.join("usr/share/doc/sample/README"), "sample docs\n").unwrap();
    symlink("sample", stage.join("usr/bin/s")).unwrap();
}

/// Build a `.ppkg` for `name` with the standard sample payload, placed in
/// the config's packages directory.
pub fn sample_package(config: &Config, name: &str, post_remove: Option<&Path>) -> PathBuf {
    let stage = config.base.join(format!("fixture-stage-{name}"));
    populate_stage(&stage);
    build_archive(
        &sample_meta(name),
        &stage,
        post_remove,
        &config.packages_dir(),
        config.compression,
    )
    .unwrap()
}
