// tests/install_remove.rs

//! Integration tests for the install/remove transaction pair against a
//! throwaway target root.

mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;

use ppkg::registry::Registry;
use ppkg::report::SilentReporter;
use ppkg::{install, remove, Error};
use tempfile::TempDir;

#[test]
fn install_populates_root_and_registry() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);
    let pkg = common::sample_package(&config, "sample", None);

    let meta = install::install(&config, pkg.to_str().unwrap(), &SilentReporter).unwrap();
    assert_eq!(meta.nvr(), "sample-1.0-1");

    // Every payload path landed inside the target root.
    assert!(config.root.join("usr/bin/sample").is_file());
    assert!(config
        .root
        .join("usr/bin/s")
        .symlink_metadata()
        .unwrap()
        .file_type()
        .is_symlink());
    assert!(config.root.join("usr/share/doc/sample/README").is_file());

    // Executable bits survived the trip through the archive.
    let mode = fs::metadata(config.root.join("usr/bin/sample"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111);

    // The registry copy of the manifest matches the archive's.
    let registry = Registry::new(&config.state_dir());
    assert_eq!(
        registry.manifest("sample").unwrap(),
        vec![
            "./usr/bin/s",
            "./usr/bin/sample",
            "./usr/share/doc/sample/README",
        ]
    );
    assert_eq!(registry.installed().unwrap(), vec!["sample"]);

    // The install log recorded name-version-release.
    let index = fs::read_to_string(config.state_dir().join("installed.index")).unwrap();
    assert!(index.trim_end().ends_with("sample-1.0-1"));
}

#[test]
fn install_resolves_relative_to_packages_dir() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);
    let pkg = common::sample_package(&config, "sample", None);
    let bare_name = pkg.file_name().unwrap().to_str().unwrap();

    install::install(&config, bare_name, &SilentReporter).unwrap();
    assert!(config.root.join("usr/bin/sample").is_file());
}

#[test]
fn install_then_remove_round_trips_to_empty_root() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);
    let pkg = common::sample_package(&config, "sample", None);

    install::install(&config, pkg.to_str().unwrap(), &SilentReporter).unwrap();
    remove::remove(&config, "sample", &SilentReporter).unwrap();

    // Every manifested path and every directory created for it is gone.
    assert!(!config.root.join("usr/bin/sample").exists());
    assert!(config.root.join("usr/bin/s").symlink_metadata().is_err());
    assert!(!config.root.join("usr").exists());
    assert!(config.root.is_dir());

    // The registry entry went away with it.
    let registry = Registry::new(&config.state_dir());
    assert!(!registry.contains("sample"));
}

#[test]
fn remove_keeps_directories_shared_with_other_packages() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);
    let pkg = common::sample_package(&config, "sample", None);

    install::install(&config, pkg.to_str().unwrap(), &SilentReporter).unwrap();

    // Another package owns a file in the same bin directory.
    fs::write(config.root.join("usr/bin/other"), "other\n").unwrap();

    remove::remove(&config, "sample", &SilentReporter).unwrap();
    assert!(!config.root.join("usr/bin/sample").exists());
    assert!(config.root.join("usr/bin/other").is_file());
    assert!(config.root.join("usr/bin").is_dir());
}

#[test]
fn second_remove_reports_not_installed() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);
    let pkg = common::sample_package(&config, "sample", None);

    install::install(&config, pkg.to_str().unwrap(), &SilentReporter).unwrap();
    remove::remove(&config, "sample", &SilentReporter).unwrap();

    let err = remove::remove(&config, "sample", &SilentReporter).unwrap_err();
    assert!(matches!(err, Error::NotInstalled(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn remove_without_install_reports_not_installed() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);
    let err = remove::remove(&config, "ghost", &SilentReporter).unwrap_err();
    assert!(matches!(err, Error::NotInstalled(_)));
}

#[test]
fn packaged_post_remove_hook_runs_with_name_and_root() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);

    let witness = temp.path().join("hook-output");
    let hook = temp.path().join("hook.sh");
    fs::write(
        &hook,
        format!("#!/bin/sh\nprintf '%s %s' \"$1\" \"$2\" > {}\n", witness.display()),
    )
    .unwrap();
    let mut perms = fs::metadata(&hook).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&hook, perms).unwrap();

    let pkg = common::sample_package(&config, "hello", Some(&hook));
    install::install(&config, pkg.to_str().unwrap(), &SilentReporter).unwrap();
    remove::remove(&config, "hello", &SilentReporter).unwrap();

    let output = fs::read_to_string(&witness).unwrap();
    assert_eq!(output, format!("hello {}", config.root.display()));
}

#[test]
fn global_post_remove_hook_runs() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);

    let witness = temp.path().join("global-hook-output");
    let hook_dir = config.hooks_dir().join("post-remove");
    let hook = hook_dir.join("sample");
    fs::write(
        &hook,
        format!("#!/bin/sh\nprintf '%s' \"$1\" > {}\n", witness.display()),
    )
    .unwrap();
    let mut perms = fs::metadata(&hook).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&hook, perms).unwrap();

    let pkg = common::sample_package(&config, "sample", None);
    install::install(&config, pkg.to_str().unwrap(), &SilentReporter).unwrap();
    remove::remove(&config, "sample", &SilentReporter).unwrap();

    assert_eq!(fs::read_to_string(&witness).unwrap(), "sample");
}

#[test]
fn remove_tolerates_already_deleted_files() {
    let temp = TempDir::new().unwrap();
    let config = common::test_config(&temp);
    let pkg = common::sample_package(&config, "sample", None);

    install::install(&config, pkg.to_str().unwrap(), &SilentReporter).unwrap();

    // Someone deleted a manifested file behind our back.
    fs::remove_file(config.root.join("usr/bin/sample")).unwrap();

    remove::remove(&config, "sample", &SilentReporter).unwrap();
    assert!(!Registry::new(&config.state_dir()).contains("sample"));
}
