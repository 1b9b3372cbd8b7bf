// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("ppkg")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Minimalist source-to-binary package manager")
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Create the directory layout under the base"))
        .subcommand(
            Command::new("run")
                .about("Execute the full build pipeline for a recipe")
                .arg(Arg::new("recipe").required(true).help("Path to the recipe file")),
        )
        .subcommand(
            Command::new("install")
                .about("Install a package archive into the target root")
                .arg(
                    Arg::new("package")
                        .required(true)
                        .help("Package path, absolute or relative to the packages directory"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed package")
                .arg(Arg::new("name").required(true).help("Registered package name")),
        )
        .subcommand(Command::new("pack").about("Re-package the current stage tree without rebuilding"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    if let Err(e) = fs::write(man_dir.join("ppkg.1"), buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
