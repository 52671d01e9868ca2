use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use git2::Repository;

fn main() {
    let cargo_manifest_dir =
        env::var_os("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set in build script");

    let git_sha = git_sha(&cargo_manifest_dir).unwrap_or_else(|err| {
        println!("cargo::warning=Could not determine git SHA ({err:#}), using 'unknown'");
        "unknown".to_owned()
    });

    let build_time = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!("cargo:rustc-env=LICENSE_ENFORCER_GIT_SHA={git_sha}");
    println!("cargo:rustc-env=LICENSE_ENFORCER_BUILD_TIME={build_time}");

    let git_head = PathBuf::from(&cargo_manifest_dir).join(".git").join("HEAD");
    if git_head.exists() {
        println!("cargo:rerun-if-changed={}", git_head.to_string_lossy());
    }
    println!("cargo:rerun-if-changed=build.rs");
}

fn git_sha(cargo_manifest_dir: &OsString) -> anyhow::Result<String> {
    let repo = Repository::open(cargo_manifest_dir)
        .context("Failed to open source directory as a git repo")?;

    let sha = repo
        .head()
        .context("Failed to resolve HEAD of the source repository")?
        .peel_to_commit()
        .context("Failed to resolve the commit HEAD points at")?
        .id()
        .to_string();

    let mut repo_status_options = git2::StatusOptions::new();
    repo_status_options.include_untracked(true);
    let repo_statuses = repo.statuses(Some(&mut repo_status_options))?;

    if repo_statuses.is_empty() {
        Ok(sha)
    } else {
        println!("cargo::warning=Not a clean git state, marking build as dirty");
        Ok(format!("{sha}-dirty"))
    }
}
