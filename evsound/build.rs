//! Build script for evsound
//!
//! Stamps the `evsound-play` startup banner with:
//! - `GIT_HASH`: short commit, `-dirty` when the tree has local edits.
//!   Distribution builds from a source tarball (no `.git`) can set
//!   `EVSOUND_BUILD_ID` instead.
//! - `BUILD_TIMESTAMP`: RFC 3339, UTC
//! - `BUILD_PROFILE`: debug/release

use std::process::Command;

const BUILD_ID_ENV: &str = "EVSOUND_BUILD_ID";

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn source_id() -> String {
    if let Ok(id) = std::env::var(BUILD_ID_ENV) {
        if !id.trim().is_empty() {
            return id.trim().to_string();
        }
    }

    match git(&["rev-parse", "--short=8", "HEAD"]) {
        Some(hash) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|status| !status.is_empty());
            if dirty {
                format!("{}-dirty", hash)
            } else {
                hash
            }
        }
        None => "unknown".to_string(),
    }
}

fn main() {
    println!("cargo:rerun-if-env-changed={}", BUILD_ID_ENV);
    println!("cargo:rerun-if-changed=build.rs");
    if let Some(head) = git(&["rev-parse", "--git-path", "HEAD"]) {
        println!("cargo:rerun-if-changed={}", head);
    }

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", source_id());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
}
