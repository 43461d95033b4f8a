//! Exposes GIT_HASH, BUILD_TIMESTAMP and BUILD_PROFILE to the crate via
//! `env!`, for the startup log line and `/api/buildinfo`.

use std::process::Command;

fn main() {
    emit("GIT_HASH", &git_short_hash().unwrap_or_else(|| "unknown".to_string()));
    emit(
        "BUILD_TIMESTAMP",
        &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    emit(
        "BUILD_PROFILE",
        &std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()),
    );

    // Re-run when the checked-out commit moves, not on every build
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

/// `git rev-parse --short=8 HEAD`, or None outside a git checkout
fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string())
}
