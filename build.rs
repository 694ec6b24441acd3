//! Embeds a human-readable build description for `--version`.
//!
//! The string is `<crate version> (<git description>) <rustc version>`, where
//! the git description comes from `git describe --tags --always --dirty` and
//! falls back to the build date when git is unavailable.

use std::process::Command;

use chrono::Utc;

fn main() {
    for path in ["src", "build.rs", "Cargo.toml"] {
        println!("cargo:rerun-if-changed={path}");
    }
    println!("cargo:rustc-env=BUILD_INFO={}", build_info());
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn build_info() -> String {
    let revision = command_output("git", &["describe", "--tags", "--always", "--dirty"])
        .unwrap_or_else(|| format!("built {}", Utc::now().format("%Y-%m-%d")));

    [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        Some(format!("({revision})")),
        command_output("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}
