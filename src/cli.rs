use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

const BUILD_INFO: &str = env!("BUILD_INFO");

#[derive(Debug, Parser)]
#[command(name = "pr-resource")]
#[command(
    about = "Pipeline resource that emits a version for every new pull request commit and reports build status back to GitHub"
)]
#[command(long_version = BUILD_INFO)]
pub struct Cli {
    #[command(subcommand)]
    pub step: Step,
}

/// Resource step to run. The request JSON is read from stdin and the
/// response JSON written to stdout.
#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Step {
    /// List new versions
    Check,
    /// Fetch a version's metadata into a directory
    Get {
        /// Directory to write version.json, metadata.json and changed_files
        destination: PathBuf,
    },
    /// Set commit status and manage pull request comments
    Put {
        /// Directory holding the build's inputs, including the one get wrote
        #[arg(default_value = ".")]
        sources: PathBuf,
    },
}

/// Parses process arguments. Help and version requests surface as
/// `clap::Error` inside the returned error.
pub fn parse_args<I, T>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Ok(Cli::try_parse_from(args)?)
}

/// Reads and decodes the JSON request for a step.
pub async fn read_request<T, R>(mut reader: R) -> Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut input = String::new();
    reader
        .read_to_string(&mut input)
        .await
        .context("failed to read request from stdin")?;
    serde_json::from_str(&input).context("failed to parse request JSON")
}
