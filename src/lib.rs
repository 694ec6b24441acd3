//! Pull request resource: tracks pull requests on GitHub as orderable
//! versions for a build pipeline.
//!
//! The [`Github`] trait hides the REST and GraphQL APIs behind the seven
//! operations the pipeline needs, [`GithubClient`] implements it, and the
//! [`commands`] module turns search results into [`Version`]s and reports
//! build status back.

pub mod cli;
pub mod commands;
pub mod error;
pub mod github;
pub mod graphql;
pub mod pagination;
pub mod rest;
pub mod search;
pub mod source;
pub mod transport;
pub mod types;

pub use cli::{Cli, Step, parse_args, read_request};
pub use commands::{CheckRequest, GetRequest, PutRequest, StepResponse, check, get, put};
pub use error::{GithubError, SourceError};
pub use github::{BuildEnvironment, Github, GithubClient};
pub use source::Source;
pub use types::{
    ChangedFileObject, CommitAuthor, CommitObject, LabelObject, Metadata, MetadataField,
    PullRequest, PullRequestObject, PullRequestState, Version,
};
