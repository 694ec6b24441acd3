//! Error types exposed by the GitHub data-access layer.

use std::num::ParseIntError;

use thiserror::Error;

/// Reasons a [`Source`](crate::Source) fails validation.
///
/// Validation stops at the first failing rule, so only one of these is ever
/// reported for a given source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("access_token must be set")]
    MissingAccessToken,

    #[error("repository must be set")]
    MissingRepository,

    #[error("v4_endpoint must be set together with v3_endpoint")]
    MissingV4Endpoint,

    #[error("v3_endpoint must be set together with v4_endpoint")]
    MissingV3Endpoint,

    /// A `states` entry is not one of the three pull request states.
    #[error("states value \"{0}\" must be one of: OPEN, MERGED, CLOSED")]
    InvalidState(String),
}

/// Errors surfaced while configuring the client or talking to GitHub.
#[derive(Debug, Error)]
pub enum GithubError {
    /// The source configuration is incomplete or inconsistent.
    #[error("invalid source configuration: {0}")]
    Source(#[from] SourceError),

    /// The repository identifier is not of the form `owner/name`.
    #[error("malformed repository: {0:?} must be in the form 'owner/name'")]
    MalformedRepository(String),

    /// An endpoint override could not be parsed as a URL.
    #[error("failed to parse {kind} endpoint {value:?}: {source}")]
    InvalidEndpoint {
        kind: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    /// A pull request number supplied as text is not an integer.
    #[error("failed to convert pull request number {value:?} to int: {source}")]
    InvalidPullRequestNumber {
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// The HTTP transport could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// GitHub rejected the token (401/403).
    #[error("GitHub rejected the token: {message}")]
    Authentication { message: String },

    /// GitHub reported that the rate limit is exhausted.
    #[error("GitHub API rate limit exceeded: {message}")]
    RateLimited { message: String },

    /// GitHub answered with a non-success status.
    #[error("GitHub API error: {message}")]
    Api { message: String },

    /// Networking failed while calling GitHub.
    #[error("network error talking to GitHub: {message}")]
    Network { message: String },

    /// The GraphQL endpoint returned an `errors` array.
    #[error("GraphQL query {operation} failed: {message}")]
    GraphQl {
        operation: &'static str,
        message: String,
    },

    /// A response body did not have the expected shape.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// A continuation signal did not move past the current position.
    #[error("invalid pagination: {message}")]
    Pagination { message: String },

    /// The requested commit is not among the most recent commits of the
    /// pull request.
    #[error("commit with ref '{commit_ref}' does not exist")]
    CommitNotFound { commit_ref: String },
}
