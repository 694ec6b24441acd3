use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Lifecycle state of a pull request as reported by the GraphQL API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestState::Open => "OPEN",
            PullRequestState::Closed => "CLOSED",
            PullRequestState::Merged => "MERGED",
        }
    }
}

impl FromStr for PullRequestState {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(PullRequestState::Open),
            "CLOSED" => Ok(PullRequestState::Closed),
            "MERGED" => Ok(PullRequestState::Merged),
            other => Err(SourceError::InvalidState(other.to_string())),
        }
    }
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive fields of a pull request, independent of which commit is
/// considered its tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestObject {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub base_ref_name: String,
    pub head_ref_name: String,
    pub repository_url: String,
    pub is_cross_repository: bool,
    pub is_draft: bool,
    pub state: PullRequestState,
    pub updated_at: DateTime<Utc>,
}

/// Author of a commit. The login is absent when the commit email is not
/// linked to a GitHub account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitAuthor {
    pub login: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitObject {
    pub id: String,
    pub oid: String,
    pub committed_date: DateTime<Utc>,
    pub message: String,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFileObject {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelObject {
    pub name: String,
}

/// A pull request paired with the commit under test.
///
/// `approved_review_count` and `labels` are only filled in by
/// [`Github::search_pull_requests`](crate::Github::search_pull_requests);
/// a pull request resolved for a specific commit leaves them empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub object: PullRequestObject,
    pub tip: CommitObject,
    pub approved_review_count: u32,
    pub labels: Vec<LabelObject>,
}

impl PullRequest {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }
}

/// The unit of change emitted to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub pr: String,
    pub commit: String,
    #[serde(rename = "updated", default)]
    pub updated_time: DateTime<Utc>,
    #[serde(default)]
    pub approved_review_count: String,
    pub state: PullRequestState,
}

impl Version {
    /// Derives the version describing `pr` at its tip commit.
    pub fn new(pr: &PullRequest) -> Self {
        Self {
            pr: pr.object.number.to_string(),
            commit: pr.tip.oid.clone(),
            updated_time: pr.object.updated_at,
            approved_review_count: pr.approved_review_count.to_string(),
            state: pr.object.state,
        }
    }
}

impl From<&PullRequest> for Version {
    fn from(pr: &PullRequest) -> Self {
        Version::new(pr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

/// Ordered name/value pairs attached to a build result. Names are not
/// deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Vec<MetadataField>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(MetadataField {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn fields(&self) -> &[MetadataField] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}
