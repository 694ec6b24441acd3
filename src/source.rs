//! Resource configuration supplied by the pipeline.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{error::SourceError, types::PullRequestState};

/// Filter and connection settings for one repository.
///
/// Constructed once per invocation from the request JSON and validated
/// before any network call is made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    pub repository: String,
    pub access_token: String,
    pub v3_endpoint: Option<String>,
    pub v4_endpoint: Option<String>,
    pub paths: Vec<String>,
    pub ignore_paths: Vec<String>,
    pub disable_ci_skip: bool,
    pub disable_git_lfs: bool,
    pub skip_ssl_verification: bool,
    pub disable_forks: bool,
    pub ignore_drafts: bool,
    pub git_crypt_key: Option<String>,
    pub base_branch: Option<String>,
    pub required_review_approvals: u32,
    pub labels: Vec<String>,
    pub states: Vec<String>,
}

impl Source {
    /// Checks the configuration, reporting the first rule that fails.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.access_token.is_empty() {
            return Err(SourceError::MissingAccessToken);
        }
        if self.repository.is_empty() {
            return Err(SourceError::MissingRepository);
        }
        match (non_empty(&self.v3_endpoint), non_empty(&self.v4_endpoint)) {
            (Some(_), None) => return Err(SourceError::MissingV4Endpoint),
            (None, Some(_)) => return Err(SourceError::MissingV3Endpoint),
            _ => {}
        }
        for state in &self.states {
            PullRequestState::from_str(state)?;
        }
        Ok(())
    }

    /// Returns the REST and GraphQL endpoint overrides when both are set.
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        non_empty(&self.v3_endpoint).zip(non_empty(&self.v4_endpoint))
    }

    /// Pull request states a version may be emitted for. Defaults to open
    /// pull requests only.
    pub fn allowed_states(&self) -> Result<Vec<PullRequestState>, SourceError> {
        if self.states.is_empty() {
            return Ok(vec![PullRequestState::Open]);
        }
        self.states
            .iter()
            .map(|state| PullRequestState::from_str(state))
            .collect()
    }

    /// Base branch filter, ignoring an empty string.
    pub fn base_branch(&self) -> Option<&str> {
        non_empty(&self.base_branch)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
