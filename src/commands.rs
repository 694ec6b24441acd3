//! The check, get and put steps of the pipeline resource.
//!
//! Each step takes the request read from the pipeline and any [`Github`]
//! implementation, so the filtering and emission rules can be exercised
//! without a network.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    github::Github,
    pagination::MAX_PAGE_SIZE,
    search::{
        filter_ignored_paths, filter_paths, matches_label_filter, matches_skip_ci, matches_state,
        search_query_for,
    },
    source::Source,
    types::{Metadata, PullRequest, PullRequestState, Version},
};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub source: Source,
    #[serde(default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetRequest {
    pub source: Source,
    pub version: Version,
    #[serde(default)]
    pub params: GetParameters,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GetParameters {
    pub list_changed_files: bool,
}

/// Input of the put step. The version is normally read from the directory a
/// previous get wrote (`params.path`); an inline `version` is used otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    pub source: Source,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub params: PutParameters,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PutParameters {
    /// Directory, relative to the step's source directory, holding the
    /// `version.json` written by get.
    pub path: Option<String>,
    pub status: Option<String>,
    pub base_context: Option<String>,
    pub context: Option<String>,
    pub target_url: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub delete_previous_comments: bool,
}

const ALLOWED_STATUSES: [&str; 4] = ["success", "pending", "failure", "error"];

impl PutParameters {
    pub fn validate(&self) -> Result<()> {
        if let Some(status) = &self.status
            && !ALLOWED_STATUSES.contains(&status.to_lowercase().as_str())
        {
            bail!("unknown status: {status}");
        }
        Ok(())
    }
}

/// Output of the get and put steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResponse {
    pub version: Version,
    pub metadata: Metadata,
}

/// Lists the versions newer than `request.version`, oldest first.
///
/// Without a previous version only the newest version is returned; when
/// nothing newer exists the previous version is echoed back.
pub async fn check<G>(request: &CheckRequest, github: &G) -> Result<Vec<Version>>
where
    G: Github + ?Sized,
{
    let source = &request.source;
    source.validate().context("invalid source configuration")?;
    let states = source.allowed_states()?;
    let query = search_query_for(source)?;

    let pulls = github
        .search_pull_requests(&query, MAX_PAGE_SIZE)
        .await
        .context("failed to search pull requests")?;
    debug!(count = pulls.len(), "search returned pull requests");

    let mut versions = Vec::new();
    for pr in &pulls {
        if let Some(reason) = rejection(source, &states, request.version.as_ref(), pr) {
            debug!(pr = pr.object.number, reason, "skipping pull request");
            continue;
        }
        if !matches_path_filters(source, github, pr).await? {
            debug!(pr = pr.object.number, "skipping pull request: no relevant files");
            continue;
        }
        versions.push(Version::new(pr));
    }

    versions.sort_by_key(|version| version.updated_time);

    let versions = match (&request.version, versions.pop()) {
        (Some(previous), None) => vec![previous.clone()],
        (None, Some(latest)) => vec![latest],
        (_, latest) => {
            versions.extend(latest);
            versions
        }
    };
    info!(count = versions.len(), "check found versions");
    Ok(versions)
}

fn rejection(
    source: &Source,
    states: &[PullRequestState],
    previous: Option<&Version>,
    pr: &PullRequest,
) -> Option<&'static str> {
    if !source.disable_ci_skip && matches_skip_ci(pr) {
        return Some("ci skip");
    }
    if source
        .base_branch()
        .is_some_and(|branch| branch != pr.object.base_ref_name)
    {
        return Some("base branch mismatch");
    }
    if source.disable_forks && pr.object.is_cross_repository {
        return Some("fork");
    }
    if source.ignore_drafts && pr.object.is_draft {
        return Some("draft");
    }
    if pr.approved_review_count < source.required_review_approvals {
        return Some("not enough approvals");
    }
    if !matches_state(pr, states) {
        return Some("state not allowed");
    }
    if !matches_label_filter(pr, &source.labels) {
        return Some("missing label");
    }
    if previous.is_some_and(|version| pr.object.updated_at <= version.updated_time) {
        return Some("not updated since previous version");
    }
    None
}

async fn matches_path_filters<G>(source: &Source, github: &G, pr: &PullRequest) -> Result<bool>
where
    G: Github + ?Sized,
{
    if source.paths.is_empty() && source.ignore_paths.is_empty() {
        return Ok(true);
    }

    let files = github
        .list_modified_files(pr.object.number)
        .await
        .with_context(|| format!("failed to list modified files for #{}", pr.object.number))?;

    Ok(has_relevant_change(&files, &source.paths, &source.ignore_paths))
}

/// Whether any file is selected by `paths` (all files when empty) and not
/// excluded by `ignore_paths`.
fn has_relevant_change(files: &[String], paths: &[String], ignore_paths: &[String]) -> bool {
    let relevant: Vec<String> = if paths.is_empty() {
        files.to_vec()
    } else {
        filter_paths(files, paths)
            .into_iter()
            .map(str::to_string)
            .collect()
    };
    if relevant.is_empty() {
        return false;
    }
    ignore_paths.is_empty() || !filter_ignored_paths(&relevant, ignore_paths).is_empty()
}

/// Resolves the requested version and writes its details to `destination`.
///
/// Writes `version.json` and `metadata.json`, plus `changed_files` (one path
/// per line) when requested.
pub async fn get<G>(request: &GetRequest, github: &G, destination: &Path) -> Result<StepResponse>
where
    G: Github + ?Sized,
{
    request
        .source
        .validate()
        .context("invalid source configuration")?;
    let version = &request.version;

    let pr = github
        .get_pull_request(&version.pr, &version.commit)
        .await
        .with_context(|| format!("failed to fetch pull request #{}", version.pr))?;
    let metadata = metadata_for(&pr);

    tokio::fs::create_dir_all(destination)
        .await
        .with_context(|| format!("failed to create {}", destination.display()))?;
    write_json(&destination.join("version.json"), version).await?;
    write_json(&destination.join("metadata.json"), &metadata).await?;

    if request.params.list_changed_files {
        let files = github
            .get_changed_files(&version.pr, &version.commit)
            .await
            .context("failed to list changed files")?;
        let mut listing = files
            .into_iter()
            .map(|file| file.path)
            .collect::<Vec<_>>()
            .join("\n");
        listing.push('\n');
        let path = destination.join("changed_files");
        tokio::fs::write(&path, listing)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(StepResponse {
        version: version.clone(),
        metadata,
    })
}

/// Reports build status on the version's commit and manages comments.
///
/// `sources` is the directory the put step runs in; `params.path` is
/// resolved against it. The status is set first, then previous comments are
/// deleted, then the new comment is posted.
pub async fn put<G>(request: &PutRequest, github: &G, sources: &Path) -> Result<StepResponse>
where
    G: Github + ?Sized,
{
    request
        .source
        .validate()
        .context("invalid source configuration")?;
    let params = &request.params;
    params.validate()?;
    let version = &resolve_put_version(request, sources).await?;

    let pr = github
        .get_pull_request(&version.pr, &version.commit)
        .await
        .with_context(|| format!("failed to fetch pull request #{}", version.pr))?;

    if let Some(status) = &params.status {
        github
            .update_commit_status(
                &version.commit,
                params.base_context.as_deref().unwrap_or_default(),
                params.context.as_deref().unwrap_or_default(),
                status,
                params.target_url.as_deref().unwrap_or_default(),
                params.description.as_deref().unwrap_or_default(),
            )
            .await
            .context("failed to set commit status")?;
    }

    if params.delete_previous_comments {
        github
            .delete_previous_comments(&version.pr)
            .await
            .context("failed to delete previous comments")?;
    }

    if let Some(comment) = &params.comment {
        github
            .post_comment(&version.pr, comment)
            .await
            .context("failed to post comment")?;
    }

    Ok(StepResponse {
        version: version.clone(),
        metadata: metadata_for(&pr),
    })
}

async fn resolve_put_version(request: &PutRequest, sources: &Path) -> Result<Version> {
    if let Some(dir) = &request.params.path {
        let path = sources.join(dir).join("version.json");
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        return serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()));
    }
    match &request.version {
        Some(version) => Ok(version.clone()),
        None => bail!("put requires params.path or a version"),
    }
}

/// Metadata describing a resolved pull request.
pub fn metadata_for(pr: &PullRequest) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.add("pr", pr.object.number.to_string());
    metadata.add("title", pr.object.title.as_str());
    metadata.add("url", pr.object.url.as_str());
    metadata.add("head_name", pr.object.head_ref_name.as_str());
    metadata.add("head_sha", pr.tip.oid.as_str());
    metadata.add("base_name", pr.object.base_ref_name.as_str());
    metadata.add("message", pr.tip.message.as_str());
    metadata.add("author", pr.tip.author.login.as_deref().unwrap_or_default());
    metadata.add(
        "author_email",
        pr.tip.author.email.as_deref().unwrap_or_default(),
    );
    metadata.add("state", pr.object.state.as_str());
    metadata
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}
