//! The GitHub capability used by the resource and its two-protocol adapter.
//!
//! [`Github`] exposes the seven operations the check/get/put workflow needs.
//! [`GithubClient`] implements them by dispatching each one to whichever API
//! owns it: search, commit lookup, changed files and comment authorship go
//! through GraphQL; file listings, comments and commit statuses through REST.

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::GithubError,
    graphql::{
        self, ChangedFilesData, ChangedFilesVariables, CommentsVariables, PullRequestCommitsData,
        PullRequestVariables, SearchData, SearchNode, SearchVariables, ViewerCommentsData,
    },
    pagination::{self, Cursor, MAX_PAGE_SIZE, Page},
    rest::{self, NewComment, NewStatus, PullRequestFile},
    source::Source,
    transport::{Endpoints, Transport},
    types::{ChangedFileObject, PullRequest},
};

/// Number of most recent commits searched when resolving a commit ref.
pub const COMMIT_WINDOW: u32 = 100;
/// Number of most recent comments inspected by
/// [`Github::delete_previous_comments`].
pub const COMMENT_WINDOW: u32 = 100;

const DEFAULT_BASE_CONTEXT: &str = "concourse-ci";
const DEFAULT_STATUS_CONTEXT: &str = "status";

/// Operations on a single repository.
#[async_trait]
pub trait Github: Send + Sync {
    /// Runs a search query and returns one pull request per hit, each paired
    /// with its latest commit, approved review count and labels. `limit` is
    /// the page size (at most 100); every page is fetched.
    async fn search_pull_requests(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<PullRequest>, GithubError>;

    /// Paths of all files modified by the pull request.
    async fn list_modified_files(&self, pr_number: u64) -> Result<Vec<String>, GithubError>;

    async fn post_comment(&self, pr_number: &str, comment: &str) -> Result<(), GithubError>;

    /// Resolves the pull request with `commit_ref` as its tip. Only the most
    /// recent [`COMMIT_WINDOW`] commits are considered, and the approved
    /// review count and labels are left empty.
    async fn get_pull_request(
        &self,
        pr_number: &str,
        commit_ref: &str,
    ) -> Result<PullRequest, GithubError>;

    /// Files changed by the pull request. The list reflects the pull request
    /// as a whole; `commit_ref` does not narrow it.
    async fn get_changed_files(
        &self,
        pr_number: &str,
        commit_ref: &str,
    ) -> Result<Vec<ChangedFileObject>, GithubError>;

    /// Creates a commit status. Empty arguments fall back to defaults.
    async fn update_commit_status(
        &self,
        commit_ref: &str,
        base_context: &str,
        status_context: &str,
        status: &str,
        target_url: &str,
        description: &str,
    ) -> Result<(), GithubError>;

    /// Deletes the authenticated user's comments among the most recent
    /// [`COMMENT_WINDOW`] comments, stopping at the first failure.
    async fn delete_previous_comments(&self, pr_number: &str) -> Result<(), GithubError>;
}

/// Pipeline values used to build the default commit status target URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnvironment {
    pub external_url: String,
    pub build_id: String,
}

impl BuildEnvironment {
    /// Reads `ATC_EXTERNAL_URL` and `BUILD_ID`, treating unset variables as
    /// empty.
    pub fn from_env() -> Self {
        Self {
            external_url: std::env::var("ATC_EXTERNAL_URL").unwrap_or_default(),
            build_id: std::env::var("BUILD_ID").unwrap_or_default(),
        }
    }

    pub fn build_url(&self) -> String {
        [self.external_url.as_str(), "builds", self.build_id.as_str()].join("/")
    }
}

/// [`Github`] implementation backed by the REST and GraphQL APIs.
#[derive(Debug, Clone)]
pub struct GithubClient {
    transport: Transport,
    owner: String,
    repository: String,
    build: BuildEnvironment,
}

impl GithubClient {
    /// Builds a client for `source.repository`.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::MalformedRepository`] when the repository is not
    /// `owner/name`, [`GithubError::InvalidEndpoint`] when an endpoint
    /// override is not a URL, and [`GithubError::Client`] when the HTTP client
    /// cannot be created.
    pub fn new(source: &Source, build: BuildEnvironment) -> Result<Self, GithubError> {
        let (owner, repository) = parse_repository(&source.repository)?;
        let endpoints = match source.endpoints() {
            Some((rest, graphql)) => Endpoints::enterprise(rest, graphql)?,
            None => Endpoints::public(),
        };
        let transport = Transport::new(
            &source.access_token,
            endpoints,
            source.skip_ssl_verification,
        )?;

        Ok(Self {
            transport,
            owner: owner.to_string(),
            repository: repository.to_string(),
            build,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn endpoints(&self) -> &Endpoints {
        self.transport.endpoints()
    }

    async fn search_page(
        &self,
        document: &str,
        query: &str,
        first: u32,
        cursor: Cursor,
    ) -> Result<Page<PullRequest>, GithubError> {
        let variables = SearchVariables {
            search_query: query,
            search_first: first,
            after: cursor.after(),
        };
        let data: SearchData = self
            .transport
            .graphql("search", document, variables)
            .await?;

        let items = data
            .search
            .nodes
            .into_iter()
            .filter_map(|node| match node {
                SearchNode::PullRequest(pr) => pr.into_pull_request(),
                SearchNode::Other => None,
            })
            .collect();
        Ok(Page::new(items, data.search.page_info.continuation()?))
    }

    async fn modified_files_page(
        &self,
        path: &str,
        cursor: Cursor,
    ) -> Result<Page<String>, GithubError> {
        let (files, next_page) = self
            .transport
            .rest_get_page::<PullRequestFile>("list modified files", path, MAX_PAGE_SIZE, cursor.page())
            .await?;
        Ok(Page::new(
            files.into_iter().map(|file| file.filename).collect(),
            next_page.map(Cursor::Page),
        ))
    }

    async fn changed_files_page(
        &self,
        number: u64,
        cursor: Cursor,
    ) -> Result<Page<ChangedFileObject>, GithubError> {
        let variables = ChangedFilesVariables {
            owner: &self.owner,
            name: &self.repository,
            number,
            first: MAX_PAGE_SIZE,
            after: cursor.after(),
        };
        let data: ChangedFilesData = self
            .transport
            .graphql("changed files", graphql::CHANGED_FILES_QUERY, variables)
            .await?;

        let files = data.repository.pull_request.files;
        Ok(Page::new(
            files.edges.into_iter().map(|edge| edge.node.into()).collect(),
            files.page_info.continuation()?,
        ))
    }
}

#[async_trait]
impl Github for GithubClient {
    async fn search_pull_requests(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<PullRequest>, GithubError> {
        let document = graphql::search_query();
        let first = limit.clamp(1, MAX_PAGE_SIZE);
        debug!(query, first, "searching pull requests");

        pagination::collect_all(Cursor::Start, |cursor| {
            self.search_page(&document, query, first, cursor)
        })
        .await
    }

    async fn list_modified_files(&self, pr_number: u64) -> Result<Vec<String>, GithubError> {
        let path = rest::pull_request_files_path(&self.owner, &self.repository, pr_number);
        pagination::collect_all(Cursor::Start, |cursor| {
            self.modified_files_page(&path, cursor)
        })
        .await
    }

    async fn post_comment(&self, pr_number: &str, comment: &str) -> Result<(), GithubError> {
        let number = parse_pr_number(pr_number)?;
        let path = rest::issue_comments_path(&self.owner, &self.repository, number);
        self.transport
            .rest_post("post comment", &path, &NewComment { body: comment })
            .await
    }

    async fn get_pull_request(
        &self,
        pr_number: &str,
        commit_ref: &str,
    ) -> Result<PullRequest, GithubError> {
        let number = parse_pr_number(pr_number)?;
        let variables = PullRequestVariables {
            owner: &self.owner,
            name: &self.repository,
            number,
            commits_last: COMMIT_WINDOW,
        };
        let data: PullRequestCommitsData = self
            .transport
            .graphql(
                "pull request",
                &graphql::pull_request_commits_query(),
                variables,
            )
            .await?;

        data.repository
            .pull_request
            .into_pull_request_at(commit_ref)
            .ok_or_else(|| GithubError::CommitNotFound {
                commit_ref: commit_ref.to_string(),
            })
    }

    async fn get_changed_files(
        &self,
        pr_number: &str,
        _commit_ref: &str,
    ) -> Result<Vec<ChangedFileObject>, GithubError> {
        let number = parse_pr_number(pr_number)?;
        pagination::collect_all(Cursor::Start, |cursor| {
            self.changed_files_page(number, cursor)
        })
        .await
    }

    async fn update_commit_status(
        &self,
        commit_ref: &str,
        base_context: &str,
        status_context: &str,
        status: &str,
        target_url: &str,
        description: &str,
    ) -> Result<(), GithubError> {
        let base_context = or_default(base_context, DEFAULT_BASE_CONTEXT);
        let status_context = or_default(status_context, DEFAULT_STATUS_CONTEXT);
        let target_url = match target_url {
            "" => self.build.build_url(),
            url => url.to_string(),
        };
        let description = match description {
            "" => format!("Concourse CI build {status}"),
            text => text.to_string(),
        };
        let state = status.to_lowercase();
        let context = join_context(base_context, status_context);

        let path = rest::statuses_path(&self.owner, &self.repository, commit_ref);
        self.transport
            .rest_post(
                "update commit status",
                &path,
                &NewStatus {
                    state: &state,
                    target_url: &target_url,
                    description: &description,
                    context: &context,
                },
            )
            .await
    }

    async fn delete_previous_comments(&self, pr_number: &str) -> Result<(), GithubError> {
        let number = parse_pr_number(pr_number)?;
        let variables = CommentsVariables {
            owner: &self.owner,
            name: &self.repository,
            number,
            comments_last: COMMENT_WINDOW,
        };
        let data: ViewerCommentsData = self
            .transport
            .graphql("previous comments", graphql::VIEWER_COMMENTS_QUERY, variables)
            .await?;

        for comment_id in data.own_comment_ids() {
            let path = rest::issue_comment_path(&self.owner, &self.repository, comment_id);
            self.transport.rest_delete("delete comment", &path).await?;
        }
        Ok(())
    }
}

/// Splits `owner/name` into its two parts.
pub fn parse_repository(repository: &str) -> Result<(&str, &str), GithubError> {
    match repository.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => Ok((*owner, *name)),
        _ => Err(GithubError::MalformedRepository(repository.to_string())),
    }
}

/// Parses a pull request number supplied as text.
pub fn parse_pr_number(pr_number: &str) -> Result<u64, GithubError> {
    pr_number
        .parse()
        .map_err(|source| GithubError::InvalidPullRequestNumber {
            value: pr_number.to_string(),
            source,
        })
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() { default } else { value }
}

/// Joins status contexts like slash-separated paths: empty and `.` segments
/// are dropped, `..` removes the preceding segment, and a leading `/` on the
/// joined value is kept.
fn join_context(base: &str, context: &str) -> String {
    let parts: Vec<&str> = [base, context]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    let rooted = parts.first().is_some_and(|part| part.starts_with('/'));

    let mut segments: Vec<&str> = Vec::new();
    for segment in parts.iter().flat_map(|part| part.split('/')) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            segment => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
