//! Query documents and typed response schemas for the GraphQL (v4) API.
//!
//! Each operation has its own response schema which is decoded once and
//! then converted into the domain types in [`crate::types`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::GithubError,
    pagination::PageInfo,
    types::{
        ChangedFileObject, CommitAuthor, CommitObject, LabelObject, PullRequest,
        PullRequestObject, PullRequestState,
    },
};

const PULL_REQUEST_FIELDS: &str = r#"
    fragment PullRequestFields on PullRequest {
        id
        number
        title
        url
        baseRefName
        headRefName
        repository { url }
        isCrossRepository
        isDraft
        state
        updatedAt
    }

    fragment CommitFields on Commit {
        id
        oid
        committedDate
        message
        author {
            user { login }
            email
        }
    }
"#;

pub fn search_query() -> String {
    format!(
        r#"
        query($searchQuery: String!, $searchFirst: Int!, $after: String) {{
            search(query: $searchQuery, type: ISSUE, first: $searchFirst, after: $after) {{
                nodes {{
                    __typename
                    ... on PullRequest {{
                        ...PullRequestFields
                        reviews(states: [APPROVED]) {{ totalCount }}
                        commits(last: 1) {{
                            edges {{ node {{ commit {{ ...CommitFields }} }} }}
                        }}
                        labels(first: 100) {{
                            edges {{ node {{ name }} }}
                        }}
                    }}
                }}
                pageInfo {{ hasNextPage endCursor }}
            }}
        }}
        {PULL_REQUEST_FIELDS}
        "#
    )
}

pub fn pull_request_commits_query() -> String {
    format!(
        r#"
        query($owner: String!, $name: String!, $number: Int!, $commitsLast: Int!) {{
            repository(owner: $owner, name: $name) {{
                pullRequest(number: $number) {{
                    ...PullRequestFields
                    commits(last: $commitsLast) {{
                        edges {{ node {{ commit {{ ...CommitFields }} }} }}
                    }}
                }}
            }}
        }}
        {PULL_REQUEST_FIELDS}
        "#
    )
}

pub const CHANGED_FILES_QUERY: &str = r#"
    query($owner: String!, $name: String!, $number: Int!, $first: Int!, $after: String) {
        repository(owner: $owner, name: $name) {
            pullRequest(number: $number) {
                files(first: $first, after: $after) {
                    edges { node { path } }
                    pageInfo { hasNextPage endCursor }
                }
            }
        }
    }
"#;

pub const VIEWER_COMMENTS_QUERY: &str = r#"
    query($owner: String!, $name: String!, $number: Int!, $commentsLast: Int!) {
        viewer { login }
        repository(owner: $owner, name: $name) {
            pullRequest(number: $number) {
                id
                comments(last: $commentsLast) {
                    edges {
                        node {
                            databaseId
                            author { login }
                        }
                    }
                }
            }
        }
    }
"#;

/// Top-level GraphQL envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<D> {
    pub data: Option<D>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

impl<D> GraphQlResponse<D> {
    /// Returns `data`, or the reported errors when there are any.
    pub fn into_data(self, operation: &'static str) -> Result<D, GithubError> {
        if !self.errors.is_empty() {
            let message = self
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GithubError::GraphQl { operation, message });
        }
        self.data.ok_or_else(|| GithubError::Decode {
            operation,
            message: "response contains neither data nor errors".to_string(),
        })
    }
}

// --- shared selections ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestFields {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub base_ref_name: String,
    pub head_ref_name: String,
    pub repository: UrlField,
    pub is_cross_repository: bool,
    pub is_draft: bool,
    pub state: PullRequestState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UrlField {
    pub url: String,
}

impl From<PullRequestFields> for PullRequestObject {
    fn from(fields: PullRequestFields) -> Self {
        Self {
            id: fields.id,
            number: fields.number,
            title: fields.title,
            url: fields.url,
            base_ref_name: fields.base_ref_name,
            head_ref_name: fields.head_ref_name,
            repository_url: fields.repository.url,
            is_cross_repository: fields.is_cross_repository,
            is_draft: fields.is_draft,
            state: fields.state,
            updated_at: fields.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFields {
    pub id: String,
    pub oid: String,
    pub committed_date: DateTime<Utc>,
    pub message: String,
    pub author: Option<GitActor>,
}

#[derive(Debug, Deserialize)]
pub struct GitActor {
    pub user: Option<Login>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub login: String,
}

impl From<CommitFields> for CommitObject {
    fn from(fields: CommitFields) -> Self {
        let author = fields
            .author
            .map(|actor| CommitAuthor {
                login: actor.user.map(|user| user.login),
                email: actor.email,
            })
            .unwrap_or_default();
        Self {
            id: fields.id,
            oid: fields.oid,
            committed_date: fields.committed_date,
            message: fields.message,
            author,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Edges<N> {
    pub edges: Vec<Edge<N>>,
}

#[derive(Debug, Deserialize)]
pub struct Edge<N> {
    pub node: N,
}

#[derive(Debug, Deserialize)]
pub struct CommitNode {
    pub commit: CommitFields,
}

// --- search ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchVariables<'a> {
    pub search_query: &'a str,
    pub search_first: u32,
    pub after: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SearchData {
    pub search: SearchConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConnection {
    pub nodes: Vec<SearchNode>,
    pub page_info: PageInfo,
}

/// A search hit. Only pull requests carry fields; issues and discussions
/// that slip through the query are decoded as [`SearchNode::Other`].
#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub enum SearchNode {
    PullRequest(Box<SearchPullRequest>),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPullRequest {
    #[serde(flatten)]
    pub fields: PullRequestFields,
    pub reviews: TotalCount,
    pub commits: Edges<CommitNode>,
    pub labels: Edges<LabelNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct LabelNode {
    pub name: String,
}

impl SearchPullRequest {
    /// Pairs the pull request with its most recent commit. Returns `None`
    /// when the commit window is empty.
    pub fn into_pull_request(self) -> Option<PullRequest> {
        let tip = self.commits.edges.into_iter().last()?.node.commit;
        Some(PullRequest {
            object: self.fields.into(),
            tip: tip.into(),
            approved_review_count: self.reviews.total_count,
            labels: self
                .labels
                .edges
                .into_iter()
                .map(|edge| LabelObject {
                    name: edge.node.name,
                })
                .collect(),
        })
    }
}

// --- pull request by number ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestVariables<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub number: u64,
    pub commits_last: u32,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestCommitsData {
    pub repository: PullRequestCommitsRepository,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestCommitsRepository {
    pub pull_request: PullRequestWithCommits,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestWithCommits {
    #[serde(flatten)]
    pub fields: PullRequestFields,
    pub commits: Edges<CommitNode>,
}

impl PullRequestWithCommits {
    /// Picks the first commit in the window whose OID is `commit_ref`.
    pub fn into_pull_request_at(self, commit_ref: &str) -> Option<PullRequest> {
        let tip = self
            .commits
            .edges
            .into_iter()
            .map(|edge| edge.node.commit)
            .find(|commit| commit.oid == commit_ref)?;
        Some(PullRequest {
            object: self.fields.into(),
            tip: tip.into(),
            approved_review_count: 0,
            labels: Vec::new(),
        })
    }
}

// --- changed files ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFilesVariables<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub number: u64,
    pub first: u32,
    pub after: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct ChangedFilesData {
    pub repository: ChangedFilesRepository,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFilesRepository {
    pub pull_request: PullRequestFiles,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestFiles {
    pub files: FileConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConnection {
    pub edges: Vec<Edge<FileNode>>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct FileNode {
    pub path: String,
}

impl From<FileNode> for ChangedFileObject {
    fn from(node: FileNode) -> Self {
        Self { path: node.path }
    }
}

// --- comments by the viewer ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsVariables<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub number: u64,
    pub comments_last: u32,
}

#[derive(Debug, Deserialize)]
pub struct ViewerCommentsData {
    pub viewer: Login,
    pub repository: CommentsRepository,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsRepository {
    pub pull_request: PullRequestComments,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestComments {
    pub comments: Edges<CommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub database_id: u64,
    /// Null when the author account has been deleted.
    pub author: Option<Login>,
}

impl ViewerCommentsData {
    /// Database IDs of the comments written by the viewer, oldest first.
    pub fn own_comment_ids(&self) -> Vec<u64> {
        self.repository
            .pull_request
            .comments
            .edges
            .iter()
            .filter(|edge| {
                edge.node
                    .author
                    .as_ref()
                    .is_some_and(|author| author.login == self.viewer.login)
            })
            .map(|edge| edge.node.database_id)
            .collect()
    }
}
