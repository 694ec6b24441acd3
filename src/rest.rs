//! Request and response shapes for the REST (v3) endpoints.

use serde::{Deserialize, Serialize};

/// One entry of `GET /repos/{owner}/{repo}/pulls/{number}/files`.
#[derive(Debug, Deserialize)]
pub struct PullRequestFile {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct NewComment<'a> {
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NewStatus<'a> {
    pub state: &'a str,
    pub target_url: &'a str,
    pub description: &'a str,
    pub context: &'a str,
}

pub fn pull_request_files_path(owner: &str, repo: &str, number: u64) -> String {
    format!("repos/{owner}/{repo}/pulls/{number}/files")
}

pub fn issue_comments_path(owner: &str, repo: &str, number: u64) -> String {
    format!("repos/{owner}/{repo}/issues/{number}/comments")
}

pub fn issue_comment_path(owner: &str, repo: &str, comment_id: u64) -> String {
    format!("repos/{owner}/{repo}/issues/comments/{comment_id}")
}

pub fn statuses_path(owner: &str, repo: &str, sha: &str) -> String {
    format!("repos/{owner}/{repo}/statuses/{sha}")
}

/// Extracts the `page` query parameter of the `rel="next"` link from a
/// `Link` header value.
pub fn next_page(link_header: &str) -> Option<u32> {
    link_header.split(',').find_map(|link| {
        let mut parts = link.split(';').map(str::trim);
        let target = parts.next()?;
        if !parts.any(|param| param == r#"rel="next""#) {
            return None;
        }
        let url = url::Url::parse(target.trim_start_matches('<').trim_end_matches('>')).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_page_is_read_from_link_header() {
        let header = concat!(
            r#"<https://api.github.com/repositories/1/pulls/2/files?per_page=100&page=3>; rel="next", "#,
            r#"<https://api.github.com/repositories/1/pulls/2/files?per_page=100&page=5>; rel="last""#
        );
        assert_eq!(next_page(header), Some(3));
    }

    #[test]
    fn last_page_has_no_next_link() {
        let header = concat!(
            r#"<https://api.github.com/repositories/1/pulls/2/files?per_page=100&page=1>; rel="first", "#,
            r#"<https://api.github.com/repositories/1/pulls/2/files?per_page=100&page=4>; rel="prev""#
        );
        assert_eq!(next_page(header), None);
    }

    #[test]
    fn malformed_link_is_ignored() {
        assert_eq!(next_page(r#"garbage; rel="next""#), None);
        assert_eq!(next_page(""), None);
    }

    #[test]
    fn status_body_uses_github_field_names() {
        let body = serde_json::to_value(NewStatus {
            state: "success",
            target_url: "https://ci/builds/1",
            description: "Concourse CI build success",
            context: "concourse-ci/status",
        })
        .unwrap();
        assert_eq!(body["target_url"], "https://ci/builds/1");
        assert_eq!(body["context"], "concourse-ci/status");
    }
}
