use pull_request_resource::{
    BuildEnvironment, ChangedFileObject, Github, GithubClient, GithubError, PullRequestState,
    Source,
};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_partial_json, header, method, path, query_param},
};

const GRAPHQL_PATH: &str = "/api/graphql";

fn source_for(server: &MockServer) -> Source {
    Source {
        repository: "owner/repo".to_string(),
        access_token: "oauthtoken".to_string(),
        v3_endpoint: Some(format!("{}/api/v3/", server.uri())),
        v4_endpoint: Some(format!("{}{GRAPHQL_PATH}", server.uri())),
        ..Source::default()
    }
}

fn client_for(server: &MockServer) -> GithubClient {
    let build = BuildEnvironment {
        external_url: "https://ci.example.com".to_string(),
        build_id: "42".to_string(),
    };
    GithubClient::new(&source_for(server), build).expect("client should build")
}

fn pull_request_fields(number: u64) -> Value {
    json!({
        "id": format!("PR_{number}"),
        "number": number,
        "title": format!("Pull request {number}"),
        "url": format!("https://github.com/owner/repo/pull/{number}"),
        "baseRefName": "master",
        "headRefName": format!("feature-{number}"),
        "repository": { "url": "https://github.com/owner/repo" },
        "isCrossRepository": false,
        "isDraft": false,
        "state": "OPEN",
        "updatedAt": "2024-03-01T10:00:00Z"
    })
}

fn commit_edge(oid: &str, message: &str) -> Value {
    json!({
        "node": {
            "commit": {
                "id": format!("C_{oid}"),
                "oid": oid,
                "committedDate": "2024-03-01T09:00:00Z",
                "message": message,
                "author": { "user": { "login": "octocat" }, "email": "octocat@github.com" }
            }
        }
    })
}

fn search_node(number: u64, oid: &str, approvals: u32, labels: &[&str]) -> Value {
    let mut node = pull_request_fields(number);
    node["__typename"] = json!("PullRequest");
    node["reviews"] = json!({ "totalCount": approvals });
    node["commits"] = json!({ "edges": [commit_edge(oid, "latest")] });
    node["labels"] = json!({
        "edges": labels.iter().map(|name| json!({ "node": { "name": name } })).collect::<Vec<_>>()
    });
    node
}

fn search_page(nodes: Vec<Value>, end_cursor: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {
            "search": {
                "nodes": nodes,
                "pageInfo": { "hasNextPage": end_cursor.is_some(), "endCursor": end_cursor }
            }
        }
    }))
}

fn commits_response(oids: &[&str]) -> ResponseTemplate {
    let mut pull_request = pull_request_fields(7);
    pull_request["commits"] = json!({
        "edges": oids
            .iter()
            .enumerate()
            .map(|(i, oid)| commit_edge(oid, &format!("commit {i}")))
            .collect::<Vec<_>>()
    });
    ResponseTemplate::new(200).set_body_json(json!({
        "data": { "repository": { "pullRequest": pull_request } }
    }))
}

#[tokio::test]
async fn search_follows_cursors_and_emits_one_pull_request_per_node() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("authorization", "Bearer oauthtoken"))
        .and(body_partial_json(json!({
            "variables": { "searchQuery": "repo:owner/repo is:pr", "searchFirst": 2, "after": null }
        })))
        .respond_with(search_page(
            vec![
                search_node(1, "aaa", 2, &["bug", "ready"]),
                json!({ "__typename": "Issue" }),
                search_node(2, "bbb", 0, &[]),
            ],
            Some("cursor-1"),
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({ "variables": { "after": "cursor-1" } })))
        .respond_with(search_page(vec![search_node(3, "ccc", 1, &[])], None))
        .expect(1)
        .mount(&server)
        .await;

    let pulls = client_for(&server)
        .search_pull_requests("repo:owner/repo is:pr", 2)
        .await
        .unwrap();

    let numbers: Vec<u64> = pulls.iter().map(|pr| pr.object.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(pulls[0].tip.oid, "aaa");
    assert_eq!(pulls[0].approved_review_count, 2);
    assert!(pulls[0].has_label("ready"));
    assert_eq!(pulls[0].labels.len(), 2);
    assert!(pulls[1].labels.is_empty());
    assert_eq!(pulls[2].object.state, PullRequestState::Open);
}

#[tokio::test]
async fn graphql_errors_fail_the_search() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Something went wrong while executing your query." }]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .search_pull_requests("repo:owner/repo", 100)
        .await
        .unwrap_err();

    assert!(matches!(err, GithubError::GraphQl { operation: "search", .. }));
}

#[tokio::test]
async fn rejected_token_is_an_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .search_pull_requests("repo:owner/repo", 100)
        .await
        .unwrap_err();

    assert!(matches!(err, GithubError::Authentication { .. }));
    assert!(err.to_string().contains("Bad credentials"));
}

#[tokio::test]
async fn modified_files_follow_link_header_pages() {
    let server = MockServer::start().await;
    let files_path = "/api/v3/repos/owner/repo/pulls/4/files";
    let next = format!(
        "<{}{files_path}?per_page=100&page=2>; rel=\"next\", <{}{files_path}?per_page=100&page=2>; rel=\"last\"",
        server.uri(),
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path(files_path))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "filename": "README.md" }, { "filename": "src/lib.rs" }]))
                .insert_header("Link", next.as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(files_path))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "filename": "ci/pipeline.yml" }])))
        .expect(1)
        .mount(&server)
        .await;

    let files = client_for(&server).list_modified_files(4).await.unwrap();

    assert_eq!(files, vec!["README.md", "src/lib.rs", "ci/pipeline.yml"]);
}

#[tokio::test]
async fn comment_is_posted_to_the_issue() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/repos/owner/repo/issues/3/comments"))
        .and(body_json(json!({ "body": "Build started" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .post_comment("3", "Build started")
        .await
        .unwrap();
}

#[tokio::test]
async fn non_numeric_pr_number_fails_before_any_request() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = client.post_comment("three", "hi").await.unwrap_err();
    assert!(matches!(err, GithubError::InvalidPullRequestNumber { .. }));

    let err = client.get_pull_request("", "abc").await.unwrap_err();
    assert!(matches!(err, GithubError::InvalidPullRequestNumber { .. }));

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn pull_request_is_resolved_at_the_requested_commit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({
            "variables": { "owner": "owner", "name": "repo", "number": 7, "commitsLast": 100 }
        })))
        .respond_with(commits_response(&["old", "target", "target", "newest"]))
        .expect(1)
        .mount(&server)
        .await;

    let pr = client_for(&server)
        .get_pull_request("7", "target")
        .await
        .unwrap();

    assert_eq!(pr.object.number, 7);
    assert_eq!(pr.tip.oid, "target");
    assert_eq!(pr.tip.message, "commit 1");
    assert_eq!(pr.approved_review_count, 0);
    assert!(pr.labels.is_empty());
}

#[tokio::test]
async fn missing_commit_ref_is_reported_as_not_found() {
    let server = MockServer::start().await;
    let window: Vec<String> = (0..100).map(|i| format!("sha{i}")).collect();
    let oids: Vec<&str> = window.iter().map(String::as_str).collect();

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(commits_response(&oids))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_pull_request("7", "not-in-window")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GithubError::CommitNotFound { ref commit_ref } if commit_ref == "not-in-window"
    ));
}

#[tokio::test]
async fn changed_files_are_collected_across_pages() {
    let server = MockServer::start().await;

    let page = |paths: &[&str], end_cursor: Option<&str>| {
        ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repository": { "pullRequest": { "files": {
                "edges": paths.iter().map(|p| json!({ "node": { "path": p } })).collect::<Vec<_>>(),
                "pageInfo": { "hasNextPage": end_cursor.is_some(), "endCursor": end_cursor }
            } } } }
        }))
    };

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({ "variables": { "number": 5, "first": 100, "after": null } })))
        .respond_with(page(&["a.txt", "b.txt"], Some("files-1")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({ "variables": { "after": "files-1" } })))
        .respond_with(page(&["c.txt"], None))
        .expect(1)
        .mount(&server)
        .await;

    let files = client_for(&server)
        .get_changed_files("5", "ignored")
        .await
        .unwrap();

    assert_eq!(
        files,
        ["a.txt", "b.txt", "c.txt"]
            .into_iter()
            .map(|path| ChangedFileObject {
                path: path.to_string()
            })
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn commit_status_defaults_are_applied() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/repos/owner/repo/statuses/abc123"))
        .and(body_json(json!({
            "state": "pending",
            "target_url": "https://ci.example.com/builds/42",
            "description": "Concourse CI build PENDING",
            "context": "concourse-ci/status"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .update_commit_status("abc123", "", "", "PENDING", "", "")
        .await
        .unwrap();
}

#[tokio::test]
async fn commit_status_uses_explicit_values() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/repos/owner/repo/statuses/abc123"))
        .and(body_json(json!({
            "state": "failure",
            "target_url": "https://example.com/run/1",
            "description": "unit tests failed",
            "context": "my-ci/unit"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .update_commit_status(
            "abc123",
            "my-ci",
            "unit",
            "Failure",
            "https://example.com/run/1",
            "unit tests failed",
        )
        .await
        .unwrap();
}

async fn mount_viewer_comments(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({ "variables": { "number": 9, "commentsLast": 100 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "viewer": { "login": "ci-bot" },
                "repository": { "pullRequest": { "id": "PR_9", "comments": { "edges": [
                    { "node": { "databaseId": 101, "author": { "login": "ci-bot" } } },
                    { "node": { "databaseId": 102, "author": { "login": "octocat" } } },
                    { "node": { "databaseId": 103, "author": { "login": "ci-bot" } } }
                ] } } }
            }
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn only_own_comments_are_deleted() {
    let server = MockServer::start().await;
    mount_viewer_comments(&server).await;

    for (id, expected) in [(101, 1), (102, 0), (103, 1)] {
        Mock::given(method("DELETE"))
            .and(path(format!("/api/v3/repos/owner/repo/issues/comments/{id}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(expected)
            .mount(&server)
            .await;
    }

    client_for(&server)
        .delete_previous_comments("9")
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_deletion_stops_remaining_deletions() {
    let server = MockServer::start().await;
    mount_viewer_comments(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/api/v3/repos/owner/repo/issues/comments/101"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/v3/repos/owner/repo/issues/comments/103"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .delete_previous_comments("9")
        .await
        .unwrap_err();

    assert!(matches!(err, GithubError::Api { .. }));
    assert!(err.to_string().contains("boom"));
}
