//! Authenticated HTTP transport shared by the REST and GraphQL calls.
//!
//! Built on `reqwest` directly so that certificate verification can be
//! turned off per client for enterprise hosts with self-signed certificates;
//! `Link` pagination and status-to-error mapping are therefore done here.

use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, USER_AGENT},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};
use url::Url;

use crate::{error::GithubError, graphql::GraphQlResponse, rest};

const DEFAULT_REST_ENDPOINT: &str = "https://api.github.com/";
const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";
const ENTERPRISE_REST_SUFFIX: &str = "api/v3/";

/// Where the two API surfaces live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub rest: Url,
    pub graphql: Url,
}

impl Endpoints {
    /// Public github.com endpoints.
    pub fn public() -> Self {
        Self {
            rest: Url::parse(DEFAULT_REST_ENDPOINT).expect("default REST endpoint is a valid URL"),
            graphql: Url::parse(DEFAULT_GRAPHQL_ENDPOINT)
                .expect("default GraphQL endpoint is a valid URL"),
        }
    }

    /// Enterprise endpoints. The REST URL gains a trailing `api/v3/` when it
    /// does not already end with it.
    pub fn enterprise(rest: &str, graphql: &str) -> Result<Self, GithubError> {
        let mut rest_url = Url::parse(rest).map_err(|source| GithubError::InvalidEndpoint {
            kind: "v3",
            value: rest.to_string(),
            source,
        })?;
        if !rest_url.path().ends_with('/') {
            rest_url.set_path(&format!("{}/", rest_url.path()));
        }
        if !rest_url.path().ends_with(ENTERPRISE_REST_SUFFIX) {
            rest_url.set_path(&format!("{}{ENTERPRISE_REST_SUFFIX}", rest_url.path()));
        }

        let graphql = Url::parse(graphql).map_err(|source| GithubError::InvalidEndpoint {
            kind: "v4",
            value: graphql.to_string(),
            source,
        })?;

        Ok(Self {
            rest: rest_url,
            graphql,
        })
    }
}

/// A token-bound HTTP client plus the endpoints it talks to.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    endpoints: Endpoints,
}

impl Transport {
    /// Builds the client. Certificate validation is only disabled when
    /// `skip_tls_verification` is set.
    pub fn new(
        token: &str,
        endpoints: Endpoints,
        skip_tls_verification: bool,
    ) -> Result<Self, GithubError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            GithubError::Authentication {
                message: "access token contains characters not allowed in a header".to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("pull-request-resource/", env!("CARGO_PKG_VERSION"))),
        );

        if skip_tls_verification {
            warn!("TLS certificate verification is disabled for GitHub requests");
        }

        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(skip_tls_verification)
            .build()
            .map_err(GithubError::Client)?;

        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Runs a GraphQL query and returns its `data` member.
    pub async fn graphql<V, D>(
        &self,
        operation: &'static str,
        query: &str,
        variables: V,
    ) -> Result<D, GithubError>
    where
        V: Serialize,
        D: DeserializeOwned,
    {
        debug!(operation, "sending GraphQL query");
        let body = serde_json::json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(self.endpoints.graphql.clone())
            .json(&body)
            .send()
            .await
            .map_err(|error| map_reqwest_error(operation, &error))?;
        let response = check_status(operation, response).await?;

        let payload: GraphQlResponse<D> =
            response.json().await.map_err(|error| GithubError::Decode {
                operation,
                message: error.to_string(),
            })?;
        payload.into_data(operation)
    }

    /// GETs one page of a REST listing and returns the items together with
    /// the next page number from the `Link` header.
    pub async fn rest_get_page<T>(
        &self,
        operation: &'static str,
        path: &str,
        per_page: u32,
        page: u32,
    ) -> Result<(Vec<T>, Option<u32>), GithubError>
    where
        T: DeserializeOwned,
    {
        let url = self.rest_url(path)?;
        debug!(operation, %url, page, "fetching REST page");
        let response = self
            .client
            .get(url)
            .query(&[("per_page", per_page), ("page", page)])
            .send()
            .await
            .map_err(|error| map_reqwest_error(operation, &error))?;
        let response = check_status(operation, response).await?;

        let next_page = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(rest::next_page);
        let items = response.json().await.map_err(|error| GithubError::Decode {
            operation,
            message: error.to_string(),
        })?;
        Ok((items, next_page))
    }

    /// POSTs a JSON body to a REST path, discarding the response body.
    pub async fn rest_post<B>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), GithubError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.rest_url(path)?;
        debug!(operation, %url, "posting to REST API");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| map_reqwest_error(operation, &error))?;
        check_status(operation, response).await.map(drop)
    }

    pub async fn rest_delete(&self, operation: &'static str, path: &str) -> Result<(), GithubError> {
        let url = self.rest_url(path)?;
        debug!(operation, %url, "deleting via REST API");
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|error| map_reqwest_error(operation, &error))?;
        check_status(operation, response).await.map(drop)
    }

    fn rest_url(&self, path: &str) -> Result<Url, GithubError> {
        self.endpoints
            .rest
            .join(path)
            .map_err(|error| GithubError::Api {
                message: format!("cannot build request URL for {path:?}: {error}"),
            })
    }
}

async fn check_status(operation: &str, response: Response) -> Result<Response, GithubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_http_error(operation, status, extract_github_message(&body)))
}

fn map_reqwest_error(operation: &str, error: &reqwest::Error) -> GithubError {
    GithubError::Network {
        message: format!("{operation} failed: {error}"),
    }
}

const fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

fn is_rate_limit(status: StatusCode, message: &str) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    ) && message.to_lowercase().contains("rate limit")
}

pub(crate) fn map_http_error(
    operation: &str,
    status: StatusCode,
    maybe_message: Option<String>,
) -> GithubError {
    let message = maybe_message.unwrap_or_else(|| "unknown error".to_string());
    if is_rate_limit(status, &message) {
        GithubError::RateLimited {
            message: format!("{operation} failed: {message}"),
        }
    } else if is_auth_failure(status) {
        GithubError::Authentication {
            message: format!("{operation} failed: GitHub returned {status} {message}"),
        }
    } else {
        GithubError::Api {
            message: format!("{operation} failed with status {status}: {message}"),
        }
    }
}

fn extract_github_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
}
