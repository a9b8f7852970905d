use std::time::Duration;

use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::{RemoteFile, RemoteStore};
use crate::config::SyncConfig;

const API_BASE: &str = "https://api.github.com";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Backend driving GitHub's REST contents endpoints.
///
/// One `(owner, repo, branch)` triple per instance; the bearer token is
/// baked into the client's default headers at construction.
pub struct GitHubContents {
    client: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
    branch: String,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

impl GitHubContents {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        Self::with_base_url(config, API_BASE)
    }

    /// Same as [`new`](Self::new) with an overridden API root. Tests point
    /// this at a local mock server.
    pub fn with_base_url(config: &SyncConfig, base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("API token is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/contents/{}", self.base_url, self.owner, self.repo, path)
    }
}

#[async_trait]
impl RemoteStore for GitHubContents {
    #[instrument(level = "debug", skip(self), err)]
    async fn fetch(&self, path: &str) -> Result<Option<RemoteFile>> {
        let url = self.contents_url(path);
        debug!(%url, branch = %self.branch, "Fetching remote file");

        let resp =
            self.client.get(&url).query(&[("ref", self.branch.as_str())]).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        resp.error_for_status_ref()?;

        let file: ContentsResponse = resp.json().await?;
        ensure!(
            file.encoding == "base64",
            "Unsupported content encoding from API: {:?}",
            file.encoding
        );
        Ok(Some(RemoteFile { sha: file.sha, content: file.content }))
    }

    #[instrument(level = "debug", skip(self, content_b64), err)]
    async fn create(&self, path: &str, message: &str, content_b64: &str) -> Result<()> {
        let url = self.contents_url(path);
        debug!(%url, branch = %self.branch, "Creating remote file");

        let resp = self
            .client
            .put(&url)
            .json(&json!({
                "message": message,
                "content": content_b64,
                "branch": self.branch,
            }))
            .send()
            .await?;
        resp.error_for_status_ref()?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, content_b64), err)]
    async fn update(&self, path: &str, message: &str, content_b64: &str, sha: &str) -> Result<()> {
        let url = self.contents_url(path);
        debug!(%url, branch = %self.branch, sha, "Updating remote file");

        let resp = self
            .client
            .put(&url)
            .json(&json!({
                "message": message,
                "content": content_b64,
                "branch": self.branch,
                "sha": sha,
            }))
            .send()
            .await?;
        resp.error_for_status_ref()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path, query_param},
    };

    use super::*;

    fn test_config() -> SyncConfig {
        SyncConfig {
            token: Some("test-token".to_string()),
            owner: "octo".to_string(),
            repo: "progress".to_string(),
            branch: "main".to_string(),
            artifact: PathBuf::from("cfr_data.pkl"),
        }
    }

    fn store(server: &MockServer) -> GitHubContents {
        GitHubContents::with_base_url(&test_config(), server.uri()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_sends_auth_and_branch_ref() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/progress/contents/cfr_data.pkl"))
            .and(query_param("ref", "main"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("Accept", ACCEPT_JSON))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "abc123",
                "content": "3q2+\n7w==\n",
                "encoding": "base64",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = store(&server).fetch("cfr_data.pkl").await.unwrap().expect("file present");
        assert_eq!(file.sha, "abc123");
        assert_eq!(file.decode().unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/progress/contents/cfr_data.pkl"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(store(&server).fetch("cfr_data.pkl").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_propagates_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/progress/contents/cfr_data.pkl"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(store(&server).fetch("cfr_data.pkl").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_rejects_unknown_encoding() {
        let server = MockServer::start().await;
        // Files above the API's size cutoff come back with encoding "none".
        Mock::given(method("GET"))
            .and(path("/repos/octo/progress/contents/cfr_data.pkl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "abc123",
                "content": "",
                "encoding": "none",
            })))
            .mount(&server)
            .await;

        assert!(store(&server).fetch("cfr_data.pkl").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_puts_content_without_sha() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/octo/progress/contents/cfr_data.pkl"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "message": "Initial AI progress",
                "content": "3q2+7w==",
                "branch": "main",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "content": { "sha": "new-sha" },
            })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .create("cfr_data.pkl", "Initial AI progress", "3q2+7w==")
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_puts_content_with_prior_sha() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/octo/progress/contents/cfr_data.pkl"))
            .and(body_partial_json(json!({
                "message": "Update AI progress",
                "content": "yv66vg==",
                "branch": "main",
                "sha": "abc123",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": { "sha": "next-sha" },
            })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .update("cfr_data.pkl", "Update AI progress", "yv66vg==", "abc123")
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_propagates_conflict_errors() {
        let server = MockServer::start().await;
        // A stale sha makes the API answer 409.
        Mock::given(method("PUT"))
            .and(path("/repos/octo/progress/contents/cfr_data.pkl"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        assert!(
            store(&server)
                .update("cfr_data.pkl", "Update AI progress", "yv66vg==", "stale")
                .await
                .is_err()
        );
    }
}
