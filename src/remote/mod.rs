mod github;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;

pub use github::GitHubContents;

/// Snapshot of a remote file as served by the contents API.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    /// Opaque revision identifier required for conflict-aware updates.
    /// Stale after any remote write; re-fetch before updating.
    pub sha: String,
    /// Base64 payload. The contents API wraps it at 60 columns, so embedded
    /// newlines are expected.
    pub content: String,
}

impl RemoteFile {
    /// Decodes the payload, tolerating the provider's line wrapping.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let compact: String =
            self.content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .context("Invalid base64 in remote content")
    }
}

/// Operations a hosted-repository backend must provide.
///
/// The artifact sync only needs three primitives; keeping the trait this
/// small lets tests drop in an in-memory store instead of a live API.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the file at `path` on the configured branch. `Ok(None)`
    /// means the path does not exist remotely.
    async fn fetch(&self, path: &str) -> Result<Option<RemoteFile>>;

    /// Creates a new file at `path` with the given base64 content.
    async fn create(&self, path: &str, message: &str, content_b64: &str) -> Result<()>;

    /// Replaces the file at `path`, guarding against lost updates with the
    /// revision identifier from a prior [`fetch`](Self::fetch).
    async fn update(&self, path: &str, message: &str, content_b64: &str, sha: &str) -> Result<()>;
}

/// Encodes artifact bytes the way the contents API expects them.
pub(crate) fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
