use std::{error::Error, path::Path};

use anyhow::{Context, Result};
use fs_err::tokio as fs;
use tracing::{error, info, instrument, warn};

use crate::{
    config::{SyncConfig, TOKEN_ENV},
    remote::{self, GitHubContents, RemoteStore},
};

/// Commit message used when the remote artifact already exists.
const UPDATE_MESSAGE: &str = "Update AI progress";
/// Commit message used when the artifact is published for the first time.
const CREATE_MESSAGE: &str = "Initial AI progress";

enum SaveOutcome {
    Created,
    Updated,
}

enum LoadOutcome {
    Missing,
    Loaded(usize),
}

/// Keeps the progress artifact in sync between the local filesystem and a
/// hosted repository.
///
/// Both operations report plain success or failure; callers that need the
/// cause must consult the log. Nothing here panics or propagates an error
/// past the public boundary.
pub struct Syncer<S> {
    config: SyncConfig,
    store: S,
}

impl Syncer<GitHubContents> {
    /// Builds a syncer against the live GitHub API from the process
    /// environment.
    pub fn from_env() -> Result<Self> {
        let config = SyncConfig::from_env();
        let store = GitHubContents::new(&config)?;
        Ok(Self { config, store })
    }
}

impl<S: RemoteStore> Syncer<S> {
    pub fn new(config: SyncConfig, store: S) -> Self {
        Self { config, store }
    }

    /// Publishes the configured artifact. See [`save_as`](Self::save_as).
    pub async fn save(&self) -> bool {
        self.save_as(&self.config.artifact).await
    }

    /// Publishes `filename` to the identically named remote path, creating
    /// the remote file on first save and updating it afterwards.
    #[instrument(skip(self, filename), fields(repo = %self.config.repo, path = %filename.as_ref().display()))]
    pub async fn save_as(&self, filename: impl AsRef<Path>) -> bool {
        if self.disabled("saving") {
            return false;
        }
        match self.try_save(filename.as_ref()).await {
            Ok(SaveOutcome::Updated) => {
                info!("Progress saved to remote repository");
                true
            }
            Ok(SaveOutcome::Created) => {
                info!("Created remote file for progress");
                true
            }
            Err(e) => {
                error!(error = e.as_ref() as &dyn Error, "Failed to save progress");
                false
            }
        }
    }

    /// Restores the configured artifact. See [`load_as`](Self::load_as).
    pub async fn load(&self) -> bool {
        self.load_as(&self.config.artifact).await
    }

    /// Fetches the remote file named like `filename` and overwrites the
    /// local file in full. A missing remote file is benign: nothing has
    /// been saved yet.
    #[instrument(skip(self, filename), fields(repo = %self.config.repo, path = %filename.as_ref().display()))]
    pub async fn load_as(&self, filename: impl AsRef<Path>) -> bool {
        if self.disabled("loading") {
            return false;
        }
        match self.try_load(filename.as_ref()).await {
            Ok(LoadOutcome::Loaded(size)) => {
                info!(size, "Progress loaded from remote repository");
                true
            }
            Ok(LoadOutcome::Missing) => {
                info!("No progress file in remote repository yet");
                false
            }
            Err(e) => {
                error!(error = e.as_ref() as &dyn Error, "Failed to load progress");
                false
            }
        }
    }

    fn disabled(&self, action: &str) -> bool {
        if self.config.token.is_some() {
            return false;
        }
        warn!("{TOKEN_ENV} not set, progress {action} disabled");
        true
    }

    async fn try_save(&self, filename: &Path) -> Result<SaveOutcome> {
        let remote_path = remote_path_for(filename)?;

        // Read before touching the network: a missing local artifact must
        // fail without a single remote call.
        let bytes = fs::read(filename)
            .await
            .with_context(|| format!("Failed to read local artifact {}", filename.display()))?;
        let encoded = remote::encode(&bytes);

        match self.store.fetch(remote_path).await.context("Failed to query remote artifact")? {
            Some(existing) => {
                self.store
                    .update(remote_path, UPDATE_MESSAGE, &encoded, &existing.sha)
                    .await
                    .context("Failed to update remote artifact")?;
                Ok(SaveOutcome::Updated)
            }
            None => {
                self.store
                    .create(remote_path, CREATE_MESSAGE, &encoded)
                    .await
                    .context("Failed to create remote artifact")?;
                Ok(SaveOutcome::Created)
            }
        }
    }

    async fn try_load(&self, filename: &Path) -> Result<LoadOutcome> {
        let remote_path = remote_path_for(filename)?;

        let Some(file) =
            self.store.fetch(remote_path).await.context("Failed to query remote artifact")?
        else {
            return Ok(LoadOutcome::Missing);
        };

        let bytes = file.decode()?;
        fs::write(filename, &bytes)
            .await
            .with_context(|| format!("Failed to write local artifact {}", filename.display()))?;
        Ok(LoadOutcome::Loaded(bytes.len()))
    }
}

fn remote_path_for(filename: &Path) -> Result<&str> {
    filename.to_str().context("Artifact path is not valid UTF-8")
}
