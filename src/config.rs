use std::{env, path::PathBuf};

use derive_more::Debug;

/// Environment variable holding the API token. Absence disables sync.
pub const TOKEN_ENV: &str = "AI_PROGRESS_TOKEN";
/// Environment variable overriding the repository owner.
pub const OWNER_ENV: &str = "GITHUB_USERNAME";
/// Environment variable overriding the repository name.
pub const REPO_ENV: &str = "GITHUB_REPOSITORY";

const DEFAULT_OWNER: &str = "Azerus96";
const DEFAULT_REPO: &str = "deeprofc";
const DEFAULT_BRANCH: &str = "main";
/// Conventional artifact name, shared between the local filesystem and the
/// remote tree.
pub const DEFAULT_ARTIFACT: &str = "cfr_data.pkl";

/// Coordinates of the remote artifact plus the credential that unlocks it.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Bearer token for the contents API. `None` disables both operations.
    #[debug(skip)]
    pub token: Option<String>,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Artifact path, used verbatim on both sides of the sync.
    pub artifact: PathBuf,
}

impl SyncConfig {
    /// Reads configuration from the process environment. Callers invoke
    /// this per operation; nothing is cached, so a rotated token is picked
    /// up on the next call.
    pub fn from_env() -> Self {
        Self {
            token: non_empty(env::var(TOKEN_ENV)),
            owner: non_empty(env::var(OWNER_ENV)).unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            repo: non_empty(env::var(REPO_ENV)).unwrap_or_else(|| DEFAULT_REPO.to_string()),
            branch: DEFAULT_BRANCH.to_string(),
            artifact: PathBuf::from(DEFAULT_ARTIFACT),
        }
    }
}

/// Empty variables count as unset, matching how the deployment environments
/// pass through blank values.
fn non_empty(value: Result<String, env::VarError>) -> Option<String> {
    value.ok().filter(|v| !v.is_empty())
}
