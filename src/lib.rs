//! This crate keeps an opaque training-progress artifact in sync with a
//! GitHub repository, using the REST contents API as the backing store.
//!
//! The whole surface is two operations on [`Syncer`]: [`Syncer::save`]
//! publishes the local artifact (create-or-update), [`Syncer::load`] pulls
//! it back down. Both collapse every failure to a boolean and leave the
//! details in the log.

pub mod config;
pub mod remote;
pub mod sync;

pub use config::SyncConfig;
pub use remote::{GitHubContents, RemoteFile, RemoteStore};
pub use sync::Syncer;

/// User agent sent with every API request.
pub(crate) const USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
