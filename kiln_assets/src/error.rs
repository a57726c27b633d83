use crate::key::AssetKey;
use kiln_scene::SceneError;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by [`crate::AssetCache`]. Cloneable so one failed load can be delivered to
/// every request waiting on it.
#[derive(Debug, Error, Clone)]
pub enum CacheError {
    #[error("Failed to load asset {key}: {reason:#}")]
    Load {
        key: AssetKey,
        reason: Arc<anyhow::Error>,
    },
    #[error("Asset {0} has not been loaded")]
    NotLoaded(AssetKey),
    #[error("Asset {0} is still loading")]
    InFlight(AssetKey),
    #[error("Asset cache has been disposed")]
    Disposed,
    #[error(transparent)]
    Scene(#[from] SceneError),
}
