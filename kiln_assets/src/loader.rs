use crate::key::AssetKey;
use kiln_scene::Object3D;
use std::future::Future;

/// Produces the scene subtree behind an [`AssetKey`].
///
/// Called at most once per key while a load is in flight; the cache applies the load-time mesh
/// pass and warm-up afterwards.
pub trait AssetLoader: Send + Sync + 'static {
    fn load(&self, key: &AssetKey) -> impl Future<Output = anyhow::Result<Object3D>> + Send;
}
