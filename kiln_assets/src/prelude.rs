pub use super::backend::*;
pub use super::cache::AssetCache;
pub use super::error::CacheError;
pub use super::gltf_loader::GltfLoader;
pub use super::key::*;
pub use super::loader::AssetLoader;
pub use super::options::*;
pub use super::slot::AssetState;
pub use super::texture_array::*;
pub use kiln_scene::prelude::*;
