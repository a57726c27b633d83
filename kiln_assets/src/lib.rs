//! Single-flight asset cache handing out independently disposable copies of loaded scenes

mod backend;
mod cache;
mod error;
mod gltf_loader;
mod key;
mod loader;
mod options;
mod slot;
mod texture_array;

pub mod prelude;

pub use backend::{HeadlessBackend, WarmupBackend};
pub use cache::AssetCache;
pub use error::CacheError;
pub use gltf_loader::GltfLoader;
pub use key::{AssetKey, AssetLocation, PROCEDURAL_PREFIX};
pub use loader::AssetLoader;
pub use options::{CacheConfig, CacheOptions};
pub use slot::AssetState;
pub use texture_array::{TextureArray, TextureArrayError, TextureArrayLoader};
