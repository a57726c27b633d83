use derivative::Derivative;
use kiln_scene::{Camera, Scene};
use std::sync::Arc;

/// Flags applied to every mesh of a freshly loaded asset
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CacheConfig {
    pub cast_shadows: bool,
    pub receive_shadows: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cast_shadows: true,
            receive_shadows: true,
        }
    }
}

/// Everything an [`crate::AssetCache`] needs besides its loader
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CacheOptions<B> {
    #[derivative(Debug = "ignore")]
    pub backend: Arc<B>,
    pub camera: Camera,
    pub scene: Scene,
    pub config: CacheConfig,
}

impl<B> CacheOptions<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            camera: Camera::default(),
            scene: Scene::default(),
            config: CacheConfig::default(),
        }
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scene = scene;
        self
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }
}
