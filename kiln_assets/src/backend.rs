use dashmap::DashSet;
use kiln_scene::{Camera, Object3D, ReleaseEvent, ResourceId, ResourceKind, Scene, Texture};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// GPU-side preparation applied once to every canonical entry before it is installed
pub trait WarmupBackend: Send + Sync + 'static {
    /// Compile every shader program `subtree` needs when drawn from `camera` into `scene`
    fn compile(
        &self,
        subtree: &Object3D,
        camera: &Camera,
        scene: &Scene,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Upload a texture so its first use does not stall a frame
    fn init_texture(&self, texture: &Texture) -> anyhow::Result<()>;
}

/// Backend without a device. Tracks which programs and textures would be resident.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    programs: DashSet<ResourceId>,
    textures: DashSet<ResourceId>,
    compiles: AtomicUsize,
    uploaded_bytes: AtomicUsize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`WarmupBackend::compile`] calls
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::Acquire)
    }

    pub fn resident_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn resident_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn is_texture_resident(&self, id: ResourceId) -> bool {
        self.textures.contains(&id)
    }

    pub fn uploaded_bytes(&self) -> usize {
        self.uploaded_bytes.load(Ordering::Acquire)
    }

    /// Drop residency for released resources. Ids the backend never saw are ignored.
    pub fn collect_garbage(&self, released: &[ReleaseEvent]) {
        for event in released {
            match event.kind {
                ResourceKind::Material => {
                    self.programs.remove(&event.id);
                }
                ResourceKind::Texture => {
                    self.textures.remove(&event.id);
                }
                ResourceKind::Geometry | ResourceKind::ImageBitmap => {}
            }
        }
    }
}

impl WarmupBackend for HeadlessBackend {
    async fn compile(
        &self,
        subtree: &Object3D,
        camera: &Camera,
        scene: &Scene,
    ) -> anyhow::Result<()> {
        let mut materials = Vec::new();
        subtree.visit_meshes(&mut |mesh| materials.push(mesh.material.id()));
        // compilation completes asynchronously on a real device
        tokio::task::yield_now().await;
        tracing::trace!(
            "Compiled {} programs of {} for {} (fov {:.2})",
            materials.len(),
            subtree.name,
            scene.name,
            camera.fov_y
        );
        for id in materials {
            self.programs.insert(id);
        }
        self.compiles.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn init_texture(&self, texture: &Texture) -> anyhow::Result<()> {
        if !self.textures.insert(texture.id()) {
            anyhow::bail!("Texture {} {} initialised twice", texture.name, texture.id());
        }
        if let Some(bitmap) = texture.source() {
            self.uploaded_bytes
                .fetch_add(bitmap.pixels().len(), Ordering::AcqRel);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_scene::{Geometry, GeometryData, ImageBitmap, Material, Mesh, ResourceHub, TextureSlot};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_compile_and_collect() {
        let hub = ResourceHub::new();
        let mut material = Material::new(&hub, "bark");
        let bitmap = ImageBitmap::new(&hub, 1, 1, Arc::from(vec![0u8; 4]));
        material.set_map(TextureSlot::BaseColor, Texture::new(&hub, "albedo", Some(bitmap)));
        let object = Object3D::mesh(
            "trunk",
            Mesh::new(Geometry::new(&hub, GeometryData::default()), material),
        );

        let backend = HeadlessBackend::new();
        backend
            .compile(&object, &Camera::default(), &Scene::default())
            .await
            .unwrap();
        let texture = object
            .as_mesh()
            .unwrap()
            .material
            .map(TextureSlot::BaseColor)
            .unwrap();
        backend.init_texture(texture).unwrap();
        assert!(backend.init_texture(texture).is_err());
        assert_eq!(backend.compiles(), 1);
        assert_eq!(backend.resident_programs(), 1);
        assert_eq!(backend.uploaded_bytes(), 4);

        backend.collect_garbage(&[
            ReleaseEvent {
                kind: ResourceKind::Texture,
                id: texture.id(),
            },
            ReleaseEvent {
                kind: ResourceKind::Material,
                id: object.as_mesh().unwrap().material.id(),
            },
        ]);
        assert_eq!(backend.resident_textures(), 0);
        assert_eq!(backend.resident_programs(), 0);
    }
}
