use crate::resource::{ResourceHandle, ResourceHub, ResourceId, ResourceKind};
use crate::texture::Texture;
use crate::traits::Disposable;
use std::collections::BTreeMap;

/// Material inputs that may be driven by a texture
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureSlot {
    BaseColor,
    Normal,
    MetallicRoughness,
    Occlusion,
    Emissive,
}

/// Shading parameters plus the compiled program identity.
///
/// Textures are held by the material but released separately: disposing a [`Material`] only
/// frees its program. Use [`Material::take_maps`] to release the textures first.
#[derive(Debug)]
pub struct Material {
    handle: ResourceHandle,
    pub name: String,
    pub base_color: glam::Vec4,
    pub metallic: f32,
    pub roughness: f32,
    maps: BTreeMap<TextureSlot, Texture>,
}

impl Material {
    pub fn new(hub: &ResourceHub, name: impl Into<String>) -> Self {
        Self {
            handle: hub.allocate(ResourceKind::Material),
            name: name.into(),
            base_color: glam::Vec4::ONE,
            metallic: 1.0,
            roughness: 1.0,
            maps: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    /// Bind a texture to `slot`, returning whichever texture was bound before
    pub fn set_map(&mut self, slot: TextureSlot, texture: Texture) -> Option<Texture> {
        self.maps.insert(slot, texture)
    }

    pub fn map(&self, slot: TextureSlot) -> Option<&Texture> {
        self.maps.get(&slot)
    }

    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.maps.values()
    }

    pub fn take_maps(&mut self) -> BTreeMap<TextureSlot, Texture> {
        std::mem::take(&mut self.maps)
    }

    pub fn duplicate(&self) -> Self {
        Self {
            handle: self.handle.duplicate(),
            name: self.name.clone(),
            base_color: self.base_color,
            metallic: self.metallic,
            roughness: self.roughness,
            maps: self
                .maps
                .iter()
                .map(|(slot, texture)| (*slot, texture.duplicate()))
                .collect(),
        }
    }
}

impl Disposable for Material {
    fn dispose(self) {
        if !self.maps.is_empty() {
            tracing::warn!(
                "Material {} {} disposed with {} textures still bound, they will leak",
                self.name,
                self.handle.id(),
                self.maps.len()
            );
        }
        self.handle.release();
    }
}
