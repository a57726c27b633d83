use crate::resource::{ResourceHandle, ResourceHub, ResourceId, ResourceKind};
use crate::traits::Disposable;
use derivative::Derivative;
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Wrapping {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Sampler {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_s: Wrapping,
    pub wrap_t: Wrapping,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            min_filter: Filter::LinearMipmapLinear,
            mag_filter: Filter::Linear,
            wrap_s: Wrapping::Repeat,
            wrap_t: Wrapping::Repeat,
        }
    }
}

/// A decoded RGBA8 image kept alive for upload. Must be closed before its texture is released.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ImageBitmap {
    handle: ResourceHandle,
    width: u32,
    height: u32,
    #[derivative(Debug = "ignore")]
    pixels: Arc<[u8]>,
}

impl ImageBitmap {
    pub fn new(hub: &ResourceHub, width: u32, height: u32, pixels: Arc<[u8]>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            handle: hub.allocate(ResourceKind::ImageBitmap),
            width,
            height,
            pixels,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn duplicate(&self) -> Self {
        Self {
            handle: self.handle.duplicate(),
            width: self.width,
            height: self.height,
            pixels: self.pixels.clone(),
        }
    }

    /// Free the decoded backing store
    pub fn close(self) {
        self.handle.release();
    }
}

#[derive(Debug)]
pub struct Texture {
    handle: ResourceHandle,
    pub name: String,
    pub sampler: Sampler,
    pub srgb: bool,
    source: Option<ImageBitmap>,
}

impl Texture {
    pub fn new(hub: &ResourceHub, name: impl Into<String>, source: Option<ImageBitmap>) -> Self {
        Self {
            handle: hub.allocate(ResourceKind::Texture),
            name: name.into(),
            sampler: Sampler::default(),
            srgb: false,
            source,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    pub fn source(&self) -> Option<&ImageBitmap> {
        self.source.as_ref()
    }

    pub fn duplicate(&self) -> Self {
        Self {
            handle: self.handle.duplicate(),
            name: self.name.clone(),
            sampler: self.sampler,
            srgb: self.srgb,
            source: self.source.as_ref().map(ImageBitmap::duplicate),
        }
    }
}

impl Disposable for Texture {
    fn dispose(self) {
        if let Some(bitmap) = self.source {
            bitmap.close();
        }
        self.handle.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ReleaseEvent;

    fn bitmap(hub: &ResourceHub) -> ImageBitmap {
        ImageBitmap::new(hub, 2, 2, Arc::from(vec![255u8; 16]))
    }

    #[test]
    fn test_bitmap_closed_before_texture() {
        let hub = ResourceHub::new();
        let texture = Texture::new(&hub, "albedo", Some(bitmap(&hub)));
        let texture_id = texture.id();
        let bitmap_id = texture.source().unwrap().id();
        texture.dispose();

        assert_eq!(
            hub.drain_released(),
            vec![
                ReleaseEvent {
                    kind: ResourceKind::ImageBitmap,
                    id: bitmap_id
                },
                ReleaseEvent {
                    kind: ResourceKind::Texture,
                    id: texture_id
                },
            ]
        );
    }

    #[test]
    fn test_texture_without_source() {
        let hub = ResourceHub::new();
        let texture = Texture::new(&hub, "empty", None);
        texture.dispose();
        let released = hub.drain_released();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].kind, ResourceKind::Texture);
    }

    #[test]
    fn test_duplicate_gets_new_bitmap_identity() {
        let hub = ResourceHub::new();
        let texture = Texture::new(&hub, "albedo", Some(bitmap(&hub)));
        let copy = texture.duplicate();
        assert_ne!(texture.id(), copy.id());
        assert_ne!(
            texture.source().unwrap().id(),
            copy.source().unwrap().id()
        );
        assert_eq!(copy.source().unwrap().pixels(), texture.source().unwrap().pixels());
    }
}
