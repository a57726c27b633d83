use crate::resource::{ResourceHandle, ResourceHub, ResourceId, ResourceKind};
use crate::traits::Disposable;
use std::sync::Arc;

/// CPU-side vertex data. Immutable once uploaded, shared between clones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    /// If None, vertices are drawn in order
    pub indices: Option<Vec<u32>>,
}

impl GeometryData {
    /// Size of all vertex and index streams in bytes
    pub fn byte_size(&self) -> usize {
        bytemuck::cast_slice::<[f32; 3], u8>(&self.positions).len()
            + bytemuck::cast_slice::<[f32; 3], u8>(&self.normals).len()
            + bytemuck::cast_slice::<[f32; 2], u8>(&self.uvs).len()
            + self
                .indices
                .as_deref()
                .map_or(0, |indices| bytemuck::cast_slice::<u32, u8>(indices).len())
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Geometry buffers backed by a GPU identity
#[derive(Debug)]
pub struct Geometry {
    handle: ResourceHandle,
    data: Arc<GeometryData>,
}

impl Geometry {
    pub fn new(hub: &ResourceHub, data: GeometryData) -> Self {
        Self {
            handle: hub.allocate(ResourceKind::Geometry),
            data: Arc::new(data),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    pub fn data(&self) -> &GeometryData {
        &self.data
    }

    /// Copy with its own GPU identity, sharing the vertex data
    pub fn duplicate(&self) -> Self {
        Self {
            handle: self.handle.duplicate(),
            data: self.data.clone(),
        }
    }
}

impl Disposable for Geometry {
    fn dispose(self) {
        self.handle.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size() {
        let data = GeometryData {
            positions: vec![[0.0; 3]; 3],
            normals: vec![[0.0; 3]; 3],
            uvs: vec![[0.0; 2]; 3],
            indices: Some(vec![0, 1, 2]),
        };
        assert_eq!(data.byte_size(), 36 + 36 + 24 + 12);
        assert_eq!(data.vertex_count(), 3);
    }

    #[test]
    fn test_duplicate_shares_data() {
        let hub = ResourceHub::new();
        let geometry = Geometry::new(&hub, GeometryData::default());
        let copy = geometry.duplicate();
        assert_ne!(geometry.id(), copy.id());
        assert!(Arc::ptr_eq(&geometry.data, &copy.data));
    }
}
