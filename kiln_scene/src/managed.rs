use crate::error::SceneError;
use crate::node::{Mesh, ObjectKind, Object3D, SceneNode};
use crate::traits::Disposable;
use std::ops::AddAssign;

/// Which leaf resources a [`ManagedResource`] is responsible for releasing
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DisposalPolicy {
    /// Master copy kept by a cache. Its raw children seed future clones and are never released
    /// by it; only nested managed resources are disposed (by their own policy).
    Canonical,
    /// Caller-facing copy. Owns and releases every geometry, material and texture below it.
    Cloned,
}

/// Number of leaf resources released by a disposal
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisposalReport {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
    pub bitmaps: usize,
}

impl DisposalReport {
    pub fn total(&self) -> usize {
        self.geometries + self.materials + self.textures + self.bitmaps
    }
}

impl AddAssign for DisposalReport {
    fn add_assign(&mut self, rhs: Self) {
        self.geometries += rhs.geometries;
        self.materials += rhs.materials;
        self.textures += rhs.textures;
        self.bitmaps += rhs.bitmaps;
    }
}

/// Owns a subtree of scene nodes and decides, at dispose time, which of its GPU resources to
/// release.
///
/// There is no automatic teardown: every instance must be disposed exactly once. Disposal takes
/// the children out of the resource, a second [`ManagedResource::dispose`] returns
/// [`SceneError::AlreadyDisposed`].
#[derive(Debug)]
pub struct ManagedResource {
    policy: DisposalPolicy,
    children: Vec<SceneNode>,
    disposed: bool,
}

impl ManagedResource {
    pub fn new(policy: DisposalPolicy) -> Self {
        Self {
            policy,
            children: Vec::new(),
            disposed: false,
        }
    }

    pub fn canonical() -> Self {
        Self::new(DisposalPolicy::Canonical)
    }

    pub fn cloned() -> Self {
        Self::new(DisposalPolicy::Cloned)
    }

    pub fn policy(&self) -> DisposalPolicy {
        self.policy
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Attach a child. Nothing about disposal is decided here.
    pub fn add(&mut self, node: impl Into<SceneNode>) {
        debug_assert!(!self.disposed, "Adding to a disposed managed resource");
        self.children.push(node.into());
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [SceneNode] {
        &mut self.children
    }

    pub fn visit_meshes<'a, F: FnMut(&'a Mesh)>(&'a self, f: &mut F) {
        for child in &self.children {
            child.visit_meshes(f);
        }
    }

    pub fn visit_meshes_mut<F: FnMut(&mut Mesh)>(&mut self, f: &mut F) {
        for child in &mut self.children {
            child.visit_meshes_mut(f);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(&mut |_| count += 1);
        count
    }

    /// Copy the whole subtree into a new [`DisposalPolicy::Cloned`] resource that owns
    /// independent copies of every leaf resource
    pub fn deep_clone(&self) -> ManagedResource {
        ManagedResource {
            policy: DisposalPolicy::Cloned,
            children: self.children.iter().map(SceneNode::deep_clone).collect(),
            disposed: false,
        }
    }

    /// Release the resources this instance is responsible for.
    ///
    /// Every child is visited even if a nested resource fails; the first such error is returned
    /// once the walk is complete.
    pub fn dispose(&mut self) -> Result<DisposalReport, SceneError> {
        self.dispose_as(self.policy)
    }

    /// Release every leaf this instance holds, whatever its policy.
    ///
    /// Used by the owner of a canonical copy when it retires it. Copies made through
    /// [`ManagedResource::deep_clone`] own fresh identities and stay valid.
    pub fn release_all(&mut self) -> Result<DisposalReport, SceneError> {
        self.dispose_as(DisposalPolicy::Cloned)
    }

    fn dispose_as(&mut self, policy: DisposalPolicy) -> Result<DisposalReport, SceneError> {
        if self.disposed {
            return Err(SceneError::AlreadyDisposed);
        }
        self.disposed = true;

        let mut walk = DisposalWalk::default();
        for child in std::mem::take(&mut self.children) {
            walk.node(child, policy);
        }
        tracing::trace!("Disposed {:?} managed resource: {:?}", policy, walk.report);
        walk.finish()
    }
}

impl Drop for ManagedResource {
    fn drop(&mut self) {
        if !self.disposed && self.policy == DisposalPolicy::Cloned && !self.children.is_empty() {
            tracing::warn!(
                "Cloned managed resource dropped without dispose, GPU resources of {} meshes leak",
                self.mesh_count()
            );
        }
    }
}

/// Visits a subtree being disposed, keeping the first nested error
#[derive(Debug, Default)]
struct DisposalWalk {
    report: DisposalReport,
    error: Option<SceneError>,
}

impl DisposalWalk {
    fn node(&mut self, node: SceneNode, policy: DisposalPolicy) {
        match node {
            SceneNode::Managed(mut nested) => match nested.dispose() {
                Ok(report) => self.report += report,
                Err(e) => {
                    tracing::error!("Failed to dispose nested managed resource: {}", e);
                    self.error.get_or_insert(e);
                }
            },
            SceneNode::Object(object) => self.object(object, policy),
        }
    }

    /// Canonical objects keep their leaves, cloned ones release textures (bitmap first), then
    /// geometry, then material
    fn object(&mut self, object: Object3D, policy: DisposalPolicy) {
        if let (DisposalPolicy::Cloned, ObjectKind::Mesh(mesh)) = (policy, object.kind) {
            self.mesh(mesh);
        }
        for child in object.children {
            self.node(child, policy);
        }
    }

    fn mesh(&mut self, mut mesh: Mesh) {
        for (_, texture) in mesh.material.take_maps() {
            if texture.source().is_some() {
                self.report.bitmaps += 1;
            }
            texture.dispose();
            self.report.textures += 1;
        }
        mesh.geometry.dispose();
        self.report.geometries += 1;
        mesh.material.dispose();
        self.report.materials += 1;
    }

    fn finish(self) -> Result<DisposalReport, SceneError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryData};
    use crate::material::{Material, TextureSlot};
    use crate::resource::{ResourceHub, ResourceId, ResourceKind};
    use crate::texture::{ImageBitmap, Texture};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn textured_mesh(hub: &ResourceHub) -> Mesh {
        let mut material = Material::new(hub, "bark");
        let bitmap = ImageBitmap::new(hub, 1, 1, Arc::from(vec![0u8; 4]));
        material.set_map(
            TextureSlot::BaseColor,
            Texture::new(hub, "bark_albedo", Some(bitmap)),
        );
        material.set_map(TextureSlot::Normal, Texture::new(hub, "bark_normal", None));
        Mesh::new(Geometry::new(hub, GeometryData::default()), material)
    }

    fn tree(hub: &ResourceHub) -> Object3D {
        let mut root = Object3D::group("tree");
        root.add(Object3D::mesh("trunk", textured_mesh(hub)));
        let mut crown = Object3D::group("crown");
        crown.add(Object3D::mesh("leaves", textured_mesh(hub)));
        root.add(crown);
        root
    }

    fn release_counts(hub: &ResourceHub) -> HashMap<ResourceId, usize> {
        let mut counts = HashMap::new();
        for event in hub.drain_released() {
            *counts.entry(event.id).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_cloned_releases_every_leaf_once() {
        let hub = ResourceHub::new();
        let mut managed = ManagedResource::cloned();
        managed.add(tree(&hub));

        let report = managed.dispose().unwrap();
        assert_eq!(
            report,
            DisposalReport {
                geometries: 2,
                materials: 2,
                textures: 4,
                bitmaps: 2,
            }
        );

        let counts = release_counts(&hub);
        // every allocated identity released exactly once
        assert_eq!(counts.len() as u64, hub.allocated());
        assert!(counts.values().all(|count| *count == 1));
    }

    #[test]
    fn test_canonical_releases_nothing_of_raw_children() {
        let hub = ResourceHub::new();
        let mut canonical = ManagedResource::canonical();
        canonical.add(tree(&hub));

        let report = canonical.dispose().unwrap();
        assert_eq!(report.total(), 0);
        assert!(hub.drain_released().is_empty());
    }

    #[test]
    fn test_canonical_delegates_to_nested() {
        let hub = ResourceHub::new();
        let mut nested = ManagedResource::cloned();
        nested.add(Object3D::mesh("rock", textured_mesh(&hub)));

        let mut canonical = ManagedResource::canonical();
        canonical.add(tree(&hub));
        canonical.add(nested);

        let report = canonical.dispose().unwrap();
        assert_eq!(report.geometries, 1);
        assert_eq!(report.materials, 1);
        assert_eq!(report.textures, 2);
    }

    #[test]
    fn test_nested_managed_inside_object_keeps_its_own_policy() {
        let hub = ResourceHub::new();
        let mut inner = ManagedResource::canonical();
        inner.add(Object3D::mesh("shared", textured_mesh(&hub)));
        let mut group = Object3D::group("group");
        group.add(inner);

        let mut owner = ManagedResource::cloned();
        owner.add(group);
        let report = owner.dispose().unwrap();
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_double_dispose_is_reported() {
        let hub = ResourceHub::new();
        let mut managed = ManagedResource::cloned();
        managed.add(tree(&hub));
        managed.dispose().unwrap();
        let released = hub.drain_released().len();

        assert_eq!(managed.dispose(), Err(SceneError::AlreadyDisposed));
        assert!(managed.is_disposed());
        assert!(managed.children().is_empty());
        assert!(hub.drain_released().is_empty());
        assert!(released > 0);
    }

    #[test]
    fn test_clone_outlives_canonical() {
        let hub = ResourceHub::new();
        let mut canonical = ManagedResource::canonical();
        canonical.add(tree(&hub));
        let mut canonical_ids = Vec::new();
        canonical.visit_meshes(&mut |mesh: &Mesh| {
            canonical_ids.push(mesh.geometry.id());
            canonical_ids.push(mesh.material.id());
        });

        let mut clone = canonical.deep_clone();
        assert_eq!(clone.policy(), DisposalPolicy::Cloned);

        canonical.dispose().unwrap();
        assert!(hub.drain_released().is_empty());
        assert_eq!(clone.mesh_count(), 2);

        let report = clone.dispose().unwrap();
        assert_eq!(report.geometries, 2);
        assert!(
            hub.drain_released()
                .iter()
                .all(|event| !canonical_ids.contains(&event.id))
        );
    }

    #[test]
    fn test_texture_released_after_its_bitmap() {
        let hub = ResourceHub::new();
        let mut managed = ManagedResource::cloned();
        managed.add(Object3D::mesh("trunk", textured_mesh(&hub)));
        managed.dispose().unwrap();

        let kinds: Vec<ResourceKind> = hub.drain_released().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::ImageBitmap,
                ResourceKind::Texture,
                ResourceKind::Texture,
                ResourceKind::Geometry,
                ResourceKind::Material,
            ]
        );
    }

    #[test]
    fn test_failed_nested_dispose_still_releases_siblings() {
        let hub = ResourceHub::new();
        let mut spent = ManagedResource::cloned();
        spent.dispose().unwrap();

        let mut owner = ManagedResource::cloned();
        owner.add(spent);
        owner.add(tree(&hub));

        assert_eq!(owner.dispose(), Err(SceneError::AlreadyDisposed));
        let counts = release_counts(&hub);
        assert_eq!(counts.len() as u64, hub.allocated());
        assert!(counts.values().all(|count| *count == 1));
    }

    #[test]
    fn test_nested_error_inside_object_keeps_walking() {
        let hub = ResourceHub::new();
        let mut spent = ManagedResource::canonical();
        spent.dispose().unwrap();
        let mut group = Object3D::group("group");
        group.add(spent);
        group.add(Object3D::mesh("trunk", textured_mesh(&hub)));

        let mut owner = ManagedResource::cloned();
        owner.add(group);
        assert!(owner.dispose().is_err());
        assert_eq!(hub.drain_released().len() as u64, hub.allocated());
    }

    #[test]
    fn test_release_all_frees_canonical_leaves() {
        let hub = ResourceHub::new();
        let mut canonical = ManagedResource::canonical();
        canonical.add(tree(&hub));
        let mut clone = canonical.deep_clone();
        let allocated = hub.allocated();

        let report = canonical.release_all().unwrap();
        assert_eq!(report.geometries, 2);
        assert_eq!(report.bitmaps, 2);
        assert_eq!(hub.drain_released().len() as u64, allocated / 2);
        assert_eq!(canonical.release_all(), Err(SceneError::AlreadyDisposed));

        // the copy owns the other half and is unaffected
        assert_eq!(clone.dispose().unwrap(), report);
        assert_eq!(hub.drain_released().len() as u64, allocated / 2);
    }
}
