use crate::geometry::Geometry;
use crate::managed::ManagedResource;
use crate::material::Material;
use crate::transform::Transform;

/// Renderable leaf: exclusively owns its geometry and material
#[derive(Debug)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    /// Copy owning fresh GPU identities for geometry, material and every texture
    pub fn duplicate(&self) -> Self {
        Self {
            geometry: self.geometry.duplicate(),
            material: self.material.duplicate(),
            cast_shadow: self.cast_shadow,
            receive_shadow: self.receive_shadow,
        }
    }
}

#[derive(Debug)]
pub enum ObjectKind {
    Group,
    Mesh(Mesh),
}

/// A node of the scene graph
#[derive(Debug)]
pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub kind: ObjectKind,
    pub children: Vec<SceneNode>,
}

/// Either a plain object subtree or a nested [`ManagedResource`] with its own disposal policy
#[derive(Debug)]
pub enum SceneNode {
    Object(Object3D),
    Managed(ManagedResource),
}

impl From<Object3D> for SceneNode {
    fn from(value: Object3D) -> Self {
        SceneNode::Object(value)
    }
}

impl From<ManagedResource> for SceneNode {
    fn from(value: ManagedResource) -> Self {
        SceneNode::Managed(value)
    }
}

impl Object3D {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: ObjectKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: ObjectKind::Mesh(mesh),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn add(&mut self, child: impl Into<SceneNode>) {
        self.children.push(child.into());
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            ObjectKind::Group => None,
            ObjectKind::Mesh(mesh) => Some(mesh),
        }
    }

    /// Visit every mesh in this subtree, nested managed resources included
    pub fn visit_meshes<'a, F: FnMut(&'a Mesh)>(&'a self, f: &mut F) {
        if let ObjectKind::Mesh(mesh) = &self.kind {
            f(mesh);
        }
        for child in &self.children {
            child.visit_meshes(f);
        }
    }

    pub fn visit_meshes_mut<F: FnMut(&mut Mesh)>(&mut self, f: &mut F) {
        if let ObjectKind::Mesh(mesh) = &mut self.kind {
            f(mesh);
        }
        for child in &mut self.children {
            child.visit_meshes_mut(f);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(&mut |_| count += 1);
        count
    }

    /// Recursively copy the subtree. Every disposable leaf of the copy is a new resource.
    pub fn deep_clone(&self) -> Object3D {
        Object3D {
            name: self.name.clone(),
            transform: self.transform,
            kind: match &self.kind {
                ObjectKind::Group => ObjectKind::Group,
                ObjectKind::Mesh(mesh) => ObjectKind::Mesh(mesh.duplicate()),
            },
            children: self.children.iter().map(SceneNode::deep_clone).collect(),
        }
    }
}

impl SceneNode {
    pub fn visit_meshes<'a, F: FnMut(&'a Mesh)>(&'a self, f: &mut F) {
        match self {
            SceneNode::Object(object) => object.visit_meshes(f),
            SceneNode::Managed(managed) => managed.visit_meshes(f),
        }
    }

    pub fn visit_meshes_mut<F: FnMut(&mut Mesh)>(&mut self, f: &mut F) {
        match self {
            SceneNode::Object(object) => object.visit_meshes_mut(f),
            SceneNode::Managed(managed) => managed.visit_meshes_mut(f),
        }
    }

    pub fn deep_clone(&self) -> SceneNode {
        match self {
            SceneNode::Object(object) => SceneNode::Object(object.deep_clone()),
            SceneNode::Managed(managed) => SceneNode::Managed(managed.deep_clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryData;
    use crate::material::TextureSlot;
    use crate::resource::ResourceHub;
    use crate::texture::Texture;

    fn textured_mesh(hub: &ResourceHub) -> Mesh {
        let mut material = Material::new(hub, "bark");
        material.set_map(TextureSlot::BaseColor, Texture::new(hub, "bark_albedo", None));
        Mesh::new(Geometry::new(hub, GeometryData::default()), material)
    }

    #[test]
    fn test_visit_meshes_descends_into_children() {
        let hub = ResourceHub::new();
        let mut root = Object3D::group("root");
        let mut branch = Object3D::group("branch");
        branch.add(Object3D::mesh("leaf_a", textured_mesh(&hub)));
        branch.add(Object3D::mesh("leaf_b", textured_mesh(&hub)));
        root.add(branch);
        root.add(Object3D::mesh("trunk", textured_mesh(&hub)));

        assert_eq!(root.mesh_count(), 3);
    }

    #[test]
    fn test_deep_clone_allocates_new_identities() {
        let hub = ResourceHub::new();
        let tree = Object3D::mesh("trunk", textured_mesh(&hub));
        let copy = tree.deep_clone();

        let original = tree.as_mesh().unwrap();
        let cloned = copy.as_mesh().unwrap();
        assert_ne!(original.geometry.id(), cloned.geometry.id());
        assert_ne!(original.material.id(), cloned.material.id());
        assert_ne!(
            original.material.map(TextureSlot::BaseColor).unwrap().id(),
            cloned.material.map(TextureSlot::BaseColor).unwrap().id()
        );
        assert_eq!(copy.name, "trunk");
    }

    #[test]
    fn test_visit_meshes_mut_sets_flags() {
        let hub = ResourceHub::new();
        let mut root = Object3D::group("root");
        root.add(Object3D::mesh("a", textured_mesh(&hub)));
        root.visit_meshes_mut(&mut |mesh| mesh.cast_shadow = true);
        assert!(root.children.iter().all(|child| match child {
            SceneNode::Object(object) => object.as_mesh().unwrap().cast_shadow,
            SceneNode::Managed(_) => false,
        }));
    }
}
