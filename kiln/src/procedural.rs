use kiln_scene::{
    Geometry, GeometryData, ImageBitmap, Material, Mesh, Object3D, ResourceHub, Texture,
    TextureSlot, Transform,
};
use std::sync::Arc;

/// Axis aligned box centred on the origin
fn cuboid(size: glam::Vec3) -> GeometryData {
    let h = size * 0.5;
    let positions = (0..8)
        .map(|corner| {
            [
                if corner & 1 == 0 { -h.x } else { h.x },
                if corner & 2 == 0 { -h.y } else { h.y },
                if corner & 4 == 0 { -h.z } else { h.z },
            ]
        })
        .collect();
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 1, 2, 3,
        4, 5, 6, 5, 7, 6,
        0, 1, 4, 1, 5, 4,
        2, 6, 3, 3, 6, 7,
        0, 4, 2, 2, 4, 6,
        1, 3, 5, 3, 7, 5,
    ];
    GeometryData {
        positions,
        normals: Vec::new(),
        uvs: Vec::new(),
        indices: Some(indices),
    }
}

/// Two-colour checkerboard, `size` x `size` texels
fn checker(hub: &ResourceHub, size: u32, a: [u8; 4], b: [u8; 4]) -> ImageBitmap {
    let pixels: Vec<u8> = (0..size * size)
        .flat_map(|i| if (i % size + i / size) % 2 == 0 { a } else { b })
        .collect();
    ImageBitmap::new(hub, size, size, Arc::from(pixels))
}

fn textured(hub: &ResourceHub, name: &str, geometry: GeometryData, colors: [[u8; 4]; 2]) -> Mesh {
    let mut material = Material::new(hub, name);
    let mut albedo = Texture::new(
        hub,
        format!("{name}_albedo"),
        Some(checker(hub, 4, colors[0], colors[1])),
    );
    albedo.srgb = true;
    material.set_map(TextureSlot::BaseColor, albedo);
    Mesh::new(Geometry::new(hub, geometry), material)
}

/// A trunk with `branches` leaf blocks spiralling around its top
pub fn tree(hub: &ResourceHub, branches: usize) -> Object3D {
    let mut root = Object3D::group("tree");
    root.add(
        Object3D::mesh(
            "trunk",
            textured(
                hub,
                "bark",
                cuboid(glam::vec3(0.3, 2.0, 0.3)),
                [[92, 64, 51, 255], [70, 48, 38, 255]],
            ),
        )
        .with_transform(Transform::from_translation(glam::Vec3::Y)),
    );

    let mut crown =
        Object3D::group("crown").with_transform(Transform::from_translation(glam::vec3(0.0, 2.0, 0.0)));
    for branch in 0..branches {
        let angle = branch as f32 / branches as f32 * std::f32::consts::TAU;
        let offset = glam::vec3(angle.cos(), branch as f32 * 0.1, angle.sin()) * 0.6;
        crown.add(
            Object3D::mesh(
                format!("leaves_{branch}"),
                textured(
                    hub,
                    "leaf",
                    cuboid(glam::Vec3::splat(0.5)),
                    [[46, 139, 87, 255], [34, 100, 60, 255]],
                ),
            )
            .with_transform(Transform::from_translation(offset)),
        );
    }
    root.add(crown);
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_layout() {
        let hub = ResourceHub::new();
        let tree = tree(&hub, 5);
        assert_eq!(tree.mesh_count(), 6);
        // geometry, material, texture and bitmap per mesh
        assert_eq!(hub.allocated(), 24);
    }

    #[test]
    fn test_cuboid() {
        let data = cuboid(glam::Vec3::ONE);
        assert_eq!(data.vertex_count(), 8);
        assert_eq!(data.indices.as_ref().map(Vec::len), Some(36));
        assert!(data.positions.iter().all(|p| p.iter().all(|c| c.abs() == 0.5)));
    }
}
