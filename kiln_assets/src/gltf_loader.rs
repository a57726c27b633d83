use crate::key::{AssetKey, AssetLocation};
use crate::loader::AssetLoader;
use anyhow::{Context, anyhow};
use kiln_scene::{
    Filter, Geometry, GeometryData, ImageBitmap, Material, Mesh, Object3D, ResourceHub, Sampler,
    Texture, TextureSlot, Transform, Wrapping,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Loads glTF / GLB files from disk or over http(s)
///
/// Files on disk resolve their buffer and image URIs against their own directory.
/// Assets fetched over http(s) must be self-contained: a GLB or a `.gltf` whose
/// buffers and images are embedded as data URIs. Relative URIs are rejected.
#[derive(Debug, Clone)]
pub struct GltfLoader {
    hub: ResourceHub,
    root: Option<PathBuf>,
    client: reqwest::Client,
}

impl GltfLoader {
    pub fn new(hub: ResourceHub) -> Self {
        Self {
            hub,
            root: None,
            client: reqwest::Client::new(),
        }
    }

    /// Resolve relative file keys against `root` instead of the working directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn hub(&self) -> &ResourceHub {
        &self.hub
    }

    async fn import(&self, key: &AssetKey) -> anyhow::Result<Imported> {
        match key.location() {
            AssetLocation::Url(url) => {
                let bytes = self
                    .client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                tracing::debug!("Fetched {} bytes from {}", bytes.len(), url);
                let source = url.clone();
                let imported = tokio::task::spawn_blocking(move || -> anyhow::Result<Imported> {
                    let document = gltf::Gltf::from_slice(&bytes)?;
                    if let Some(uri) = external_reference(&document) {
                        return Err(anyhow!(
                            "{uri} is referenced relative to {source}, only self-contained assets load over http(s)"
                        ));
                    }
                    Ok(gltf::import_slice(&bytes)?)
                })
                .await?
                .with_context(|| format!("Failed to parse {url}"))?;
                Ok(imported)
            }
            AssetLocation::FilePath(path) => {
                let path = match &self.root {
                    Some(root) => root.join(path),
                    None => path,
                };
                let display = path.display().to_string();
                let imported = tokio::task::spawn_blocking(move || gltf::import(path))
                    .await?
                    .with_context(|| format!("Failed to import {display}"))?;
                Ok(imported)
            }
            AssetLocation::Procedural(name) => Err(anyhow!(
                "Procedural asset {name} has to be registered before it is requested"
            )),
        }
    }
}

/// First buffer or image URI that is neither embedded in the file nor a data URI
fn external_reference(document: &gltf::Gltf) -> Option<String> {
    let buffers = document.buffers().filter_map(|buffer| match buffer.source() {
        gltf::buffer::Source::Uri(uri) => Some(uri),
        gltf::buffer::Source::Bin => None,
    });
    let images = document.images().filter_map(|image| match image.source() {
        gltf::image::Source::Uri { uri, .. } => Some(uri),
        gltf::image::Source::View { .. } => None,
    });
    buffers
        .chain(images)
        .find(|uri| !uri.starts_with("data:"))
        .map(str::to_owned)
}

type Imported = (
    gltf::Document,
    Vec<gltf::buffer::Data>,
    Vec<gltf::image::Data>,
);

impl AssetLoader for GltfLoader {
    async fn load(&self, key: &AssetKey) -> anyhow::Result<Object3D> {
        let (document, buffers, images) = self.import(key).await?;
        let images = images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                to_rgba8(image).with_context(|| format!("Image {index} of {key}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let builder = SceneBuilder {
            hub: &self.hub,
            buffers: &buffers,
            images: &images,
        };
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| anyhow!("{key} contains no scene"))?;
        let mut root = Object3D::group(scene.name().unwrap_or(key.as_str()));
        for node in scene.nodes() {
            root.add(builder.node(&node)?);
        }
        tracing::info!(
            "Loaded {}: {} meshes, {} images",
            key,
            root.mesh_count(),
            images.len()
        );
        Ok(root)
    }
}

/// Decoded image shared by every texture that samples it
struct Rgba8Image {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

fn to_rgba8(image: &gltf::image::Data) -> anyhow::Result<Rgba8Image> {
    use gltf::image::Format;

    let (width, height) = (image.width, image.height);
    let pixels = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image::RgbImage::from_raw(width, height, image.pixels.clone())
            .map(|rgb| image::DynamicImage::ImageRgb8(rgb).to_rgba8().into_raw())
            .ok_or_else(|| anyhow!("RGB pixel data does not match {width}x{height}"))?,
        Format::R8 => image::GrayImage::from_raw(width, height, image.pixels.clone())
            .map(|gray| image::DynamicImage::ImageLuma8(gray).to_rgba8().into_raw())
            .ok_or_else(|| anyhow!("Grey pixel data does not match {width}x{height}"))?,
        other => anyhow::bail!("Unsupported image format {other:?}"),
    };
    Ok(Rgba8Image {
        width,
        height,
        pixels: Arc::from(pixels),
    })
}

struct SceneBuilder<'a> {
    hub: &'a ResourceHub,
    buffers: &'a [gltf::buffer::Data],
    images: &'a [Rgba8Image],
}

impl SceneBuilder<'_> {
    fn node(&self, node: &gltf::Node) -> anyhow::Result<Object3D> {
        let name = node
            .name()
            .map_or_else(|| format!("node_{}", node.index()), String::from);
        let transform =
            Transform::from(glam::Mat4::from_cols_array_2d(&node.transform().matrix()));
        let mut object = Object3D::group(name).with_transform(transform);

        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                let name = format!(
                    "{}_{}",
                    mesh.name().unwrap_or("mesh"),
                    primitive.index()
                );
                object.add(Object3D::mesh(name, self.primitive(&primitive)?));
            }
        }
        for child in node.children() {
            object.add(self.node(&child)?);
        }
        Ok(object)
    }

    fn primitive(&self, primitive: &gltf::Primitive) -> anyhow::Result<Mesh> {
        let reader = primitive.reader(|buffer| {
            self.buffers
                .get(buffer.index())
                .map(|data| data.0.as_slice())
        });
        let positions = reader
            .read_positions()
            .ok_or_else(|| anyhow!("Primitive {} has no positions", primitive.index()))?
            .collect();
        let data = GeometryData {
            positions,
            normals: reader
                .read_normals()
                .map(|normals| normals.collect())
                .unwrap_or_default(),
            uvs: reader
                .read_tex_coords(0)
                .map(|uvs| uvs.into_f32().collect())
                .unwrap_or_default(),
            indices: reader
                .read_indices()
                .map(|indices| indices.into_u32().collect()),
        };
        let geometry = Geometry::new(self.hub, data);
        Ok(Mesh::new(geometry, self.material(&primitive.material())?))
    }

    fn material(&self, source: &gltf::Material) -> anyhow::Result<Material> {
        let pbr = source.pbr_metallic_roughness();
        let mut material = Material::new(self.hub, source.name().unwrap_or("material"));
        material.base_color = glam::Vec4::from_array(pbr.base_color_factor());
        material.metallic = pbr.metallic_factor();
        material.roughness = pbr.roughness_factor();

        let maps = [
            (
                TextureSlot::BaseColor,
                pbr.base_color_texture().map(|info| info.texture()),
            ),
            (
                TextureSlot::MetallicRoughness,
                pbr.metallic_roughness_texture().map(|info| info.texture()),
            ),
            (
                TextureSlot::Normal,
                source.normal_texture().map(|info| info.texture()),
            ),
            (
                TextureSlot::Occlusion,
                source.occlusion_texture().map(|info| info.texture()),
            ),
            (
                TextureSlot::Emissive,
                source.emissive_texture().map(|info| info.texture()),
            ),
        ];
        for (slot, texture) in maps {
            if let Some(texture) = texture {
                material.set_map(slot, self.texture(slot, &texture)?);
            }
        }
        Ok(material)
    }

    fn texture(&self, slot: TextureSlot, source: &gltf::Texture) -> anyhow::Result<Texture> {
        let image_index = source.source().index();
        let image = self
            .images
            .get(image_index)
            .ok_or_else(|| anyhow!("Texture {} samples missing image {image_index}", source.index()))?;
        let bitmap = ImageBitmap::new(self.hub, image.width, image.height, image.pixels.clone());
        let name = source
            .name()
            .map_or_else(|| format!("texture_{}", source.index()), String::from);

        let mut texture = Texture::new(self.hub, name, Some(bitmap));
        texture.sampler = sampler(&source.sampler());
        // colour data is authored in sRGB, everything else is linear
        texture.srgb = matches!(slot, TextureSlot::BaseColor | TextureSlot::Emissive);
        Ok(texture)
    }
}

fn sampler(source: &gltf::texture::Sampler) -> Sampler {
    use gltf::texture::{MagFilter, MinFilter, WrappingMode};

    let wrapping = |mode: WrappingMode| match mode {
        WrappingMode::ClampToEdge => Wrapping::ClampToEdge,
        WrappingMode::MirroredRepeat => Wrapping::MirroredRepeat,
        WrappingMode::Repeat => Wrapping::Repeat,
    };
    let defaults = Sampler::default();
    Sampler {
        min_filter: source.min_filter().map_or(defaults.min_filter, |filter| match filter {
            MinFilter::Nearest
            | MinFilter::NearestMipmapNearest
            | MinFilter::NearestMipmapLinear => Filter::Nearest,
            MinFilter::Linear => Filter::Linear,
            MinFilter::LinearMipmapNearest | MinFilter::LinearMipmapLinear => {
                Filter::LinearMipmapLinear
            }
        }),
        mag_filter: source.mag_filter().map_or(defaults.mag_filter, |filter| match filter {
            MagFilter::Nearest => Filter::Nearest,
            MagFilter::Linear => Filter::Linear,
        }),
        wrap_s: wrapping(source.wrap_s()),
        wrap_t: wrapping(source.wrap_t()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_scene::{ManagedResource, ResourceKind, SceneNode};

    /// One textureless triangle under a translated parent node
    const TRIANGLE: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "name": "world", "nodes": [0] } ],
        "nodes": [
            { "name": "parent", "translation": [1.0, 2.0, 3.0], "children": [1] },
            { "name": "child", "mesh": 0 }
        ],
        "meshes": [ { "name": "triangle", "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 } ] } ],
        "materials": [ { "name": "red", "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0], "metallicFactor": 0.0 } } ],
        "buffers": [ { "uri": "triangle.bin", "byteLength": 42 } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    fn write_triangle(dir: &std::path::Path) {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let mut bin = Vec::new();
        for position in positions {
            for component in position {
                bin.extend_from_slice(&component.to_le_bytes());
            }
        }
        for index in [0u16, 1, 2] {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("triangle.bin"), bin).unwrap();
        std::fs::write(dir.join("triangle.gltf"), TRIANGLE).unwrap();
    }

    #[tokio::test]
    async fn test_load_gltf_file() {
        let dir = std::env::temp_dir().join(format!("kiln_gltf_{}", std::process::id()));
        write_triangle(&dir);

        let hub = ResourceHub::new();
        let loader = GltfLoader::new(hub.clone()).with_root(&dir);
        let root = loader.load(&AssetKey::from("triangle.gltf")).await.unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(root.name, "world");
        assert_eq!(root.mesh_count(), 1);
        let SceneNode::Object(parent) = &root.children[0] else {
            panic!("Expected an object node");
        };
        assert_eq!(parent.name, "parent");
        assert_eq!(parent.transform.translation, glam::Vec3::new(1.0, 2.0, 3.0));

        let mut meshes = Vec::new();
        root.visit_meshes(&mut |mesh| meshes.push(mesh));
        let mesh = meshes[0];
        assert_eq!(mesh.geometry.data().vertex_count(), 3);
        assert_eq!(mesh.geometry.data().indices, Some(vec![0, 1, 2]));
        assert!(mesh.geometry.data().normals.is_empty());
        assert_eq!(mesh.material.name, "red");
        assert_eq!(mesh.material.base_color, glam::Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(mesh.material.metallic, 0.0);
        assert_eq!(mesh.material.textures().count(), 0);

        let mut managed = ManagedResource::cloned();
        managed.add(root);
        managed.dispose().unwrap();
        let kinds: Vec<ResourceKind> = hub.drain_released().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ResourceKind::Geometry, ResourceKind::Material]);
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let loader = GltfLoader::new(ResourceHub::new());
        let error = loader
            .load(&AssetKey::from("does/not/exist.glb"))
            .await
            .unwrap_err();
        assert!(format!("{error:#}").contains("does/not/exist.glb"));
    }

    #[test]
    fn test_relative_uris_are_external() {
        let document = gltf::Gltf::from_slice(TRIANGLE.as_bytes()).unwrap();
        assert_eq!(external_reference(&document).as_deref(), Some("triangle.bin"));

        let embedded = TRIANGLE.replace("triangle.bin", "data:application/octet-stream;base64,AAAA");
        let document = gltf::Gltf::from_slice(embedded.as_bytes()).unwrap();
        assert_eq!(external_reference(&document), None);
    }

    #[tokio::test]
    async fn test_procedural_key_is_rejected() {
        let loader = GltfLoader::new(ResourceHub::new());
        assert!(loader.load(&AssetKey::from("proc:tree")).await.is_err());
    }

    #[test]
    fn test_rgb_is_expanded_to_rgba() {
        let image = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let rgba = to_rgba8(&image).unwrap();
        assert_eq!(&rgba.pixels[..], &[10, 20, 30, 255, 40, 50, 60, 255]);

        let image = gltf::image::Data {
            pixels: vec![0; 4],
            format: gltf::image::Format::R16,
            width: 2,
            height: 1,
        };
        assert!(to_rgba8(&image).is_err());
    }
}
