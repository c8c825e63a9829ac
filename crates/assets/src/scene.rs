use crate::mesh::{MaterialData, MeshData, TextureImage};
use crate::{AssetError, AssetId};
use glam::Mat4;
use image::{DynamicImage, ImageBuffer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A named node of the scene asset.
///
/// `geometry` is in the node's local space: composers place it themselves,
/// `world` is kept for inspection only.
#[derive(Debug, Clone)]
pub struct AssetNode {
    pub name: String,
    pub geometry: Option<Arc<MeshData>>,
    pub material: Option<Arc<MaterialData>>,
    pub world: Mat4,
}

/// Immutable scene loaded from a binary glTF file.
#[derive(Debug)]
pub struct SceneAsset {
    id: AssetId,
    source: Option<PathBuf>,
    nodes: BTreeMap<String, AssetNode>,
    materials: BTreeMap<String, Arc<MaterialData>>,
}

impl SceneAsset {
    /// Read and parse a `.glb` (or self-contained `.gltf`) file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut asset = Self::from_glb_bytes(&bytes)?;
        asset.source = Some(path.to_path_buf());
        tracing::info!(
            "loaded scene asset {} ({} nodes, {} materials) from {}",
            asset.id,
            asset.nodes.len(),
            asset.materials.len(),
            path.display()
        );
        Ok(asset)
    }

    /// Parse GLB bytes. Files that require an extension this loader cannot
    /// decode, such as Draco mesh compression, fail with
    /// [`AssetError::UnsupportedExtension`].
    pub fn from_glb_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        check_required_extensions(bytes)?;
        let (document, buffers, images) = gltf::import_slice(bytes)?;

        let mut textures: BTreeMap<usize, Arc<TextureImage>> = BTreeMap::new();
        for (index, image) in images.into_iter().enumerate() {
            match decode_image(image) {
                Some(texture) => {
                    textures.insert(index, Arc::new(texture));
                }
                None => tracing::warn!("image {index} has a pixel buffer of the wrong size, skipped"),
            }
        }

        let mut by_index: Vec<Arc<MaterialData>> = Vec::new();
        let mut materials = BTreeMap::new();
        for material in document.materials() {
            let index = material.index().unwrap_or(by_index.len());
            let name = material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material_{index}"));
            let pbr = material.pbr_metallic_roughness();
            let data = Arc::new(MaterialData {
                name: name.clone(),
                base_color: pbr.base_color_factor(),
                base_color_texture: pbr
                    .base_color_texture()
                    .and_then(|info| textures.get(&info.texture().source().index()).cloned()),
                metallic: pbr.metallic_factor(),
                roughness: pbr.roughness_factor(),
                emissive: material.emissive_factor(),
            });
            by_index.push(data.clone());
            materials.entry(name).or_insert(data);
        }

        let mut meshes: Vec<Option<(Arc<MeshData>, Option<Arc<MaterialData>>)>> = Vec::new();
        for mesh in document.meshes() {
            meshes.push(read_mesh(&mesh, &buffers, &by_index));
        }

        let mut world: BTreeMap<usize, Mat4> = BTreeMap::new();
        for scene in document.scenes() {
            for node in scene.nodes() {
                accumulate_world(&node, Mat4::IDENTITY, &mut world);
            }
        }

        let mut nodes = BTreeMap::new();
        for node in document.nodes() {
            let name = node
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("node_{}", node.index()));
            let (geometry, material) = node
                .mesh()
                .and_then(|mesh| meshes.get(mesh.index()).cloned().flatten())
                .map(|(geometry, material)| (Some(geometry), material))
                .unwrap_or((None, None));
            let world_matrix = world
                .get(&node.index())
                .copied()
                .unwrap_or_else(|| Mat4::from_cols_array_2d(&node.transform().matrix()));
            if nodes.contains_key(&name) {
                tracing::warn!("duplicate node name {name:?}, keeping the first");
                continue;
            }
            nodes.insert(
                name.clone(),
                AssetNode {
                    name,
                    geometry,
                    material,
                    world: world_matrix,
                },
            );
        }

        Ok(Self {
            id: AssetId::of_bytes(bytes),
            source: None,
            nodes,
            materials,
        })
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn node(&self, name: &str) -> Result<&AssetNode, AssetError> {
        self.nodes
            .get(name)
            .ok_or_else(|| AssetError::MissingNode(name.to_string()))
    }

    /// Geometry of a named node; errors if the node is missing or meshless.
    pub fn geometry(&self, name: &str) -> Result<&Arc<MeshData>, AssetError> {
        self.node(name)?
            .geometry
            .as_ref()
            .ok_or_else(|| AssetError::NodeWithoutMesh(name.to_string()))
    }

    pub fn material(&self, name: &str) -> Result<&Arc<MaterialData>, AssetError> {
        self.materials
            .get(name)
            .ok_or_else(|| AssetError::MissingMaterial(name.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &AssetNode> {
        self.nodes.values()
    }

    pub fn materials(&self) -> impl Iterator<Item = &Arc<MaterialData>> {
        self.materials.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

fn accumulate_world(node: &gltf::Node<'_>, parent: Mat4, out: &mut BTreeMap<usize, Mat4>) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    out.insert(node.index(), world);
    for child in node.children() {
        accumulate_world(&child, world, out);
    }
}

/// Merge every triangle primitive of a mesh into one geometry. The first
/// primitive's material stands for the whole mesh.
fn read_mesh(
    mesh: &gltf::Mesh<'_>,
    buffers: &[gltf::buffer::Data],
    materials: &[Arc<MaterialData>],
) -> Option<(Arc<MeshData>, Option<Arc<MaterialData>>)> {
    let mut data = MeshData {
        name: mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh_{}", mesh.index())),
        ..Default::default()
    };
    let mut material = None;

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            tracing::warn!("mesh {:?}: skipping non-triangle primitive", data.name);
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let count = positions.len();
        let base = data.positions.len() as u32;

        let normals: Vec<[f32; 3]> = reader
            .read_normals()
            .map(|n| n.collect())
            .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; count]);
        let uvs: Vec<[f32; 2]> = reader
            .read_tex_coords(0)
            .map(|t| t.into_f32().collect())
            .unwrap_or_else(|| vec![[0.0, 0.0]; count]);
        let indices: Vec<u32> = reader
            .read_indices()
            .map(|i| i.into_u32().map(|i| base + i).collect())
            .unwrap_or_else(|| (base..base + count as u32).collect());

        data.positions.extend(positions);
        data.normals.extend(normals);
        data.uvs.extend(uvs);
        data.indices.extend(indices);

        if material.is_none() {
            material = primitive
                .material()
                .index()
                .and_then(|i| materials.get(i).cloned());
        }
    }

    if data.is_empty() {
        return None;
    }
    Some((Arc::new(data), material))
}

/// No optional glTF extension is enabled, so any required one is fatal.
fn check_required_extensions(bytes: &[u8]) -> Result<(), AssetError> {
    let gltf = gltf::Gltf::from_slice_without_validation(bytes)?;
    match gltf.document.extensions_required().next() {
        Some(extension) => Err(AssetError::UnsupportedExtension(extension.to_string())),
        None => Ok(()),
    }
}

fn decode_image(image: gltf::image::Data) -> Option<TextureImage> {
    use gltf::image::Format;

    let (width, height) = (image.width, image.height);
    let pixels = image.pixels;
    let dynamic = match image.format {
        Format::R8 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, pixels)?),
        Format::R8G8 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, pixels)?),
        Format::R8G8B8 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, pixels)?),
        Format::R8G8B8A8 => {
            DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, pixels)?)
        }
        Format::R16 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(
            width,
            height,
            words(&pixels, u16::from_ne_bytes),
        )?),
        Format::R16G16 => DynamicImage::ImageLumaA16(ImageBuffer::from_raw(
            width,
            height,
            words(&pixels, u16::from_ne_bytes),
        )?),
        Format::R16G16B16 => DynamicImage::ImageRgb16(ImageBuffer::from_raw(
            width,
            height,
            words(&pixels, u16::from_ne_bytes),
        )?),
        Format::R16G16B16A16 => DynamicImage::ImageRgba16(ImageBuffer::from_raw(
            width,
            height,
            words(&pixels, u16::from_ne_bytes),
        )?),
        Format::R32G32B32FLOAT => DynamicImage::ImageRgb32F(ImageBuffer::from_raw(
            width,
            height,
            words(&pixels, f32::from_ne_bytes),
        )?),
        Format::R32G32B32A32FLOAT => DynamicImage::ImageRgba32F(ImageBuffer::from_raw(
            width,
            height,
            words(&pixels, f32::from_ne_bytes),
        )?),
    };
    Some(TextureImage {
        width,
        height,
        rgba: dynamic.into_rgba8().into_raw(),
    })
}

/// Reinterpret decoded pixel bytes as wider channels in native byte order.
fn words<T, const N: usize>(bytes: &[u8], from: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .filter_map(|chunk| chunk.try_into().ok().map(from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use glam::Vec3;

    #[test]
    fn fixture_nodes_resolve_by_name() {
        let asset = fixture::computers_scene().unwrap();
        assert!(asset.node("Object_206").is_ok());
        assert!(asset.geometry("Object_207").is_ok());
        assert!(asset.geometry("Sphere").is_ok());
        assert!(asset.material("Texture").is_ok());
    }

    #[test]
    fn missing_lookups_are_errors() {
        let asset = fixture::computers_scene().unwrap();
        assert!(matches!(
            asset.node("Object_9999"),
            Err(AssetError::MissingNode(name)) if name == "Object_9999"
        ));
        assert!(matches!(
            asset.geometry(fixture::ROOT_NODE),
            Err(AssetError::NodeWithoutMesh(_))
        ));
        assert!(matches!(
            asset.material("Chrome"),
            Err(AssetError::MissingMaterial(_))
        ));
    }

    #[test]
    fn world_transform_accumulates_parents() {
        let asset = fixture::computers_scene().unwrap();
        let sphere = asset.node("Sphere").unwrap();
        let origin = sphere.world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 3.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn frames_share_the_texture_material() {
        let asset = fixture::computers_scene().unwrap();
        let frame = asset.node("Object_206").unwrap();
        let material = frame.material.as_ref().unwrap();
        assert_eq!(material.name, "Texture");
        assert!(Arc::ptr_eq(material, asset.material("Texture").unwrap()));
    }

    #[test]
    fn geometry_keeps_local_space() {
        let asset = fixture::computers_scene().unwrap();
        let panel = asset.geometry("Object_207").unwrap();
        let (lo, hi) = panel.bounds().unwrap();
        assert!(lo.z.abs() < 1e-6 && hi.z.abs() < 1e-6);
        assert_eq!(panel.triangle_count(), 2);
    }

    #[test]
    fn load_from_disk() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), fixture::computers_glb().unwrap()).unwrap();
        let asset = SceneAsset::load(tmp.path()).unwrap();
        assert_eq!(asset.source(), Some(tmp.path()));
        assert_eq!(asset.node_count(), fixture::computers_scene().unwrap().node_count());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = SceneAsset::load("/nonexistent/computers.glb").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }

    #[test]
    fn sixteen_bit_textures_are_narrowed_to_rgba8() {
        let pixels = [65535, 0, 32896].repeat(4);
        let texture = image::DynamicImage::ImageRgb16(
            image::ImageBuffer::from_raw(2, 2, pixels).unwrap(),
        );
        let bytes = fixture::computers_glb_with_texture(&texture).unwrap();
        let asset = SceneAsset::from_glb_bytes(&bytes).unwrap();
        let image = asset
            .material("Texture")
            .unwrap()
            .base_color_texture
            .clone()
            .unwrap();
        assert_eq!(image.rgba.len(), 16);
        assert_eq!(image.rgba[..4], [255, 0, 128, 255]);
    }

    #[test]
    fn float_pixels_decode() {
        let pixels: Vec<u8> = [1.0f32, 0.0, 0.5]
            .iter()
            .flat_map(|f| f.to_ne_bytes())
            .collect();
        let image = decode_image(gltf::image::Data {
            pixels,
            format: gltf::image::Format::R32G32B32FLOAT,
            width: 1,
            height: 1,
        })
        .unwrap();
        assert_eq!(image.rgba[0], 255);
        assert_eq!(image.rgba[1], 0);
        assert_eq!(image.rgba[3], 255);
    }

    #[test]
    fn short_pixel_buffers_are_rejected() {
        let image = decode_image(gltf::image::Data {
            pixels: vec![0; 5],
            format: gltf::image::Format::R8G8B8A8,
            width: 2,
            height: 1,
        });
        assert!(image.is_none());
    }

    #[test]
    fn draco_compressed_assets_are_reported() {
        let document = serde_json::json!({
            "asset": { "version": "2.0" },
            "extensionsUsed": ["KHR_draco_mesh_compression"],
            "extensionsRequired": ["KHR_draco_mesh_compression"],
        });
        let bytes = fixture::encode_glb(&document, &[]).unwrap();
        assert!(matches!(
            SceneAsset::from_glb_bytes(&bytes),
            Err(AssetError::UnsupportedExtension(name)) if name == "KHR_draco_mesh_compression"
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        assert!(matches!(
            SceneAsset::from_glb_bytes(b"definitely not a glb"),
            Err(AssetError::Gltf(_))
        ));
    }
}
