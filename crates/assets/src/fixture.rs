//! Synthetic stand-in for the computers scene file.
//!
//! Builds a small binary glTF in memory that carries every node the
//! composers look up: the instanced parts, the monitor frames (boxes sharing
//! the `Texture` material, which carries a small PNG color map) and their
//! panels (quads facing +Z). Tests use it
//! instead of the real asset, and the hosts fall back to it with
//! `--synthetic`.

use crate::mesh::MeshData;
use crate::{AssetError, FontResource, SceneAsset};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{Value, json};
use std::io::Cursor;

/// Name of the fixture's root node. It has children but no mesh.
pub const ROOT_NODE: &str = "Scene";

/// Monitor panels, rendered as quads.
pub const PANEL_NODES: &[&str] = &[
    "Object_207",
    "Object_213",
    "Object_216",
    "Object_219",
    "Object_222",
    "Object_225",
    "Object_228",
    "Object_231",
];

/// Every other meshed node, rendered as boxes.
pub const BOX_NODES: &[&str] = &[
    "Object_4",
    "Object_16",
    "Object_22",
    "Object_26",
    "Object_28",
    "Object_52",
    "Object_172",
    "Object_174",
    "Object_178",
    "Object_206",
    "Object_212",
    "Object_215",
    "Object_218",
    "Object_221",
    "Object_224",
    "Object_227",
    "Object_230",
];

const SPHERE_NODE: &str = "Sphere";

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;

/// Pixels of the frame texture, 2x2 RGB checker.
pub const FRAME_TEXTURE: [[u8; 3]; 4] = [[200, 180, 150], [90, 80, 70], [90, 80, 70], [200, 180, 150]];

/// The 8-bit frame texture as an image.
pub fn frame_texture() -> DynamicImage {
    let pixels = FRAME_TEXTURE.iter().flatten().copied().collect();
    match RgbImage::from_raw(2, 2, pixels) {
        Some(image) => DynamicImage::ImageRgb8(image),
        None => DynamicImage::new_rgb8(2, 2),
    }
}

/// DejaVu Sans ExtraLight (Bitstream Vera license), shipped for tests.
pub const TEST_FONT_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/testdata/DejaVuSans-ExtraLight.ttf"
);

pub fn test_font() -> Result<FontResource, AssetError> {
    FontResource::load(TEST_FONT_PATH)
}

/// Parsed fixture scene.
pub fn computers_scene() -> Result<SceneAsset, AssetError> {
    SceneAsset::from_glb_bytes(&computers_glb()?)
}

/// Fixture scene encoded as GLB bytes.
pub fn computers_glb() -> Result<Vec<u8>, AssetError> {
    computers_glb_with_texture(&frame_texture())
}

/// Fixture scene whose `Texture` material maps `texture`, embedded as PNG.
pub fn computers_glb_with_texture(texture: &DynamicImage) -> Result<Vec<u8>, AssetError> {
    let mut bin = Vec::new();
    let mut views = Vec::new();
    let mut accessors = Vec::new();

    let frame = MeshData::cuboid("frame", 1.2, 1.0, 0.3);
    let panel = MeshData::quad("panel", 1.0, 0.8);
    let frame_prim = push_geometry(&frame, &mut bin, &mut views, &mut accessors);
    let panel_prim = push_geometry(&panel, &mut bin, &mut views, &mut accessors);

    let mut png = Cursor::new(Vec::new());
    texture.write_to(&mut png, ImageFormat::Png)?;
    let png = png.into_inner();
    let image_offset = bin.len();
    bin.extend_from_slice(&png);
    views.push(json!({ "buffer": 0, "byteOffset": image_offset, "byteLength": png.len() }));
    let images = json!([{ "bufferView": views.len() - 1, "mimeType": "image/png" }]);

    let materials = json!([
        { "name": "Texture", "pbrMetallicRoughness": { "baseColorFactor": [0.6, 0.58, 0.52, 1.0], "baseColorTexture": { "index": 0 }, "metallicFactor": 0.0, "roughnessFactor": 0.8 } },
        { "name": "Screen", "pbrMetallicRoughness": { "baseColorFactor": [0.05, 0.05, 0.05, 1.0], "metallicFactor": 0.0 } },
        { "name": "Emissive", "pbrMetallicRoughness": { "baseColorFactor": [1.0, 1.0, 1.0, 1.0], "metallicFactor": 0.0 } },
    ]);

    let mut meshes = Vec::new();
    let mut nodes = vec![json!({ "name": ROOT_NODE, "translation": [0.0, 1.0, 0.0], "children": [] })];
    let mut children = Vec::new();

    let mut push_node = |name: &str, primitive: &Value, material: u32, translation: [f32; 3]| {
        let mut primitive = primitive.clone();
        primitive["material"] = json!(material);
        meshes.push(json!({ "name": name, "primitives": [primitive] }));
        children.push(nodes.len());
        nodes.push(json!({ "name": name, "mesh": meshes.len() - 1, "translation": translation }));
    };

    for (i, name) in BOX_NODES.iter().enumerate() {
        push_node(name, &frame_prim, 0, [i as f32 * 1.5, 0.0, 0.0]);
    }
    for (i, name) in PANEL_NODES.iter().enumerate() {
        push_node(name, &panel_prim, 1, [i as f32 * 1.5, 0.0, 0.16]);
    }
    push_node(SPHERE_NODE, &frame_prim, 2, [1.0, 2.0, 3.0]);

    nodes[0]["children"] = json!(children);

    let document = json!({
        "asset": { "version": "2.0", "generator": "oldcomputers fixture" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": nodes,
        "meshes": meshes,
        "materials": materials,
        "textures": [{ "source": 0 }],
        "images": images,
        "accessors": accessors,
        "bufferViews": views,
        "buffers": [{ "byteLength": bin.len() }],
    });

    encode_glb(&document, &bin)
}

/// Append positions, normals, uvs and indices of `mesh` to the binary chunk
/// and return the primitive referencing them.
fn push_geometry(
    mesh: &MeshData,
    bin: &mut Vec<u8>,
    views: &mut Vec<Value>,
    accessors: &mut Vec<Value>,
) -> Value {
    let (lo, hi) = mesh.bounds().unwrap_or_default();
    let position = push_accessor(
        bin,
        views,
        accessors,
        mesh.positions.iter().flatten().flat_map(|f| f.to_le_bytes()),
        json!({ "componentType": FLOAT, "count": mesh.positions.len(), "type": "VEC3",
                "min": lo.to_array(), "max": hi.to_array() }),
    );
    let normal = push_accessor(
        bin,
        views,
        accessors,
        mesh.normals.iter().flatten().flat_map(|f| f.to_le_bytes()),
        json!({ "componentType": FLOAT, "count": mesh.normals.len(), "type": "VEC3" }),
    );
    let uv = push_accessor(
        bin,
        views,
        accessors,
        mesh.uvs.iter().flatten().flat_map(|f| f.to_le_bytes()),
        json!({ "componentType": FLOAT, "count": mesh.uvs.len(), "type": "VEC2" }),
    );
    let indices = push_accessor(
        bin,
        views,
        accessors,
        mesh.indices.iter().flat_map(|i| i.to_le_bytes()),
        json!({ "componentType": UNSIGNED_INT, "count": mesh.indices.len(), "type": "SCALAR" }),
    );
    json!({
        "attributes": { "POSITION": position, "NORMAL": normal, "TEXCOORD_0": uv },
        "indices": indices,
    })
}

fn push_accessor(
    bin: &mut Vec<u8>,
    views: &mut Vec<Value>,
    accessors: &mut Vec<Value>,
    bytes: impl Iterator<Item = u8>,
    mut accessor: Value,
) -> usize {
    let offset = bin.len();
    bin.extend(bytes);
    views.push(json!({ "buffer": 0, "byteOffset": offset, "byteLength": bin.len() - offset }));
    accessor["bufferView"] = json!(views.len() - 1);
    accessors.push(accessor);
    accessors.len() - 1
}

/// Wrap a glTF JSON document and its binary buffer in a GLB container.
pub fn encode_glb(document: &Value, bin: &[u8]) -> Result<Vec<u8>, AssetError> {
    let mut json = serde_json::to_vec(document)?;
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    // The binary chunk is optional and left out when there is nothing in it.
    let bin_chunk = if bin.is_empty() { 0 } else { 8 + bin.len() };
    let total = 12 + 8 + json.len() + bin_chunk;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glb_header_and_alignment() {
        let bytes = computers_glb().unwrap();
        assert_eq!(&bytes[..4], GLB_MAGIC);
        let total = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        assert_eq!(total, bytes.len());
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn fixture_is_deterministic() {
        let a = computers_scene().unwrap();
        let b = computers_scene().unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn every_listed_node_has_geometry() {
        let asset = computers_scene().unwrap();
        for name in BOX_NODES.iter().chain(PANEL_NODES).chain([&SPHERE_NODE]) {
            assert!(asset.geometry(name).is_ok(), "missing {name}");
        }
        // root plus every meshed node
        assert_eq!(asset.node_count(), 1 + BOX_NODES.len() + PANEL_NODES.len() + 1);
        assert_eq!(asset.material_count(), 3);
    }

    #[test]
    fn frame_material_carries_the_texture() {
        let asset = computers_scene().unwrap();
        let texture = asset
            .material("Texture")
            .unwrap()
            .base_color_texture
            .clone()
            .unwrap();
        assert_eq!((texture.width, texture.height), (2, 2));
        let [r, g, b] = FRAME_TEXTURE[1];
        assert_eq!(texture.rgba[4..8], [r, g, b, 255]);
        assert!(asset.material("Screen").unwrap().base_color_texture.is_none());
    }
}
