use glam::Vec3;
use std::sync::Arc;

/// Indexed triangle geometry in the node's local space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Axis-aligned bounds, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.positions.iter().map(|p| Vec3::from_array(*p));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    /// Append `other`, offsetting its indices past the current vertices.
    pub fn append(&mut self, other: &MeshData) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.uvs.extend_from_slice(&other.uvs);
        self.indices.extend(other.indices.iter().map(|i| base + i));
    }

    /// Box centered on the origin.
    pub fn cuboid(name: impl Into<String>, width: f32, height: f32, depth: f32) -> Self {
        let (x, y, z) = (width * 0.5, height * 0.5, depth * 0.5);
        // (normal, four corners counter-clockwise seen from outside)
        #[rustfmt::skip]
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0],  [[-x, -y,  z], [ x, -y,  z], [ x,  y,  z], [-x,  y,  z]]),
            ([0.0, 0.0, -1.0], [[ x, -y, -z], [-x, -y, -z], [-x,  y, -z], [ x,  y, -z]]),
            ([1.0, 0.0, 0.0],  [[ x, -y,  z], [ x, -y, -z], [ x,  y, -z], [ x,  y,  z]]),
            ([-1.0, 0.0, 0.0], [[-x, -y, -z], [-x, -y,  z], [-x,  y,  z], [-x,  y, -z]]),
            ([0.0, 1.0, 0.0],  [[-x,  y,  z], [ x,  y,  z], [ x,  y, -z], [-x,  y, -z]]),
            ([0.0, -1.0, 0.0], [[-x, -y, -z], [ x, -y, -z], [ x, -y,  z], [-x, -y,  z]]),
        ];
        let mut mesh = MeshData {
            name: name.into(),
            ..Default::default()
        };
        for (normal, corners) in faces {
            let base = mesh.positions.len() as u32;
            mesh.positions.extend_from_slice(&corners);
            mesh.normals.extend_from_slice(&[normal; 4]);
            mesh.uvs
                .extend_from_slice(&[[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        mesh
    }

    /// Quad in the XY plane facing +Z. UV (0, 0) sits at the top-left corner
    /// so an image maps upright.
    pub fn quad(name: impl Into<String>, width: f32, height: f32) -> Self {
        let (x, y) = (width * 0.5, height * 0.5);
        MeshData {
            name: name.into(),
            positions: vec![[-x, -y, 0.0], [x, -y, 0.0], [x, y, 0.0], [-x, y, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            uvs: vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }
}

/// Decoded RGBA8 image, sRGB encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// PBR material subset the scene uses.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub name: String,
    /// Linear base color factor.
    pub base_color: [f32; 4],
    pub base_color_texture: Option<Arc<TextureImage>>,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: "default".into(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic: 1.0,
            roughness: 1.0,
            emissive: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_has_six_faces() {
        let mesh = MeshData::cuboid("box", 1.0, 2.0, 3.0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        let (lo, hi) = mesh.bounds().unwrap();
        assert_eq!(lo, Vec3::new(-0.5, -1.0, -1.5));
        assert_eq!(hi, Vec3::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn append_offsets_indices() {
        let mut merged = MeshData::quad("a", 1.0, 1.0);
        merged.append(&MeshData::quad("b", 1.0, 1.0));
        assert_eq!(merged.vertex_count(), 8);
        assert_eq!(&merged.indices[6..], &[4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn empty_mesh_has_no_bounds() {
        assert!(MeshData::default().bounds().is_none());
        assert!(MeshData::default().is_empty());
    }
}
