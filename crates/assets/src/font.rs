//! Font loading and text meshing.
//!
//! Text is turned into filled triangle geometry: glyph outlines come from
//! `ttf-parser`, are rebuilt as `lyon` paths and tessellated. The resulting
//! mesh lies in the XY plane, faces +Z and is centered on the origin, so a
//! text node can be placed like any other mesh.
//!
//! Layout is deliberately simple: one line per `\n`, advance-based pen,
//! letter spacing in em units, no kerning or shaping.

use crate::mesh::MeshData;
use crate::AssetError;
use lyon::math::point;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, VertexBuffers,
};
use std::path::{Path as FsPath, PathBuf};

/// Errors from font parsing and text layout.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("compressed web fonts (WOFF/WOFF2) are not supported, convert to TTF or OTF")]
    CompressedWebFont,
    #[error("font parse error: {0}")]
    Parse(String),
    #[error("font size must be > 0, got {0}")]
    InvalidSize(f32),
    #[error("tessellation failed: {0}")]
    Tessellation(String),
}

/// A parsed-once, validated TrueType/OpenType font.
#[derive(Debug, Clone)]
pub struct FontResource {
    source: Option<PathBuf>,
    data: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
    descender: f32,
}

/// Text layout parameters in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Em size in world units.
    pub font_size: f32,
    /// Extra advance after each glyph, in em.
    pub letter_spacing: f32,
    /// Line advance, in em.
    pub line_height: f32,
    /// Flattening tolerance in world units.
    pub tolerance: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 1.0,
            letter_spacing: 0.0,
            line_height: 1.2,
            tolerance: 0.002,
        }
    }
}

/// Laid-out text geometry plus its block extent.
#[derive(Debug, Clone)]
pub struct TextMesh {
    pub mesh: MeshData,
    pub width: f32,
    pub height: f32,
}

impl FontResource {
    pub fn load(path: impl AsRef<FsPath>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut font = Self::from_bytes(data)?;
        font.source = Some(path.to_path_buf());
        tracing::info!("loaded font {}", path.display());
        Ok(font)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FontError> {
        if data.starts_with(b"wOFF") || data.starts_with(b"wOF2") {
            return Err(FontError::CompressedWebFont);
        }
        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| FontError::Parse(e.to_string()))?;
        let units_per_em = f32::from(face.units_per_em());
        let ascender = f32::from(face.ascender());
        let descender = f32::from(face.descender());
        Ok(Self {
            source: None,
            data,
            units_per_em,
            ascender,
            descender,
        })
    }

    pub fn source(&self) -> Option<&FsPath> {
        self.source.as_deref()
    }

    pub fn units_per_em(&self) -> f32 {
        self.units_per_em
    }

    /// Lay `text` out as a single centered mesh.
    pub fn layout(&self, text: &str, style: &TextStyle) -> Result<TextMesh, FontError> {
        if style.font_size.is_nan() || style.font_size <= 0.0 {
            return Err(FontError::InvalidSize(style.font_size));
        }
        let face =
            ttf_parser::Face::parse(&self.data, 0).map_err(|e| FontError::Parse(e.to_string()))?;
        let scale = style.font_size / self.units_per_em;
        let fill = FillOptions::tolerance((style.tolerance / scale).max(0.01))
            .with_fill_rule(FillRule::NonZero);
        let mut tessellator = FillTessellator::new();

        let mut mesh = MeshData {
            name: text.to_string(),
            ..Default::default()
        };
        let line_advance = style.line_height * style.font_size;
        let mut lines = 0usize;
        let mut widest = 0.0f32;

        for (row, line) in text.split('\n').enumerate() {
            lines += 1;
            let baseline = -(row as f32) * line_advance;
            let mut pen = 0.0f32;
            let mut line_mesh = MeshData::default();

            for ch in line.chars() {
                let glyph = face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
                let mut sink = OutlineSink::default();
                if face.outline_glyph(glyph, &mut sink).is_some() {
                    let path = sink.finish();
                    let offset = pen;
                    let mut buffers: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
                    tessellator
                        .tessellate_path(
                            &path,
                            &fill,
                            &mut BuffersBuilder::new(&mut buffers, |v: FillVertex| {
                                let p = v.position();
                                [p.x * scale + offset, p.y * scale + baseline]
                            }),
                        )
                        .map_err(|e| FontError::Tessellation(format!("{e:?}")))?;
                    line_mesh.append(&flat_mesh(&buffers));
                }
                let advance = f32::from(face.glyph_hor_advance(glyph).unwrap_or(0)) * scale;
                pen += advance + style.letter_spacing * style.font_size;
            }

            // The trailing letter spacing is not part of the line.
            let width = if line.is_empty() {
                0.0
            } else {
                pen - style.letter_spacing * style.font_size
            };
            for p in &mut line_mesh.positions {
                p[0] -= width * 0.5;
            }
            widest = widest.max(width);
            mesh.append(&line_mesh);
        }

        // Vertically center the block between the first line's ascender and
        // the last line's descender.
        let top = self.ascender * scale;
        let bottom = -((lines - 1) as f32) * line_advance + self.descender * scale;
        let middle = (top + bottom) * 0.5;
        for p in &mut mesh.positions {
            p[1] -= middle;
        }

        Ok(TextMesh {
            mesh,
            width: widest,
            height: top - bottom,
        })
    }
}

fn flat_mesh(buffers: &VertexBuffers<[f32; 2], u32>) -> MeshData {
    let count = buffers.vertices.len();
    MeshData {
        name: String::new(),
        positions: buffers.vertices.iter().map(|[x, y]| [*x, *y, 0.0]).collect(),
        normals: vec![[0.0, 0.0, 1.0]; count],
        uvs: vec![[0.0, 0.0]; count],
        indices: buffers.indices.clone(),
    }
}

/// Rebuilds a glyph outline as a lyon path in font units.
#[derive(Default)]
struct OutlineSink {
    builder: Option<lyon::path::path::Builder>,
    open: bool,
}

impl OutlineSink {
    fn builder(&mut self) -> &mut lyon::path::path::Builder {
        self.builder.get_or_insert_with(Path::builder)
    }

    fn finish(mut self) -> Path {
        if self.open {
            self.builder().end(false);
        }
        self.builder.take().unwrap_or_else(Path::builder).build()
    }
}

impl ttf_parser::OutlineBuilder for OutlineSink {
    fn move_to(&mut self, x: f32, y: f32) {
        if self.open {
            self.builder().end(false);
        }
        self.builder().begin(point(x, y));
        self.open = true;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder().line_to(point(x, y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder().quadratic_bezier_to(point(x1, y1), point(x, y));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder()
            .cubic_bezier_to(point(x1, y1), point(x2, y2), point(x, y));
    }

    fn close(&mut self) {
        if self.open {
            self.builder().close();
            self.open = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttf_parser::OutlineBuilder;

    #[test]
    fn woff_is_rejected_before_parsing() {
        let mut bytes = b"wOFF".to_vec();
        bytes.extend_from_slice(&[0; 64]);
        assert!(matches!(
            FontResource::from_bytes(bytes),
            Err(FontError::CompressedWebFont)
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            FontResource::from_bytes(vec![1, 2, 3, 4, 5]),
            Err(FontError::Parse(_))
        ));
    }

    #[test]
    fn missing_font_file_is_io_error() {
        assert!(matches!(
            FontResource::load("/nonexistent/Inter-Medium.ttf"),
            Err(AssetError::Io { .. })
        ));
    }

    #[test]
    fn sink_closes_every_contour() {
        let mut sink = OutlineSink::default();
        // Two square contours, the second left open.
        sink.move_to(0.0, 0.0);
        sink.line_to(10.0, 0.0);
        sink.line_to(10.0, 10.0);
        sink.line_to(0.0, 10.0);
        sink.close();
        sink.move_to(20.0, 0.0);
        sink.line_to(30.0, 0.0);
        sink.quad_to(35.0, 5.0, 30.0, 10.0);
        let path = sink.finish();

        let mut buffers: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
        FillTessellator::new()
            .tessellate_path(
                &path,
                &FillOptions::tolerance(0.1),
                &mut BuffersBuilder::new(&mut buffers, |v: FillVertex| v.position().to_array()),
            )
            .unwrap();
        let mesh = flat_mesh(&buffers);
        assert!(mesh.triangle_count() >= 3);
        assert!(mesh.normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn layout_is_centered_on_the_origin() {
        let font = crate::fixture::test_font().unwrap();
        assert_eq!(font.units_per_em(), 2048.0);
        let text = font.layout("H", &TextStyle::default()).unwrap();
        let (lo, hi) = text.mesh.bounds().unwrap();
        assert!((lo.x + hi.x).abs() < 0.02, "x bounds {lo} {hi}");
        assert!(lo.x < 0.0 && hi.x > 0.0);
        assert!(text.mesh.positions.iter().all(|p| p[2] == 0.0));
        assert!(text.mesh.triangle_count() > 0);
        assert!(hi.x - lo.x <= text.width);
    }

    #[test]
    fn negative_letter_spacing_narrows_the_line() {
        let font = crate::fixture::test_font().unwrap();
        let text = "Upload Listen";
        let plain = font.layout(text, &TextStyle::default()).unwrap();
        let tight = font
            .layout(
                text,
                &TextStyle {
                    letter_spacing: -0.1,
                    ..TextStyle::default()
                },
            )
            .unwrap();
        let gaps = (text.chars().count() - 1) as f32;
        assert!((plain.width - tight.width - 0.1 * gaps).abs() < 1e-3);
        let (lo, hi) = tight.mesh.bounds().unwrap();
        assert!(hi.x - lo.x < plain.width);
        assert!((lo.x + hi.x).abs() < 0.1);
    }

    #[test]
    fn lines_stack_downwards() {
        let font = crate::fixture::test_font().unwrap();
        let one = font.layout("Listen", &TextStyle::default()).unwrap();
        let two = font.layout("Upload\nListen", &TextStyle::default()).unwrap();
        assert!((two.height - one.height - 1.2).abs() < 1e-4);
        assert!(two.mesh.triangle_count() > one.mesh.triangle_count());
    }

    #[test]
    fn non_positive_size_is_rejected() {
        let font = crate::fixture::test_font().unwrap();
        let style = TextStyle {
            font_size: 0.0,
            ..TextStyle::default()
        };
        assert!(matches!(
            font.layout("x", &style),
            Err(FontError::InvalidSize(_))
        ));
    }

    #[test]
    fn empty_sink_builds_empty_path() {
        let path = OutlineSink::default().finish();
        assert_eq!(path.iter().count(), 0);
    }
}
