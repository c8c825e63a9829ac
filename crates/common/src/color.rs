use serde::{Deserialize, Serialize};

/// Errors from parsing a color string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("unknown color name: {0}")]
    UnknownName(String),
    #[error("malformed hex color: {0}")]
    MalformedHex(String),
}

/// Linear RGB color. Components may exceed 1.0 for emissive, non-tone-mapped
/// materials.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

const NAMED: &[(&str, u32)] = &[
    ("black", 0x000000),
    ("white", 0xffffff),
    ("orange", 0xffa500),
    ("indianred", 0xcd5c5c),
    ("hotpink", 0xff69b4),
    ("red", 0xff0000),
    ("green", 0x008000),
    ("blue", 0x0000ff),
];

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    /// Linear components, used as given.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB` in sRGB, converted to linear.
    pub fn from_srgb_hex(hex: u32) -> Self {
        let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
        Self::rgb(channel(16), channel(8), channel(0))
    }

    /// Parse `#rrggbb`, `#rgb` or a CSS color name.
    pub fn parse(s: &str) -> Result<Self, ColorError> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ColorError::MalformedHex(s.to_string()));
            }
            let value = match hex.len() {
                6 => u32::from_str_radix(hex, 16).ok(),
                3 => u32::from_str_radix(hex, 16).ok().map(|v| {
                    let r = (v >> 8) & 0xf;
                    let g = (v >> 4) & 0xf;
                    let b = v & 0xf;
                    ((r * 0x11) << 16) | ((g * 0x11) << 8) | (b * 0x11)
                }),
                _ => None,
            };
            return value
                .map(Self::from_srgb_hex)
                .ok_or_else(|| ColorError::MalformedHex(s.to_string()));
        }
        let lower = s.to_ascii_lowercase();
        NAMED
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, hex)| Self::from_srgb_hex(*hex))
            .ok_or(ColorError::UnknownName(lower))
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_rgba(self, alpha: f32) -> [f32; 4] {
        [self.r, self.g, self.b, alpha]
    }

    /// Component-wise product, used to tint a material color by an instance color.
    pub fn tint(self, other: Color) -> Self {
        Self::rgb(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    pub fn scaled(self, k: f32) -> Self {
        Self::rgb(self.r * k, self.g * k, self.b * k)
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_named_and_hex_agree() {
        assert_eq!(Color::parse("orange").unwrap(), Color::parse("#ffa500").unwrap());
        assert_eq!(Color::parse("Black").unwrap(), Color::BLACK);
        assert_eq!(Color::parse("#fff").unwrap(), Color::WHITE);
    }

    #[test]
    fn srgb_hex_is_linearized() {
        let c = Color::parse("#35c19f").unwrap();
        // 0x35 / 255 = 0.2078 in sRGB is about 0.0356 linear.
        assert!((c.r - 0.0356).abs() < 1e-3);
        assert!(c.g > c.b && c.b > c.r);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(
            Color::parse("#12345"),
            Err(ColorError::MalformedHex("#12345".into()))
        );
        assert!(matches!(
            Color::parse("chartreuse-ish"),
            Err(ColorError::UnknownName(_))
        ));
    }

    #[test]
    fn rgb_is_linear_and_unclamped() {
        let c = Color::rgb(1.0, 2.0, 1.0);
        assert_eq!(c.to_array(), [1.0, 2.0, 1.0]);
        assert_eq!(c.tint(Color::rgb(0.5, 0.5, 0.5)).g, 1.0);
    }

    #[test]
    fn hex_signs_are_rejected() {
        assert_eq!(
            Color::parse("#+fff00"),
            Err(ColorError::MalformedHex("#+fff00".into()))
        );
        assert!(Color::parse("#+ff").is_err());
        assert!(Color::parse("#-12345").is_err());
    }
}
