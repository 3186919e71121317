//! Colour parsing and rendering for stylesheet attributes.

/// An sRGB colour as stored in stylesheet attributes.
///
/// Sheets write colours in three spellings: a hex word (`x00FF88` or
/// `#00FF88`), a packed decimal integer, or a one-max triple of channel
/// fractions (`0.00 1.00 0.53`). Parsing is total; anything unreadable
/// comes back as black rather than failing the whole sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn from_packed(v: u32) -> Self {
        Self {
            r: ((v >> 16) & 0xff) as u8,
            g: ((v >> 8) & 0xff) as u8,
            b: (v & 0xff) as u8,
        }
    }

    pub fn packed(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | (self.b as u32)
    }

    pub fn from_text(s: &str) -> Self {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('x').or_else(|| s.strip_prefix('#')) {
            return u32::from_str_radix(hex, 16)
                .map(Self::from_packed)
                .unwrap_or_default();
        }
        if s.contains(char::is_whitespace) {
            let parts: Vec<f32> = s
                .split_whitespace()
                .filter_map(|p| p.parse().ok())
                .collect();
            if parts.len() == 3 {
                return Self {
                    r: channel(parts[0]),
                    g: channel(parts[1]),
                    b: channel(parts[2]),
                };
            }
            return Self::default();
        }
        s.parse::<u32>().map(Self::from_packed).unwrap_or_default()
    }

    /// The hex spelling used by the typesetting backend.
    pub fn to_tex(&self) -> String {
        format!("x{:06X}", self.packed())
    }

    /// The one-max triple spelling, each channel as a 0..1 fraction with
    /// two decimal places.
    pub fn to_one_max(&self) -> String {
        format!(
            "{:.2} {:.2} {:.2}",
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0
        )
    }
}

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_words() {
        assert_eq!(Color::from_text("xFF0000"), Color { r: 255, g: 0, b: 0 });
        assert_eq!(Color::from_text("#00FF88"), Color { r: 0, g: 255, b: 136 });
    }

    #[test]
    fn parses_one_max_triples() {
        assert_eq!(Color::from_text("1.00 0.00 0.00"), Color { r: 255, g: 0, b: 0 });
        assert_eq!(Color::from_text("0.5 0.5 0.5"), Color { r: 128, g: 128, b: 128 });
    }

    #[test]
    fn parses_packed_decimal() {
        assert_eq!(Color::from_text("255"), Color { r: 0, g: 0, b: 255 });
        assert_eq!(Color::from_text("16711680"), Color { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn garbage_reads_as_black() {
        assert_eq!(Color::from_text("teal-ish"), Color::default());
        assert_eq!(Color::from_text(""), Color::default());
        assert_eq!(Color::from_text("0.1 0.2"), Color::default());
    }

    #[test]
    fn renders_both_spellings() {
        let c = Color { r: 255, g: 0, b: 136 };
        assert_eq!(c.to_tex(), "xFF0088");
        assert_eq!(c.to_one_max(), "1.00 0.00 0.53");
    }
}
