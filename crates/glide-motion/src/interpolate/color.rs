//! CSS color parsing and mixing.
//!
//! Colors are parsed from `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
//! `rgb()/rgba()` and `hsl()/hsla()`. HSL inputs are converted to sRGB with
//! `palette`. Channels mix in linear light, alpha mixes linearly.

use palette::{FromColor, Hsla, Srgba};
use std::fmt;

/// An sRGB color with 0-255 channels and 0-1 alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    pub fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self { red, green, blue, alpha }
    }

    /// Parse a CSS color string.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let (name, args) = s.split_once('(')?;
        let args = args.strip_suffix(')')?;
        let parts: Vec<&str> = args
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() < 3 || parts.len() > 4 {
            return None;
        }
        let alpha = match parts.get(3) {
            Some(a) => parse_alpha(a)?,
            None => 1.0,
        };
        match name.trim() {
            "rgb" | "rgba" => Some(Self::new(
                parse_channel(parts[0])?,
                parse_channel(parts[1])?,
                parse_channel(parts[2])?,
                alpha,
            )),
            "hsl" | "hsla" => {
                let hue = parts[0].trim_end_matches("deg").parse::<f64>().ok()?;
                let saturation = parse_percent(parts[1])?;
                let lightness = parse_percent(parts[2])?;
                Some(Self::from_hsla(hue, saturation, lightness, alpha))
            }
            _ => None,
        }
    }

    /// Convert from HSL (hue in degrees, saturation and lightness in 0-1).
    pub fn from_hsla(hue: f64, saturation: f64, lightness: f64, alpha: f64) -> Self {
        let hsla: Hsla = Hsla::new(hue as f32, saturation as f32, lightness as f32, alpha as f32);
        let srgb: Srgba = Srgba::from_color(hsla);
        Self::new(
            srgb.red as f64 * 255.0,
            srgb.green as f64 * 255.0,
            srgb.blue as f64 * 255.0,
            alpha,
        )
    }

    /// Mix two colors at progress `p`.
    pub fn mix(&self, to: &Self, p: f64) -> Self {
        Self {
            red: mix_linear_color(self.red, to.red, p),
            green: mix_linear_color(self.green, to.green, p),
            blue: mix_linear_color(self.blue, to.blue, p),
            alpha: self.alpha + (to.alpha - self.alpha) * p,
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alpha = (self.alpha.clamp(0.0, 1.0) * 100_000.0).round() / 100_000.0;
        write!(
            f,
            "rgba({}, {}, {}, {})",
            self.red.clamp(0.0, 255.0).round(),
            self.green.clamp(0.0, 255.0).round(),
            self.blue.clamp(0.0, 255.0).round(),
            alpha
        )
    }
}

/// Mix one channel in linear light: `sqrt(a²(1-p) + b²p)`.
#[inline]
pub fn mix_linear_color(from: f64, to: f64, p: f64) -> f64 {
    let from_sq = from * from;
    (p * (to * to - from_sq) + from_sq).max(0.0).sqrt()
}

/// Whether `s` parses as a color.
pub fn is_color(s: &str) -> bool {
    Rgba::parse(s).is_some()
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| (v * 17) as f64);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(f64::from);
    match hex.len() {
        3 => Some(Rgba::new(nibble(0)?, nibble(1)?, nibble(2)?, 1.0)),
        4 => Some(Rgba::new(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)? / 255.0)),
        6 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, 1.0)),
        8 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)? / 255.0)),
        _ => None,
    }
}

fn parse_channel(s: &str) -> Option<f64> {
    match s.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok().map(|v| v / 100.0 * 255.0),
        None => s.parse::<f64>().ok(),
    }
}

fn parse_alpha(s: &str) -> Option<f64> {
    match s.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok().map(|v| v / 100.0),
        None => s.parse::<f64>().ok(),
    }
}

fn parse_percent(s: &str) -> Option<f64> {
    s.trim_end_matches('%').parse::<f64>().ok().map(|v| v / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.5
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgba::parse("#fff"), Some(Rgba::new(255.0, 255.0, 255.0, 1.0)));
        assert_eq!(Rgba::parse("#ff000080").map(|c| c.red), Some(255.0));
        assert!(Rgba::parse("#ff000080").is_some_and(|c| (c.alpha - 0.502).abs() < 0.001));
        assert_eq!(Rgba::parse("#ggg"), None);
    }

    #[test]
    fn test_parse_functional() {
        assert_eq!(
            Rgba::parse("rgba(10, 20, 30, 0.5)"),
            Some(Rgba::new(10.0, 20.0, 30.0, 0.5))
        );
        assert_eq!(Rgba::parse("rgb(10 20 30 / 50%)"), Some(Rgba::new(10.0, 20.0, 30.0, 0.5)));

        let red = Rgba::parse("hsl(0, 100%, 50%)").unwrap();
        assert!(approx_eq(red.red, 255.0));
        assert!(approx_eq(red.green, 0.0));
        assert!(approx_eq(red.blue, 0.0));
    }

    #[test]
    fn test_mix_is_linear_light() {
        let black = Rgba::new(0.0, 0.0, 0.0, 1.0);
        let white = Rgba::new(255.0, 255.0, 255.0, 0.0);
        let mid = black.mix(&white, 0.5);
        // sqrt(0.5 * 255²) ≈ 180.3, brighter than the naive 127.5
        assert!(approx_eq(mid.red, 180.3));
        assert!((mid.alpha - 0.5).abs() < 1e-9);
        assert_eq!(black.mix(&white, 0.0), black);
    }

    #[test]
    fn test_display() {
        let c = Rgba::new(10.4, 20.6, 300.0, 0.5);
        assert_eq!(c.to_string(), "rgba(10, 21, 255, 0.5)");
    }
}
