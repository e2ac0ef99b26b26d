//! Color values.
//!
//! Colors are the registered opaque kind: the merger treats them as atomic
//! units and the expression language can derive new ones.

use regex_lite::Regex;
use std::fmt;
use std::sync::OnceLock;

/// An sRGB color with 8-bit channels and a fractional alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    red: u8,
    green: u8,
    blue: u8,
    alpha: f64,
}

/// Color parse failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid color '{0}'")]
pub struct ColorParseError(pub String);

fn functional_notation() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*([0-9]*\.?[0-9]+)\s*)?\)$",
        )
        .expect("color pattern is valid")
    })
}

impl Color {
    /// Opaque color from channels.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::rgba(red, green, blue, 1.0)
    }

    /// Color from channels; alpha is clamped to [0, 1].
    pub fn rgba(red: u8, green: u8, blue: u8, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: clamp_unit(alpha),
        }
    }

    /// Parse a CSS color: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
    /// `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    pub fn parse(input: &str) -> Result<Self, ColorParseError> {
        let trimmed = input.trim();
        let invalid = || ColorParseError(input.to_string());

        if let Some(hex) = trimmed.strip_prefix('#') {
            return Self::parse_hex(hex).ok_or_else(invalid);
        }

        let caps = functional_notation()
            .captures(trimmed)
            .ok_or_else(invalid)?;
        let channel = |idx: usize| -> Result<u8, ColorParseError> {
            caps[idx].parse::<u8>().map_err(|_| invalid())
        };
        let alpha = match caps.get(4) {
            Some(a) => {
                let a: f64 = a.as_str().parse().map_err(|_| invalid())?;
                if a > 1.0 {
                    return Err(invalid());
                }
                a
            }
            None => 1.0,
        };

        Ok(Self::rgba(channel(1)?, channel(2)?, channel(3)?, alpha))
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|n| n * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        match hex.len() {
            3 => Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            4 => Some(Self::rgba(
                nibble(0)?,
                nibble(1)?,
                nibble(2)?,
                f64::from(nibble(3)?) / 255.0,
            )),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(
                byte(0)?,
                byte(2)?,
                byte(4)?,
                f64::from(byte(6)?) / 255.0,
            )),
            _ => None,
        }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.alpha >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                self.red,
                self.green,
                self.blue,
                (self.alpha * 255.0).round() as u8
            )
        }
    }

    /// Blend towards `other`; `weight` is the share of `other` in [0, 1].
    pub fn mix(&self, other: &Color, weight: f64) -> Color {
        let w = clamp_unit(weight);
        let blend = |a: u8, b: u8| (f64::from(a) * (1.0 - w) + f64::from(b) * w).round() as u8;
        Color {
            red: blend(self.red, other.red),
            green: blend(self.green, other.green),
            blue: blend(self.blue, other.blue),
            alpha: self.alpha * (1.0 - w) + other.alpha * w,
        }
    }

    /// Blend towards white, keeping alpha.
    pub fn lighten(&self, amount: f64) -> Color {
        let mixed = self.mix(&Color::rgba(255, 255, 255, self.alpha), amount);
        Color { alpha: self.alpha, ..mixed }
    }

    /// Blend towards black, keeping alpha.
    pub fn darken(&self, amount: f64) -> Color {
        let mixed = self.mix(&Color::rgba(0, 0, 0, self.alpha), amount);
        Color { alpha: self.alpha, ..mixed }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_long_hex() {
        assert_eq!(Color::parse("#fff").unwrap(), Color::rgb(255, 255, 255));
        assert_eq!(Color::parse("#1a2b3c").unwrap(), Color::rgb(0x1a, 0x2b, 0x3c));

        let translucent = Color::parse("#00000080").unwrap();
        assert_eq!(translucent.red(), 0);
        assert!((translucent.alpha() - 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_functional_notation() {
        assert_eq!(Color::parse("rgb(10, 20, 30)").unwrap(), Color::rgb(10, 20, 30));

        let c = Color::parse("rgba(10,20,30,0.5)").unwrap();
        assert_eq!(c.alpha(), 0.5);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Color::parse("#12").is_err());
        assert!(Color::parse("#gggggg").is_err());
        assert!(Color::parse("rgb(300, 0, 0)").is_err());
        assert!(Color::parse("rgba(0, 0, 0, 2)").is_err());
        assert!(Color::parse("red").is_err());
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(Color::rgb(255, 0, 16).to_hex(), "#ff0010");
        assert_eq!(Color::rgba(0, 0, 0, 0.5).to_hex(), "#00000080");
    }

    #[test]
    fn test_lighten_and_darken() {
        let base = Color::rgb(100, 100, 100);
        assert_eq!(base.lighten(1.0), Color::rgb(255, 255, 255));
        assert_eq!(base.darken(1.0), Color::rgb(0, 0, 0));
        assert_eq!(base.lighten(0.0), base);
    }

    #[test]
    fn test_mix_halfway() {
        let mixed = Color::rgb(0, 0, 0).mix(&Color::rgb(200, 100, 50), 0.5);
        assert_eq!(mixed, Color::rgb(100, 50, 25));
    }
}
