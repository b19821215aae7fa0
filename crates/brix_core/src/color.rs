//! LDraw colour table.
//!
//! Parses `0 !COLOUR` definitions (from `LDConfig.ldr`, `LDCfgalt.ldr`, or
//! inline in any model) into a lookup keyed by colour code.
//!
//! Syntax:
//!
//! ```text
//! 0 !COLOUR <name> CODE <n> VALUE <#rrggbb> EDGE <#rrggbb>
//!     [ALPHA <a>] [LUMINANCE <l>]
//!     [CHROME | PEARLESCENT | RUBBER | MATTE_METALLIC | METAL
//!      | MATERIAL (GLITTER | SPECKLE) VALUE <#rrggbb> ...]
//! ```

use std::collections::HashMap;

use brix_math::Vec3;
use thiserror::Error;

/// Colour code meaning "inherit the enclosing colour".
pub const MAIN_COLOR: &str = "16";

/// Colour code meaning "edge colour of the enclosing colour".
pub const EDGE_COLOR: &str = "24";

/// Standard colour table file.
pub const STANDARD_TABLE: &str = "LDConfig.ldr";

/// Alternate colour table file.
pub const ALTERNATE_TABLE: &str = "LDCfgalt.ldr";

/// Errors that can occur while parsing a `!COLOUR` line.
#[derive(Error, Debug, PartialEq)]
pub enum ColorError {
    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("invalid hex colour: {0}")]
    InvalidHex(String),

    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

/// Result type for colour parsing.
pub type ColorResult<T> = Result<T, ColorError>;

/// Material finish of a colour, driving the external shader builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Finish {
    #[default]
    Plain,
    Chrome,
    Pearlescent,
    Rubber,
    MatteMetallic,
    Metal,
    Glitter,
    Speckle,
    Milky,
    Opal,
}

/// One colour/material definition.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorDefinition {
    /// Colour code (`"4"`, `"0x2FF0000"`, ...)
    pub code: String,

    /// Human readable name (`Red`, `Trans_Clear`, ...)
    pub name: String,

    /// Base colour, linear RGB
    pub color: Vec3,

    /// Opacity (0=transparent, 1=opaque)
    pub alpha: f32,

    /// Edge colour, linear RGB
    pub edge_color: Vec3,

    /// Glow brightness, 0-1
    pub luminance: f32,

    /// Surface finish
    pub finish: Finish,

    /// Secondary colour for glitter/speckle/opal finishes, linear RGB
    pub material_color: Option<Vec3>,
}

impl ColorDefinition {
    /// Fully opaque mid-grey, used for undefined codes.
    pub fn fallback(code: &str) -> Self {
        Self {
            code: code.to_string(),
            name: format!("Unknown_{code}"),
            color: Vec3::splat(srgb_to_linear(128)),
            alpha: 1.0,
            edge_color: Vec3::splat(srgb_to_linear(51)),
            luminance: 0.0,
            finish: Finish::Plain,
            material_color: None,
        }
    }

    /// Check if this colour is see-through.
    pub fn is_transparent(&self) -> bool {
        self.alpha < 1.0
    }

    /// Parse the parameters of a `0 !COLOUR` line (everything after `!COLOUR`).
    pub fn parse(params: &[&str]) -> ColorResult<Self> {
        let name = params.first().ok_or(ColorError::MissingField("name"))?;
        let code = value_after(params, "CODE").ok_or(ColorError::MissingField("CODE"))?;
        let value = value_after(params, "VALUE").ok_or(ColorError::MissingField("VALUE"))?;
        let edge = value_after(params, "EDGE").ok_or(ColorError::MissingField("EDGE"))?;

        let alpha = match value_after(params, "ALPHA") {
            Some(a) => parse_number(a)? / 255.0,
            None => 1.0,
        };
        let luminance = match value_after(params, "LUMINANCE") {
            Some(l) => parse_number(l)? / 255.0,
            None => 0.0,
        };

        let upper: Vec<String> = params.iter().map(|p| p.to_ascii_uppercase()).collect();
        let has = |keyword: &str| upper.iter().any(|p| p == keyword);

        let mut material_color = None;
        let mut finish = if has("CHROME") {
            Finish::Chrome
        } else if has("PEARLESCENT") {
            Finish::Pearlescent
        } else if has("RUBBER") {
            Finish::Rubber
        } else if has("MATTE_METALLIC") {
            Finish::MatteMetallic
        } else if has("METAL") {
            Finish::Metal
        } else {
            Finish::Plain
        };

        if let Some(material_at) = upper.iter().position(|p| p == "MATERIAL") {
            let material = &params[material_at + 1..];
            // The material's own VALUE follows the MATERIAL keyword.
            if let Some(hex) = value_after(material, "VALUE") {
                material_color = Some(parse_hex(hex)?);
            }
            finish = match material.first().map(|m| m.to_ascii_uppercase()) {
                Some(m) if m == "GLITTER" => Finish::Glitter,
                Some(m) if m == "SPECKLE" => Finish::Speckle,
                _ => finish,
            };
        }

        if name.eq_ignore_ascii_case("Milky_White") {
            finish = Finish::Milky;
        } else if name.contains("Opal") {
            finish = Finish::Opal;
        }

        Ok(Self {
            code: code.to_string(),
            name: name.to_string(),
            color: parse_hex(value)?,
            alpha,
            edge_color: parse_hex(edge)?,
            luminance,
            finish,
            material_color,
        })
    }

    /// Decode a direct colour code (`0x2RRGGBB` or `#RRGGBB`).
    pub fn direct(code: &str) -> Option<Self> {
        let hex = code
            .strip_prefix("0x2")
            .or_else(|| code.strip_prefix("0X2"))
            .or_else(|| code.strip_prefix('#'))?;
        if hex.len() != 6 {
            return None;
        }
        let color = parse_hex(&format!("#{hex}")).ok()?;
        Some(Self {
            code: code.to_string(),
            name: format!("Direct_{hex}"),
            color,
            alpha: 1.0,
            edge_color: Vec3::ZERO,
            luminance: 0.0,
            finish: Finish::Plain,
            material_color: None,
        })
    }
}

/// Colour lookup keyed by code.
#[derive(Clone, Debug, Default)]
pub struct ColorTable {
    colors: HashMap<String, ColorDefinition>,
}

impl ColorTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// File name of the table selected by the alternate-colours flag.
    pub fn table_name(use_alt_colors: bool) -> &'static str {
        if use_alt_colors {
            ALTERNATE_TABLE
        } else {
            STANDARD_TABLE
        }
    }

    /// Build a table from raw lines, skipping everything but `!COLOUR`.
    ///
    /// Malformed definitions are logged and skipped.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let (table, errors) = Self::parse_with_errors(lines);
        for (index, e) in errors {
            log::warn!("Skipping colour at line {}: {}", index + 1, e);
        }
        table
    }

    /// Like [`ColorTable::parse`], but hands back each rejected definition
    /// as a 0-based line index and its error.
    pub fn parse_with_errors<S: AsRef<str>>(lines: &[S]) -> (Self, Vec<(usize, ColorError)>) {
        let mut table = Self::new();
        let mut errors = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            let tokens: Vec<&str> = line.as_ref().split_whitespace().collect();
            if tokens.len() < 2 || tokens[0] != "0" || tokens[1] != "!COLOUR" {
                continue;
            }
            match ColorDefinition::parse(&tokens[2..]) {
                Ok(definition) => table.insert(definition),
                Err(e) => errors.push((index, e)),
            }
        }
        log::debug!("Parsed {} colour definitions", table.len());
        (table, errors)
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, definition: ColorDefinition) {
        self.colors.insert(definition.code.clone(), definition);
    }

    /// Merge every definition of `other`, replacing existing codes.
    pub fn extend(&mut self, other: impl IntoIterator<Item = ColorDefinition>) {
        for definition in other {
            self.insert(definition);
        }
    }

    /// Get a defined colour without fallback.
    pub fn get(&self, code: &str) -> Option<&ColorDefinition> {
        self.colors.get(code)
    }

    /// Check if a code is defined (directly or as a direct colour).
    pub fn is_known(&self, code: &str) -> bool {
        self.colors.contains_key(code) || ColorDefinition::direct(code).is_some()
    }

    /// Look up a colour, falling back to direct colours, then mid-grey.
    ///
    /// Codes 16 and 24 are the caller's business and are never substituted
    /// here; asking for them returns the fallback.
    pub fn lookup(&self, code: &str) -> ColorDefinition {
        if let Some(definition) = self.colors.get(code) {
            return definition.clone();
        }
        ColorDefinition::direct(code).unwrap_or_else(|| ColorDefinition::fallback(code))
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Iterate over definitions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ColorDefinition> {
        self.colors.values()
    }
}

fn value_after<'a>(params: &[&'a str], keyword: &str) -> Option<&'a str> {
    params
        .iter()
        .position(|p| p.eq_ignore_ascii_case(keyword))
        .and_then(|i| params.get(i + 1))
        .copied()
}

fn parse_number(s: &str) -> ColorResult<f32> {
    s.parse::<f32>()
        .map_err(|_| ColorError::InvalidNumber(s.to_string()))
}

/// Parse `#rrggbb` (or `0xrrggbb`) into linear RGB.
fn parse_hex(s: &str) -> ColorResult<Vec3> {
    let digits = s
        .strip_prefix('#')
        .or_else(|| s.strip_prefix("0x"))
        .ok_or_else(|| ColorError::InvalidHex(s.to_string()))?;
    if digits.len() != 6 {
        return Err(ColorError::InvalidHex(s.to_string()));
    }
    let rgb = u32::from_str_radix(digits, 16).map_err(|_| ColorError::InvalidHex(s.to_string()))?;
    Ok(Vec3::new(
        srgb_to_linear((rgb >> 16) as u8),
        srgb_to_linear((rgb >> 8) as u8),
        srgb_to_linear(rgb as u8),
    ))
}

/// Convert sRGB byte value to linear float.
fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(line: &str) -> Vec<&str> {
        line.split_whitespace().skip(2).collect()
    }

    #[test]
    fn test_parse_plain_colour() {
        let p = params("0 !COLOUR Red CODE 4 VALUE #C91A09 EDGE #333333");
        let red = ColorDefinition::parse(&p).unwrap();

        assert_eq!(red.code, "4");
        assert_eq!(red.name, "Red");
        assert_eq!(red.finish, Finish::Plain);
        assert!(!red.is_transparent());
        assert!(red.color.x > red.color.y);
    }

    #[test]
    fn test_parse_alpha_and_luminance() {
        let p = params("0 !COLOUR Glow_In_Dark_Trans CODE 294 VALUE #BDC6AD EDGE #333333 ALPHA 240 LUMINANCE 15");
        let glow = ColorDefinition::parse(&p).unwrap();

        assert!((glow.alpha - 240.0 / 255.0).abs() < 0.001);
        assert!((glow.luminance - 15.0 / 255.0).abs() < 0.001);
        assert!(glow.is_transparent());
    }

    #[test]
    fn test_parse_finishes() {
        let chrome = ColorDefinition::parse(&params(
            "0 !COLOUR Chrome_Gold CODE 334 VALUE #BBA53D EDGE #BBB23D CHROME",
        ))
        .unwrap();
        assert_eq!(chrome.finish, Finish::Chrome);

        let glitter = ColorDefinition::parse(&params(
            "0 !COLOUR Glitter_Trans_Clear CODE 117 VALUE #FFFFFF EDGE #C3C3C3 ALPHA 128 MATERIAL GLITTER VALUE #FFFFFF FRACTION 0.08 VFRACTION 0.1 SIZE 1",
        ))
        .unwrap();
        assert_eq!(glitter.finish, Finish::Glitter);
        assert!(glitter.material_color.is_some());

        let milky = ColorDefinition::parse(&params(
            "0 !COLOUR Milky_White CODE 79 VALUE #FFFFFF EDGE #C3C3C3 ALPHA 224",
        ))
        .unwrap();
        assert_eq!(milky.finish, Finish::Milky);
    }

    #[test]
    fn test_parse_missing_edge() {
        let err = ColorDefinition::parse(&params("0 !COLOUR Red CODE 4 VALUE #C91A09")).unwrap_err();
        assert_eq!(err, ColorError::MissingField("EDGE"));
    }

    #[test]
    fn test_table_lookup_fallback() {
        let table = ColorTable::parse(&[
            "0 // LDraw colour table",
            "0 !COLOUR Black CODE 0 VALUE #1B2A34 EDGE #2B4354",
            "0 !COLOUR Broken CODE 1 VALUE nothex EDGE #000000",
        ]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("0").name, "Black");

        let unknown = table.lookup("9999");
        assert_eq!(unknown.code, "9999");
        assert_eq!(unknown.alpha, 1.0);
        assert!(!table.is_known("9999"));
    }

    #[test]
    fn test_table_reports_rejected_definitions() {
        let (table, errors) = ColorTable::parse_with_errors(&[
            "0 !COLOUR Red CODE 4 VALUE #C91A09 EDGE #333333",
            "0 !COLOUR Broken CODE 5 VALUE nothex EDGE #000000",
            "0 !COLOUR NoCode VALUE #FFFFFF EDGE #000000",
        ]);

        assert_eq!(table.len(), 1);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].0, 1);
        assert!(matches!(errors[0].1, ColorError::InvalidHex(_)));
        assert_eq!(errors[1].0, 2);
    }

    #[test]
    fn test_direct_colour() {
        let table = ColorTable::new();
        let direct = table.lookup("0x2FF0000");

        assert!((direct.color.x - 1.0).abs() < 0.001);
        assert!(direct.color.y.abs() < 0.001);
        assert!(table.is_known("0x2FF0000"));
    }

    #[test]
    fn test_table_name() {
        assert_eq!(ColorTable::table_name(false), "LDConfig.ldr");
        assert_eq!(ColorTable::table_name(true), "LDCfgalt.ldr");
    }

    #[test]
    fn test_srgb_to_linear() {
        assert!((srgb_to_linear(0) - 0.0).abs() < 0.001);
        assert!((srgb_to_linear(255) - 1.0).abs() < 0.001);
        let mid = srgb_to_linear(128);
        assert!(mid < 0.5 && mid > 0.1);
    }
}
