//! Generator configuration
//!
//! `GeneratorConfig` is the single source for page geometry, capture fidelity,
//! settlement policy and output naming. Defaults describe an A4 page at the
//! 96 px/inch reference density captured at 3×.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Millimetres per inch
pub const MM_PER_INCH: f64 = 25.4;

/// PDF user-space points per inch
pub const PT_PER_INCH: f64 = 72.0;

/// Lowest capture multiplier that keeps print output sharp
pub const MIN_CAPTURE_SCALE: f32 = 2.0;

/// Highest accepted capture multiplier
pub const MAX_CAPTURE_SCALE: f32 = 8.0;

/// Physical page size plus the pixel density the layout is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_mm: f64,
    pub height_mm: f64,
    /// Reference density used to map millimetres to layout pixels
    pub dpi: f64,
}

impl PageGeometry {
    pub const A4: PageGeometry = PageGeometry {
        width_mm: 210.0,
        height_mm: 297.0,
        dpi: 96.0,
    };

    pub fn width_px(&self) -> f64 {
        self.width_mm / MM_PER_INCH * self.dpi
    }

    pub fn height_px(&self) -> f64 {
        self.height_mm / MM_PER_INCH * self.dpi
    }

    /// Surface size in whole layout pixels
    pub fn size_px(&self) -> (u32, u32) {
        (
            self.width_px().round().max(1.0) as u32,
            self.height_px().round().max(1.0) as u32,
        )
    }

    pub fn width_pt(&self) -> f64 {
        self.width_mm / MM_PER_INCH * PT_PER_INCH
    }

    pub fn height_pt(&self) -> f64 {
        self.height_mm / MM_PER_INCH * PT_PER_INCH
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width_mm / self.height_mm
    }

    /// Layout pixels per millimetre at the reference density
    pub fn px_per_mm(&self) -> f64 {
        self.dpi / MM_PER_INCH
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::A4
    }
}

/// An sRGB colour with straight alpha, written as `#rrggbb` or `#rrggbbaa`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Rgba = Rgba::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 0xff
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let hex = raw
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| Error::ConfigError(format!("colour '{}' must start with '#'", raw)))?;
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| Error::ConfigError(format!("invalid colour '{}'", raw)))
        };
        match hex.len() {
            6 => Ok(Rgba::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Rgba {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: channel(6)?,
            }),
            _ => Err(Error::ConfigError(format!("invalid colour '{}'", raw))),
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Rgba::parse(&value)
    }
}

impl From<Rgba> for String {
    fn from(value: Rgba) -> Self {
        value.to_string()
    }
}

/// How the capture session decides the fixed layout has settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Wait for the renderer's layout-ready signal, proceeding after
    /// `timeout_ms` if it never arrives
    ReadySignal { timeout_ms: u64 },
    /// Wait a fixed amount of time after switching modes
    FixedDelay { delay_ms: u64 },
}

impl Default for SettlePolicy {
    fn default() -> Self {
        SettlePolicy::ReadySignal { timeout_ms: 300 }
    }
}

/// Options handed to a [`crate::Rasterizer`] for one capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Resolution multiplier over layout pixels
    pub scale: f32,
    /// Painted under everything; must be opaque
    pub background: Rgba,
    /// Tolerate logos the rasterizer cannot resolve locally
    pub allow_cross_origin: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: 3.0,
            background: Rgba::WHITE,
            allow_cross_origin: true,
        }
    }
}

/// Configuration for the generator
///
/// ```
/// let cfg = declara::GeneratorConfig::default();
/// assert_eq!(cfg.capture_scale, 3.0);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Physical page
    pub page: PageGeometry,
    /// Capture resolution multiplier
    pub capture_scale: f32,
    /// Opaque background painted under the capture
    pub background: Rgba,
    /// Skip unresolvable logos instead of failing the capture
    pub allow_cross_origin: bool,
    /// Layout settlement strategy after forcing the fixed layout
    pub settle: SettlePolicy,
    /// Minimum wait after forcing the fixed layout, applied with any policy
    pub min_settle_ms: u64,
    /// Space kept free around the page when the preview must shrink
    pub fit_margin_px: f64,
    /// Directory exported documents are saved to
    pub output_dir: PathBuf,
    pub filename_prefix: String,
    /// Name used when the student name normalizes to nothing
    pub filename_fallback: String,
    /// Outline font for page text. When unset a system sans font is used if
    /// one is installed, else bitmap glyphs
    pub font_path: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            page: PageGeometry::A4,
            capture_scale: 3.0,
            background: Rgba::WHITE,
            allow_cross_origin: true,
            settle: SettlePolicy::default(),
            min_settle_ms: 0,
            fit_margin_px: 16.0,
            output_dir: PathBuf::from("."),
            filename_prefix: "declaracao-transferencia".to_string(),
            filename_fallback: "documento".to_string(),
            font_path: None,
        }
    }
}

impl GeneratorConfig {
    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: GeneratorConfig = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let page = &self.page;
        if !(page.width_mm > 0.0 && page.height_mm > 0.0 && page.dpi > 0.0)
            || !page.width_px().is_finite()
            || !page.height_px().is_finite()
        {
            return Err(Error::ConfigError(format!(
                "page geometry must be positive, got {}x{} mm at {} dpi",
                page.width_mm, page.height_mm, page.dpi
            )));
        }
        if !(MIN_CAPTURE_SCALE..=MAX_CAPTURE_SCALE).contains(&self.capture_scale) {
            return Err(Error::ConfigError(format!(
                "capture scale must be within {}..={}, got {}",
                MIN_CAPTURE_SCALE, MAX_CAPTURE_SCALE, self.capture_scale
            )));
        }
        if !self.background.is_opaque() {
            return Err(Error::ConfigError(format!(
                "capture background must be opaque, got {}",
                self.background
            )));
        }
        if !(self.fit_margin_px >= 0.0 && self.fit_margin_px.is_finite()) {
            return Err(Error::ConfigError(format!(
                "fit margin must be a non-negative number, got {}",
                self.fit_margin_px
            )));
        }
        if self.filename_prefix.trim().is_empty() || self.filename_fallback.trim().is_empty() {
            return Err(Error::ConfigError(
                "filename prefix and fallback must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            scale: self.capture_scale,
            background: self.background,
            allow_cross_origin: self.allow_cross_origin,
        }
    }
}
