//! Viewport calculation
//!
//! Pure arithmetic turning a page's intrinsic size, the view rotation, the
//! container box and a size mode into the scale and pixel sizes used for
//! rendering and for the container's custom properties.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::renderer::PageRenderer;
use crate::{Error, Result};

/// Page rotation in degrees, normalized to 0, 90, 180 or 270
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rotation(u16);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);

    /// Accepts any multiple of 90, including negative values
    pub fn new(degrees: i32) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(Error::invalid_argument(format!(
                "rotation: {} is not a multiple of 90",
                degrees
            )));
        }
        Ok(Self(degrees.rem_euclid(360) as u16))
    }

    pub fn degrees(&self) -> u16 {
        self.0
    }

    /// True when width and height trade places
    pub fn is_sideways(&self) -> bool {
        (self.0 / 90) % 2 == 1
    }

    /// Sum of two rotations
    pub fn combine(self, other: Rotation) -> Rotation {
        Rotation((self.0 + other.0) % 360)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Rotation> for i32 {
    fn from(value: Rotation) -> Self {
        value.0 as i32
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strategy for deriving the render scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMode {
    /// Fit the page to the container width
    #[default]
    Width,
    /// Fit the page to the container height
    Height,
    /// Use an explicit scale factor
    Scale,
}

impl SizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Width => "width",
            Self::Height => "height",
            Self::Scale => "scale",
        }
    }
}

impl FromStr for SizeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "width" => Ok(Self::Width),
            "height" => Ok(Self::Height),
            "scale" => Ok(Self::Scale),
            other => Err(Error::UnknownMode(other.to_string())),
        }
    }
}

/// Width/height of a box in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxSize {
    pub width: f64,
    pub height: f64,
}

impl BoxSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Page size as stored in the document, before view rotation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicSize {
    pub width: f64,
    pub height: f64,
    /// Rotation the document itself applies to the page
    #[serde(default)]
    pub rotation: Rotation,
}

impl IntrinsicSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            rotation: Rotation::NONE,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Width and height after applying the intrinsic and view rotations
    pub fn effective(&self, rotation: Rotation) -> (f64, f64) {
        if self.rotation.combine(rotation).is_sideways() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    pub fn dimensions(&self, rotation: Rotation) -> PageDimensions {
        let (width, height) = self.effective(rotation);
        PageDimensions {
            width,
            height,
            aspect_ratio: width / height,
        }
    }
}

/// Rotated page dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f64,
    pub height: f64,
    pub aspect_ratio: f64,
}

/// Scale and size for rendering a page at a rotation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scale: f64,
    pub rotation: Rotation,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Device pixel size for off-screen rendering at `pixel_ratio`
    pub fn physical(&self, pixel_ratio: f64) -> (u32, u32) {
        let ratio = normalize_pixel_ratio(pixel_ratio);
        (
            (self.width * ratio).floor() as u32,
            (self.height * ratio).floor() as u32,
        )
    }
}

/// Treat a missing or nonsensical device pixel ratio as 1
pub fn normalize_pixel_ratio(pixel_ratio: f64) -> f64 {
    if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio
    } else {
        1.0
    }
}

/// Explicit scales must be finite and positive
pub fn validate_scale(scale: Option<f64>) -> Result<f64> {
    match scale {
        Some(value) if value.is_finite() && value > 0.0 => Ok(value),
        other => Err(Error::invalid_argument(format!(
            "viewport: scale mode requires a finite positive number, got {:?}",
            other
        ))),
    }
}

/// Scale factor for the given size mode
pub fn scale_for(
    intrinsic: &IntrinsicSize,
    mode: SizeMode,
    container: BoxSize,
    rotation: Rotation,
    scale: Option<f64>,
) -> Result<f64> {
    let (width, height) = intrinsic.effective(rotation);
    match mode {
        SizeMode::Width => Ok(container.width / width),
        SizeMode::Height => Ok(container.height / height),
        SizeMode::Scale => validate_scale(scale),
    }
}

/// Compute the viewport for a page
pub fn viewport(
    intrinsic: &IntrinsicSize,
    mode: SizeMode,
    container: BoxSize,
    rotation: Rotation,
    scale: Option<f64>,
) -> Result<Viewport> {
    let scale = scale_for(intrinsic, mode, container, rotation, scale)?;
    let (width, height) = intrinsic.effective(rotation);
    Ok(Viewport {
        scale,
        rotation,
        width: width * scale,
        height: height * scale,
    })
}

/// Everything a render or resize pass needs to know about sizes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderGeometry {
    /// Viewport fitted to the container
    pub viewport: Viewport,
    /// Same scale expressed as an explicit-scale viewport, used for rasterizing
    pub raster_viewport: Viewport,
    pub scale: f64,
    /// CSS pixel size
    pub css_width: u32,
    pub css_height: u32,
    /// Device pixel size
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_ratio: f64,
    /// Rotated page dimensions at scale 1
    pub page: PageDimensions,
}

impl RenderGeometry {
    /// Do all the arithmetic for a render pass through the renderer
    pub fn prepare(
        renderer: &dyn PageRenderer,
        page_number: u32,
        mode: SizeMode,
        container: BoxSize,
        rotation: Rotation,
        scale_factor: Option<f64>,
        pixel_ratio: f64,
    ) -> Result<Self> {
        let pixel_ratio = normalize_pixel_ratio(pixel_ratio);
        let viewport = renderer.viewport(
            page_number,
            mode,
            container.width,
            container.height,
            rotation,
            scale_factor,
        )?;
        let raster_viewport = renderer.viewport(
            page_number,
            SizeMode::Scale,
            0.0,
            0.0,
            rotation,
            Some(viewport.scale),
        )?;
        let (pixel_width, pixel_height) = raster_viewport.physical(pixel_ratio);
        let page = renderer.dimensions(page_number, rotation)?;

        Ok(Self {
            viewport,
            raster_viewport,
            scale: viewport.scale,
            css_width: viewport.width.floor() as u32,
            css_height: viewport.height.floor() as u32,
            pixel_width,
            pixel_height,
            pixel_ratio,
            page,
        })
    }
}

/// Custom properties written onto the page container for layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerProperties {
    pub scale_factor: f64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub page_width: Option<f64>,
    pub page_height: Option<f64>,
}

impl ContainerProperties {
    pub const SCALE_FACTOR: &'static str = "--scale-factor";
    pub const VIEWPORT_WIDTH: &'static str = "--viewport-width";
    pub const VIEWPORT_HEIGHT: &'static str = "--viewport-height";
    pub const PAGE_WIDTH: &'static str = "--page-width";
    pub const PAGE_HEIGHT: &'static str = "--page-height";

    /// Scale and viewport size only, as set by a synchronous resize
    pub fn scale_only(viewport: &Viewport) -> Self {
        Self {
            scale_factor: viewport.scale,
            viewport_width: viewport.width.floor() as u32,
            viewport_height: viewport.height.floor() as u32,
            page_width: None,
            page_height: None,
        }
    }

    /// Add the rotated page size
    pub fn with_page(mut self, page: &PageDimensions) -> Self {
        self.page_width = Some(page.width);
        self.page_height = Some(page.height);
        self
    }

    /// Property name/value pairs in the order they are applied
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            (Self::SCALE_FACTOR, format!("{:.4}", self.scale_factor)),
            (Self::VIEWPORT_WIDTH, self.viewport_width.to_string()),
            (Self::VIEWPORT_HEIGHT, self.viewport_height.to_string()),
        ];
        if let Some(width) = self.page_width {
            entries.push((Self::PAGE_WIDTH, width.to_string()));
        }
        if let Some(height) = self.page_height {
            entries.push((Self::PAGE_HEIGHT, height.to_string()));
        }
        entries
    }
}
