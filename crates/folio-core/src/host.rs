//! Host-side handles the engine paints into
//!
//! The UI layer mounts these onto a [`Page`](crate::Page); the engine never
//! creates or destroys them. Every handle may disappear between the compute
//! and paint phases of a render, so paint steps re-read them from the page.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::geometry::BoxSize;

/// Page container element
pub trait ContainerHandle: Send + Sync {
    /// Current layout box of the container
    fn bounding_box(&self) -> BoxSize;

    /// Set a custom property (e.g. `--scale-factor`) on the container
    fn set_property(&self, name: &str, value: &str);
}

/// Visible drawing surface (canvas)
pub trait SurfaceHandle: Send + Sync {
    fn size(&self) -> (u32, u32);

    /// Resizing clears the surface contents
    fn set_size(&self, width: u32, height: u32);

    /// Copy an off-screen surface onto this one at the origin
    fn draw(&self, source: &OffscreenSurface);
}

/// Text or annotation layer element
pub trait LayerHandle: Send + Sync {
    /// Replace the layer's attributes and children with the fragment's
    fn replace(&self, fragment: LayerFragment);
}

/// Vector drawing element (e.g. an `<svg>`); used instead of a surface in
/// [`RenderMode::Vector`](crate::page::RenderMode::Vector)
pub trait VectorHandle: Send + Sync {
    /// Display size in CSS pixels; does not clear the content
    fn set_size(&self, width: u32, height: u32);

    /// Replace the element's attributes and children with the fragment's
    fn replace(&self, fragment: LayerFragment);
}

/// Off-screen RGBA raster the renderer draws into during the compute phase
#[derive(Clone, PartialEq, Eq)]
pub struct OffscreenSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl OffscreenSurface {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * Self::BYTES_PER_PIXEL],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

impl std::fmt::Debug for OffscreenSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffscreenSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Element inside a detached layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayerNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
}

impl LayerNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Detached layer content built during compute and moved into a
/// [`LayerHandle`] during paint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayerFragment {
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<LayerNode>,
}

impl LayerFragment {
    pub const MAIN_ROTATION: &'static str = "data-main-rotation";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn push(&mut self, node: LayerNode) {
        self.children.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }
}
