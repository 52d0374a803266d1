//! Page renderer capability
//!
//! The engine never decodes documents. It talks to a [`PageRenderer`] for
//! geometry and drawing; [`PageCache`] is the stock implementation that keeps
//! per-page intrinsic sizes and hands drawing off to an opaque [`PageBackend`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::geometry::{self, BoxSize, IntrinsicSize, PageDimensions, Rotation, SizeMode, Viewport};
use crate::host::{LayerFragment, OffscreenSurface};
use crate::{Error, Result};

/// Geometry and drawing operations for one loaded document
#[async_trait::async_trait]
pub trait PageRenderer: Send + Sync {
    /// Rotated page dimensions at scale 1
    fn dimensions(&self, page_number: u32, rotation: Rotation) -> Result<PageDimensions>;

    /// Viewport for a container box and size mode
    fn viewport(
        &self,
        page_number: u32,
        mode: SizeMode,
        width: f64,
        height: f64,
        rotation: Rotation,
        scale: Option<f64>,
    ) -> Result<Viewport>;

    /// Rasterize the page into an off-screen surface
    async fn render_surface(
        &self,
        page_number: u32,
        viewport: &Viewport,
        surface: &mut OffscreenSurface,
        pixel_ratio: f64,
    ) -> Result<()>;

    /// Build the selectable text layer
    async fn render_text_layer(
        &self,
        page_number: u32,
        _viewport: &Viewport,
        _layer: &mut LayerFragment,
    ) -> Result<()> {
        Err(Error::Unsupported(format!("text layer (page {})", page_number)))
    }

    /// Build the annotation layer
    async fn render_annotation_layer(
        &self,
        page_number: u32,
        _viewport: &Viewport,
        _layer: &mut LayerFragment,
    ) -> Result<()> {
        Err(Error::Unsupported(format!(
            "annotation layer (page {})",
            page_number
        )))
    }

    /// Draw the page as vector content at scale 1
    async fn render_vector(&self, page_number: u32, _target: &mut LayerFragment) -> Result<()> {
        Err(Error::Unsupported(format!("vector output (page {})", page_number)))
    }
}

/// Resolves link destinations for annotation rendering
pub trait LinkService: Send + Sync {
    /// 1-relative page number for a named destination
    fn page_for(&self, destination: &str) -> Option<u32>;
}

/// Document decoder that does the actual drawing
#[async_trait::async_trait]
pub trait PageBackend: Send + Sync {
    async fn draw_surface(
        &self,
        page_number: u32,
        viewport: &Viewport,
        surface: &mut OffscreenSurface,
        pixel_ratio: f64,
    ) -> Result<()>;

    async fn draw_text_layer(
        &self,
        page_number: u32,
        _viewport: &Viewport,
        _layer: &mut LayerFragment,
    ) -> Result<()> {
        Err(Error::Unsupported(format!("text layer (page {})", page_number)))
    }

    async fn draw_annotation_layer(
        &self,
        page_number: u32,
        _viewport: &Viewport,
        _layer: &mut LayerFragment,
        _links: &dyn LinkService,
    ) -> Result<()> {
        Err(Error::Unsupported(format!(
            "annotation layer (page {})",
            page_number
        )))
    }

    async fn draw_vector(&self, page_number: u32, _target: &mut LayerFragment) -> Result<()> {
        Err(Error::Unsupported(format!("vector output (page {})", page_number)))
    }
}

/// Retains page intrinsic sizes and answers geometry questions about them
pub struct PageCache<B> {
    entries: RwLock<HashMap<u32, IntrinsicSize>>,
    backend: B,
    links: Option<Arc<dyn LinkService>>,
}

impl<B: PageBackend> PageCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            backend,
            links: None,
        }
    }

    /// Set the link service required by annotation rendering
    pub fn with_link_service(mut self, links: Arc<dyn LinkService>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Retain a page and its statistics
    pub fn retain(&self, page_number: u32, intrinsic: IntrinsicSize) {
        debug!(
            page = page_number,
            width = intrinsic.width,
            height = intrinsic.height,
            "Retaining page"
        );
        self.write().insert(page_number, intrinsic);
    }

    /// Discard a page and its statistics
    pub fn evict(&self, page_number: u32) {
        self.write().remove(&page_number);
    }

    pub fn has(&self, page_number: u32) -> bool {
        self.read().contains_key(&page_number)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn entry(&self, page_number: u32) -> Result<IntrinsicSize> {
        self.read()
            .get(&page_number)
            .copied()
            .ok_or(Error::UnknownPage(page_number))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u32, IntrinsicSize>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u32, IntrinsicSize>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl<B: PageBackend> PageRenderer for PageCache<B> {
    fn dimensions(&self, page_number: u32, rotation: Rotation) -> Result<PageDimensions> {
        Ok(self.entry(page_number)?.dimensions(rotation))
    }

    fn viewport(
        &self,
        page_number: u32,
        mode: SizeMode,
        width: f64,
        height: f64,
        rotation: Rotation,
        scale: Option<f64>,
    ) -> Result<Viewport> {
        let entry = self.entry(page_number)?;
        geometry::viewport(&entry, mode, BoxSize::new(width, height), rotation, scale)
    }

    async fn render_surface(
        &self,
        page_number: u32,
        viewport: &Viewport,
        surface: &mut OffscreenSurface,
        pixel_ratio: f64,
    ) -> Result<()> {
        self.entry(page_number)?;
        self.backend
            .draw_surface(page_number, viewport, surface, pixel_ratio)
            .await
    }

    async fn render_text_layer(
        &self,
        page_number: u32,
        viewport: &Viewport,
        layer: &mut LayerFragment,
    ) -> Result<()> {
        self.entry(page_number)?;
        self.backend
            .draw_text_layer(page_number, viewport, layer)
            .await
    }

    async fn render_annotation_layer(
        &self,
        page_number: u32,
        viewport: &Viewport,
        layer: &mut LayerFragment,
    ) -> Result<()> {
        self.entry(page_number)?;
        let links = self.links.as_deref().ok_or_else(|| {
            Error::Unsupported("annotation layer requires a link service".to_string())
        })?;
        self.backend
            .draw_annotation_layer(page_number, viewport, layer, links)
            .await
    }

    async fn render_vector(&self, page_number: u32, target: &mut LayerFragment) -> Result<()> {
        self.entry(page_number)?;
        self.backend.draw_vector(page_number, target).await
    }
}
