//! Mock renderer and host handles shared by the unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::geometry::{self, BoxSize, IntrinsicSize, PageDimensions, Rotation, SizeMode, Viewport};
use crate::host::{
    ContainerHandle, LayerFragment, LayerHandle, LayerNode, OffscreenSurface, SurfaceHandle,
    VectorHandle,
};
use crate::page::RenderContext;
use crate::pipeline::FrameScheduler;
use crate::renderer::PageRenderer;
use crate::{Error, Result};

/// US letter at 72 dpi
pub(crate) const LETTER: IntrinsicSize = IntrinsicSize {
    width: 612.0,
    height: 792.0,
    rotation: Rotation::NONE,
};

pub(crate) struct MockRenderer {
    page_count: u32,
    intrinsic: IntrinsicSize,
    pub surface_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
    pub annotation_calls: AtomicUsize,
    pub vector_calls: AtomicUsize,
    pub fail_surface: AtomicBool,
}

impl MockRenderer {
    pub fn new(page_count: u32) -> Arc<Self> {
        Arc::new(Self {
            page_count,
            intrinsic: LETTER,
            surface_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            annotation_calls: AtomicUsize::new(0),
            vector_calls: AtomicUsize::new(0),
            fail_surface: AtomicBool::new(false),
        })
    }

    pub fn surfaces(&self) -> usize {
        self.surface_calls.load(Ordering::SeqCst)
    }

    fn entry(&self, page_number: u32) -> Result<IntrinsicSize> {
        if page_number == 0 || page_number > self.page_count {
            return Err(Error::UnknownPage(page_number));
        }
        Ok(self.intrinsic)
    }
}

#[async_trait::async_trait]
impl PageRenderer for MockRenderer {
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
        _viewport: &Viewport,
        surface: &mut OffscreenSurface,
        _pixel_ratio: f64,
    ) -> Result<()> {
        self.surface_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_surface.load(Ordering::SeqCst) {
            return Err(Error::render_failure(page_number, "mock surface failure"));
        }
        surface.pixels_mut().fill(page_number as u8);
        Ok(())
    }

    async fn render_text_layer(
        &self,
        page_number: u32,
        _viewport: &Viewport,
        layer: &mut LayerFragment,
    ) -> Result<()> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        layer.push(LayerNode::new("span").with_text(format!("page {}", page_number)));
        Ok(())
    }

    async fn render_annotation_layer(
        &self,
        page_number: u32,
        _viewport: &Viewport,
        layer: &mut LayerFragment,
    ) -> Result<()> {
        self.annotation_calls.fetch_add(1, Ordering::SeqCst);
        layer.push(LayerNode::new("a").with_attribute("href", format!("#page-{}", page_number)));
        Ok(())
    }

    async fn render_vector(&self, page_number: u32, target: &mut LayerFragment) -> Result<()> {
        let entry = self.entry(page_number)?;
        self.vector_calls.fetch_add(1, Ordering::SeqCst);
        target.set_attribute("viewBox", format!("0 0 {} {}", entry.width, entry.height));
        target.push(LayerNode::new("path"));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockContainer {
    bounds: Mutex<BoxSize>,
    properties: Mutex<HashMap<String, String>>,
    pub property_sets: AtomicUsize,
}

impl MockContainer {
    pub fn new(width: f64, height: f64) -> Arc<Self> {
        Arc::new(Self {
            bounds: Mutex::new(BoxSize::new(width, height)),
            ..Default::default()
        })
    }

    pub fn set_bounds(&self, width: f64, height: f64) {
        *self.bounds.lock().unwrap() = BoxSize::new(width, height);
    }

    pub fn property(&self, name: &str) -> Option<String> {
        self.properties.lock().unwrap().get(name).cloned()
    }
}

impl ContainerHandle for MockContainer {
    fn bounding_box(&self) -> BoxSize {
        *self.bounds.lock().unwrap()
    }

    fn set_property(&self, name: &str, value: &str) {
        self.property_sets.fetch_add(1, Ordering::SeqCst);
        self.properties
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }
}

#[derive(Default)]
pub(crate) struct MockSurface {
    size: Mutex<(u32, u32)>,
    pub resizes: AtomicUsize,
    pub draws: AtomicUsize,
}

impl MockSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn draw_count(&self) -> usize {
        self.draws.load(Ordering::SeqCst)
    }
}

impl SurfaceHandle for MockSurface {
    fn size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }

    fn set_size(&self, width: u32, height: u32) {
        self.resizes.fetch_add(1, Ordering::SeqCst);
        *self.size.lock().unwrap() = (width, height);
    }

    fn draw(&self, source: &OffscreenSurface) {
        assert_eq!(self.size(), (source.width(), source.height()));
        self.draws.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct MockLayer {
    fragment: Mutex<Option<LayerFragment>>,
}

impl MockLayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fragment(&self) -> Option<LayerFragment> {
        self.fragment.lock().unwrap().clone()
    }
}

impl LayerHandle for MockLayer {
    fn replace(&self, fragment: LayerFragment) {
        *self.fragment.lock().unwrap() = Some(fragment);
    }
}

#[derive(Default)]
pub(crate) struct MockVector {
    size: Mutex<(u32, u32)>,
    fragment: Mutex<Option<LayerFragment>>,
}

impl MockVector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }

    pub fn fragment(&self) -> Option<LayerFragment> {
        self.fragment.lock().unwrap().clone()
    }
}

impl VectorHandle for MockVector {
    fn set_size(&self, width: u32, height: u32) {
        *self.size.lock().unwrap() = (width, height);
    }

    fn replace(&self, fragment: LayerFragment) {
        *self.fragment.lock().unwrap() = Some(fragment);
    }
}

pub(crate) fn context(
    renderer: Arc<MockRenderer>,
    frames: Arc<dyn FrameScheduler>,
) -> RenderContext {
    RenderContext::new(renderer, frames).with_pixel_ratio(2.0)
}
