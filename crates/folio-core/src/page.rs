//! Per-page virtualization state
//!
//! A [`Page`] moves between the COLD, WARM and HOT tiers under the direction
//! of a tier policy. Rendering happens at most once per generation: any tier
//! transition or handle unmount resets the `rendered` flag and bumps the
//! generation, and paint steps from an older generation are dropped.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::geometry::{
    normalize_pixel_ratio, ContainerProperties, PageDimensions, RenderGeometry, Rotation, SizeMode,
    Viewport,
};
use crate::host::{
    ContainerHandle, LayerFragment, LayerHandle, OffscreenSurface, SurfaceHandle, VectorHandle,
};
use crate::pipeline::{run_pipeline, Action, FrameScheduler, PaintStep};
use crate::renderer::PageRenderer;
use crate::tracker::TrackedTarget;
use crate::Result;

/// Materialization tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// Placeholder only
    #[default]
    Cold,
    /// Sized, no content
    Warm,
    /// Fully rendered
    Hot,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "COLD",
            Self::Warm => "WARM",
            Self::Hot => "HOT",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How HOT page content is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Rasterized into a surface at the current scale
    #[default]
    Surface,
    /// Drawn once as a scale-invariant vector fragment; never redrawn on resize
    Vector,
}

/// Collaborators every render and resize pass needs
#[derive(Clone)]
pub struct RenderContext {
    pub renderer: Arc<dyn PageRenderer>,
    pub frames: Arc<dyn FrameScheduler>,
    /// Device pixel ratio; normalized to 1 when missing or invalid
    pub pixel_ratio: f64,
}

impl RenderContext {
    pub fn new(renderer: Arc<dyn PageRenderer>, frames: Arc<dyn FrameScheduler>) -> Self {
        Self {
            renderer,
            frames,
            pixel_ratio: 1.0,
        }
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = normalize_pixel_ratio(pixel_ratio);
        self
    }
}

/// Disconnected snapshot of a page, safe to hand to hosts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub id: String,
    pub index: usize,
    pub tier: Tier,
    pub page_number: u32,
    pub row: usize,
    pub column: usize,
    pub scale: Option<f64>,
    pub rotation: Rotation,
    pub aspect_ratio: Option<f64>,
}

/// Result of one compute action; slots are index-aligned with paint steps
#[derive(Debug)]
enum ComputeOutput {
    Geometry(Viewport),
    Surface(OffscreenSurface),
    Vector(LayerFragment),
    TextLayer(LayerFragment),
    AnnotationLayer(LayerFragment),
    Skipped,
}

const GEOMETRY_SLOT: usize = 0;
const SURFACE_SLOT: usize = 1;
const TEXT_SLOT: usize = 2;
const ANNOTATION_SLOT: usize = 3;

struct PageState {
    tier: Tier,
    rotation: Rotation,
    size_mode: SizeMode,
    scale_factor: Option<f64>,
    aspect_ratio: Option<f64>,
    rendered: bool,
    generation: u64,
    row: usize,
    column: usize,
    container: Option<Arc<dyn ContainerHandle>>,
    surface: Option<Arc<dyn SurfaceHandle>>,
    vector: Option<Arc<dyn VectorHandle>>,
    text_layer: Option<Arc<dyn LayerHandle>>,
    annotation_layer: Option<Arc<dyn LayerHandle>>,
}

impl PageState {
    fn invalidate(&mut self) {
        self.rendered = false;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Inputs to a render or resize pass, captured under one lock
struct Snapshot {
    container: Arc<dyn ContainerHandle>,
    tier: Tier,
    rotation: Rotation,
    size_mode: SizeMode,
    scale_factor: Option<f64>,
    generation: u64,
    has_surface: bool,
    has_vector: bool,
    has_text_layer: bool,
    has_annotation_layer: bool,
}

/// One document page
pub struct Page {
    id: String,
    index: usize,
    page_number: u32,
    label: Option<String>,
    render_mode: RenderMode,
    tier_tx: watch::Sender<Tier>,
    state: Mutex<PageState>,
}

impl Page {
    /// Create a COLD page; `index` is 0-relative
    pub fn new(id: impl Into<String>, index: usize, size_mode: SizeMode) -> Self {
        let (tier_tx, _) = watch::channel(Tier::Cold);
        Self {
            id: id.into(),
            index,
            page_number: index as u32 + 1,
            label: None,
            render_mode: RenderMode::Surface,
            tier_tx,
            state: Mutex::new(PageState {
                tier: Tier::Cold,
                rotation: Rotation::NONE,
                size_mode,
                scale_factor: None,
                aspect_ratio: None,
                rendered: false,
                generation: 0,
                row: 0,
                column: 0,
                container: None,
                surface: None,
                vector: None,
                text_layer: None,
                annotation_layer: None,
            }),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_render_mode(mut self, render_mode: RenderMode) -> Self {
        self.render_mode = render_mode;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Display label, e.g. "iii"; falls back to the page number
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.page_number.to_string())
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn tier(&self) -> Tier {
        self.state().tier
    }

    pub fn is(&self, tier: Tier) -> bool {
        self.tier() == tier
    }

    /// Observe tier changes
    pub fn subscribe_tier(&self) -> watch::Receiver<Tier> {
        self.tier_tx.subscribe()
    }

    pub fn rotation(&self) -> Rotation {
        self.state().rotation
    }

    pub fn size_mode(&self) -> SizeMode {
        self.state().size_mode
    }

    pub fn set_size_mode(&self, size_mode: SizeMode) {
        self.state().size_mode = size_mode;
    }

    pub fn scale_factor(&self) -> Option<f64> {
        self.state().scale_factor
    }

    /// Explicit scale used by [`SizeMode::Scale`]
    pub fn set_scale_factor(&self, scale: f64) {
        self.state().scale_factor = Some(scale);
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        self.state().aspect_ratio
    }

    pub fn is_rendered(&self) -> bool {
        self.state().rendered
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Grid placement, 1-relative
    pub fn grid(&self) -> (usize, usize) {
        let state = self.state();
        (state.row, state.column)
    }

    pub fn set_grid(&self, row: usize, column: usize) {
        let mut state = self.state();
        state.row = row;
        state.column = column;
    }

    pub fn has_container(&self) -> bool {
        self.state().container.is_some()
    }

    pub fn hot(&self, rotation: Option<Rotation>) {
        self.transition(Tier::Hot, Some(rotation.unwrap_or_default()));
    }

    pub fn warm(&self, rotation: Option<Rotation>) {
        self.transition(Tier::Warm, Some(rotation.unwrap_or_default()));
    }

    pub fn cold(&self) {
        self.transition(Tier::Cold, None);
    }

    fn transition(&self, tier: Tier, rotation: Option<Rotation>) {
        {
            let mut state = self.state();
            state.tier = tier;
            if let Some(rotation) = rotation {
                state.rotation = rotation;
            }
            state.invalidate();
            trace!(page = self.page_number, %tier, generation = state.generation, "Tier transition");
        }
        self.tier_tx.send_replace(tier);
    }

    pub fn mount_container(&self, handle: Option<Arc<dyn ContainerHandle>>) {
        let mut state = self.state();
        mount(&mut state, handle, |s| &mut s.container, self.page_number, "container");
    }

    pub fn mount_surface(&self, handle: Option<Arc<dyn SurfaceHandle>>) {
        let mut state = self.state();
        mount(&mut state, handle, |s| &mut s.surface, self.page_number, "surface");
    }

    /// Vector target; only drawn into in [`RenderMode::Vector`]
    pub fn mount_vector(&self, handle: Option<Arc<dyn VectorHandle>>) {
        let mut state = self.state();
        mount(&mut state, handle, |s| &mut s.vector, self.page_number, "vector");
    }

    pub fn mount_text_layer(&self, handle: Option<Arc<dyn LayerHandle>>) {
        let mut state = self.state();
        mount(&mut state, handle, |s| &mut s.text_layer, self.page_number, "text");
    }

    pub fn mount_annotation_layer(&self, handle: Option<Arc<dyn LayerHandle>>) {
        let mut state = self.state();
        mount(
            &mut state,
            handle,
            |s| &mut s.annotation_layer,
            self.page_number,
            "annotation",
        );
    }

    pub fn info(&self) -> PageInfo {
        let state = self.state();
        PageInfo {
            id: self.id.clone(),
            index: self.index,
            tier: state.tier,
            page_number: self.page_number,
            row: state.row,
            column: state.column,
            scale: state.scale_factor,
            rotation: state.rotation,
            aspect_ratio: state.aspect_ratio,
        }
    }

    /// Render the page for its current tier, once per generation.
    ///
    /// Returns after compute settles; paint lands on the next frame.
    pub async fn render(self: &Arc<Self>, ctx: &RenderContext) -> Result<()> {
        let snapshot = {
            let mut state = self.state();
            let Some(container) = state.container.clone() else {
                return Ok(());
            };
            if state.rendered {
                return Ok(());
            }
            state.rendered = true;
            Snapshot::capture(&state, container)
        };

        let geometry = RenderGeometry::prepare(
            ctx.renderer.as_ref(),
            self.page_number,
            snapshot.size_mode,
            snapshot.container.bounding_box(),
            snapshot.rotation,
            snapshot.scale_factor,
            ctx.pixel_ratio,
        )?;
        debug!(
            page = self.page_number,
            tier = %snapshot.tier,
            generation = snapshot.generation,
            scale = geometry.scale,
            "Rendering page"
        );

        let mut actions: Vec<Action<ComputeOutput>> = Vec::with_capacity(4);
        let mut paint: Vec<PaintStep<ComputeOutput>> = Vec::with_capacity(4);

        actions.push(self.geometry_action(&geometry, true));
        paint.push(self.properties_step(snapshot.generation, geometry.page));

        if snapshot.tier == Tier::Hot {
            match self.render_mode {
                RenderMode::Surface if snapshot.has_surface => {
                    actions.push(surface_action(ctx, self.page_number, &geometry));
                    paint.push(self.surface_step(snapshot.generation, &geometry));
                }
                RenderMode::Vector if snapshot.has_vector => {
                    actions.push(vector_action(ctx, self.page_number, geometry.viewport.rotation));
                    paint.push(self.vector_step(snapshot.generation));
                }
                _ => actions.push(skipped()),
            }

            if snapshot.has_text_layer {
                let renderer = ctx.renderer.clone();
                let (page_number, viewport) = (self.page_number, geometry.viewport);
                actions.push(Box::pin(async move {
                    let mut fragment = LayerFragment::new();
                    renderer
                        .render_text_layer(page_number, &viewport, &mut fragment)
                        .await?;
                    stamp_rotation(&mut fragment, viewport.rotation);
                    Ok(ComputeOutput::TextLayer(fragment))
                }));
                paint.push(self.layer_step(snapshot.generation, TEXT_SLOT));
            } else {
                actions.push(skipped());
            }

            if snapshot.has_annotation_layer {
                let renderer = ctx.renderer.clone();
                let (page_number, viewport) = (self.page_number, geometry.viewport);
                actions.push(Box::pin(async move {
                    let mut fragment = LayerFragment::new();
                    renderer
                        .render_annotation_layer(page_number, &viewport, &mut fragment)
                        .await?;
                    stamp_rotation(&mut fragment, viewport.rotation);
                    Ok(ComputeOutput::AnnotationLayer(fragment))
                }));
                paint.push(self.layer_step(snapshot.generation, ANNOTATION_SLOT));
            } else {
                actions.push(skipped());
            }
        }

        run_pipeline(actions, paint, ctx.frames.as_ref()).await
    }

    /// Recompute geometry after a container size change.
    ///
    /// Only runs on a rendered page. A HOT page with a mounted surface is
    /// re-rasterized when `redraw` is set; vector content is never redrawn.
    pub async fn resize(self: &Arc<Self>, ctx: &RenderContext, redraw: bool) -> Result<()> {
        let snapshot = {
            let state = self.state();
            let Some(container) = state.container.clone() else {
                return Ok(());
            };
            if !state.rendered {
                return Ok(());
            }
            Snapshot::capture(&state, container)
        };

        let geometry = RenderGeometry::prepare(
            ctx.renderer.as_ref(),
            self.page_number,
            snapshot.size_mode,
            snapshot.container.bounding_box(),
            snapshot.rotation,
            snapshot.scale_factor,
            ctx.pixel_ratio,
        )?;
        debug!(page = self.page_number, redraw, scale = geometry.scale, "Resizing page");

        let mut actions: Vec<Action<ComputeOutput>> = Vec::with_capacity(2);
        let mut paint: Vec<PaintStep<ComputeOutput>> = Vec::with_capacity(2);

        actions.push(self.geometry_action(&geometry, false));
        paint.push(self.properties_step(snapshot.generation, geometry.page));

        if snapshot.tier == Tier::Hot
            && self.render_mode == RenderMode::Surface
            && snapshot.has_surface
            && redraw
        {
            actions.push(surface_action(ctx, self.page_number, &geometry));
            paint.push(self.surface_step(snapshot.generation, &geometry));
        }

        run_pipeline(actions, paint, ctx.frames.as_ref()).await
    }

    /// Update scale and viewport properties for a target box right away.
    ///
    /// Meant to be called from a frame callback while a resize burst is still
    /// being debounced.
    pub fn resize_sync(&self, renderer: &dyn PageRenderer, width: f64, height: f64) -> Result<()> {
        let (container, size_mode, rotation, scale_factor) = {
            let state = self.state();
            let Some(container) = state.container.clone() else {
                return Ok(());
            };
            if !state.rendered {
                return Ok(());
            }
            (container, state.size_mode, state.rotation, state.scale_factor)
        };

        let viewport = renderer.viewport(
            self.page_number,
            size_mode,
            width,
            height,
            rotation,
            scale_factor,
        )?;
        apply_properties(container.as_ref(), &ContainerProperties::scale_only(&viewport));
        Ok(())
    }

    /// Slot 0: record scale and aspect ratio; on render, pre-size the surface
    /// or vector target so it shows at the right size before drawing starts
    fn geometry_action(self: &Arc<Self>, geometry: &RenderGeometry, presize: bool) -> Action<ComputeOutput> {
        let page = Arc::clone(self);
        let geometry = *geometry;
        Box::pin(async move {
            let (tier, surface, vector) = {
                let mut state = page.state();
                state.scale_factor = Some(geometry.scale);
                state.aspect_ratio = Some(geometry.page.aspect_ratio);
                (state.tier, state.surface.clone(), state.vector.clone())
            };
            if let (true, RenderMode::Vector, Some(vector)) = (presize, page.render_mode, vector) {
                vector.set_size(geometry.css_width, geometry.css_height);
            }
            if let (true, RenderMode::Surface, Some(surface)) = (presize, page.render_mode, surface) {
                let css = (geometry.css_width, geometry.css_height);
                if tier == Tier::Warm || surface.size() != css {
                    // resizing clears the surface
                    surface.set_size(css.0, css.1);
                }
            }
            Ok(ComputeOutput::Geometry(geometry.viewport))
        })
    }

    fn properties_step(
        self: &Arc<Self>,
        generation: u64,
        dimensions: PageDimensions,
    ) -> PaintStep<ComputeOutput> {
        let page = Arc::clone(self);
        Box::new(move |results: &[ComputeOutput]| {
            let Some(ComputeOutput::Geometry(viewport)) = results.get(GEOMETRY_SLOT) else {
                return;
            };
            if let Some(container) = page.paint_target(generation, "container", |s| s.container.clone()) {
                let properties = ContainerProperties::scale_only(viewport).with_page(&dimensions);
                apply_properties(container.as_ref(), &properties);
            }
        })
    }

    fn surface_step(self: &Arc<Self>, generation: u64, geometry: &RenderGeometry) -> PaintStep<ComputeOutput> {
        let page = Arc::clone(self);
        let (width, height) = (geometry.pixel_width, geometry.pixel_height);
        Box::new(move |results: &[ComputeOutput]| {
            let Some(ComputeOutput::Surface(local)) = results.get(SURFACE_SLOT) else {
                return;
            };
            if let Some(surface) = page.paint_target(generation, "surface", |s| s.surface.clone()) {
                surface.set_size(width, height);
                surface.draw(local);
            }
        })
    }

    fn vector_step(self: &Arc<Self>, generation: u64) -> PaintStep<ComputeOutput> {
        let page = Arc::clone(self);
        Box::new(move |results: &[ComputeOutput]| {
            let Some(ComputeOutput::Vector(fragment)) = results.get(SURFACE_SLOT) else {
                return;
            };
            if let Some(vector) = page.paint_target(generation, "vector", |s| s.vector.clone()) {
                vector.replace(fragment.clone());
            }
        })
    }

    fn layer_step(self: &Arc<Self>, generation: u64, slot: usize) -> PaintStep<ComputeOutput> {
        let page = Arc::clone(self);
        Box::new(move |results: &[ComputeOutput]| {
            let (fragment, target) = match results.get(slot) {
                Some(ComputeOutput::TextLayer(fragment)) => (
                    fragment,
                    page.paint_target(generation, "text", |s| s.text_layer.clone()),
                ),
                Some(ComputeOutput::AnnotationLayer(fragment)) => (
                    fragment,
                    page.paint_target(generation, "annotation", |s| s.annotation_layer.clone()),
                ),
                _ => return,
            };
            if let Some(layer) = target {
                layer.replace(fragment.clone());
            }
        })
    }

    /// Handle to paint into, or `None` if the page moved on since compute
    fn paint_target<H: ?Sized>(
        &self,
        generation: u64,
        what: &'static str,
        pick: impl FnOnce(&PageState) -> Option<Arc<H>>,
    ) -> Option<Arc<H>> {
        let state = self.state();
        if state.generation != generation {
            debug!(
                page = self.page_number,
                what,
                stale = generation,
                current = state.generation,
                "Dropping stale paint"
            );
            return None;
        }
        let handle = pick(&state);
        if handle.is_none() {
            debug!(page = self.page_number, what, "Handle unmounted before paint");
        }
        handle
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PageState> {
        crate::lock(&self.state)
    }
}

impl Snapshot {
    fn capture(state: &PageState, container: Arc<dyn ContainerHandle>) -> Self {
        Self {
            container,
            tier: state.tier,
            rotation: state.rotation,
            size_mode: state.size_mode,
            scale_factor: state.scale_factor,
            generation: state.generation,
            has_surface: state.surface.is_some(),
            has_vector: state.vector.is_some(),
            has_text_layer: state.text_layer.is_some(),
            has_annotation_layer: state.annotation_layer.is_some(),
        }
    }
}

/// Swap a mount slot. Re-mounting the same handle is a no-op; removing or
/// replacing a handle invalidates the current render.
fn mount<H: ?Sized>(
    state: &mut PageState,
    handle: Option<Arc<H>>,
    slot: impl Fn(&mut PageState) -> &mut Option<Arc<H>>,
    page_number: u32,
    what: &'static str,
) {
    let current = slot(state);
    let unchanged = match (current.as_ref(), handle.as_ref()) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    };
    if unchanged {
        return;
    }
    let replaced = current.is_some();
    *current = handle;
    if replaced {
        state.invalidate();
    }
    trace!(page = page_number, what, replaced, generation = state.generation, "Mount changed");
}

fn surface_action(ctx: &RenderContext, page_number: u32, geometry: &RenderGeometry) -> Action<ComputeOutput> {
    let renderer = ctx.renderer.clone();
    let geometry = *geometry;
    Box::pin(async move {
        let mut local = OffscreenSurface::new(geometry.pixel_width, geometry.pixel_height);
        renderer
            .render_surface(
                page_number,
                &geometry.raster_viewport,
                &mut local,
                geometry.pixel_ratio,
            )
            .await?;
        Ok(ComputeOutput::Surface(local))
    })
}

/// Vector content is drawn at scale 1 and scaled by the host
fn vector_action(ctx: &RenderContext, page_number: u32, rotation: Rotation) -> Action<ComputeOutput> {
    let renderer = ctx.renderer.clone();
    Box::pin(async move {
        let mut fragment = LayerFragment::new();
        renderer.render_vector(page_number, &mut fragment).await?;
        stamp_rotation(&mut fragment, rotation);
        Ok(ComputeOutput::Vector(fragment))
    })
}

fn skipped() -> Action<ComputeOutput> {
    Box::pin(async { Ok(ComputeOutput::Skipped) })
}

fn stamp_rotation(fragment: &mut LayerFragment, rotation: Rotation) {
    fragment
        .attributes
        .entry(LayerFragment::MAIN_ROTATION.to_string())
        .or_insert_with(|| rotation.to_string());
}

fn apply_properties(container: &dyn ContainerHandle, properties: &ContainerProperties) {
    for (name, value) in properties.entries() {
        container.set_property(name, &value);
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Page {}

impl Hash for Page {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("page_number", &self.page_number)
            .field("tier", &state.tier)
            .field("rendered", &state.rendered)
            .field("generation", &state.generation)
            .finish()
    }
}

impl TrackedTarget for Arc<Page> {
    /// A page stays interesting to observers while its container is mounted
    fn is_live(&self) -> bool {
        self.has_container()
    }
}
