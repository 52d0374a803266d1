//! Document viewer orchestration
//!
//! [`Viewer`] owns the pages of one loaded document. It applies tier policy
//! verdicts, lays the selected tile window out on the grid, drives render
//! passes and turns debounced observer batches into page resizes and
//! [`ViewerEvent`]s.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::geometry::{validate_scale, Rotation, SizeMode};
use crate::layout::TileConfiguration;
use crate::page::{Page, PageInfo, RenderContext, RenderMode, Tier};
use crate::pipeline::FrameScheduler;
use crate::policy::{select_tiles, TierAssignment, TierPolicy};
use crate::renderer::PageRenderer;
use crate::tracker::{
    ResizeConfiguration, ResizeDiff, ResizeSample, ResizeTracker, ScrollConfiguration,
    ScrollTracker,
};
use crate::{Error, Result};

/// Resize details for one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResizeInfo {
    pub page: PageInfo,
    pub di: f64,
    pub db: f64,
    pub upsize: bool,
    /// Whether the surface gets re-rasterized; hosts may rewrite this
    pub redraw: bool,
}

/// Events emitted by the viewer to notify the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ViewerEvent {
    /// Pages are about to be resized
    ResizePages { pages: Vec<ResizeInfo> },
    /// Pages have been resized and carry their new scale
    ResizeComplete { pages: Vec<ResizeInfo> },
    /// Pages currently intersecting the scroll root
    VisiblePages { pages: Vec<PageInfo> },
    /// A page failed to render or resize; other pages are unaffected
    RenderFailed { page: PageInfo, message: String },
}

impl ViewerEvent {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Host hook that may rewrite the `redraw` flags before pages are resized
pub type ResizeHook = Arc<dyn Fn(&mut [ResizeInfo]) + Send + Sync>;

/// Outcome of [`Viewer::render_pages`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    pub failed: usize,
}

/// Orchestrates the pages of one document
pub struct Viewer {
    ctx: RenderContext,
    tiles: TileConfiguration,
    size_mode: SizeMode,
    render_mode: RenderMode,
    scale: f64,
    resize_config: ResizeConfiguration,
    scroll_config: ScrollConfiguration,
    rotation: Rotation,
    pages: Vec<Arc<Page>>,
    resize: Arc<ResizeTracker<Arc<Page>>>,
    scroll: Arc<ScrollTracker<Arc<Page>>>,
    resize_hook: Option<ResizeHook>,
    event_tx: mpsc::UnboundedSender<ViewerEvent>,
}

impl Viewer {
    /// Create a viewer and the channel its events arrive on
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        frames: Arc<dyn FrameScheduler>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ViewerEvent>)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let viewer = Self {
            ctx: RenderContext::new(renderer, frames).with_pixel_ratio(config.render.pixel_ratio),
            tiles: config.tile_configuration()?,
            size_mode: config.layout.size_mode,
            render_mode: config.render.mode,
            scale: config.document_scale()?,
            resize_config: config.resize_configuration()?,
            scroll_config: config.scroll_configuration()?,
            rotation: Rotation::NONE,
            pages: Vec::new(),
            resize: Arc::new(ResizeTracker::new()),
            scroll: Arc::new(ScrollTracker::new()),
            resize_hook: None,
            event_tx,
        };
        Ok((viewer, event_rx))
    }

    pub fn set_resize_hook(&mut self, hook: ResizeHook) {
        self.resize_hook = Some(hook);
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn tiles(&self) -> &TileConfiguration {
        &self.tiles
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Document scale applied to pages in [`SizeMode::Scale`]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Materialize `page_count` COLD pages, replacing any loaded document.
    ///
    /// Page ids are `"{base_id}-page-{n}"`; a random base id is used when
    /// none is given. `labels` supplies display labels by index.
    pub fn load(
        &mut self,
        page_count: usize,
        size_mode: Option<SizeMode>,
        base_id: Option<&str>,
        labels: Option<&[String]>,
    ) {
        self.unload();

        let base_id = base_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let size_mode = size_mode.unwrap_or(self.size_mode);

        self.pages = (0..page_count)
            .map(|ix| {
                let page = Page::new(format!("{}-page-{}", base_id, ix + 1), ix, size_mode)
                    .with_render_mode(self.render_mode);
                if size_mode == SizeMode::Scale {
                    page.set_scale_factor(self.scale);
                }
                let page = match labels.and_then(|labels| labels.get(ix)) {
                    Some(label) => page.with_label(label.clone()),
                    None => page,
                };
                Arc::new(page)
            })
            .collect();

        let window = select_tiles(&self.pages, 0, self.tiles.total()).to_vec();
        self.place(&window);
        info!(pages = page_count, base_id = %base_id, "Document loaded");
    }

    /// Forget observer state and drop every page
    pub fn unload(&mut self) {
        self.resize.reset();
        self.scroll.reset();
        if !self.pages.is_empty() {
            debug!(pages = self.pages.len(), "Document unloaded");
        }
        self.pages.clear();
    }

    /// Apply a tier policy.
    ///
    /// Only pages whose tier or rotation changes are transitioned; pages the
    /// policy leaves out of range are untouched. Returns the tile window the
    /// host should materialize, already laid out on the grid.
    pub fn apply(&self, policy: &dyn TierPolicy) -> Vec<TierAssignment> {
        let scan = policy.execute(&self.pages);

        let mut changed = 0;
        for assignment in &scan {
            let Some(tier) = assignment.tier else {
                continue;
            };
            if self.transition(&assignment.page, tier) {
                changed += 1;
            }
        }

        let window = select_tiles(&scan, policy.tile_start(), self.tiles.total()).to_vec();
        let pages: Vec<Arc<Page>> = window.iter().map(|a| a.page.clone()).collect();
        self.place(&pages);
        debug!(
            changed,
            tile_start = policy.tile_start(),
            tiles = window.len(),
            "Tier policy applied"
        );
        window
    }

    /// Change the document rotation; every non-COLD page is re-transitioned
    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        for page in &self.pages {
            match page.tier() {
                Tier::Hot => page.hot(Some(rotation)),
                Tier::Warm => page.warm(Some(rotation)),
                Tier::Cold => {}
            }
        }
    }

    /// Change the document scale. Pages in [`SizeMode::Scale`] take it over
    /// and the non-COLD ones among them are re-transitioned.
    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        self.scale = validate_scale(Some(scale))?;
        for page in self.pages.iter().filter(|p| p.size_mode() == SizeMode::Scale) {
            page.set_scale_factor(scale);
            match page.tier() {
                Tier::Hot => page.hot(Some(self.rotation)),
                Tier::Warm => page.warm(Some(self.rotation)),
                Tier::Cold => {}
            }
        }
        debug!(scale, "Document scale changed");
        Ok(())
    }

    /// Render every mounted, not yet rendered page concurrently
    pub async fn render_pages(&self) -> RenderSummary {
        let targets: Vec<&Arc<Page>> = self
            .pages
            .iter()
            .filter(|page| page.has_container() && !page.is_rendered())
            .collect();
        let results = join_all(targets.iter().map(|page| page.render(&self.ctx))).await;

        let mut summary = RenderSummary::default();
        for (page, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => summary.rendered += 1,
                Err(e) => {
                    summary.failed += 1;
                    report_failure(&self.event_tx, page, e);
                }
            }
        }
        if summary.failed > 0 {
            warn!(rendered = summary.rendered, failed = summary.failed, "Render pass finished with failures");
        }
        summary
    }

    /// Feed container size observations, keyed by 1-relative page number
    pub fn observe_resize(&self, samples: impl IntoIterator<Item = (u32, ResizeSample)>) {
        for (page_number, sample) in samples {
            match self.page_by_number(page_number) {
                Some(page) => self.resize.track(page.clone(), sample),
                None => debug!(page = page_number, "Resize observed for unknown page"),
            }
        }

        if self.resize_config.is_dynamic() {
            self.request_dynamic_resize();
        }

        let ctx = self.ctx.clone();
        let event_tx = self.event_tx.clone();
        let hook = self.resize_hook.clone();
        self.resize
            .track_complete(&self.resize_config, move |diffs| async move {
                resize_pages(ctx, event_tx, hook, diffs).await;
                Ok(())
            });
    }

    /// Feed visibility observations, keyed by 1-relative page number
    pub fn observe_intersection(&self, entries: impl IntoIterator<Item = (u32, bool)>) {
        for (page_number, is_intersecting) in entries {
            match self.page_by_number(page_number) {
                Some(page) => self.scroll.track(page.clone(), is_intersecting),
                None => debug!(page = page_number, "Intersection observed for unknown page"),
            }
        }

        let event_tx = self.event_tx.clone();
        self.scroll
            .track_complete(&self.scroll_config, move |pages| async move {
                if !pages.is_empty() {
                    let pages = pages.iter().map(|page| page.info()).collect();
                    send_event(&event_tx, ViewerEvent::VisiblePages { pages });
                }
                Ok(())
            });
    }

    /// Pages currently intersecting the scroll root
    pub fn visible(&self) -> Vec<Arc<Page>> {
        self.scroll.visible()
    }

    pub fn pages(&self) -> &[Arc<Page>] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page by 0-relative index
    pub fn page(&self, index: usize) -> Option<&Arc<Page>> {
        self.pages.get(index)
    }

    /// Page by 1-relative page number
    pub fn page_by_number(&self, page_number: u32) -> Option<&Arc<Page>> {
        let index = (page_number as usize).checked_sub(1)?;
        self.pages.get(index)
    }

    pub fn info(&self, page_number: u32) -> Option<PageInfo> {
        self.page_by_number(page_number).map(|page| page.info())
    }

    fn transition(&self, page: &Page, tier: Tier) -> bool {
        let current = page.tier();
        if current == tier && (tier == Tier::Cold || page.rotation() == self.rotation) {
            return false;
        }
        match tier {
            Tier::Hot => page.hot(Some(self.rotation)),
            Tier::Warm => page.warm(Some(self.rotation)),
            Tier::Cold => page.cold(),
        }
        true
    }

    /// Lay `window` out on the grid in sequence order; other pages lose their
    /// placement
    fn place(&self, window: &[Arc<Page>]) {
        for page in &self.pages {
            page.set_grid(0, 0);
        }
        for (page, tile) in window.iter().zip(self.tiles.sequence()) {
            page.set_grid(tile.row + 1, tile.column + 1);
        }
    }

    /// Scale-only update of visible pages on the next frame, while the resize
    /// burst is still being debounced
    fn request_dynamic_resize(&self) {
        let resize = Arc::clone(&self.resize);
        let scroll = Arc::clone(&self.scroll);
        let renderer = self.ctx.renderer.clone();
        let pixel_ratio = self.ctx.pixel_ratio;

        self.ctx.frames.request_frame(Box::new(move || {
            let visible = scroll.visible();
            for (page, sample) in resize.active() {
                if !visible.contains(&page) {
                    continue;
                }
                let Some(delta) = resize.delta(&page) else {
                    continue;
                };
                if delta.db == 0.0 && delta.di == 0.0 {
                    continue;
                }
                // samples are device pixels
                let width = sample.inline_size / pixel_ratio;
                let height = sample.block_size / pixel_ratio;
                if let Err(e) = page.resize_sync(renderer.as_ref(), width, height) {
                    debug!(page = page.page_number(), error = %e, "Dynamic resize skipped");
                }
            }
        }));
    }
}

/// Settled resize burst: announce, resize, announce again with new scales
async fn resize_pages(
    ctx: RenderContext,
    event_tx: mpsc::UnboundedSender<ViewerEvent>,
    hook: Option<ResizeHook>,
    diffs: Vec<ResizeDiff<Arc<Page>>>,
) {
    let mut infos: Vec<ResizeInfo> = diffs
        .iter()
        .map(|diff| ResizeInfo {
            page: diff.target.info(),
            di: diff.di,
            db: diff.db,
            upsize: diff.upsize,
            redraw: diff.upsize,
        })
        .collect();
    if let Some(hook) = &hook {
        hook(&mut infos);
    }
    send_event(
        &event_tx,
        ViewerEvent::ResizePages {
            pages: infos.clone(),
        },
    );

    let results = join_all(diffs.iter().map(|diff| {
        let redraw = infos
            .iter()
            .find(|info| info.page.id == diff.target.id())
            .map_or(diff.upsize, |info| info.redraw);
        diff.target.resize(&ctx, redraw)
    }))
    .await;
    for (diff, result) in diffs.iter().zip(results) {
        if let Err(e) = result {
            report_failure(&event_tx, &diff.target, e);
        }
    }

    for info in infos.iter_mut() {
        if let Some(diff) = diffs.iter().find(|d| d.target.id() == info.page.id) {
            info.page = diff.target.info();
        }
    }
    debug!(pages = infos.len(), "Resize complete");
    send_event(&event_tx, ViewerEvent::ResizeComplete { pages: infos });
}

fn report_failure(event_tx: &mpsc::UnboundedSender<ViewerEvent>, page: &Page, error: Error) {
    let failure = match error {
        failure @ Error::RenderFailure { .. } => failure,
        other => Error::render_failure(page.page_number(), other.to_string()),
    };
    warn!(page = page.page_number(), error = %failure, "Page render failed");
    send_event(
        event_tx,
        ViewerEvent::RenderFailed {
            page: page.info(),
            message: failure.to_string(),
        },
    );
}

/// Send an event to the host (if it is still listening)
fn send_event(event_tx: &mpsc::UnboundedSender<ViewerEvent>, event: ViewerEvent) {
    if event_tx.send(event).is_err() {
        warn!("Failed to send viewer event: receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Direction, Extent};
    use crate::pipeline::{FrameQueue, ImmediateFrames};
    use crate::policy::{Proximity, Range, Scroll};
    use crate::testing::{MockContainer, MockRenderer};
    use std::time::Duration;

    fn viewer(
        renderer: Arc<MockRenderer>,
        frames: Arc<dyn FrameScheduler>,
        config: &EngineConfig,
    ) -> (Viewer, mpsc::UnboundedReceiver<ViewerEvent>) {
        Viewer::new(renderer, frames, config).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ViewerEvent>) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn mount(viewer: &Viewer, index: usize) -> Arc<MockContainer> {
        let container = MockContainer::new(306.0, 1000.0);
        viewer.pages()[index].mount_container(Some(container.clone()));
        container
    }

    #[tokio::test]
    async fn test_load_lays_out_single_column() {
        let config = EngineConfig::default();
        let (mut viewer, _rx) = viewer(MockRenderer::new(5), Arc::new(ImmediateFrames), &config);
        let labels: Vec<String> = ["i", "ii", "iii"].iter().map(|s| s.to_string()).collect();

        viewer.load(5, None, Some("doc"), Some(&labels));

        assert_eq!(viewer.page_count(), 5);
        let page = viewer.page_by_number(3).unwrap();
        assert_eq!(page.id(), "doc-page-3");
        assert_eq!(page.label(), "iii");
        assert_eq!(viewer.page(4).unwrap().label(), "5");
        assert_eq!(page.grid(), (3, 1));
        assert!(viewer.pages().iter().all(|p| p.is(Tier::Cold)));
        assert!(viewer.page_by_number(0).is_none());

        viewer.load(2, Some(SizeMode::Height), None, None);
        assert_eq!(viewer.page_count(), 2);
        assert!(viewer.page(0).unwrap().id().ends_with("-page-1"));
        assert_eq!(viewer.page(0).unwrap().size_mode(), SizeMode::Height);
    }

    #[tokio::test]
    async fn test_apply_only_transitions_changes() {
        let config = EngineConfig::default();
        let (mut viewer, _rx) = viewer(MockRenderer::new(15), Arc::new(ImmediateFrames), &config);
        viewer.load(15, None, Some("doc"), None);

        let window = viewer.apply(&Proximity::new(9, Some(4), Some(4)));
        assert_eq!(window.len(), 15);
        assert!(viewer.page(0).unwrap().is(Tier::Cold));
        assert!(viewer.page(9).unwrap().is(Tier::Hot));
        assert!(viewer.page(14).unwrap().is(Tier::Warm));

        let generations: Vec<u64> = viewer.pages().iter().map(|p| p.generation()).collect();
        viewer.apply(&Proximity::new(9, Some(4), Some(4)));
        let again: Vec<u64> = viewer.pages().iter().map(|p| p.generation()).collect();
        assert_eq!(generations, again);

        viewer.apply(&Range::new(0, 7).unwrap());
        viewer.apply(&Range::new(8, 10).unwrap());
        for (ix, page) in viewer.pages().iter().enumerate() {
            let expected = if (8..=10).contains(&ix) { Tier::Hot } else { Tier::Warm };
            assert_eq!(page.tier(), expected, "index {}", ix);
        }
    }

    #[tokio::test]
    async fn test_scroll_window_on_fixed_grid() {
        let mut config = EngineConfig::default();
        config.layout.direction = Direction::Row;
        config.layout.rows = Extent::Fixed(3);
        config.layout.columns = Extent::Fixed(3);
        let (mut viewer, _rx) = viewer(MockRenderer::new(20), Arc::new(ImmediateFrames), &config);
        viewer.load(20, None, Some("doc"), None);
        assert_eq!(viewer.page(8).unwrap().grid(), (3, 3));
        assert_eq!(viewer.page(9).unwrap().grid(), (0, 0));

        let window = viewer.apply(&Scroll::new(18, Range::new(18, 19).unwrap()));

        let indexes: Vec<usize> = window.iter().map(|a| a.page.index()).collect();
        assert_eq!(indexes, vec![18, 19]);
        assert_eq!(viewer.page(18).unwrap().grid(), (1, 1));
        assert_eq!(viewer.page(19).unwrap().grid(), (1, 2));
        assert_eq!(viewer.page(0).unwrap().grid(), (0, 0));
    }

    #[tokio::test]
    async fn test_set_rotation_retransitions() {
        let config = EngineConfig::default();
        let (mut viewer, _rx) = viewer(MockRenderer::new(6), Arc::new(ImmediateFrames), &config);
        viewer.load(6, None, Some("doc"), None);
        viewer.apply(&Proximity::new(0, Some(1), Some(1)));

        let rotation = Rotation::new(90).unwrap();
        viewer.set_rotation(rotation);

        assert_eq!(viewer.page(0).unwrap().rotation(), rotation);
        assert_eq!(viewer.page(2).unwrap().rotation(), rotation);
        assert!(viewer.page(2).unwrap().is(Tier::Warm));
        assert_eq!(viewer.page(5).unwrap().rotation(), Rotation::NONE);

        // same verdict under the new rotation changes nothing further
        let generation = viewer.page(0).unwrap().generation();
        viewer.apply(&Proximity::new(0, Some(1), Some(1)));
        assert_eq!(viewer.page(0).unwrap().generation(), generation);
    }

    #[tokio::test]
    async fn test_render_pages_contains_failures() {
        let config = EngineConfig::default();
        let renderer = MockRenderer::new(2);
        let (mut viewer, mut rx) = viewer(renderer.clone(), Arc::new(ImmediateFrames), &config);
        viewer.load(3, None, Some("doc"), None);
        viewer.apply(&Proximity::new(0, None, None));
        for ix in 0..3 {
            mount(&viewer, ix);
        }

        let summary = viewer.render_pages().await;

        assert_eq!(summary, RenderSummary { rendered: 2, failed: 1 });
        match drain(&mut rx).as_slice() {
            [ViewerEvent::RenderFailed { page, message }] => {
                assert_eq!(page.page_number, 3);
                assert!(message.contains("Page 3 not in cache"));
            }
            other => panic!("unexpected events: {:?}", other),
        }

        // rendered pages are not redone
        let summary = viewer.render_pages().await;
        assert_eq!(summary, RenderSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_flow() {
        let config = EngineConfig::default();
        let (mut viewer, mut rx) = viewer(MockRenderer::new(2), Arc::new(ImmediateFrames), &config);
        viewer.load(2, None, Some("doc"), None);
        viewer.apply(&Proximity::new(0, Some(0), None));
        let container = mount(&viewer, 0);
        viewer.render_pages().await;
        viewer.set_resize_hook(Arc::new(|infos: &mut [ResizeInfo]| {
            for info in infos.iter_mut() {
                info.redraw = false;
            }
        }));

        // first sample only sets the baseline
        viewer.observe_resize([(1, ResizeSample::new(306.0, 396.0))]);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(drain(&mut rx).is_empty());

        container.set_bounds(612.0, 1000.0);
        viewer.observe_resize([(1, ResizeSample::new(612.0, 792.0)), (9, ResizeSample::default())]);
        tokio::time::sleep(Duration::from_millis(150)).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        let ViewerEvent::ResizePages { pages } = &events[0] else {
            panic!("expected resize-pages, got {:?}", events[0]);
        };
        assert_eq!(pages.len(), 1);
        assert!(pages[0].upsize);
        assert!(!pages[0].redraw);
        assert_eq!(pages[0].page.scale, Some(0.5));

        let ViewerEvent::ResizeComplete { pages } = &events[1] else {
            panic!("expected resize-complete, got {:?}", events[1]);
        };
        assert_eq!(pages[0].page.scale, Some(1.0));
        assert_eq!(container.property("--viewport-width").as_deref(), Some("612"));
        assert!(events[1].to_json().unwrap().contains("\"event\":\"resize-complete\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_pages_event() {
        let config = EngineConfig::default();
        let (mut viewer, mut rx) = viewer(MockRenderer::new(4), Arc::new(ImmediateFrames), &config);
        viewer.load(4, None, Some("doc"), None);
        for ix in 0..3 {
            mount(&viewer, ix);
        }

        viewer.observe_intersection([(1, true), (2, true)]);
        viewer.observe_intersection([(3, true), (1, false), (4, true)]);
        tokio::time::sleep(Duration::from_millis(150)).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        let ViewerEvent::VisiblePages { pages } = &events[0] else {
            panic!("expected visible-pages, got {:?}", events[0]);
        };
        // page 4 has no container mounted
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert_eq!(viewer.visible().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dynamic_resize_updates_visible_pages() {
        let mut config = EngineConfig::default();
        config.resize.dynamic = true;
        let frames = Arc::new(FrameQueue::new());
        let (mut viewer, _rx) = viewer(MockRenderer::new(2), frames.clone(), &config);
        viewer.load(2, None, Some("doc"), None);
        viewer.apply(&Proximity::new(0, Some(0), None));
        let container = mount(&viewer, 0);
        viewer.render_pages().await;
        frames.flush();
        viewer.observe_intersection([(1, true)]);

        viewer.observe_resize([(1, ResizeSample::new(306.0, 396.0))]);
        tokio::time::sleep(Duration::from_millis(150)).await;
        frames.flush();
        assert_eq!(container.property("--scale-factor").as_deref(), Some("0.5000"));

        viewer.observe_resize([(1, ResizeSample::new(153.0, 198.0))]);
        frames.flush();
        assert_eq!(container.property("--scale-factor").as_deref(), Some("0.2500"));
        assert_eq!(container.property("--viewport-width").as_deref(), Some("153"));
    }

    #[tokio::test]
    async fn test_scale_mode_document() {
        let config = EngineConfig::default();
        let (mut viewer, mut rx) = viewer(MockRenderer::new(3), Arc::new(ImmediateFrames), &config);
        viewer.load(3, Some(SizeMode::Scale), Some("doc"), None);
        viewer.apply(&Proximity::new(0, None, None));
        let containers: Vec<_> = (0..3).map(|ix| mount(&viewer, ix)).collect();

        viewer.set_scale(0.5).unwrap();
        let summary = viewer.render_pages().await;

        assert_eq!(summary, RenderSummary { rendered: 3, failed: 0 });
        assert!(drain(&mut rx).is_empty());
        assert_eq!(containers[2].property("--scale-factor").as_deref(), Some("0.5000"));
        assert_eq!(containers[2].property("--viewport-width").as_deref(), Some("306"));

        viewer.set_scale(2.0).unwrap();
        assert!(viewer.pages().iter().all(|p| !p.is_rendered()));
        viewer.render_pages().await;
        assert_eq!(containers[0].property("--viewport-width").as_deref(), Some("1224"));
        assert_eq!(viewer.info(1).unwrap().scale, Some(2.0));

        assert!(matches!(viewer.set_scale(0.0), Err(Error::InvalidArgument(_))));
        assert!(matches!(viewer.set_scale(f64::NAN), Err(Error::InvalidArgument(_))));
        assert_eq!(viewer.scale(), 2.0);
    }

    #[tokio::test]
    async fn test_configured_scale_and_render_mode_reach_pages() {
        let mut config = EngineConfig::default();
        config.layout.size_mode = SizeMode::Scale;
        config.layout.scale = 1.5;
        config.render.mode = RenderMode::Vector;
        let (mut viewer, _rx) = viewer(MockRenderer::new(2), Arc::new(ImmediateFrames), &config);

        viewer.load(2, None, Some("doc"), None);

        let page = viewer.page(0).unwrap();
        assert_eq!(page.scale_factor(), Some(1.5));
        assert_eq!(page.render_mode(), RenderMode::Vector);

        // fit modes compute their own scale
        viewer.load(2, Some(SizeMode::Width), Some("doc"), None);
        assert_eq!(viewer.page(0).unwrap().scale_factor(), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config =
            EngineConfig::from_toml_str("[layout]\nrows = 4294967296\ncolumns = 4294967296\n").unwrap();
        assert!(matches!(
            Viewer::new(MockRenderer::new(1), Arc::new(ImmediateFrames), &config),
            Err(Error::Config(_))
        ));

        let mut config = EngineConfig::default();
        config.layout.scale = -1.0;
        assert!(matches!(
            Viewer::new(MockRenderer::new(1), Arc::new(ImmediateFrames), &config),
            Err(Error::Config(_))
        ));
    }
}
