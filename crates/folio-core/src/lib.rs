//! Page virtualization and render scheduling for long paginated documents.
//!
//! Pages move between COLD, WARM and HOT tiers as the reader scrolls; only HOT
//! pages hold rasterized surfaces and text/annotation layers. Rendering is a
//! two-phase pipeline (concurrent compute, single-frame paint) and observer
//! streams are debounced before they trigger work.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod config;
pub mod error;
pub mod geometry;
pub mod host;
pub mod layout;
pub mod page;
pub mod pipeline;
pub mod policy;
pub mod renderer;
pub mod tracker;
pub mod viewer;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use geometry::{BoxSize, IntrinsicSize, PageDimensions, Rotation, SizeMode, Viewport};
pub use host::{
    ContainerHandle, LayerFragment, LayerHandle, LayerNode, OffscreenSurface, SurfaceHandle,
    VectorHandle,
};
pub use layout::{Direction, Extent, Tile, TileConfiguration};
pub use page::{Page, PageInfo, RenderContext, RenderMode, Tier};
pub use pipeline::{FrameLoop, FrameQueue, FrameScheduler, ImmediateFrames};
pub use policy::{Proximity, Range, Scroll, TierAssignment, TierPolicy};
pub use renderer::{LinkService, PageBackend, PageCache, PageRenderer};
pub use tracker::{ResizeConfiguration, ResizeSample, ScrollConfiguration, UpsizePolicy};
pub use viewer::{RenderSummary, ResizeInfo, Viewer, ViewerEvent};

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
