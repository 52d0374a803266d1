//! Tier policies
//!
//! A policy looks at the page list and decides which tier each page should be
//! in. Policies are pure: they never touch the pages, the orchestrator applies
//! their verdicts.

use std::sync::Arc;

use crate::page::{Page, Tier};
use crate::{Error, Result};

/// Verdict for one page; `None` means out of range, leave the page alone
#[derive(Debug, Clone)]
pub struct TierAssignment {
    pub page: Arc<Page>,
    pub tier: Option<Tier>,
}

/// Strategy assigning a tier to every page
pub trait TierPolicy: Send + Sync {
    fn execute(&self, pages: &[Arc<Page>]) -> Vec<TierAssignment>;

    /// First scan entry to materialize as a tile
    fn tile_start(&self) -> usize {
        0
    }
}

/// Tier of a page by its distance from the reference page.
///
/// `hot` of `None` makes every in-range page HOT; `warm` of `None` makes every
/// page outside the HOT radius WARM.
pub fn zone(
    page_index: usize,
    ref_index: usize,
    page_count: usize,
    hot: Option<usize>,
    warm: Option<usize>,
) -> Option<Tier> {
    let distance = page_index.abs_diff(ref_index);
    if distance >= page_count {
        return None;
    }
    let Some(hot) = hot else {
        return Some(Tier::Hot);
    };
    if distance <= hot {
        return Some(Tier::Hot);
    }
    let Some(warm) = warm else {
        return Some(Tier::Warm);
    };
    if distance <= hot.saturating_add(warm) {
        return Some(Tier::Warm);
    }
    Some(Tier::Cold)
}

/// HOT/WARM/COLD bands centered on a focal page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proximity {
    ref_index: usize,
    hot: Option<usize>,
    warm: Option<usize>,
}

impl Proximity {
    /// `ref_index` is 0-relative
    pub fn new(ref_index: usize, hot: Option<usize>, warm: Option<usize>) -> Self {
        Self {
            ref_index,
            hot,
            warm,
        }
    }

    pub fn ref_index(&self) -> usize {
        self.ref_index
    }
}

impl TierPolicy for Proximity {
    fn execute(&self, pages: &[Arc<Page>]) -> Vec<TierAssignment> {
        let count = pages.len();
        pages
            .iter()
            .map(|page| TierAssignment {
                page: page.clone(),
                tier: zone(page.index(), self.ref_index, count, self.hot, self.warm),
            })
            .collect()
    }
}

/// Inclusive index range is HOT, everything else WARM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    start: usize,
    stop: usize,
}

impl Range {
    pub fn new(start: usize, stop: usize) -> Result<Self> {
        if stop < start {
            return Err(Error::invalid_argument(format!(
                "stop: must be GE start ({} < {})",
                stop, start
            )));
        }
        Ok(Self { start, stop })
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.stop).contains(&index)
    }
}

impl TierPolicy for Range {
    fn execute(&self, pages: &[Arc<Page>]) -> Vec<TierAssignment> {
        pages
            .iter()
            .map(|page| TierAssignment {
                page: page.clone(),
                tier: Some(if self.contains(page.index()) {
                    Tier::Hot
                } else {
                    Tier::Warm
                }),
            })
            .collect()
    }
}

/// Pages through a fixed grid a group of tiles at a time
pub struct Scroll<P> {
    tile_start: usize,
    inner: P,
}

impl<P: TierPolicy> Scroll<P> {
    pub fn new(tile_start: usize, inner: P) -> Self {
        Self { tile_start, inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: TierPolicy> TierPolicy for Scroll<P> {
    fn execute(&self, pages: &[Arc<Page>]) -> Vec<TierAssignment> {
        self.inner.execute(pages)
    }

    fn tile_start(&self) -> usize {
        self.tile_start
    }
}

/// Contiguous window of `count` entries starting at `start`, clipped to the
/// end of the scan. A `count` of `None` or 0 means the whole scan length.
pub fn select_tiles<T>(scan: &[T], start: usize, count: Option<usize>) -> &[T] {
    let count = match count {
        Some(n) if n > 0 => n,
        _ => scan.len(),
    };
    let begin = start.min(scan.len());
    let end = start.saturating_add(count).min(scan.len());
    &scan[begin..end]
}
