//! Debounced observer tracking
//!
//! Hosts forward resize and intersection observations as they arrive. The
//! trackers accumulate them and, once the stream has been quiet for the
//! configured trigger time, report a single batch of changes.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::{debug, error, trace};

use crate::{Error, Result};

/// Key the trackers accumulate observations for
pub trait TrackedTarget: Clone + Eq + Hash + Send + Sync + 'static {
    /// False once the target can no longer be acted on
    fn is_live(&self) -> bool;
}

struct Slot {
    token: u64,
    handle: Option<AbortHandle>,
}

/// Single deferred callback. Scheduling again before it fires replaces it.
pub struct Trigger {
    slot: Arc<Mutex<Slot>>,
}

impl Trigger {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                token: 0,
                handle: None,
            })),
        }
    }

    /// Run `callback` after `delay`, cancelling a pending callback.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = crate::lock(&self.slot);
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        slot.token = slot.token.wrapping_add(1);
        let token = slot.token;

        let shared = Arc::clone(&self.slot);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = crate::lock(&shared);
                if slot.token != token {
                    return;
                }
                // fired: a later schedule must not abort this run
                slot.handle = None;
            }
            callback().await;
        });
        slot.handle = Some(task.abort_handle());
    }

    /// Cancel a pending callback without running it
    pub fn reset(&self) {
        let mut slot = crate::lock(&self.slot);
        slot.token = slot.token.wrapping_add(1);
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        crate::lock(&self.slot).handle.is_some()
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        self.reset();
    }
}

fn validate_trigger_time(trigger_time_ms: u64) -> Result<Duration> {
    if trigger_time_ms == 0 {
        return Err(Error::invalid_argument("triggerTime: must be GT zero"));
    }
    Ok(Duration::from_millis(trigger_time_ms))
}

/// How the `upsize` flag of a resize diff is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsizePolicy {
    /// Grew in both directions
    #[default]
    Strict,
    /// Grew in either direction
    Lenient,
}

impl UpsizePolicy {
    pub fn is_upsize(&self, db: f64, di: f64) -> bool {
        match self {
            Self::Strict => db > 0.0 && di > 0.0,
            Self::Lenient => db > 0.0 || di > 0.0,
        }
    }
}

/// When pages see new sizes during a resize burst
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Only after the burst settles
    #[default]
    Deferred,
    /// Visible pages also get a scale-only update on every frame of the burst
    Dynamic { root_margin: Option<String> },
}

/// Resize tolerance and debounce settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeConfiguration {
    delta_inline: u32,
    delta_block: u32,
    trigger_time: Duration,
    upsize: UpsizePolicy,
    mode: ResizeMode,
}

impl ResizeConfiguration {
    /// Tolerances are in device pixels; `trigger_time_ms` must be GT zero
    pub fn new(delta_inline: u32, delta_block: u32, trigger_time_ms: u64) -> Result<Self> {
        Ok(Self {
            delta_inline,
            delta_block,
            trigger_time: validate_trigger_time(trigger_time_ms)?,
            upsize: UpsizePolicy::default(),
            mode: ResizeMode::default(),
        })
    }

    pub fn with_upsize(mut self, upsize: UpsizePolicy) -> Self {
        self.upsize = upsize;
        self
    }

    pub fn with_mode(mut self, mode: ResizeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn delta_inline(&self) -> u32 {
        self.delta_inline
    }

    pub fn delta_block(&self) -> u32 {
        self.delta_block
    }

    pub fn trigger_time(&self) -> Duration {
        self.trigger_time
    }

    pub fn upsize(&self) -> UpsizePolicy {
        self.upsize
    }

    pub fn mode(&self) -> &ResizeMode {
        &self.mode
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.mode, ResizeMode::Dynamic { .. })
    }
}

impl Default for ResizeConfiguration {
    fn default() -> Self {
        Self {
            delta_inline: 4,
            delta_block: 4,
            trigger_time: Duration::from_millis(100),
            upsize: UpsizePolicy::default(),
            mode: ResizeMode::default(),
        }
    }
}

/// Observed content box, in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResizeSample {
    pub inline_size: f64,
    pub block_size: f64,
}

impl ResizeSample {
    pub fn new(inline_size: f64, block_size: f64) -> Self {
        Self {
            inline_size,
            block_size,
        }
    }
}

/// Change between the last acted-on size and the latest one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeDelta {
    pub db: f64,
    pub di: f64,
}

/// A target whose size moved beyond tolerance
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeDiff<K> {
    pub target: K,
    pub db: f64,
    pub di: f64,
    pub upsize: bool,
}

struct ResizeState<K> {
    /// Latest sample per key for the current burst, in first-seen order
    active: Vec<(K, ResizeSample)>,
    last_known: HashMap<K, ResizeSample>,
}

impl<K: TrackedTarget> ResizeState<K> {
    fn compute(&mut self, config: &ResizeConfiguration) -> Vec<ResizeDiff<K>> {
        let mut diffs = Vec::new();
        for (key, sample) in &self.active {
            let Some(known) = self.last_known.get(key) else {
                trace!("First sample, committing baseline");
                self.last_known.insert(key.clone(), *sample);
                continue;
            };
            let db = sample.block_size - known.block_size;
            let di = sample.inline_size - known.inline_size;
            if db.abs() > config.delta_block as f64 || di.abs() > config.delta_inline as f64 {
                diffs.push(ResizeDiff {
                    target: key.clone(),
                    db,
                    di,
                    upsize: config.upsize.is_upsize(db, di),
                });
                self.last_known.insert(key.clone(), *sample);
            }
        }
        diffs
    }
}

/// Accumulates resize observations and reports sizes that moved beyond
/// tolerance once the stream settles
pub struct ResizeTracker<K> {
    state: Arc<Mutex<ResizeState<K>>>,
    trigger: Trigger,
}

impl<K: TrackedTarget> ResizeTracker<K> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ResizeState {
                active: Vec::new(),
                last_known: HashMap::new(),
            })),
            trigger: Trigger::new(),
        }
    }

    /// Record the latest size for a key
    pub fn track(&self, key: K, sample: ResizeSample) {
        let mut state = crate::lock(&self.state);
        match state.active.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = sample,
            None => state.active.push((key, sample)),
        }
    }

    /// Diff the burst against the last known sizes, committing what moved
    pub fn compute(&self, config: &ResizeConfiguration) -> Vec<ResizeDiff<K>> {
        crate::lock(&self.state).compute(config)
    }

    /// Pending change for a key, if it has both a baseline and a new sample
    pub fn delta(&self, key: &K) -> Option<ResizeDelta> {
        let state = crate::lock(&self.state);
        let (_, sample) = state.active.iter().find(|(k, _)| k == key)?;
        let known = state.last_known.get(key)?;
        Some(ResizeDelta {
            db: sample.block_size - known.block_size,
            di: sample.inline_size - known.inline_size,
        })
    }

    /// Samples of the burst still being debounced
    pub fn active(&self) -> Vec<(K, ResizeSample)> {
        crate::lock(&self.state).active.clone()
    }

    /// (Re)arm the debounce timer. When it fires, the burst is diffed, live
    /// targets that moved are passed to `callback`.
    pub fn track_complete<F, Fut>(&self, config: &ResizeConfiguration, callback: F)
    where
        F: FnOnce(Vec<ResizeDiff<K>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let config = config.clone();
        self.trigger.schedule(config.trigger_time(), move || async move {
            let diffs = {
                let mut state = crate::lock(&state);
                let diffs = state.compute(&config);
                state.active.clear();
                diffs
            };
            let live: Vec<ResizeDiff<K>> = diffs.into_iter().filter(|d| d.target.is_live()).collect();
            if live.is_empty() {
                return;
            }
            debug!(count = live.len(), "Resize burst settled");
            if let Err(e) = callback(live).await {
                let failure = Error::ObserverCallbackFailure(e.to_string());
                error!("{}", failure);
            }
        });
    }

    /// Forget all sizes and cancel a pending callback
    pub fn reset(&self) {
        {
            let mut state = crate::lock(&self.state);
            state.active.clear();
            state.last_known.clear();
        }
        self.trigger.reset();
    }

    pub fn is_pending(&self) -> bool {
        self.trigger.is_pending()
    }
}

impl<K: TrackedTarget> Default for ResizeTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Intersection debounce settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollConfiguration {
    root_margin: Option<String>,
    trigger_time: Duration,
}

impl ScrollConfiguration {
    pub fn new(root_margin: Option<String>, trigger_time_ms: u64) -> Result<Self> {
        Ok(Self {
            root_margin,
            trigger_time: validate_trigger_time(trigger_time_ms)?,
        })
    }

    /// Margin around the scroll root, CSS shorthand (top, right, bottom, left)
    pub fn root_margin(&self) -> Option<&str> {
        self.root_margin.as_deref()
    }

    pub fn trigger_time(&self) -> Duration {
        self.trigger_time
    }
}

impl Default for ScrollConfiguration {
    fn default() -> Self {
        Self {
            root_margin: None,
            trigger_time: Duration::from_millis(100),
        }
    }
}

/// Tracks which keys currently intersect the scroll root
pub struct ScrollTracker<K> {
    visible: Arc<Mutex<Vec<K>>>,
    trigger: Trigger,
}

impl<K: TrackedTarget> ScrollTracker<K> {
    pub fn new() -> Self {
        Self {
            visible: Arc::new(Mutex::new(Vec::new())),
            trigger: Trigger::new(),
        }
    }

    pub fn track(&self, key: K, is_intersecting: bool) {
        let mut visible = crate::lock(&self.visible);
        let position = visible.iter().position(|k| *k == key);
        match (is_intersecting, position) {
            (true, None) => visible.push(key),
            (false, Some(ix)) => {
                visible.remove(ix);
            }
            _ => {}
        }
    }

    /// Currently intersecting keys, in the order they became visible
    pub fn visible(&self) -> Vec<K> {
        crate::lock(&self.visible).clone()
    }

    /// (Re)arm the debounce timer; when it fires the live visible keys are
    /// passed to `callback`
    pub fn track_complete<F, Fut>(&self, config: &ScrollConfiguration, callback: F)
    where
        F: FnOnce(Vec<K>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let visible = Arc::clone(&self.visible);
        self.trigger.schedule(config.trigger_time(), move || async move {
            let keys: Vec<K> = crate::lock(&visible)
                .iter()
                .filter(|k| k.is_live())
                .cloned()
                .collect();
            debug!(count = keys.len(), "Visibility settled");
            if let Err(e) = callback(keys).await {
                let failure = Error::ObserverCallbackFailure(e.to_string());
                error!("{}", failure);
            }
        });
    }

    pub fn reset(&self) {
        crate::lock(&self.visible).clear();
        self.trigger.reset();
    }

    pub fn is_pending(&self) -> bool {
        self.trigger.is_pending()
    }
}

impl<K: TrackedTarget> Default for ScrollTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
