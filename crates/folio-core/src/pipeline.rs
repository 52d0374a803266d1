//! Two-phase render pipeline
//!
//! Compute actions run concurrently and may suspend; paint steps only mutate
//! host handles and run together inside a single frame callback once every
//! action has resolved.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{try_join_all, BoxFuture};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::{Error, Result};

/// Asynchronous compute step
pub type Action<T> = BoxFuture<'static, Result<T>>;

/// Synchronous paint step; receives the full, index-aligned result slice
pub type PaintStep<T> = Box<dyn FnOnce(&[T]) + Send>;

/// Work to run on the next frame boundary
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Source of frame boundaries for paint work
pub trait FrameScheduler: Send + Sync {
    fn request_frame(&self, callback: FrameCallback);
}

/// Run all actions concurrently, then schedule every paint step on one frame.
///
/// Returns once compute has settled; paint runs later on the frame. If any
/// action fails, the error is returned and no paint step runs.
pub async fn run_pipeline<T>(
    actions: Vec<Action<T>>,
    paint: Vec<PaintStep<T>>,
    frames: &dyn FrameScheduler,
) -> Result<()>
where
    T: Send + 'static,
{
    let results = try_join_all(actions).await?;
    trace!(results = results.len(), steps = paint.len(), "Compute settled");

    frames.request_frame(Box::new(move || {
        for step in paint {
            step(&results);
        }
    }));
    Ok(())
}

/// Frame callbacks queued until the host flushes them
#[derive(Default)]
pub struct FrameQueue {
    callbacks: Mutex<Vec<FrameCallback>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued callback. Callbacks requested while flushing wait for
    /// the next flush.
    pub fn flush(&self) -> usize {
        let callbacks = std::mem::take(&mut *crate::lock(&self.callbacks));
        let count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        count
    }

    pub fn pending(&self) -> usize {
        crate::lock(&self.callbacks).len()
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&self, callback: FrameCallback) {
        crate::lock(&self.callbacks).push(callback);
    }
}

/// Runs callbacks right away; for headless hosts
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateFrames;

impl FrameScheduler for ImmediateFrames {
    fn request_frame(&self, callback: FrameCallback) {
        callback();
    }
}

/// Flushes a [`FrameQueue`] on a fixed interval
pub struct FrameLoop {
    queue: Arc<FrameQueue>,
    interval: Duration,
}

impl FrameLoop {
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::invalid_argument("frame interval must be GT 0"));
        }
        Ok(Self {
            queue: Arc::new(FrameQueue::new()),
            interval,
        })
    }

    /// Queue to hand to pages and viewers as their frame scheduler
    pub fn queue(&self) -> Arc<FrameQueue> {
        self.queue.clone()
    }

    /// Flush frames until shutdown is signalled
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Frame loop started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let ran = self.queue.flush();
                    if ran > 0 {
                        trace!(callbacks = ran, "Frame flushed");
                    }
                }
            }
        }

        // paint work already requested still lands
        let ran = self.queue.flush();
        debug!(callbacks = ran, "Frame loop stopped");
    }

    /// Spawn the loop on the current runtime
    pub fn spawn(self) -> FrameLoopHandle {
        let queue = self.queue();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        FrameLoopHandle {
            queue,
            shutdown_tx,
            task,
        }
    }
}

/// Running [`FrameLoop`]
pub struct FrameLoopHandle {
    queue: Arc<FrameQueue>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FrameLoopHandle {
    pub fn queue(&self) -> Arc<FrameQueue> {
        self.queue.clone()
    }

    /// Signal shutdown and wait for the final flush
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
