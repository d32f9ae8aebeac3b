//! Pacing between broadcast cycles.
//!
//! The cycle loop never sleeps directly; it asks a [`Ticker`] to wait.  In
//! production that is an [`IntervalTicker`] backed by `tokio::time`.  Tests
//! use a [`ManualTicker`] and fire each cycle explicitly, so they neither
//! depend on wall-clock timing nor wait out a real interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Waits for the next cycle.
#[async_trait]
pub trait Ticker: Send {
    /// Suspends until the next cycle is due.
    ///
    /// Returns `false` once the ticker has been cancelled; the caller must
    /// then stop its loop.
    async fn tick(&mut self) -> bool;
}

/// Sleeps a fixed interval between cycles and observes a shared shutdown flag.
pub struct IntervalTicker {
    period: Duration,
    running: Arc<AtomicBool>,
}

impl IntervalTicker {
    pub fn new(period: Duration, running: Arc<AtomicBool>) -> Self {
        Self { period, running }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        if !self.running.load(Ordering::Relaxed) {
            return false;
        }
        if self.period.is_zero() {
            // Still yield so a zero interval cannot starve other tasks.
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.period).await;
        }
        self.running.load(Ordering::Relaxed)
    }
}

/// Ticker that advances only when its [`ManualTrigger`] fires.
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Fires cycles on a [`ManualTicker`].  Dropping it cancels the ticker.
#[derive(Clone)]
pub struct ManualTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn new() -> (Self, ManualTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTrigger { tx })
    }
}

impl ManualTrigger {
    /// Releases one pending `tick()`.
    ///
    /// Returns `false` if the ticker has already been dropped.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
