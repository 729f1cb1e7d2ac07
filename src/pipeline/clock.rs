//! Frame clocks: what decides when the pump ticks

use std::future::Future;
use std::time::Duration;

use flume::{Receiver, Sender};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Resolves once per displayable frame; `None` when the clock has stopped.
/// Clones start fresh so each session run gets its own schedule.
pub trait FrameClock: Clone + Send + 'static {
    fn next_frame(&mut self) -> impl Future<Output = Option<Instant>> + Send;
}

/// Fixed-rate clock. Late ticks are skipped, not bunched up.
#[derive(Debug)]
pub struct IntervalClock {
    period: Duration,
    interval: Option<Interval>,
}

/// tokio intervals reject a zero period
const MIN_PERIOD: Duration = Duration::from_millis(1);

impl IntervalClock {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            interval: None,
        }
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / fps.max(1) as f64))
    }
}

impl Clone for IntervalClock {
    fn clone(&self) -> Self {
        Self::new(self.period)
    }
}

impl FrameClock for IntervalClock {
    async fn next_frame(&mut self) -> Option<Instant> {
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        Some(interval.tick().await)
    }
}

/// Clock driven by hand through a [`ManualTicker`]
#[derive(Clone)]
pub struct ManualClock {
    rx: Receiver<()>,
}

/// Fires ticks on a [`ManualClock`]; dropping every ticker stops the clock.
#[derive(Clone)]
pub struct ManualTicker {
    tx: Sender<()>,
}

impl ManualClock {
    pub fn pair() -> (ManualTicker, ManualClock) {
        let (tx, rx) = flume::unbounded();
        (ManualTicker { tx }, ManualClock { rx })
    }
}

impl ManualTicker {
    /// Queue one tick. False if the clock is gone.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl FrameClock for ManualClock {
    async fn next_frame(&mut self) -> Option<Instant> {
        self.rx.recv_async().await.ok().map(|()| Instant::now())
    }
}
