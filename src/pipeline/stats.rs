//! Pump counters shared with observers

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

/// Written by the pump, readable from anywhere
#[derive(Debug, Default)]
pub struct PumpStats {
    counters: CachePadded<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    frames_rendered: AtomicU64,
    frames_dropped: AtomicU64,
    overlays_drawn: AtomicU64,
    detections_issued: AtomicU64,
    detections_completed: AtomicU64,
    detections_failed: AtomicU64,
    render_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub frames_rendered: u64,
    pub frames_dropped: u64,
    pub overlays_drawn: u64,
    pub detections_issued: u64,
    pub detections_completed: u64,
    pub detections_failed: u64,
    pub render_errors: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl PumpStats {
    pub(crate) fn tick(&self) {
        bump(&self.counters.ticks, 1);
    }

    pub(crate) fn rendered(&self, overlays: usize) {
        bump(&self.counters.frames_rendered, 1);
        bump(&self.counters.overlays_drawn, overlays as u64);
    }

    pub(crate) fn dropped(&self, frames: usize) {
        if frames > 0 {
            bump(&self.counters.frames_dropped, frames as u64);
            metrics::counter!("frames_dropped").increment(frames as u64);
        }
    }

    pub(crate) fn detection_issued(&self) {
        bump(&self.counters.detections_issued, 1);
    }

    pub(crate) fn detection_completed(&self) {
        bump(&self.counters.detections_completed, 1);
    }

    pub(crate) fn detection_failed(&self) {
        bump(&self.counters.detections_failed, 1);
        metrics::counter!("detections_failed").increment(1);
    }

    pub(crate) fn render_error(&self) {
        bump(&self.counters.render_errors, 1);
        metrics::counter!("render_errors").increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            ticks: load(&c.ticks),
            frames_rendered: load(&c.frames_rendered),
            frames_dropped: load(&c.frames_dropped),
            overlays_drawn: load(&c.overlays_drawn),
            detections_issued: load(&c.detections_issued),
            detections_completed: load(&c.detections_completed),
            detections_failed: load(&c.detections_failed),
            render_errors: load(&c.render_errors),
        }
    }
}
