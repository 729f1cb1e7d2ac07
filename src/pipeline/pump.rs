//! The per-frame scheduling loop.
//!
//! Each tick shows the newest camera frame with the most recent *completed*
//! landmarks, which may be a few frames old. Detection runs beside the loop
//! with at most one pass in flight; frames that arrive meanwhile are shown
//! with stale landmarks and never queued for detection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};

use crate::capture::{FrameFeed, VideoFrame};
use crate::detect::adapter::{DetectionOutcome, DetectorAdapter, HandLandmarker};
use crate::detect::landmarks::{Detections, LandmarkSet};
use crate::pipeline::clock::FrameClock;
use crate::pipeline::stats::{PumpStats, StatsSnapshot};
use crate::render::compositor::OverlayRenderer;
use crate::render::overlay::OverlayControls;
use crate::render::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Running flag was cleared; nothing more will be scheduled
    Stopped,
    /// Camera has not produced a frame yet
    NoFrame,
    Rendered { overlays: usize },
    /// Drawing failed this tick
    Skipped,
}

pub struct FramePump<D, S> {
    feed: FrameFeed,
    detector: DetectorAdapter<D>,
    renderer: OverlayRenderer,
    surface: S,
    overlay: OverlayControls,
    running: Arc<AtomicBool>,
    stats: Arc<PumpStats>,
    current: Option<VideoFrame>,
    cache: Option<Detections>,
    last_issued: Option<u64>,
}

impl<D: HandLandmarker, S: Surface> FramePump<D, S> {
    pub fn new(
        feed: FrameFeed,
        detector: DetectorAdapter<D>,
        renderer: OverlayRenderer,
        surface: S,
        overlay: OverlayControls,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            feed,
            detector,
            renderer,
            surface,
            overlay,
            running,
            stats: Arc::default(),
            current: None,
            cache: None,
            last_issued: None,
        }
    }

    pub fn stats(&self) -> Arc<PumpStats> {
        self.stats.clone()
    }

    /// Hands the next tick will draw with, if any are cached
    pub fn cached(&self) -> Option<&Detections> {
        self.cache.as_ref()
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.running.load(Ordering::Acquire) {
            return TickOutcome::Stopped;
        }
        self.stats.tick();
        self.absorb_detections();

        let (newest, skipped) = self.feed.latest();
        self.stats.dropped(skipped);
        if let Some(frame) = newest {
            self.current = Some(frame);
        }
        let Some(frame) = self.current.clone() else {
            return TickOutcome::NoFrame;
        };

        if !self.detector.is_in_flight()
            && self.last_issued != Some(frame.sequence())
            && self.detector.try_issue(&frame)
        {
            self.last_issued = Some(frame.sequence());
            self.stats.detection_issued();
        }

        if self
            .cache
            .as_ref()
            .is_some_and(|cached| cached.frame_size != frame.size())
        {
            debug!("Frame size changed, dropping cached landmarks");
            self.cache = None;
        }
        let hands: &[LandmarkSet] = self.cache.as_ref().map_or(&[], |c| &c.hands);

        let state = self.overlay.snapshot();
        let rendered = self
            .renderer
            .render(&mut self.surface, &frame, hands, &state)
            .and_then(|overlays| self.surface.present().map(|()| overlays));

        match rendered {
            Ok(overlays) => {
                self.stats.rendered(overlays);
                TickOutcome::Rendered { overlays }
            }
            Err(e) => {
                debug!("Skipping frame {}: {}", frame.sequence(), e);
                self.stats.render_error();
                TickOutcome::Skipped
            }
        }
    }

    fn absorb_detections(&mut self) {
        while let Some(outcome) = self.detector.poll() {
            match outcome {
                DetectionOutcome::Completed(detections) => {
                    trace!(
                        "Frame {}: {} hand(s)",
                        detections.frame_sequence,
                        detections.hands.len()
                    );
                    self.stats.detection_completed();
                    self.cache = Some(detections);
                }
                DetectionOutcome::Failed(e) => {
                    debug!("Keeping stale landmarks: {}", e);
                    self.stats.detection_failed();
                }
                DetectionOutcome::Unavailable(e) => {
                    warn!("{}; showing video without overlay", e);
                }
            }
        }
    }

    /// Tick on every clock beat until stopped or the clock ends.
    #[instrument(skip_all)]
    pub async fn run<C: FrameClock>(mut self, mut clock: C) -> StatsSnapshot {
        info!("Frame pump started");
        while self.running.load(Ordering::Acquire) {
            if clock.next_frame().await.is_none() {
                debug!("Frame clock closed");
                break;
            }
            if self.tick() == TickOutcome::Stopped {
                break;
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Frame pump stopped after {} frames, {} detections",
            stats.frames_rendered, stats.detections_completed
        );
        stats
    }
}
