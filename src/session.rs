//! Tracking session lifecycle.
//!
//! `Idle -> Acquiring -> Running -> Stopping -> Idle`, with `Acquiring -> Idle`
//! when the camera cannot be opened. The session owns the camera stream and
//! is the only one to release it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::capture::{CameraSource, CameraStream, CaptureConstraints};
use crate::detect::adapter::{DetectorAdapter, LandmarkerFactory};
use crate::pipeline::clock::FrameClock;
use crate::pipeline::pump::FramePump;
use crate::pipeline::stats::{PumpStats, StatsSnapshot};
use crate::render::compositor::OverlayRenderer;
use crate::render::overlay::OverlayControls;
use crate::render::surface::Surface;
use crate::{Config, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Acquiring,
    Running,
    Stopping,
}

struct ActiveRun<T> {
    stream: T,
    running: Arc<AtomicBool>,
    task: JoinHandle<StatsSnapshot>,
    stats: Arc<PumpStats>,
}

/// Puts the state back to Idle if `start` is dropped mid-acquisition
struct AcquireGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    armed: bool,
}

impl AcquireGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(SessionState::Idle);
        }
    }
}

pub struct TrackingSession<C, F, S, K>
where
    C: CameraSource,
    F: LandmarkerFactory,
    S: Surface + Clone,
    K: FrameClock,
{
    config: Config,
    camera: C,
    landmarker: Arc<F>,
    surface: S,
    clock: K,
    renderer: OverlayRenderer,
    overlay: OverlayControls,
    state: watch::Sender<SessionState>,
    active: Option<ActiveRun<C::Stream>>,
    last_stats: Option<Arc<PumpStats>>,
}

impl<C, F, S, K> TrackingSession<C, F, S, K>
where
    C: CameraSource,
    F: LandmarkerFactory,
    S: Surface + Clone,
    K: FrameClock,
{
    /// `surface` and `clock` are templates; each run gets a fresh clone.
    pub fn new(config: Config, camera: C, landmarker: F, surface: S, clock: K) -> Self {
        let overlay = OverlayControls::new(&config.overlay);
        let renderer = OverlayRenderer::from_config(&config.overlay, &config.display);
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            config,
            camera,
            landmarker: Arc::new(landmarker),
            surface,
            clock,
            renderer,
            overlay,
            state,
            active: None,
            last_stats: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn overlay(&self) -> &OverlayControls {
        &self.overlay
    }

    /// Counters of the current run, or of the last one after `stop`
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.active
            .as_ref()
            .map(|run| &run.stats)
            .or(self.last_stats.as_ref())
            .map(|stats| stats.snapshot())
    }

    pub fn active_tracks(&self) -> usize {
        self.active.as_ref().map_or(0, |run| run.stream.active_tracks())
    }

    fn set_state(&self, state: SessionState) {
        debug!("Session {:?} -> {:?}", self.state(), state);
        self.state.send_replace(state);
    }

    /// Open the camera and start the frame pump.
    ///
    /// A no-op unless Idle. Camera failure returns `Error::CameraUnavailable`
    /// with the session back in Idle and no pump started.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        let state = self.state();
        if state != SessionState::Idle {
            debug!("start() ignored while {:?}", state);
            return Ok(());
        }

        self.set_state(SessionState::Acquiring);
        let constraints = CaptureConstraints::from(&self.config.capture);
        let guard = AcquireGuard {
            state: &self.state,
            armed: true,
        };
        let acquired = self.camera.acquire(&constraints).await;
        guard.disarm();

        let stream = match acquired {
            Ok(stream) => stream,
            Err(e) => {
                self.set_state(SessionState::Idle);
                warn!("Camera acquisition failed: {}", e);
                return Err(match e {
                    Error::CameraUnavailable(_) => e,
                    other => Error::CameraUnavailable(other.to_string()),
                });
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let detector = DetectorAdapter::load(self.landmarker.clone(), self.config.detector.clone());
        let pump = FramePump::new(
            stream.frames(),
            detector,
            self.renderer,
            self.surface.clone(),
            self.overlay.clone(),
            running.clone(),
        );
        let stats = pump.stats();
        let task = tokio::spawn(pump.run(self.clock.clone()));

        self.active = Some(ActiveRun {
            stream,
            running,
            task,
            stats,
        });
        self.set_state(SessionState::Running);
        info!("Tracking session running");
        Ok(())
    }

    /// Stop the pump and release the camera before returning.
    ///
    /// Does not wait for a pending detection; its result is dropped.
    pub fn stop(&mut self) {
        let Some(mut run) = self.active.take() else {
            debug!("stop() ignored while {:?}", self.state());
            return;
        };

        self.set_state(SessionState::Stopping);
        run.running.store(false, Ordering::Release);
        run.task.abort();
        run.stream.release();
        self.last_stats = Some(run.stats);
        self.set_state(SessionState::Idle);
        info!("Tracking session stopped");
    }
}

impl<C, F, S, K> Drop for TrackingSession<C, F, S, K>
where
    C: CameraSource,
    F: LandmarkerFactory,
    S: Surface + Clone,
    K: FrameClock,
{
    fn drop(&mut self) {
        self.stop();
    }
}
