#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flume::Sender;
use ringfit::capture::{CameraSource, CameraStream, CaptureConstraints, FrameFeed, VideoFrame};
use ringfit::detect::{HandLandmarker, Landmark, LandmarkSet, LandmarkerFactory};
use ringfit::{DetectorConfig, Error, Result};

/// Observes and feeds whatever stream a [`FakeCamera`] hands out
#[derive(Clone, Default)]
pub struct CameraTap {
    pub acquisitions: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
    pub active_tracks: Arc<AtomicUsize>,
    sender: Arc<Mutex<Option<Sender<VideoFrame>>>>,
}

impl CameraTap {
    /// Emit a frame on the live stream; false if there is none
    pub fn push(&self, frame: VideoFrame) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn active_tracks(&self) -> usize {
        self.active_tracks.load(Ordering::SeqCst)
    }
}

pub struct FakeCamera {
    pub tap: CameraTap,
    pub deny: bool,
}

impl FakeCamera {
    pub fn new() -> (Self, CameraTap) {
        let tap = CameraTap::default();
        (
            Self {
                tap: tap.clone(),
                deny: false,
            },
            tap,
        )
    }

    pub fn denied() -> (Self, CameraTap) {
        let (mut camera, tap) = Self::new();
        camera.deny = true;
        (camera, tap)
    }
}

impl CameraSource for FakeCamera {
    type Stream = FakeStream;

    async fn acquire(&mut self, _constraints: &CaptureConstraints) -> Result<FakeStream> {
        self.tap.acquisitions.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(Error::CameraUnavailable("permission denied".into()));
        }

        let (tx, rx) = flume::bounded(8);
        *self.tap.sender.lock().unwrap() = Some(tx);
        self.tap.active_tracks.store(1, Ordering::SeqCst);
        Ok(FakeStream {
            feed: FrameFeed::new(rx),
            tap: self.tap.clone(),
            released: false,
        })
    }
}

pub struct FakeStream {
    feed: FrameFeed,
    tap: CameraTap,
    released: bool,
}

impl CameraStream for FakeStream {
    fn frames(&self) -> FrameFeed {
        self.feed.clone()
    }

    fn active_tracks(&self) -> usize {
        self.tap.active_tracks()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.tap.sender.lock().unwrap().take();
        self.tap.active_tracks.store(0, Ordering::SeqCst);
        self.tap.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared view into every [`FakeLandmarker`] built from it
#[derive(Clone)]
pub struct LandmarkerTap {
    pub loads: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub fail_next: Arc<AtomicBool>,
    pub hands: Arc<Mutex<Vec<LandmarkSet>>>,
}

impl LandmarkerTap {
    /// One hand with every landmark at (x, y)
    pub fn with_hand_at(x: f32, y: f32) -> Self {
        Self {
            loads: Arc::default(),
            calls: Arc::default(),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
            fail_next: Arc::default(),
            hands: Arc::new(Mutex::new(vec![LandmarkSet::uniform(0, Landmark::new(x, y))])),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

pub struct FakeLandmarker {
    pub tap: LandmarkerTap,
    pub delay: Duration,
}

impl HandLandmarker for FakeLandmarker {
    async fn detect(
        &mut self,
        _frame: &VideoFrame,
        _timestamp_ms: u64,
    ) -> Result<Vec<LandmarkSet>> {
        self.tap.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.tap.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.tap.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.tap.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.tap.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::DetectionFailed("inference rejected".into()));
        }
        Ok(self.tap.hands.lock().unwrap().clone())
    }
}

pub struct FakeFactory {
    pub tap: LandmarkerTap,
    pub delay: Duration,
    pub broken: bool,
}

impl FakeFactory {
    pub fn new(tap: &LandmarkerTap, delay: Duration) -> Self {
        Self {
            tap: tap.clone(),
            delay,
            broken: false,
        }
    }

    pub fn broken(tap: &LandmarkerTap) -> Self {
        Self {
            tap: tap.clone(),
            delay: Duration::ZERO,
            broken: true,
        }
    }
}

impl LandmarkerFactory for FakeFactory {
    type Landmarker = FakeLandmarker;

    async fn create(&self, _config: &DetectorConfig) -> Result<FakeLandmarker> {
        self.tap.loads.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(Error::DetectorUnavailable("model asset missing".into()));
        }
        Ok(FakeLandmarker {
            tap: self.tap.clone(),
            delay: self.delay,
        })
    }
}

pub fn frame(sequence: u64, width: u32, height: u32) -> VideoFrame {
    VideoFrame::filled(sequence, width, height, [40, 40, 40])
}

/// Let spawned tasks run without moving time
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
