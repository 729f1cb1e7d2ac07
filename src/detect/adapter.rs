//! Uniform async front for an injected hand landmarker.
//!
//! The adapter moves the landmarker into the detection task and only gets it
//! back when the task completes, so a second call can never be issued while
//! one is pending. Completions come back over a channel that the frame pump
//! drains on its own schedule; dropping the adapter discards anything still
//! running.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use flume::{Receiver, Sender};
use tracing::{debug, info};

use crate::capture::VideoFrame;
use crate::detect::landmarks::{Detections, LandmarkSet};
use crate::{DetectorConfig, Error, Result};

/// A hand landmark model. `timestamp_ms` strictly increases per instance.
pub trait HandLandmarker: Send + 'static {
    fn detect(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: u64,
    ) -> impl Future<Output = Result<Vec<LandmarkSet>>> + Send;
}

/// Loads a landmarker. Failure means `Error::DetectorUnavailable`.
pub trait LandmarkerFactory: Send + Sync + 'static {
    type Landmarker: HandLandmarker;

    fn create(
        &self,
        config: &DetectorConfig,
    ) -> impl Future<Output = Result<Self::Landmarker>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Loading,
    Ready,
    InFlight,
    Unavailable,
}

#[derive(Debug)]
pub enum DetectionOutcome {
    Completed(Detections),
    /// One pass failed; the next one may succeed
    Failed(Error),
    /// Model never loaded. Reported once.
    Unavailable(Error),
}

enum Completion<D> {
    Loaded(Result<D>),
    Detected {
        detector: D,
        detections: Result<Detections>,
        issued_at: Instant,
    },
}

pub struct DetectorAdapter<D> {
    detector: Option<D>,
    state: AdapterState,
    tx: Sender<Completion<D>>,
    rx: Receiver<Completion<D>>,
    origin: Instant,
    last_timestamp_ms: Option<u64>,
}

impl<D: HandLandmarker> DetectorAdapter<D> {
    /// Start loading in the background. Must be called inside a tokio runtime.
    pub fn load<F>(factory: Arc<F>, config: DetectorConfig) -> Self
    where
        F: LandmarkerFactory<Landmarker = D>,
    {
        let adapter = Self::with_state(None, AdapterState::Loading);
        let tx = adapter.tx.clone();
        tokio::spawn(async move {
            let loaded = factory.create(&config).await;
            let _ = tx.send(Completion::Loaded(loaded));
        });
        adapter
    }

    /// Wrap an already loaded landmarker.
    pub fn ready(detector: D) -> Self {
        Self::with_state(Some(detector), AdapterState::Ready)
    }

    fn with_state(detector: Option<D>, state: AdapterState) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            detector,
            state,
            tx,
            rx,
            origin: Instant::now(),
            last_timestamp_ms: None,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == AdapterState::InFlight
    }

    /// Issue a detection for `frame` if the landmarker is idle.
    /// Never waits; returns whether a call was issued.
    pub fn try_issue(&mut self, frame: &VideoFrame) -> bool {
        if self.state != AdapterState::Ready {
            return false;
        }
        let Some(mut detector) = self.detector.take() else {
            return false;
        };

        let timestamp_ms = self.next_timestamp(frame);
        let frame = frame.clone();
        let tx = self.tx.clone();
        self.state = AdapterState::InFlight;

        tokio::spawn(async move {
            let issued_at = Instant::now();
            let detections = detector
                .detect(&frame, timestamp_ms)
                .await
                .map(|hands| Detections {
                    frame_sequence: frame.sequence(),
                    frame_size: frame.size(),
                    hands,
                });
            if tx
                .send(Completion::Detected {
                    detector,
                    detections,
                    issued_at,
                })
                .is_err()
            {
                debug!("Detection for frame {} discarded", frame.sequence());
            }
        });
        true
    }

    /// Next finished load or detection, if any.
    pub fn poll(&mut self) -> Option<DetectionOutcome> {
        loop {
            match self.rx.try_recv().ok()? {
                Completion::Loaded(Ok(detector)) => {
                    info!("Hand landmarker ready");
                    self.detector = Some(detector);
                    self.state = AdapterState::Ready;
                }
                Completion::Loaded(Err(e)) => {
                    self.state = AdapterState::Unavailable;
                    return Some(DetectionOutcome::Unavailable(e));
                }
                Completion::Detected {
                    detector,
                    detections,
                    issued_at,
                } => {
                    self.detector = Some(detector);
                    self.state = AdapterState::Ready;
                    metrics::histogram!("detection_latency_ms")
                        .record(issued_at.elapsed().as_secs_f64() * 1000.0);
                    return Some(match detections {
                        Ok(detections) => DetectionOutcome::Completed(detections),
                        Err(e) => DetectionOutcome::Failed(e),
                    });
                }
            }
        }
    }

    fn next_timestamp(&mut self, frame: &VideoFrame) -> u64 {
        let ms = frame.timestamp.saturating_duration_since(self.origin).as_millis() as u64;
        let ms = match self.last_timestamp_ms {
            Some(last) if ms <= last => last + 1,
            _ => ms,
        };
        self.last_timestamp_ms = Some(ms);
        ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::landmarks::Landmark;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Waits for a permit per call and records timestamps
    struct Gated {
        gate: Arc<Semaphore>,
        seen: Arc<Mutex<Vec<u64>>>,
    }

    impl HandLandmarker for Gated {
        async fn detect(
            &mut self,
            _frame: &VideoFrame,
            timestamp_ms: u64,
        ) -> Result<Vec<LandmarkSet>> {
            self.seen.lock().unwrap().push(timestamp_ms);
            self.gate.acquire().await.unwrap().forget();
            Ok(vec![LandmarkSet::uniform(0, Landmark::new(0.25, 0.75))])
        }
    }

    struct Broken;

    impl LandmarkerFactory for Broken {
        type Landmarker = Gated;

        async fn create(&self, _config: &DetectorConfig) -> Result<Gated> {
            Err(Error::DetectorUnavailable("no model".into()))
        }
    }

    fn gated() -> (Gated, Arc<Semaphore>, Arc<Mutex<Vec<u64>>>) {
        let gate = Arc::new(Semaphore::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let detector = Gated {
            gate: gate.clone(),
            seen: seen.clone(),
        };
        (detector, gate, seen)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn second_issue_refused_while_pending() {
        let (detector, gate, _) = gated();
        let mut adapter = DetectorAdapter::ready(detector);
        let frame = VideoFrame::filled(1, 4, 4, [0, 0, 0]);

        assert!(adapter.try_issue(&frame));
        assert!(adapter.is_in_flight());
        assert!(!adapter.try_issue(&frame));
        assert!(adapter.poll().is_none());

        gate.add_permits(1);
        settle().await;

        match adapter.poll() {
            Some(DetectionOutcome::Completed(d)) => {
                assert_eq!(d.frame_sequence, 1);
                assert_eq!(d.frame_size, (4, 4));
                assert_eq!(d.hands.len(), 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(adapter.state(), AdapterState::Ready);
        assert!(adapter.try_issue(&frame));
    }

    #[tokio::test]
    async fn timestamps_strictly_increase() {
        let (detector, gate, seen) = gated();
        let mut adapter = DetectorAdapter::ready(detector);
        let frame = VideoFrame::filled(1, 2, 2, [0, 0, 0]);
        gate.add_permits(3);

        for _ in 0..3 {
            assert!(adapter.try_issue(&frame));
            settle().await;
            assert!(adapter.poll().is_some());
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    }

    #[tokio::test]
    async fn load_failure_reported_once() {
        let config = crate::Config::default().detector;
        let mut adapter = DetectorAdapter::load(Arc::new(Broken), config);
        assert_eq!(adapter.state(), AdapterState::Loading);
        settle().await;

        assert!(matches!(adapter.poll(), Some(DetectionOutcome::Unavailable(_))));
        assert!(adapter.poll().is_none());
        assert_eq!(adapter.state(), AdapterState::Unavailable);
        assert!(!adapter.try_issue(&VideoFrame::filled(1, 2, 2, [0, 0, 0])));
    }
}
