pub mod adapter;
pub mod landmarks;
pub mod mediapipe;

pub use adapter::{
    AdapterState, DetectionOutcome, DetectorAdapter, HandLandmarker, LandmarkerFactory,
};
pub use landmarks::{Detections, Handedness, Landmark, LandmarkSet};
pub use mediapipe::{MediaPipeBridge, MediaPipeFactory};
