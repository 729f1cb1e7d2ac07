pub mod decoder;
pub mod frame;
pub mod source;
pub mod v4l2;

pub use frame::PixelFormat;
pub use frame::VideoFrame;
pub use source::{CameraSource, CameraStream, CaptureConstraints, FrameFeed};
pub use v4l2::V4l2Camera;
