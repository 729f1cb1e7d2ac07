use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Permission denied or no capture device. Surfaced to `start()`.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// The landmark model failed to load; video keeps running without overlay.
    #[error("hand landmarker unavailable: {0}")]
    DetectorUnavailable(String),

    /// A single detection pass failed.
    #[error("detection failed: {0}")]
    DetectionFailed(String),

    #[error("render surface error: {0}")]
    RenderSurface(String),

    #[error("frame decode failed: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ::config::ConfigError),
}
