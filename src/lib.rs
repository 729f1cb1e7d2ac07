pub mod capture;
pub mod catalog;
pub mod detect;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod utils;

use std::path::Path;

use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};

pub use capture::VideoFrame;
pub use error::{Error, Result};

/// Environment prefix for overrides, e.g. `RINGFIT__CAPTURE__FPS=60`
const ENV_PREFIX: &str = "RINGFIT";

/// Highest render clock or capture rate accepted
const MAX_FPS: u32 = 240;
/// Largest overlay multiplier accepted
const MAX_SCALE: f32 = 10.0;

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub detector: DetectorConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Empty path means scan `/dev/video*`
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
    pub facing_mode: FacingMode,
    /// Decoded frames waiting for the pump before new ones are dropped
    pub frame_queue: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// Selfie view: flip video and landmarks horizontally
    pub mirrored: bool,
    /// Render clock rate
    pub fps: u32,
}

/// Landmarker bridge settings. Model path and delegate are passed through
/// to the bridge untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub program: String,
    pub script: String,
    pub model_asset_path: String,
    pub delegate: String,
    pub num_hands: u32,
    pub min_confidence: f32,
    pub load_timeout_ms: u64,
    /// A detection pass without a reply by then disables the bridge
    pub detect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub default_item: String,
    pub initial_scale: f32,
    pub scale_min: f32,
    pub scale_max: f32,
    pub scale_step: f32,
    pub line_width: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                device: String::new(),
                width: 1280,
                height: 720,
                fps: 30,
                format: PixelFormat::Mjpeg,
                buffer_count: 4,
                facing_mode: FacingMode::User,
                frame_queue: 4,
            },
            display: DisplayConfig {
                title: "Ringfit".into(),
                width: 1280,
                height: 720,
                vsync: true,
                mirrored: true,
                fps: 30,
            },
            detector: DetectorConfig {
                program: ".venv/bin/python".into(),
                script: "hand_detect.py".into(),
                model_asset_path: "models/hand_landmarker.task".into(),
                delegate: "GPU".into(),
                num_hands: 2,
                min_confidence: 0.5,
                load_timeout_ms: 20_000,
                detect_timeout_ms: 2_000,
            },
            overlay: OverlayConfig {
                default_item: "gold".into(),
                initial_scale: 1.0,
                scale_min: 0.5,
                scale_max: 2.0,
                scale_step: 0.1,
                line_width: 3.0,
            },
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `RINGFIT__*` env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        let config = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<Config>()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let overlay = &self.overlay;
        if !(overlay.scale_min > 0.0
            && overlay.scale_min <= overlay.scale_max
            && overlay.scale_max <= MAX_SCALE)
        {
            return Err(Error::InvalidConfig(format!(
                "scale bounds [{}, {}] must be ordered within (0, {MAX_SCALE}]",
                overlay.scale_min, overlay.scale_max
            )));
        }
        if !(overlay.initial_scale.is_finite() && overlay.initial_scale > 0.0) {
            return Err(Error::InvalidConfig("initial_scale must be positive".into()));
        }
        for (name, fps) in [("display", self.display.fps), ("capture", self.capture.fps)] {
            if !(1..=MAX_FPS).contains(&fps) {
                return Err(Error::InvalidConfig(format!(
                    "{name} fps {fps} must be within 1..={MAX_FPS}"
                )));
            }
        }
        if !(overlay.line_width.is_finite() && overlay.line_width > 0.0) {
            return Err(Error::InvalidConfig("line_width must be positive".into()));
        }
        if self.detector.detect_timeout_ms == 0 {
            return Err(Error::InvalidConfig("detect_timeout_ms must be non-zero".into()));
        }
        if self.capture.frame_queue == 0 {
            return Err(Error::InvalidConfig("frame_queue must be non-zero".into()));
        }
        Ok(())
    }
}
