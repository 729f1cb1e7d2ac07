use std::path::Path;

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use v4l::{capability::Flags, video::Capture, Device, FourCC};

use crate::capture::frame::PixelFormat;

// Detected capture device info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundDevice {
    pub path: String,
    pub format: PixelFormat,
}

/// Auto-detect best capture device, preferring MJPEG over YUYV
pub fn auto_detect_device() -> Result<FoundDevice> {
    info!("Auto-detecting capture devices...");

    let mut fallback = None;
    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }

        for fmt in dev.enum_formats().unwrap_or_default() {
            if fmt.fourcc == FourCC::new(b"MJPG") {
                info!("Found MJPEG device: {} - {}", path, caps.card);
                return Ok(FoundDevice {
                    path,
                    format: PixelFormat::Mjpeg,
                });
            } else if fmt.fourcc == FourCC::new(b"YUYV") && fallback.is_none() {
                info!("Found YUYV device: {} - {}", path, caps.card);
                fallback = Some(FoundDevice {
                    path: path.clone(),
                    format: PixelFormat::Yuyv4,
                });
            }
        }
    }

    fallback.ok_or_else(|| eyre!("No suitable capture device found"))
}
