use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decoded RGB24 frame. Cloning shares the pixel buffer.
#[derive(Clone)]
pub struct VideoFrame {
    /// Immutable pixel data - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    pub format: PixelFormat,
    pub device_timestamp: Option<Duration>, // Hardware timestamp if available
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Yuyv4,
    Mjpeg,
    Nv12,
}

impl VideoFrame {
    /// Wrap tightly packed RGB24 pixels.
    pub fn rgb(sequence: u64, width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            meta: Arc::new(FrameMetadata {
                sequence,
                width,
                height,
                stride: width * 3,
                format: PixelFormat::Rgb24,
                device_timestamp: None,
            }),
            timestamp: Instant::now(),
        }
    }

    /// Solid-color frame, handy for synthetic sources.
    pub fn filled(sequence: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect::<Vec<u8>>();
        Self::rgb(sequence, width, height, pixels)
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    pub fn size(&self) -> (u32, u32) {
        (self.meta.width, self.meta.height)
    }

    /// Tightly packed `width * height * 3` bytes, repacking rows when the
    /// stride is padded. `None` if the buffer is too short for its layout.
    pub fn packed_rgb(&self) -> Option<Cow<'_, [u8]>> {
        let (width, height) = self.size();
        let row = width as usize * 3;
        let stride = self.meta.stride as usize;
        if stride < row {
            return None;
        }
        let needed = match height as usize {
            0 => 0,
            h => stride * (h - 1) + row,
        };
        if self.data.len() < needed {
            return None;
        }
        if stride == row {
            return Some(Cow::Borrowed(&self.data[..row * height as usize]));
        }
        let packed = self
            .data
            .chunks(stride)
            .take(height as usize)
            .flat_map(|line| &line[..row])
            .copied()
            .collect();
        Some(Cow::Owned(packed))
    }

    /// RGB triple at (x, y), if in bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.meta.width || y >= self.meta.height {
            return None;
        }
        let offset = (y * self.meta.stride + x * 3) as usize;
        let px = self.data.get(offset..offset + 3)?;
        Some([px[0], px[1], px[2]])
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("sequence", &self.meta.sequence)
            .field("width", &self.meta.width)
            .field("height", &self.meta.height)
            .field("format", &self.meta.format)
            .finish()
    }
}
