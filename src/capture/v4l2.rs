//! V4L2 camera source with a dedicated capture thread

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result as EyreResult};
use flume::{Receiver, Sender, TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::decoder;
use crate::capture::frame::{FrameMetadata, PixelFormat, VideoFrame};
use crate::capture::source::{CameraSource, CameraStream, CaptureConstraints, FrameFeed};
use crate::{utils, CaptureConfig, Error, Result};

/// Longest the capture thread waits on a buffer before re-checking `running`
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(200);

/// Opens a V4L2 device on `acquire`
pub struct V4l2Camera {
    config: CaptureConfig,
}

impl V4l2Camera {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl CameraSource for V4l2Camera {
    type Stream = V4l2Stream;

    #[instrument(skip(self))]
    async fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<V4l2Stream> {
        let mut config = self.config.clone();
        config.width = constraints.width;
        config.height = constraints.height;
        // V4L2 has no notion of facing; the device path decides
        debug!("Facing mode hint {:?} ignored by V4L2", constraints.facing_mode);

        let (tx, rx) = flume::bounded(config.frame_queue);
        let (ready_tx, ready_rx) = oneshot::channel();
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let running = running.clone();
            let rx = rx.clone();
            thread::Builder::new()
                .name("v4l2-capture".into())
                .spawn(move || capture_thread(config, tx, rx, running, ready_tx))
                .map_err(|e| Error::CameraUnavailable(format!("capture thread: {e}")))?
        };

        match ready_rx.await {
            Ok(Ok(())) => Ok(V4l2Stream {
                rx,
                running,
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => Err(Error::CameraUnavailable(
                "capture thread exited during setup".into(),
            )),
        }
    }
}

/// Live V4L2 stream; the capture thread runs until `release`
pub struct V4l2Stream {
    rx: Receiver<VideoFrame>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CameraStream for V4l2Stream {
    fn frames(&self) -> FrameFeed {
        FrameFeed::new(self.rx.clone())
    }

    fn active_tracks(&self) -> usize {
        match &self.worker {
            Some(worker) if !worker.is_finished() => 1,
            _ => 0,
        }
    }

    fn release(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Capture thread panicked");
            }
            info!("Camera stream released");
        }
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.release();
    }
}

fn camera_error(path: &str, e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::PermissionDenied => {
            Error::CameraUnavailable(format!("permission denied for {path}"))
        }
        _ => Error::CameraUnavailable(format!("{path}: {e}")),
    }
}

struct OpenedDevice {
    device: Device,
    path: String,
    width: u32,
    height: u32,
    format: PixelFormat,
}

fn open_device(config: &CaptureConfig) -> Result<OpenedDevice> {
    let (path, format) = if config.device.is_empty() {
        let found = utils::auto_detect_device()
            .map_err(|e| Error::CameraUnavailable(e.to_string()))?;
        (found.path, found.format)
    } else {
        (config.device.clone(), config.format)
    };

    let device = Device::with_path(&path).map_err(|e| camera_error(&path, e))?;
    let caps = device.query_caps().map_err(|e| camera_error(&path, e))?;
    info!("Device: {} ({})", caps.card, caps.driver);

    if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
        return Err(Error::CameraUnavailable(format!(
            "{path} doesn't support video capture"
        )));
    }

    let negotiated = negotiate_format(&device, config, format)
        .map_err(|e| Error::CameraUnavailable(format!("{path}: {e}")))?;

    Ok(OpenedDevice {
        device,
        path,
        width: negotiated.0,
        height: negotiated.1,
        format,
    })
}

fn negotiate_format(
    device: &Device,
    config: &CaptureConfig,
    format: PixelFormat,
) -> EyreResult<(u32, u32)> {
    let mut fmt = device.format()?;
    fmt.width = config.width;
    fmt.height = config.height;
    fmt.fourcc = match format {
        PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
        PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
        PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
        PixelFormat::Bgr24 => FourCC::new(b"BGR3"),
        PixelFormat::Nv12 => FourCC::new(b"NV12"),
    };

    // The driver may pick the nearest size it supports
    let applied = device.set_format(&fmt)?;
    if applied.fourcc != fmt.fourcc {
        return Err(eyre!("driver refused {:?}, offered {}", format, applied.fourcc));
    }

    let params = v4l::video::capture::Parameters::with_fps(config.fps);
    if let Err(e) = device.set_params(&params) {
        warn!("Could not set {} fps: {}", config.fps, e);
    }

    Ok((applied.width, applied.height))
}

fn capture_thread(
    config: CaptureConfig,
    tx: Sender<VideoFrame>,
    own_rx: Receiver<VideoFrame>,
    running: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<()>>,
) {
    let opened = match open_device(&config) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut stream =
        match MmapStream::with_buffers(&opened.device, Type::VideoCapture, config.buffer_count) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(camera_error(&opened.path, e)));
                return;
            }
        };
    stream.set_timeout(DEQUEUE_TIMEOUT);

    info!(
        "Capture stream started on {} at {}x{} with {} buffers",
        opened.path, opened.width, opened.height, config.buffer_count
    );
    if ready.send(Ok(())).is_err() {
        // acquire() was cancelled
        return;
    }

    let format = StreamFormat {
        format: opened.format,
        width: opened.width,
        height: opened.height,
    };
    capture_loop(&mut stream, format, &tx, &own_rx, &running);
}

/// Dequeues one filled capture buffer and its device timestamp.
/// `ErrorKind::TimedOut` means no frame arrived in time.
trait BufferSource {
    fn dequeue(&mut self) -> io::Result<(&[u8], Duration)>;
}

impl BufferSource for MmapStream<'_> {
    fn dequeue(&mut self) -> io::Result<(&[u8], Duration)> {
        let (buf, meta) = CaptureStream::next(self)?;
        let device_time = Duration::from_secs(meta.timestamp.sec as u64)
            + Duration::from_micros(meta.timestamp.usec as u64);
        Ok((buf, device_time))
    }
}

#[derive(Debug, Clone, Copy)]
struct StreamFormat {
    format: PixelFormat,
    width: u32,
    height: u32,
}

fn capture_loop<B: BufferSource>(
    source: &mut B,
    stream: StreamFormat,
    tx: &Sender<VideoFrame>,
    own_rx: &Receiver<VideoFrame>,
    running: &AtomicBool,
) {
    let mut sequence = 0u64;
    while running.load(Ordering::Acquire) {
        let timestamp = Instant::now();
        let (buf, device_time) = match source.dequeue() {
            Ok(next) => next,
            // camera went quiet; loop to re-check `running`
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => {
                warn!("Capture error: {}", e);
                thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        let rgb = match decoder::decode_frame(buf, stream.format, stream.width, stream.height) {
            Ok(rgb) => rgb,
            Err(e) => {
                debug!("Dropping undecodable frame: {}", e);
                metrics::counter!("frames_dropped").increment(1);
                continue;
            }
        };

        sequence += 1;
        let frame = VideoFrame {
            data: Bytes::from(rgb),
            meta: Arc::new(FrameMetadata {
                sequence,
                width: stream.width,
                height: stream.height,
                stride: stream.width * 3,
                format: PixelFormat::Rgb24,
                device_timestamp: Some(device_time),
            }),
            timestamp,
        };

        if !push_latest(tx, own_rx, frame) {
            break;
        }
    }

    debug!("Capture thread exiting after {} frames", sequence);
}

/// Queue a frame, dropping the oldest queued one when full.
/// Returns false once every consumer is gone.
fn push_latest(
    tx: &Sender<VideoFrame>,
    own_rx: &Receiver<VideoFrame>,
    frame: VideoFrame,
) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(frame)) => {
            let _ = own_rx.try_recv();
            metrics::counter!("frames_dropped").increment(1);
            let _ = tx.try_send(frame);
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
