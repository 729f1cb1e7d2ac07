//! MediaPipe hand landmarker behind a subprocess bridge.
//!
//! The bridge prints `READY` once the model is loaded. Each request is a
//! little-endian header (width, height, channels as u32, timestamp_ms as u64)
//! followed by raw RGB bytes; each reply is a single JSON line.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, instrument, warn};

use crate::capture::{PixelFormat, VideoFrame};
use crate::detect::adapter::{HandLandmarker, LandmarkerFactory};
use crate::detect::landmarks::{index, Handedness, Landmark, LandmarkSet};
use crate::{DetectorConfig, Error, Result};

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    handedness: String,
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

#[derive(Deserialize, Debug)]
struct Reply {
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Spawns a [`MediaPipeBridge`] per session
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaPipeFactory;

impl LandmarkerFactory for MediaPipeFactory {
    type Landmarker = MediaPipeBridge;

    async fn create(&self, config: &DetectorConfig) -> Result<MediaPipeBridge> {
        MediaPipeBridge::spawn(config).await
    }
}

/// Request header: width, height, channels (u32) and timestamp_ms (u64), LE
const HEADER_LEN: usize = 20;

pub struct MediaPipeBridge {
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    min_confidence: f32,
    reply_timeout: Duration,
    /// Set after any i/o failure; the pipe may hold half a request
    broken: bool,
    line: String,
}

impl MediaPipeBridge {
    #[instrument(skip(config), fields(script = %config.script))]
    pub async fn spawn(config: &DetectorConfig) -> Result<Self> {
        if !Path::new(&config.script).exists() {
            return Err(Error::DetectorUnavailable(format!(
                "bridge script not found at {}",
                config.script
            )));
        }

        info!("Starting hand landmarker bridge...");
        let mut child = Command::new(&config.program)
            .arg(&config.script)
            .arg("--model")
            .arg(&config.model_asset_path)
            .arg("--delegate")
            .arg(&config.delegate)
            .arg("--num-hands")
            .arg(config.num_hands.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::DetectorUnavailable(format!("{}: {e}", config.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::DetectorUnavailable("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::DetectorUnavailable("bridge stdout unavailable".into()))?;
        let mut stdout = BufReader::new(stdout);

        // Wait for "READY" signal
        let mut ready = String::new();
        let timeout = Duration::from_millis(config.load_timeout_ms);
        match tokio::time::timeout(timeout, stdout.read_line(&mut ready)).await {
            Ok(Ok(_)) if ready.trim() == "READY" => {}
            Ok(Ok(_)) => {
                return Err(Error::DetectorUnavailable(format!(
                    "bridge did not signal ready, got: {}",
                    ready.trim()
                )))
            }
            Ok(Err(e)) => return Err(Error::DetectorUnavailable(e.to_string())),
            Err(_) => {
                return Err(Error::DetectorUnavailable(format!(
                    "model load exceeded {timeout:?}"
                )))
            }
        }

        info!("Hand landmarker bridge ready");
        Ok(Self {
            _child: child,
            stdin,
            stdout,
            min_confidence: config.min_confidence.clamp(0.0, 1.0),
            reply_timeout: Duration::from_millis(config.detect_timeout_ms),
            broken: false,
            line: String::new(),
        })
    }

    async fn round_trip(&mut self, request: &[u8]) -> std::io::Result<()> {
        self.stdin.write_all(request).await?;
        self.stdin.flush().await?;

        self.line.clear();
        if self.stdout.read_line(&mut self.line).await? == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }
}

impl HandLandmarker for MediaPipeBridge {
    async fn detect(&mut self, frame: &VideoFrame, timestamp_ms: u64) -> Result<Vec<LandmarkSet>> {
        if self.broken {
            return Err(Error::DetectionFailed("bridge is out of sync".into()));
        }
        let request = encode_request(frame, timestamp_ms)?;

        let outcome = tokio::time::timeout(self.reply_timeout, self.round_trip(&request)).await;
        let failure = match outcome {
            Ok(Ok(())) => return parse_reply(&self.line, self.min_confidence, timestamp_ms),
            Ok(Err(e)) => format!("bridge i/o: {e}"),
            Err(_) => format!("no reply within {:?}", self.reply_timeout),
        };
        warn!("Hand landmarker bridge failed, disabling it: {}", failure);
        self.broken = true;
        Err(Error::DetectionFailed(failure))
    }
}

/// Header plus packed RGB rows, exactly as many bytes as the header announces
fn encode_request(frame: &VideoFrame, timestamp_ms: u64) -> Result<Vec<u8>> {
    if frame.meta.format != PixelFormat::Rgb24 {
        return Err(Error::DetectionFailed(format!(
            "frame {} is {:?}, bridge takes RGB24",
            frame.sequence(),
            frame.meta.format
        )));
    }
    let pixels = frame.packed_rgb().ok_or_else(|| {
        Error::DetectionFailed(format!(
            "frame {} has {} bytes, too few for its size",
            frame.sequence(),
            frame.data.len()
        ))
    })?;

    let (width, height) = frame.size();
    let mut request = Vec::with_capacity(HEADER_LEN + pixels.len());
    request.extend_from_slice(&width.to_le_bytes());
    request.extend_from_slice(&height.to_le_bytes());
    request.extend_from_slice(&3u32.to_le_bytes());
    request.extend_from_slice(&timestamp_ms.to_le_bytes());
    request.extend_from_slice(&pixels);
    Ok(request)
}

/// Decode one reply line, keeping every confident 21-point hand.
fn parse_reply(line: &str, min_confidence: f32, timestamp_ms: u64) -> Result<Vec<LandmarkSet>> {
    let reply: Reply = serde_json::from_str(line)
        .map_err(|e| Error::DetectionFailed(format!("bad reply {:?}: {e}", line.trim())))?;

    if let Some(error) = reply.error {
        return Err(Error::DetectionFailed(error));
    }

    let mut hands = Vec::with_capacity(reply.hands.len());
    for (hand, raw) in reply.hands.into_iter().enumerate() {
        if raw.score < min_confidence {
            continue;
        }
        if raw.landmarks.len() != index::COUNT {
            warn!("Expected {} landmarks, got {}", index::COUNT, raw.landmarks.len());
            continue;
        }

        let landmarks = raw
            .landmarks
            .iter()
            .map(|lm| Landmark {
                x: lm.x,
                y: lm.y,
                z: lm.z,
            })
            .collect::<Vec<_>>();

        debug!(
            "Hand detected: {} (confidence={:.2}), ring_pip=({:.3},{:.3})",
            raw.handedness,
            raw.score,
            landmarks[index::RING_FINGER_PIP].x,
            landmarks[index::RING_FINGER_PIP].y
        );

        hands.push(LandmarkSet {
            hand,
            handedness: Handedness::parse(&raw.handedness),
            score: raw.score,
            landmarks,
            timestamp_ms,
        });
    }
    Ok(hands)
}
