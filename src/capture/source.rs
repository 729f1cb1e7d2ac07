//! Camera acquisition contract

use std::future::Future;

use flume::{Receiver, TryRecvError};

use crate::capture::VideoFrame;
use crate::{CaptureConfig, FacingMode, Result};

/// What the session asks the camera for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
}

impl From<&CaptureConfig> for CaptureConstraints {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            facing_mode: config.facing_mode,
        }
    }
}

/// Something that can open a live stream.
pub trait CameraSource: Send + 'static {
    type Stream: CameraStream;

    /// Open the device. Fails with `Error::CameraUnavailable`.
    fn acquire(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// An acquired stream. The owner must call `release`; it is safe to call
/// more than once.
pub trait CameraStream: Send + 'static {
    /// Consumer side of the live frame sequence
    fn frames(&self) -> FrameFeed;

    /// Tracks still producing frames
    fn active_tracks(&self) -> usize;

    fn release(&mut self);
}

/// Receiving end of a stream's frames, in emission order.
#[derive(Clone)]
pub struct FrameFeed {
    rx: Receiver<VideoFrame>,
}

impl FrameFeed {
    pub fn new(rx: Receiver<VideoFrame>) -> Self {
        Self { rx }
    }

    /// Drain everything queued and keep the newest.
    /// Returns the frame and how many older frames were skipped.
    pub fn latest(&self) -> (Option<VideoFrame>, usize) {
        let mut newest = None;
        let mut skipped = 0;
        loop {
            match self.rx.try_recv() {
                Ok(frame) => {
                    if newest.replace(frame).is_some() {
                        skipped += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        (newest, skipped)
    }

    /// True once the producer is gone and nothing is left to read
    pub fn is_closed(&self) -> bool {
        self.rx.is_disconnected() && self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_keeps_newest_in_order() {
        let (tx, rx) = flume::bounded(4);
        let feed = FrameFeed::new(rx);
        for seq in 1..=3 {
            tx.send(VideoFrame::filled(seq, 2, 2, [0, 0, 0])).unwrap();
        }

        let (frame, skipped) = feed.latest();
        assert_eq!(frame.map(|f| f.sequence()), Some(3));
        assert_eq!(skipped, 2);

        let (frame, skipped) = feed.latest();
        assert!(frame.is_none());
        assert_eq!(skipped, 0);

        drop(tx);
        assert!(feed.is_closed());
    }
}
