mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{frame, settle, FakeFactory, FakeLandmarker, LandmarkerTap};
use flume::Sender;
use ringfit::capture::{FrameFeed, VideoFrame};
use ringfit::detect::DetectorAdapter;
use ringfit::pipeline::{FramePump, IntervalClock, TickOutcome};
use ringfit::render::{OverlayControls, OverlayRenderer, RecordingSurface};
use ringfit::Config;

struct Rig {
    pump: FramePump<FakeLandmarker, RecordingSurface>,
    frames: Sender<VideoFrame>,
    surface: RecordingSurface,
    running: Arc<AtomicBool>,
}

fn rig(detector: DetectorAdapter<FakeLandmarker>) -> Rig {
    let config = Config::default();
    let (frames, rx) = flume::unbounded();
    let surface = RecordingSurface::new(640, 480);
    let running = Arc::new(AtomicBool::new(true));
    let pump = FramePump::new(
        FrameFeed::new(rx),
        detector,
        OverlayRenderer::new(3.0, false),
        surface.clone(),
        OverlayControls::new(&config.overlay),
        running.clone(),
    );
    Rig {
        pump,
        frames,
        surface,
        running,
    }
}

fn ready(tap: &LandmarkerTap, delay: Duration) -> DetectorAdapter<FakeLandmarker> {
    DetectorAdapter::ready(FakeLandmarker {
        tap: tap.clone(),
        delay,
    })
}

#[tokio::test(start_paused = true)]
async fn one_detection_in_flight_while_frames_pile_up() {
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let mut rig = rig(ready(&tap, Duration::from_millis(120)));

    for seq in 1..=10 {
        rig.frames.send(frame(seq, 640, 480)).unwrap();
        assert!(matches!(rig.pump.tick(), TickOutcome::Rendered { .. }));
        settle().await;
    }

    assert_eq!(tap.calls(), 1);
    assert_eq!(tap.max_in_flight(), 1);
    assert_eq!(rig.surface.frames_drawn(), (1..=10).collect::<Vec<_>>());

    tokio::time::advance(Duration::from_millis(120)).await;
    settle().await;
    rig.frames.send(frame(11, 640, 480)).unwrap();
    rig.pump.tick();
    settle().await;

    assert_eq!(tap.calls(), 2);
    assert_eq!(tap.max_in_flight(), 1);
    assert_eq!(rig.pump.stats().snapshot().detections_issued, 2);
}

#[tokio::test(start_paused = true)]
async fn stale_landmarks_follow_newer_frames() {
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let mut rig = rig(ready(&tap, Duration::from_millis(100)));

    rig.frames.send(frame(1, 640, 480)).unwrap();
    assert_eq!(rig.pump.tick(), TickOutcome::Rendered { overlays: 0 });
    settle().await;
    tokio::time::advance(Duration::from_millis(100)).await;
    settle().await;

    rig.frames.send(frame(2, 640, 480)).unwrap();
    assert_eq!(rig.pump.tick(), TickOutcome::Rendered { overlays: 1 });
    assert_eq!(rig.pump.cached().unwrap().frame_sequence, 1);

    // detection for frame 2 still pending; frame 3 reuses frame 1's hands
    rig.frames.send(frame(3, 640, 480)).unwrap();
    assert_eq!(rig.pump.tick(), TickOutcome::Rendered { overlays: 1 });
    assert_eq!(rig.pump.cached().unwrap().frame_sequence, 1);
    settle().await;
    assert_eq!(tap.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_pass_keeps_previous_hands() {
    let tap = LandmarkerTap::with_hand_at(0.25, 0.25);
    let mut rig = rig(ready(&tap, Duration::ZERO));

    rig.frames.send(frame(1, 640, 480)).unwrap();
    rig.pump.tick();
    settle().await;

    tap.fail_next.store(true, Ordering::SeqCst);
    rig.frames.send(frame(2, 640, 480)).unwrap();
    assert_eq!(rig.pump.tick(), TickOutcome::Rendered { overlays: 1 });
    settle().await;

    rig.frames.send(frame(3, 640, 480)).unwrap();
    assert_eq!(rig.pump.tick(), TickOutcome::Rendered { overlays: 1 });
    assert_eq!(rig.pump.cached().unwrap().frame_sequence, 1);
    settle().await;

    let stats = rig.pump.stats().snapshot();
    assert_eq!(stats.detections_failed, 1);
    // the tick after the failure asked again
    assert_eq!(tap.calls(), 3);
}

#[tokio::test]
async fn unavailable_detector_still_shows_video() {
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let factory = Arc::new(FakeFactory::broken(&tap));
    let mut rig = rig(DetectorAdapter::load(factory, Config::default().detector));
    settle().await;

    for seq in 1..=5 {
        rig.frames.send(frame(seq, 320, 240)).unwrap();
        assert_eq!(rig.pump.tick(), TickOutcome::Rendered { overlays: 0 });
        settle().await;
    }

    assert_eq!(tap.loads(), 1);
    assert_eq!(tap.calls(), 0);
    assert!(rig.surface.ellipses().is_empty());
    assert_eq!(rig.surface.presents(), 5);
}

#[tokio::test]
async fn nothing_rendered_before_first_frame() {
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let mut rig = rig(ready(&tap, Duration::ZERO));

    assert_eq!(rig.pump.tick(), TickOutcome::NoFrame);
    assert!(rig.surface.ops().is_empty());
    assert_eq!(tap.calls(), 0);
}

#[tokio::test]
async fn last_frame_is_redrawn_without_new_detection() {
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let mut rig = rig(ready(&tap, Duration::ZERO));

    rig.frames.send(frame(1, 640, 480)).unwrap();
    rig.pump.tick();
    settle().await;
    rig.pump.tick();
    settle().await;

    assert_eq!(rig.surface.frames_drawn(), vec![1, 1]);
    assert_eq!(tap.calls(), 1);
}

#[tokio::test]
async fn resolution_change_drops_cached_hands() {
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let mut rig = rig(ready(&tap, Duration::ZERO));

    rig.frames.send(frame(1, 640, 480)).unwrap();
    rig.pump.tick();
    settle().await;

    rig.frames.send(frame(2, 1280, 720)).unwrap();
    assert_eq!(rig.pump.tick(), TickOutcome::Rendered { overlays: 0 });
}

#[tokio::test]
async fn bad_frame_is_skipped_and_loop_continues() {
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let mut rig = rig(ready(&tap, Duration::ZERO));

    rig.frames.send(VideoFrame::rgb(1, 0, 0, Vec::new())).unwrap();
    assert_eq!(rig.pump.tick(), TickOutcome::Skipped);
    settle().await;

    rig.frames.send(frame(2, 640, 480)).unwrap();
    assert!(matches!(rig.pump.tick(), TickOutcome::Rendered { .. }));
    assert_eq!(rig.pump.stats().snapshot().render_errors, 1);
}

#[tokio::test]
async fn cleared_running_flag_is_terminal() {
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let mut rig = rig(ready(&tap, Duration::ZERO));
    rig.frames.send(frame(1, 640, 480)).unwrap();

    rig.running.store(false, Ordering::SeqCst);
    assert_eq!(rig.pump.tick(), TickOutcome::Stopped);
    assert!(rig.surface.ops().is_empty());

    let stats = rig.pump.run(IntervalClock::from_fps(30)).await;
    assert_eq!(stats.ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_detector_does_not_slow_rendering() {
    // 30 fps camera and display, 120 ms per detection
    let tap = LandmarkerTap::with_hand_at(0.5, 0.5);
    let rig = rig(ready(&tap, Duration::from_millis(120)));
    let Rig {
        pump,
        frames,
        surface,
        running,
    } = rig;

    let producer = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(33));
        for seq in 1.. {
            interval.tick().await;
            if frames.send_async(frame(seq, 640, 480)).await.is_err() {
                break;
            }
        }
    });
    let pump_task = tokio::spawn(pump.run(IntervalClock::from_fps(30)));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    running.store(false, Ordering::SeqCst);
    let stats = pump_task.await.unwrap();
    producer.abort();

    assert!((29..=32).contains(&stats.ticks), "ticks {}", stats.ticks);
    // the very first tick may beat the first camera frame
    assert!(stats.frames_rendered + 1 >= stats.ticks);
    assert!(
        (6..=8).contains(&stats.detections_completed),
        "completions {}",
        stats.detections_completed
    );
    assert_eq!(tap.max_in_flight(), 1);
    // once the first pass lands every frame carries a ring
    assert!(surface.ellipses().len() as u64 >= stats.ticks - 6);
}
