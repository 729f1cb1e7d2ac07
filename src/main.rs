//! Ringfit: live ring try-on over a V4L2 camera with SDL2 output

use std::path::PathBuf;

use color_eyre::{eyre::eyre, Result};
use flume::bounded;
use tracing::{error, info};

use ringfit::capture::V4l2Camera;
use ringfit::detect::MediaPipeFactory;
use ringfit::display::{run_controller, Sdl2Display, UiCommand};
use ringfit::pipeline::IntervalClock;
use ringfit::render::RgbaCanvas;
use ringfit::session::TrackingSession;
use ringfit::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    init_tracing();

    info!("Ringfit launching...");

    // Load configuration
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RINGFIT_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ringfit.toml"));
    let config = Config::load(Some(&path))?;
    info!("Configuration loaded from {} (if present)", path.display());

    // Composited frames go to the window; one slot so the pump never waits
    let (frame_tx, frame_rx) = bounded(1);
    let (command_tx, command_rx) = flume::unbounded::<UiCommand>();

    let canvas = RgbaCanvas::with_output(config.capture.width, config.capture.height, frame_tx)?;
    let session = TrackingSession::new(
        config.clone(),
        V4l2Camera::new(config.capture.clone()),
        MediaPipeFactory,
        canvas,
        IntervalClock::from_fps(config.display.fps),
    );
    let controller = tokio::spawn(run_controller(session, command_rx));
    command_tx.send(UiCommand::Start)?;

    // Ctrl-C quits like closing the window
    let signal_tx = command_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            let _ = signal_tx.send(UiCommand::Quit);
        }
    });

    // Initialize SDL2 and run the window on this thread
    let sdl_context = sdl2::init().map_err(|e| eyre!(e))?;
    let mut display = Sdl2Display::new(&sdl_context, &config.display)?;
    if let Err(e) = display.run(&sdl_context, frame_rx, command_tx.clone()) {
        error!("Display error: {}", e);
    }

    let _ = command_tx.send(UiCommand::Quit);
    drop(command_tx);
    controller.await?;

    info!("Ringfit shutting down");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ringfit=debug"));

    #[cfg(feature = "profiling")]
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(tracing_subscriber::fmt::time::uptime()),
            )
            .with(tracing_tracy::TracyLayer::default())
            .init();
    }

    #[cfg(not(feature = "profiling"))]
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();
}
