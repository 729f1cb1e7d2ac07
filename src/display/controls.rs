//! UI commands and how they drive a session

use flume::Receiver;
use tracing::{error, info, warn};

use crate::capture::CameraSource;
use crate::detect::adapter::LandmarkerFactory;
use crate::pipeline::clock::FrameClock;
use crate::render::surface::Surface;
use crate::session::{SessionState, TrackingSession};
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Start,
    Stop,
    /// Start when idle, stop otherwise
    Toggle,
    Select(String),
    SelectNext,
    Scale(f32),
    /// Move the scale by this many slider steps
    ScaleBy(f32),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply one command. Only a failed start returns an error.
pub async fn apply_command<C, F, S, K>(
    session: &mut TrackingSession<C, F, S, K>,
    command: UiCommand,
) -> Result<Flow>
where
    C: CameraSource,
    F: LandmarkerFactory,
    S: Surface + Clone,
    K: FrameClock,
{
    match command {
        UiCommand::Start => session.start().await?,
        UiCommand::Stop => session.stop(),
        UiCommand::Toggle => {
            if session.state() == SessionState::Idle {
                session.start().await?;
            } else {
                session.stop();
            }
        }
        UiCommand::Select(id) => {
            if !session.overlay().select_id(&id) {
                warn!("Unknown jewelry item {:?}", id);
            }
        }
        UiCommand::SelectNext => session.overlay().select_next(),
        UiCommand::Scale(value) => {
            session.overlay().set_scale(value);
        }
        UiCommand::ScaleBy(steps) => {
            let scale = session.overlay().nudge_scale(steps);
            info!("Scale {:.1}", scale);
        }
        UiCommand::Quit => {
            session.stop();
            return Ok(Flow::Quit);
        }
    }
    Ok(Flow::Continue)
}

/// Apply commands until `Quit` or every sender is gone, then stop.
pub async fn run_controller<C, F, S, K>(
    mut session: TrackingSession<C, F, S, K>,
    commands: Receiver<UiCommand>,
) where
    C: CameraSource,
    F: LandmarkerFactory,
    S: Surface + Clone,
    K: FrameClock,
{
    while let Ok(command) = commands.recv_async().await {
        match apply_command(&mut session, command).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => error!("{}", e),
        }
    }
    session.stop();
}
