pub mod controls;

#[cfg(feature = "sdl-display")]
pub mod display;

pub use controls::{apply_command, run_controller, Flow, UiCommand};

#[cfg(feature = "sdl-display")]
pub use display::Sdl2Display;
