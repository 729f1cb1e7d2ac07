//! SDL2 Window Display Module
//! Presents composited frames and turns key presses into UI commands.

use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use flume::{Receiver, RecvTimeoutError, Sender};
use image::RgbaImage;
use sdl2::event::Event;
use sdl2::keyboard::Scancode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use tracing::info;

use crate::catalog::Catalog;
use crate::display::controls::UiCommand;
use crate::DisplayConfig;

/// How long to wait for a frame before polling events again
const FRAME_WAIT: Duration = Duration::from_millis(8);

pub struct Sdl2Display {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
}

impl Sdl2Display {
    pub fn new(sdl_context: &sdl2::Sdl, config: &DisplayConfig) -> Result<Self> {
        let video_subsystem = sdl_context.video().map_err(|e| eyre!(e))?;

        let window = video_subsystem
            .window(&config.title, config.width, config.height)
            .position_centered()
            .resizable()
            .build()?;

        let mut canvas_builder = window.into_canvas();
        if config.vsync {
            canvas_builder = canvas_builder.present_vsync();
        }
        let canvas = canvas_builder.build()?;
        let texture_creator = canvas.texture_creator();

        Ok(Self {
            canvas,
            texture_creator,
        })
    }

    pub fn render_image(&mut self, image: &RgbaImage) -> Result<()> {
        let (width, height) = image.dimensions();
        // RGBA byte order on little-endian
        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::ABGR8888, width, height)
            .map_err(|e| eyre!(e))?;

        texture
            .update(None, image.as_raw(), (width * 4) as usize)
            .map_err(|e| eyre!(e))?;

        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| eyre!(e))?;

        self.canvas.present();
        Ok(())
    }

    /// Event loop; returns when the window closes or Escape is pressed.
    pub fn run(
        &mut self,
        sdl_context: &sdl2::Sdl,
        frames: Receiver<RgbaImage>,
        commands: Sender<UiCommand>,
    ) -> Result<()> {
        let mut event_pump = sdl_context.event_pump().map_err(|e| eyre!(e))?;

        'running: loop {
            for event in event_pump.poll_iter() {
                let command = match event {
                    Event::Quit { .. } => {
                        info!("Quit event received");
                        Some(UiCommand::Quit)
                    }
                    Event::KeyDown {
                        scancode: Some(scancode),
                        repeat: false,
                        ..
                    } => key_command(scancode),
                    _ => None,
                };

                if let Some(command) = command {
                    let quit = command == UiCommand::Quit;
                    if commands.send(command).is_err() || quit {
                        break 'running;
                    }
                }
            }

            match frames.recv_timeout(FRAME_WAIT) {
                Ok(image) => self.render_image(&image)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break 'running,
            }
        }

        Ok(())
    }
}

fn key_command(scancode: Scancode) -> Option<UiCommand> {
    let select = |slot: usize| {
        Catalog::global()
            .items()
            .get(slot)
            .map(|item| UiCommand::Select(item.id.to_string()))
    };

    match scancode {
        Scancode::Space => Some(UiCommand::Toggle),
        Scancode::Escape => Some(UiCommand::Quit),
        Scancode::Tab => Some(UiCommand::SelectNext),
        Scancode::Equals | Scancode::KpPlus => Some(UiCommand::ScaleBy(1.0)),
        Scancode::Minus | Scancode::KpMinus => Some(UiCommand::ScaleBy(-1.0)),
        Scancode::Num1 => select(0),
        Scancode::Num2 => select(1),
        Scancode::Num3 => select(2),
        Scancode::Num4 => select(3),
        _ => None,
    }
}
