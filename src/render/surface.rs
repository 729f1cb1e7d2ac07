use image::RgbaImage;

use crate::capture::VideoFrame;
use crate::catalog::Color;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// 2D drawing target. Failing calls return `Error::RenderSurface`.
pub trait Surface: Send + 'static {
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn clear(&mut self);

    /// Scale `frame` into `dest`, optionally flipped horizontally
    fn draw_image(&mut self, frame: &VideoFrame, dest: Rect, flip_x: bool) -> Result<()>;

    /// Blend a picture with alpha, scaled into `dest`
    fn draw_sprite(&mut self, sprite: &RgbaImage, dest: Rect) -> Result<()>;

    fn stroke_ellipse(
        &mut self,
        center: Point,
        radii: (f32, f32),
        color: Color,
        line_width: f32,
    ) -> Result<()>;

    fn fill_polygon(&mut self, points: &[Point], color: Color) -> Result<()>;

    /// Closed outline through `points`
    fn stroke_polygon(&mut self, points: &[Point], color: Color, line_width: f32) -> Result<()>;

    /// Hand the finished picture to whoever displays it
    fn present(&mut self) -> Result<()> {
        Ok(())
    }
}
