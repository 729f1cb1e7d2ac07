//! Headless surface that records draw calls

use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbaImage;

use crate::capture::VideoFrame;
use crate::catalog::Color;
use crate::render::surface::{Point, Rect, Surface};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Resize(u32, u32),
    Clear,
    Image { sequence: u64, dest: Rect, flip_x: bool },
    Sprite { size: (u32, u32), dest: Rect },
    Ellipse { center: Point, radii: (f32, f32), color: Color },
    Fill { points: Vec<Point>, color: Color },
    Stroke { points: Vec<Point>, color: Color },
    Present,
}

/// Clones share one log, so a copy handed to the pump can be inspected
/// from outside.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    size: (u32, u32),
    ops: Arc<Mutex<Vec<DrawOp>>>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ops: Arc::default(),
        }
    }

    fn log(&self) -> MutexGuard<'_, Vec<DrawOp>> {
        self.ops.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, op: DrawOp) {
        self.log().push(op);
    }

    pub fn ops(&self) -> Vec<DrawOp> {
        self.log().clone()
    }

    pub fn take_ops(&self) -> Vec<DrawOp> {
        std::mem::take(&mut *self.log())
    }

    /// Band ellipses drawn so far, one per rendered overlay
    pub fn ellipses(&self) -> Vec<(Point, (f32, f32))> {
        self.log()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Ellipse { center, radii, .. } => Some((*center, *radii)),
                _ => None,
            })
            .collect()
    }

    /// Destinations of jewelry pictures drawn so far
    pub fn sprites(&self) -> Vec<Rect> {
        self.log()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Sprite { dest, .. } => Some(*dest),
                _ => None,
            })
            .collect()
    }

    pub fn presents(&self) -> usize {
        self.log().iter().filter(|op| **op == DrawOp::Present).count()
    }

    /// Sequences of frames drawn, in order
    pub fn frames_drawn(&self) -> Vec<u64> {
        self.log()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::RenderSurface(format!("cannot resize to {width}x{height}")));
        }
        self.size = (width, height);
        self.push(DrawOp::Resize(width, height));
        Ok(())
    }

    fn clear(&mut self) {
        self.push(DrawOp::Clear);
    }

    fn draw_image(&mut self, frame: &VideoFrame, dest: Rect, flip_x: bool) -> Result<()> {
        self.push(DrawOp::Image {
            sequence: frame.sequence(),
            dest,
            flip_x,
        });
        Ok(())
    }

    fn draw_sprite(&mut self, sprite: &RgbaImage, dest: Rect) -> Result<()> {
        self.push(DrawOp::Sprite {
            size: sprite.dimensions(),
            dest,
        });
        Ok(())
    }

    fn stroke_ellipse(
        &mut self,
        center: Point,
        radii: (f32, f32),
        color: Color,
        _line_width: f32,
    ) -> Result<()> {
        self.push(DrawOp::Ellipse { center, radii, color });
        Ok(())
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) -> Result<()> {
        self.push(DrawOp::Fill {
            points: points.to_vec(),
            color,
        });
        Ok(())
    }

    fn stroke_polygon(&mut self, points: &[Point], color: Color, _line_width: f32) -> Result<()> {
        self.push(DrawOp::Stroke {
            points: points.to_vec(),
            color,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.push(DrawOp::Present);
        Ok(())
    }
}
