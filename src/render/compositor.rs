//! Per-frame overlay compositing

use std::time::Instant;

use crate::capture::VideoFrame;
use crate::catalog::{Color, JewelryItem, Visual};
use crate::detect::landmarks::{Landmark, LandmarkSet};
use crate::render::overlay::OverlayState;
use crate::render::surface::{Point, Rect, Surface};
use crate::{DisplayConfig, Error, OverlayConfig, Result};

/// Ring band plus gem, centered on an anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingGeometry {
    pub center: Point,
    pub size: f32,
    pub band_radii: (f32, f32),
    pub gem: [Point; 4],
}

impl RingGeometry {
    /// Width and height of the drawn shape
    pub fn bounding_size(&self) -> (f32, f32) {
        // gem tip sits at -size/2, band bottom at +size/3
        (2.0 * self.band_radii.0, self.size / 2.0 + self.band_radii.1)
    }
}

pub fn ring_geometry(center: Point, size: f32) -> RingGeometry {
    let Point { x: cx, y: cy } = center;
    RingGeometry {
        center,
        size,
        band_radii: (size, size / 3.0),
        gem: [
            Point::new(cx, cy - size / 2.0),
            Point::new(cx + size / 4.0, cy - size / 3.0),
            Point::new(cx, cy - size / 6.0),
            Point::new(cx - size / 4.0, cy - size / 3.0),
        ],
    }
}

/// Normalized landmark to surface pixels
pub fn anchor_point(landmark: Landmark, surface: (u32, u32)) -> Point {
    Point::new(landmark.x * surface.0 as f32, landmark.y * surface.1 as f32)
}

/// Square of side `2 * size` centered on `center`, snapped to pixels
pub fn sprite_rect(center: Point, size: f32) -> Rect {
    let side = (2.0 * size).round().max(1.0);
    Rect {
        x: (center.x - side / 2.0).round() as i32,
        y: (center.y - side / 2.0).round() as i32,
        width: side as u32,
        height: side as u32,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayRenderer {
    line_width: f32,
    mirrored: bool,
}

impl OverlayRenderer {
    pub fn new(line_width: f32, mirrored: bool) -> Self {
        Self {
            line_width,
            mirrored,
        }
    }

    pub fn from_config(overlay: &OverlayConfig, display: &DisplayConfig) -> Self {
        Self::new(overlay.line_width, display.mirrored)
    }

    /// Draw `frame`, then one ring per hand that has the item's anchor.
    /// Returns the number of rings drawn.
    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        frame: &VideoFrame,
        hands: &[LandmarkSet],
        state: &OverlayState,
    ) -> Result<usize> {
        let render_start = Instant::now();

        let (width, height) = frame.size();
        if width == 0 || height == 0 {
            return Err(Error::RenderSurface(format!(
                "frame {} is {width}x{height}",
                frame.sequence()
            )));
        }
        if surface.size() != (width, height) {
            surface.resize(width, height)?;
        }

        // Geometry always follows the surface as it is now
        let (sw, sh) = surface.size();
        surface.clear();
        surface.draw_image(
            frame,
            Rect {
                x: 0,
                y: 0,
                width: sw,
                height: sh,
            },
            self.mirrored,
        )?;

        let mut drawn = 0;
        if let Some(item) = &state.item {
            let size = item.base_size * state.scale;
            for hand in hands {
                let Some(mut landmark) = hand.landmark(item.anchor) else {
                    continue;
                };
                if self.mirrored {
                    landmark.x = 1.0 - landmark.x;
                }

                self.draw_item(surface, item, anchor_point(landmark, (sw, sh)), size)?;
                drawn += 1;
            }
        }

        metrics::histogram!("render_time_us").record(render_start.elapsed().as_micros() as f64);
        Ok(drawn)
    }

    fn draw_item<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        item: &JewelryItem,
        center: Point,
        size: f32,
    ) -> Result<()> {
        if let Visual::Image(sprite) = &item.visual {
            if let Some(image) = sprite.image() {
                return surface.draw_sprite(&image, sprite_rect(center, size));
            }
        }

        let ring = ring_geometry(center, size);
        surface.stroke_ellipse(ring.center, ring.band_radii, item.color, self.line_width)?;
        surface.fill_polygon(&ring.gem, Color::WHITE)?;
        surface.stroke_polygon(&ring.gem, item.color, self.line_width)
    }
}
