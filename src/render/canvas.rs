//! CPU raster surface drawn with tiny-skia

use flume::{Sender, TrySendError};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FillRule, IntSize, LineJoin, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};

use crate::capture::VideoFrame;
use crate::catalog::Color;
use crate::render::surface::{Point, Rect, Surface};
use crate::{Error, Result};

#[derive(Clone)]
pub struct RgbaCanvas {
    pixmap: Pixmap,
    output: Option<Sender<RgbaImage>>,
}

fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width, height).ok_or_else(|| {
        Error::RenderSurface(format!("cannot allocate a {width}x{height} canvas"))
    })
}

fn paint(color: Color) -> Paint<'static> {
    let [r, g, b, a] = color.0;
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn stroke(line_width: f32) -> Stroke {
    Stroke {
        width: line_width,
        line_join: LineJoin::Round,
        ..Stroke::default()
    }
}

fn polygon(points: &[Point]) -> Result<Path> {
    if points.len() < 2 {
        return Err(Error::RenderSurface(format!(
            "polygon needs at least 2 points, got {}",
            points.len()
        )));
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::RenderSurface("non-finite polygon point".into()));
    }

    let mut builder = PathBuilder::new();
    builder.move_to(points[0].x, points[0].y);
    for p in &points[1..] {
        builder.line_to(p.x, p.y);
    }
    builder.close();
    builder
        .finish()
        .ok_or_else(|| Error::RenderSurface("degenerate polygon".into()))
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            pixmap: new_pixmap(width, height)?,
            output: None,
        })
    }

    /// Canvas whose `present` pushes a copy into `output`.
    /// A full channel drops the picture rather than blocking the pump.
    pub fn with_output(width: u32, height: u32, output: Sender<RgbaImage>) -> Result<Self> {
        Ok(Self {
            pixmap: new_pixmap(width, height)?,
            output: Some(output),
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight-alpha copy of the current picture
    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.pixmap.width(), self.pixmap.height(), |x, y| {
            self.pixmap.pixel(x, y).map_or(Rgba([0, 0, 0, 0]), |px| {
                let c = px.demultiply();
                Rgba([c.red(), c.green(), c.blue(), c.alpha()])
            })
        })
    }

    /// Scale `picture` to `dest` and composite it over the canvas
    fn blit(&mut self, picture: RgbaImage, dest: Rect) -> Result<()> {
        let size = IntSize::from_wh(dest.width, dest.height).ok_or_else(|| {
            Error::RenderSurface(format!("cannot draw into {}x{}", dest.width, dest.height))
        })?;
        let picture = if picture.dimensions() == (dest.width, dest.height) {
            picture
        } else {
            imageops::resize(&picture, dest.width, dest.height, FilterType::Triangle)
        };

        // tiny-skia wants premultiplied pixels
        let mut data = picture.into_raw();
        for px in data.chunks_exact_mut(4) {
            if px[3] != 255 {
                let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
                px.copy_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
            }
        }
        let source = Pixmap::from_vec(data, size)
            .ok_or_else(|| Error::RenderSurface("picture does not fit its size".into()))?;

        self.pixmap.draw_pixmap(
            dest.x,
            dest.y,
            source.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(())
    }
}

impl Surface for RgbaCanvas {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::RenderSurface(format!(
                "cannot resize canvas to {width}x{height}"
            )));
        }
        if self.size() != (width, height) {
            self.pixmap = new_pixmap(width, height)?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::BLACK);
    }

    fn draw_image(&mut self, frame: &VideoFrame, dest: Rect, flip_x: bool) -> Result<()> {
        let (fw, fh) = frame.size();
        if fw == 0 || fh == 0 || dest.width == 0 || dest.height == 0 {
            return Err(Error::RenderSurface(format!(
                "cannot draw {fw}x{fh} frame into {}x{}",
                dest.width, dest.height
            )));
        }
        let pixels = frame.packed_rgb().ok_or_else(|| {
            Error::RenderSurface(format!("frame {} is truncated", frame.sequence()))
        })?;

        let mut picture = RgbaImage::from_fn(fw, fh, |x, y| {
            let i = (y as usize * fw as usize + x as usize) * 3;
            Rgba([pixels[i], pixels[i + 1], pixels[i + 2], 255])
        });
        if flip_x {
            imageops::flip_horizontal_in_place(&mut picture);
        }
        self.blit(picture, dest)
    }

    fn draw_sprite(&mut self, sprite: &RgbaImage, dest: Rect) -> Result<()> {
        if sprite.width() == 0 || sprite.height() == 0 {
            return Err(Error::RenderSurface("empty sprite".into()));
        }
        self.blit(sprite.clone(), dest)
    }

    fn stroke_ellipse(
        &mut self,
        center: Point,
        radii: (f32, f32),
        color: Color,
        line_width: f32,
    ) -> Result<()> {
        let (rx, ry) = radii;
        if !(rx.is_finite() && ry.is_finite() && rx >= 0.0 && ry >= 0.0) {
            return Err(Error::RenderSurface(format!("invalid ellipse radii {rx}x{ry}")));
        }
        if rx == 0.0 || ry == 0.0 {
            return Ok(());
        }

        let oval = tiny_skia::Rect::from_xywh(center.x - rx, center.y - ry, 2.0 * rx, 2.0 * ry)
            .ok_or_else(|| Error::RenderSurface(format!("ellipse at {center:?} out of range")))?;
        let mut builder = PathBuilder::new();
        builder.push_oval(oval);
        let path = builder
            .finish()
            .ok_or_else(|| Error::RenderSurface("degenerate ellipse".into()))?;

        self.pixmap.stroke_path(
            &path,
            &paint(color),
            &stroke(line_width),
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) -> Result<()> {
        let path = polygon(points)?;
        self.pixmap.fill_path(
            &path,
            &paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn stroke_polygon(&mut self, points: &[Point], color: Color, line_width: f32) -> Result<()> {
        let path = polygon(points)?;
        self.pixmap.stroke_path(
            &path,
            &paint(color),
            &stroke(line_width),
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let Some(output) = &self.output else {
            return Ok(());
        };
        if output.is_disconnected() {
            return Err(Error::RenderSurface("display is gone".into()));
        }
        // skip the copy when the window has not caught up
        if output.is_full() {
            metrics::counter!("presents_dropped").increment(1);
            return Ok(());
        }
        match output.try_send(self.to_image()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                metrics::counter!("presents_dropped").increment(1);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(Error::RenderSurface("display is gone".into()))
            }
        }
    }
}
