pub mod canvas;
pub mod compositor;
pub mod overlay;
pub mod recording;
pub mod surface;

pub use canvas::RgbaCanvas;
pub use compositor::{ring_geometry, OverlayRenderer, RingGeometry};
pub use overlay::{OverlayControls, OverlayState};
pub use recording::{DrawOp, RecordingSurface};
pub use surface::{Point, Rect, Surface};
