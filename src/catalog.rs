//! Selectable jewelry items

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use once_cell::sync::{Lazy, OnceCell};
use tracing::{info, warn};

use crate::detect::landmarks::index;

/// Straight RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);

    /// Parse `#RRGGBB`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some(Color([channel(0)?, channel(2)?, channel(4)?, 255]))
    }
}

/// Picture of a piece of jewelry, decoded on first use
#[derive(Clone)]
pub struct Sprite {
    path: &'static str,
    image: OnceCell<Option<Arc<RgbaImage>>>,
}

impl Sprite {
    /// Image file under the working directory, e.g. `assets/band.png`
    pub const fn asset(path: &'static str) -> Self {
        Self {
            path,
            image: OnceCell::new(),
        }
    }

    /// Already decoded picture
    pub fn from_image(name: &'static str, image: RgbaImage) -> Self {
        Self {
            path: name,
            image: OnceCell::with_value(Some(Arc::new(image))),
        }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    /// The decoded picture. A file that fails to load is reported once and
    /// stays `None`.
    pub fn image(&self) -> Option<Arc<RgbaImage>> {
        self.image
            .get_or_init(|| match image::open(self.path) {
                Ok(decoded) => {
                    let decoded = decoded.to_rgba8();
                    info!("Loaded {} ({}x{})", self.path, decoded.width(), decoded.height());
                    Some(Arc::new(decoded))
                }
                Err(e) => {
                    warn!("Cannot load jewelry image {}: {}", self.path, e);
                    None
                }
            })
            .clone()
    }
}

impl fmt::Debug for Sprite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sprite").field(&self.path).finish()
    }
}

impl PartialEq for Sprite {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

/// How an item is drawn over the anchor
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    /// Band ellipse and gem in the item color
    Ring,
    /// Picture `2 * size` pixels square; drawn as a ring if it cannot load
    Image(Sprite),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JewelryItem {
    pub id: &'static str,
    pub name: &'static str,
    /// Band color, also the swatch shown for image items
    pub color: Color,
    pub visual: Visual,
    /// Overlay half-width in pixels at scale 1.0
    pub base_size: f32,
    /// Landmark the overlay is centered on
    pub anchor: usize,
}

pub struct Catalog {
    items: Vec<Arc<JewelryItem>>,
}

static CATALOG: Lazy<Catalog> = Lazy::new(|| Catalog {
    items: vec![
        Arc::new(JewelryItem {
            id: "gold",
            name: "Gold Ring",
            color: Color([0xFF, 0xD7, 0x00, 0xFF]),
            visual: Visual::Ring,
            base_size: 30.0,
            anchor: index::RING_FINGER_PIP,
        }),
        Arc::new(JewelryItem {
            id: "silver",
            name: "Silver Ring",
            color: Color([0xC0, 0xC0, 0xC0, 0xFF]),
            visual: Visual::Ring,
            base_size: 25.0,
            anchor: index::RING_FINGER_PIP,
        }),
        Arc::new(JewelryItem {
            id: "rose",
            name: "Rose Gold Ring",
            color: Color([0xB7, 0x6E, 0x79, 0xFF]),
            visual: Visual::Ring,
            base_size: 35.0,
            anchor: index::RING_FINGER_PIP,
        }),
        Arc::new(JewelryItem {
            id: "band",
            name: "Silver Band",
            color: Color([0xC0, 0xC0, 0xC0, 0xFF]),
            visual: Visual::Image(Sprite::asset("assets/silver_band.png")),
            base_size: 25.0,
            anchor: index::RING_FINGER_PIP,
        }),
    ],
});

impl Catalog {
    pub fn global() -> &'static Catalog {
        &CATALOG
    }

    pub fn items(&self) -> &[Arc<JewelryItem>] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<Arc<JewelryItem>> {
        self.items.iter().find(|item| item.id == id).cloned()
    }

    /// Item after `current`, wrapping; the first item when nothing is selected
    pub fn next_after(&self, current: Option<&JewelryItem>) -> Option<Arc<JewelryItem>> {
        let pos = current.and_then(|cur| self.items.iter().position(|i| i.id == cur.id));
        let next = pos.map_or(0, |p| (p + 1) % self.items.len());
        self.items.get(next).cloned()
    }
}
