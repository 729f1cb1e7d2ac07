//! User-controlled overlay selection and scale

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::catalog::{Catalog, JewelryItem};
use crate::OverlayConfig;

/// What the renderer draws. Read once per tick as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    pub item: Option<Arc<JewelryItem>>,
    pub scale: f32,
}

/// Shared handle for UI handlers and the frame pump.
///
/// Every setter swaps in a whole new state, so a reader never sees the
/// selection from one action paired with the scale from another.
#[derive(Clone)]
pub struct OverlayControls {
    state: Arc<ArcSwap<OverlayState>>,
    min_scale: f32,
    max_scale: f32,
    step: f32,
}

impl OverlayControls {
    pub fn new(config: &OverlayConfig) -> Self {
        let item = Catalog::global().get(&config.default_item);
        if item.is_none() {
            debug!("Unknown default item {:?}, starting with none", config.default_item);
        }
        let scale = config.initial_scale.clamp(config.scale_min, config.scale_max);
        Self {
            state: Arc::new(ArcSwap::from_pointee(OverlayState { item, scale })),
            min_scale: config.scale_min,
            max_scale: config.scale_max,
            step: config.scale_step,
        }
    }

    pub fn snapshot(&self) -> Arc<OverlayState> {
        self.state.load_full()
    }

    pub fn select(&self, item: Option<Arc<JewelryItem>>) {
        self.state.rcu(|current| OverlayState {
            item: item.clone(),
            scale: current.scale,
        });
    }

    /// Select by catalog id; false if the id is unknown
    pub fn select_id(&self, id: &str) -> bool {
        match Catalog::global().get(id) {
            Some(item) => {
                self.select(Some(item));
                true
            }
            None => false,
        }
    }

    pub fn select_next(&self) {
        self.state.rcu(|current| OverlayState {
            item: Catalog::global().next_after(current.item.as_deref()),
            scale: current.scale,
        });
    }

    /// Set the scale, clamped to the configured bounds.
    /// Non-finite values are ignored. Returns the scale now in effect.
    pub fn set_scale(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return self.state.load().scale;
        }
        let scale = value.clamp(self.min_scale, self.max_scale);
        self.state.rcu(|current| OverlayState {
            item: current.item.clone(),
            scale,
        });
        scale
    }

    /// Move the scale by `steps` slider increments
    pub fn nudge_scale(&self, steps: f32) -> f32 {
        let target = self.state.load().scale + steps * self.step;
        self.set_scale(target)
    }

    /// Replace selection and scale in one swap
    pub fn set(&self, item: Option<Arc<JewelryItem>>, scale: f32) {
        let scale = if scale.is_finite() {
            scale.clamp(self.min_scale, self.max_scale)
        } else {
            self.state.load().scale
        };
        self.state.store(Arc::new(OverlayState { item, scale }));
    }
}
