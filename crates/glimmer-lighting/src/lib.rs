//! Point light sources, shadow-ray geometry, and source recycling.
//!
//! Lock order across the engine: tracer queue, then the [`LightLock`], then a source's
//! own lock, then tile storage. Shadow casting never runs under the light lock, and
//! maps must not take their tile lock while the light lock is held.
#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard, PoisonError};

use glimmer_geom::{Location, Rgb};

pub mod params;
pub mod pool;
pub mod rays;
pub mod source;

pub use params::{LightError, LightParams};
pub use pool::SourcePool;
pub use rays::{RayStep, RayTable};
pub use source::{LightHandle, LightSource, falloff};

/// Largest supported light radius.
pub const MAX_RADIUS: usize = 6;

/// Degree of view blocking: 0 is clear, [`VIEW_BLOCKED`] is opaque.
pub type Obscurity = u8;
pub const VIEW_CLEAR: Obscurity = 0;
pub const VIEW_BLOCKED: Obscurity = u8::MAX;

/// Monitor serialising light application against reads of accumulated colour.
#[derive(Default)]
pub struct LightLock {
    inner: Mutex<()>,
}

pub type LightGuard<'a> = MutexGuard<'a, ()>;

impl LightLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> LightGuard<'_> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tile storage as seen by the lighting engine.
pub trait LightingMap: Send + Sync {
    /// Whether the tile at `loc` takes light arriving along direction `(dx, dy)`.
    fn accepts_light(&self, loc: Location, dx: i32, dy: i32) -> bool;

    fn blocks_view(&self, loc: Location) -> Obscurity;

    /// Adds `color` to the tile's accumulated light. Called with the light lock held.
    fn set_light(&self, loc: Location, color: Rgb);

    /// Clears all accumulated light to black. Called with the light lock held.
    fn reset_lights(&self);

    /// Hook run once a full pass has been applied. Called with the light lock held.
    fn render_lights(&self) {}

    fn light_lock(&self) -> &LightLock;
}
