use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glimmer_geom::{Location, Rgb};

use crate::params::{LightError, LightParams};
use crate::rays::RayTable;
use crate::{LightingMap, VIEW_BLOCKED};

/// Linear attenuation: 1.0 at the emitter, reaching 0.0 one tile past the radius.
#[inline]
pub fn falloff(dist: f32, size: usize) -> f32 {
    (1.0 - dist / (size as f32 + 1.0)).max(0.0)
}

/// A single point emitter and its last computed intensity grid.
pub struct LightSource {
    location: Location,
    params: LightParams,
    // Row-major, side = 2 * size + 1, centre at (size, size).
    grid: Vec<f32>,
    dirty: bool,
    cached: bool,
}

impl LightSource {
    pub fn new(location: Location, packed: u32) -> Result<Self, LightError> {
        Ok(Self::with_params(location, LightParams::decode(packed)?))
    }

    pub fn with_params(location: Location, params: LightParams) -> Self {
        let side = params.side();
        Self {
            location,
            params,
            grid: vec![0.0; side * side],
            dirty: true,
            cached: false,
        }
    }

    /// Replaces location and parameters. Leaves the source untouched on error.
    pub fn decode(&mut self, location: Location, packed: u32) -> Result<(), LightError> {
        let params = LightParams::decode(packed)?;
        if self.cached {
            debug_assert!(false, "decode on a pooled light source");
            log::warn!("ignoring decode of pooled light source at {:?}", self.location);
            return Ok(());
        }
        self.set_params(location, params);
        Ok(())
    }

    fn set_params(&mut self, location: Location, params: LightParams) {
        let side = params.side();
        if self.grid.len() != side * side {
            self.grid = vec![0.0; side * side];
        }
        self.location = location;
        self.params = params;
        self.dirty = true;
    }

    /// Recomputes the intensity grid if dirty. Returns whether any work was done.
    pub fn calculate_shadows(&mut self, map: &dyn LightingMap) -> bool {
        if self.cached {
            debug_assert!(false, "shadow casting on a pooled light source");
            log::warn!("skipping shadows of pooled light source at {:?}", self.location);
            return false;
        }
        if !self.dirty {
            return false;
        }
        self.grid.fill(0.0);
        let size = self.params.size;
        let side = self.params.side();
        let centre = size * side + size;
        if map.accepts_light(self.location, 0, 0) {
            self.grid[centre] = 1.0;
        }
        for ray in RayTable::for_radius(size).rays() {
            let mut transmission = 1.0f32;
            for step in ray {
                // Past the edge of the coordinate space: nothing there to light or block.
                let Some(here) = self.location.checked_offset(step.dx as i32, step.dy as i32) else {
                    break;
                };
                if map.accepts_light(here, step.sx as i32, step.sy as i32) {
                    let v = falloff(step.dist, size) * transmission;
                    let gx = (step.dx as i32 + size as i32) as usize;
                    let gy = (step.dy as i32 + size as i32) as usize;
                    let cell = &mut self.grid[gy * side + gx];
                    if v > *cell {
                        *cell = v;
                    }
                }
                let obscurity = map.blocks_view(here);
                if obscurity >= VIEW_BLOCKED {
                    break;
                }
                transmission *= 1.0 - obscurity as f32 / VIEW_BLOCKED as f32;
            }
        }
        self.dirty = false;
        true
    }

    /// Adds this source's contribution to `map`.
    pub fn apply(&self, map: &dyn LightingMap) {
        if self.cached {
            return;
        }
        let size = self.params.size as i32;
        let side = self.params.side();
        for (i, &intensity) in self.grid.iter().enumerate() {
            if intensity <= 0.0 {
                continue;
            }
            let dx = (i % side) as i32 - size;
            let dy = (i / side) as i32 - size;
            if let Some(loc) = self.location.checked_offset(dx, dy) {
                map.set_light(loc, self.delta(intensity));
            }
        }
    }

    /// Colour added for a cell of the given intensity.
    #[inline]
    pub fn delta(&self, intensity: f32) -> Rgb {
        let c = self.params.color * (intensity * self.params.brightness);
        if self.params.invert { c - Rgb::WHITE } else { c }
    }

    /// Marks the source dirty if `changed` lies within its square on the same layer.
    pub fn notify_change(&mut self, changed: Location) -> bool {
        if self.cached {
            debug_assert!(false, "change notification on a pooled light source");
            return false;
        }
        match self.location.planar_reach(changed) {
            Some(reach) if reach <= self.params.size as u32 => {
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    pub fn refresh(&mut self) {
        if self.cached {
            debug_assert!(false, "refresh of a pooled light source");
            return;
        }
        self.dirty = true;
    }

    /// Drops the computed grid without recomputing; used to park a faulted source.
    pub fn clear_shadows(&mut self) {
        self.grid.fill(0.0);
        self.dirty = false;
    }

    pub(crate) fn reinit(&mut self, location: Location, params: LightParams) {
        self.cached = false;
        self.grid.fill(0.0);
        self.set_params(location, params);
    }

    pub(crate) fn reset_cached(&mut self) {
        self.grid.fill(0.0);
        self.params.color = Rgb::BLACK;
        self.params.brightness = 0.0;
        self.params.invert = false;
        self.dirty = false;
        self.cached = true;
    }

    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }

    #[inline]
    pub fn params(&self) -> &LightParams {
        &self.params
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.params.size
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Computed intensity at an offset from the emitter; 0.0 outside the grid.
    pub fn intensity_at(&self, dx: i32, dy: i32) -> f32 {
        let size = self.params.size as i32;
        if dx.abs() > size || dy.abs() > size {
            return 0.0;
        }
        let side = self.params.side();
        self.grid[(dy + size) as usize * side + (dx + size) as usize]
    }
}

impl fmt::Debug for LightSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightSource")
            .field("location", &self.location)
            .field("params", &self.params)
            .field("dirty", &self.dirty)
            .field("cached", &self.cached)
            .finish()
    }
}

/// Shared handle to a pooled light source. Equality and hashing are by identity.
#[derive(Clone)]
pub struct LightHandle(Arc<Mutex<LightSource>>);

impl LightHandle {
    pub fn new(source: LightSource) -> Self {
        Self(Arc::new(Mutex::new(source)))
    }

    /// Locks the source. A panic while the lock was held does not make it unusable.
    pub fn lock(&self) -> MutexGuard<'_, LightSource> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &LightHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for LightHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for LightHandle {}

impl Hash for LightHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for LightHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LightHandle({:p})", Arc::as_ptr(&self.0))
    }
}
