use std::sync::{Mutex, OnceLock, PoisonError};

use glimmer_geom::Location;

use crate::MAX_RADIUS;
use crate::params::{LightError, LightParams};
use crate::source::{LightHandle, LightSource};

/// Free lists of released light sources, one per radius.
///
/// Each radius has its own lock, so releasing a size-2 light never waits on a size-5 one.
/// Lists are allocated on first use.
#[derive(Default)]
pub struct SourcePool {
    lists: [OnceLock<Mutex<Vec<LightHandle>>>; MAX_RADIUS],
}

impl SourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, size: usize) -> &Mutex<Vec<LightHandle>> {
        assert!((1..=MAX_RADIUS).contains(&size), "no pool for radius {size}");
        self.lists[size - 1].get_or_init(|| Mutex::new(Vec::new()))
    }

    pub fn acquire(&self, size: usize) -> Option<LightHandle> {
        self.list(size)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    pub fn release(&self, size: usize, handle: LightHandle) {
        let mut list = self.list(size).lock().unwrap_or_else(PoisonError::into_inner);
        if list.iter().any(|h| h.ptr_eq(&handle)) {
            debug_assert!(false, "light source released twice");
            return;
        }
        list.push(handle);
    }

    /// Decodes `packed` into a recycled source of the same radius, or a fresh one.
    pub fn create_light(&self, location: Location, packed: u32) -> Result<LightHandle, LightError> {
        let params = LightParams::decode(packed)?;
        if let Some(handle) = self.acquire(params.size) {
            handle.lock().reinit(location, params);
            return Ok(handle);
        }
        Ok(LightHandle::new(LightSource::with_params(location, params)))
    }

    /// Resets the source and returns it to its radius's list. Releasing twice is a no-op.
    pub fn release_light(&self, handle: &LightHandle) {
        let size = {
            let mut source = handle.lock();
            if source.is_cached() {
                log::debug!("light source at {:?} already pooled", source.location());
                return;
            }
            source.reset_cached();
            source.size()
        };
        self.release(size, handle.clone());
    }

    /// Number of sources waiting in the list for `size`.
    pub fn pooled(&self, size: usize) -> usize {
        self.lists
            .get(size.wrapping_sub(1))
            .and_then(OnceLock::get)
            .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }
}
