use glimmer_geom::Location;
use glimmer_lighting::LightHandle;
use hashbrown::HashSet;

use crate::TracerState;

// Source popped from `dirty` that the worker is computing outside the queue lock.
pub(crate) struct InFlight {
    pub handle: LightHandle,
    pub location: Location,
    pub size: usize,
    // Changed while computing: goes back to dirty instead of tidy.
    pub dirtied: bool,
    pub removed: bool,
}

/// Dirty/tidy partition plus the worker's scheduling flags. Always behind the queue lock.
pub(crate) struct Queues {
    pub state: TracerState,
    pub dirty: HashSet<LightHandle>,
    pub tidy: Vec<LightHandle>,
    // tidy[..cursor] has been applied since the last reset.
    pub cursor: usize,
    pub in_flight: Option<InFlight>,
    pub pending: bool,
    pub restart: bool,
}

impl Queues {
    pub fn new() -> Self {
        Self {
            state: TracerState::Stopped,
            dirty: HashSet::new(),
            tidy: Vec::new(),
            cursor: 0,
            in_flight: None,
            pending: false,
            restart: false,
        }
    }

    pub fn request_restart(&mut self) {
        self.restart = true;
        self.pending = true;
    }

    pub fn in_flight_mut(&mut self, handle: &LightHandle) -> Option<&mut InFlight> {
        self.in_flight.as_mut().filter(|f| f.handle == *handle)
    }

    pub fn take_from_tidy(&mut self, handle: &LightHandle) -> bool {
        let Some(pos) = self.tidy.iter().position(|h| h == handle) else {
            return false;
        };
        self.tidy.remove(pos);
        if pos < self.cursor {
            self.cursor -= 1;
        }
        true
    }

    /// Moves every tidy source for which `dirties` returns true into `dirty`.
    pub fn demote_tidy(&mut self, mut dirties: impl FnMut(&LightHandle) -> bool) -> usize {
        let mut moved = 0;
        let mut i = 0;
        while i < self.tidy.len() {
            if dirties(&self.tidy[i]) {
                let h = self.tidy.remove(i);
                if i < self.cursor {
                    self.cursor -= 1;
                }
                self.dirty.insert(h);
                moved += 1;
            } else {
                i += 1;
            }
        }
        moved
    }

    pub fn pop_dirty(&mut self) -> Option<LightHandle> {
        let h = self.dirty.iter().next().cloned()?;
        self.dirty.remove(&h);
        Some(h)
    }

    /// Inserts a freshly applied source into tidy, counted as applied this pass.
    pub fn settle(&mut self, handle: LightHandle) {
        let at = self.cursor.min(self.tidy.len());
        self.tidy.insert(at, handle);
        self.cursor = at + 1;
    }

    pub fn is_drained(&self) -> bool {
        !self.pending && !self.restart && self.dirty.is_empty() && self.in_flight.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimmer_lighting::LightSource;

    fn handle(x: i32) -> LightHandle {
        LightHandle::new(LightSource::new(Location::new(x, 0, 0), 19990).unwrap())
    }

    #[test]
    fn take_from_tidy_keeps_cursor_on_next_unapplied() {
        let mut q = Queues::new();
        let hs: Vec<_> = (0..4).map(handle).collect();
        q.tidy = hs.clone();
        q.cursor = 2;
        assert!(q.take_from_tidy(&hs[0]));
        assert_eq!(q.cursor, 1);
        assert_eq!(q.tidy[q.cursor], hs[2]);
        assert!(q.take_from_tidy(&hs[3]));
        assert_eq!(q.cursor, 1);
        assert!(!q.take_from_tidy(&hs[3]));
    }

    #[test]
    fn settle_inserts_at_cursor() {
        let mut q = Queues::new();
        let hs: Vec<_> = (0..3).map(handle).collect();
        q.tidy = vec![hs[0].clone(), hs[1].clone()];
        q.cursor = 1;
        q.settle(hs[2].clone());
        assert_eq!(q.tidy, vec![hs[0].clone(), hs[2].clone(), hs[1].clone()]);
        assert_eq!(q.cursor, 2);
    }

    #[test]
    fn demote_moves_matching_only() {
        let mut q = Queues::new();
        let hs: Vec<_> = (0..4).map(handle).collect();
        q.tidy = hs.clone();
        q.cursor = 4;
        let moved = q.demote_tidy(|h| h == &hs[1] || h == &hs[3]);
        assert_eq!(moved, 2);
        assert_eq!(q.tidy, vec![hs[0].clone(), hs[2].clone()]);
        assert_eq!(q.cursor, 2);
        assert!(q.dirty.contains(&hs[1]) && q.dirty.contains(&hs[3]));
        assert!(q.pop_dirty().is_some());
        assert!(q.pop_dirty().is_some());
        assert!(q.pop_dirty().is_none());
    }
}
