//! Background light tracer: incremental dirty/tidy scheduling on one worker thread.
#![forbid(unsafe_code)]

mod queues;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use glimmer_geom::Location;
use glimmer_lighting::{LightError, LightHandle, LightingMap, SourcePool};
use rayon::prelude::*;

use crate::queues::{InFlight, Queues};

const EVENT_BACKLOG: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracerState {
    Stopped,
    Running,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracerEvent {
    /// Accumulated light was cleared and a new pass started.
    Restarted,
    /// Everything is computed and applied; the worker went to sleep.
    Idle,
    /// Shadow casting for the source at this location panicked; it was parked dark.
    Fault(Location),
}

#[derive(Clone, Copy, Debug)]
pub struct TracerStats {
    pub state: TracerState,
    pub dirty: usize,
    pub tidy: usize,
    pub passes: u64,
    pub computed: u64,
    pub applied: u64,
    pub restarts: u64,
    pub faults: u64,
}

struct Shared {
    queues: Mutex<Queues>,
    wake: Condvar,
    map: Weak<dyn LightingMap>,
    pool: Arc<SourcePool>,
    events: Sender<TracerEvent>,
    passes: AtomicU64,
    computed: AtomicU64,
    applied: AtomicU64,
    restarts: AtomicU64,
    faults: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, ev: TracerEvent) {
        if let Err(TrySendError::Full(ev)) = self.events.try_send(ev) {
            log::trace!(target: "tracer", "event backlog full, dropped {:?}", ev);
        }
    }

    // Runs shadow casting for one source, isolating panics from the map or the ray walk.
    fn compute(&self, map: &dyn LightingMap, handle: &LightHandle) -> bool {
        let mut src = handle.lock();
        match catch_unwind(AssertUnwindSafe(|| src.calculate_shadows(map))) {
            Ok(did) => {
                if did {
                    self.computed.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            Err(_) => {
                let at = src.location();
                log::error!(target: "tracer", "shadow casting panicked for light at {:?}; parking it dark", at);
                src.clear_shadows();
                self.faults.fetch_add(1, Ordering::Relaxed);
                self.emit(TracerEvent::Fault(at));
                false
            }
        }
    }

    // Caller must hold the light lock.
    fn apply(&self, map: &dyn LightingMap, handle: &LightHandle) {
        handle.lock().apply(map);
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    fn run(self: Arc<Self>) {
        log::info!(target: "tracer", "worker started");
        loop {
            let mut q = self.lock();
            loop {
                let state = q.state;
                match state {
                    TracerState::Stopped => {
                        log::info!(target: "tracer", "worker stopped");
                        return;
                    }
                    TracerState::Running if q.restart || q.pending => break,
                    _ => {}
                }
                q = self.wake.wait(q).unwrap_or_else(PoisonError::into_inner);
            }
            let Some(map) = self.map.upgrade() else {
                log::warn!(target: "tracer", "lighting map dropped; stopping worker");
                q.state = TracerState::Stopped;
                return;
            };
            let map: &dyn LightingMap = map.as_ref();

            if q.restart {
                q.restart = false;
                q.cursor = 0;
                q.pending = true;
                drop(q);
                {
                    let _lights = map.light_lock().lock();
                    map.reset_lights();
                }
                self.restarts.fetch_add(1, Ordering::Relaxed);
                self.emit(TracerEvent::Restarted);
                log::debug!(target: "tracer", "restart: accumulation cleared");
                continue;
            }

            // Previously stable light goes back in before anything new is computed.
            if q.cursor < q.tidy.len() {
                let h = q.tidy[q.cursor].clone();
                q.cursor += 1;
                drop(q);
                let _lights = map.light_lock().lock();
                self.apply(map, &h);
                continue;
            }

            if let Some(h) = q.pop_dirty() {
                let (location, size) = {
                    let src = h.lock();
                    (src.location(), src.size())
                };
                q.in_flight = Some(InFlight {
                    handle: h.clone(),
                    location,
                    size,
                    dirtied: false,
                    removed: false,
                });
                drop(q);

                self.compute(map, &h);
                {
                    let _lights = map.light_lock().lock();
                    self.apply(map, &h);
                }

                let mut q = self.lock();
                let Some(done) = q.in_flight.take() else {
                    continue;
                };
                if done.removed {
                    drop(q);
                    self.pool.release_light(&h);
                } else if done.dirtied {
                    q.dirty.insert(h);
                } else {
                    q.settle(h);
                }
                continue;
            }

            // Nothing left: one consistent full pass, then sleep.
            q.pending = false;
            q.cursor = q.tidy.len();
            {
                let _lights = map.light_lock().lock();
                map.reset_lights();
                for h in &q.tidy {
                    self.apply(map, h);
                }
                map.render_lights();
            }
            let lights = q.tidy.len();
            drop(q);
            self.passes.fetch_add(1, Ordering::Relaxed);
            self.emit(TracerEvent::Idle);
            log::debug!(target: "tracer", "pass complete, {} light(s) applied", lights);
        }
    }
}

/// Owns the set of active lights for one lighting map and keeps its accumulated
/// colour up to date on a dedicated worker thread.
pub struct LightTracer {
    shared: Arc<Shared>,
    events: Receiver<TracerEvent>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LightTracer {
    /// Creates a stopped tracer for `map`. The map is held weakly so it can own the tracer.
    pub fn new(map: Weak<dyn LightingMap>, pool: Arc<SourcePool>) -> Self {
        let (tx, rx) = bounded(EVENT_BACKLOG);
        Self {
            shared: Arc::new(Shared {
                queues: Mutex::new(Queues::new()),
                wake: Condvar::new(),
                map,
                pool,
                events: tx,
                passes: AtomicU64::new(0),
                computed: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                restarts: AtomicU64::new(0),
                faults: AtomicU64::new(0),
            }),
            events: rx,
            worker: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &Arc<SourcePool> {
        &self.shared.pool
    }

    pub fn state(&self) -> TracerState {
        self.shared.lock().state
    }

    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let mut q = self.shared.lock();
        match q.state {
            TracerState::Running => {}
            TracerState::Paused => {
                q.state = TracerState::Running;
                drop(q);
                self.shared.wake.notify_all();
                log::info!(target: "tracer", "resumed");
            }
            TracerState::Stopped => {
                q.state = TracerState::Running;
                drop(q);
                let shared = self.shared.clone();
                match thread::Builder::new()
                    .name("glimmer-tracer".into())
                    .spawn(move || shared.run())
                {
                    Ok(handle) => *worker = Some(handle),
                    Err(e) => {
                        log::error!(target: "tracer", "failed to spawn worker: {}", e);
                        self.shared.lock().state = TracerState::Stopped;
                    }
                }
            }
        }
    }

    pub fn pause(&self) {
        let mut q = self.shared.lock();
        if q.state == TracerState::Running {
            q.state = TracerState::Paused;
            log::info!(target: "tracer", "paused with {} dirty, {} tidy", q.dirty.len(), q.tidy.len());
        }
    }

    /// Stops and joins the worker. Queued lights are kept; `start` spawns a fresh worker.
    pub fn shutdown(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        self.shared.lock().state = TracerState::Stopped;
        self.shared.wake.notify_all();
        let Some(handle) = worker.take() else {
            return;
        };
        // The worker can end up dropping the map (and us) itself.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!(target: "tracer", "worker thread panicked");
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Queues) -> R) -> R {
        let r = {
            let mut q = self.shared.lock();
            f(&mut q)
        };
        self.shared.wake.notify_all();
        r
    }

    /// Decodes a light from the pool and queues it dirty.
    pub fn add_light(&self, location: Location, packed: u32) -> Result<LightHandle, LightError> {
        let handle = self.shared.pool.create_light(location, packed)?;
        self.add(&handle);
        log::debug!(target: "tracer", "added light {:06} at {:?}", packed, location);
        Ok(handle)
    }

    /// Queues `handle` dirty. Adding a source that is already tracked changes nothing.
    pub fn add(&self, handle: &LightHandle) {
        self.mutate(|q| {
            if handle.lock().is_cached() {
                debug_assert!(false, "adding a pooled light source");
                log::warn!(target: "tracer", "refusing to add pooled light source {:?}", handle);
                return;
            }
            // Already tracked: tidy stays tidy, an in-flight source settles as usual.
            if let Some(f) = q.in_flight_mut(handle) {
                f.removed = false;
                return;
            }
            if q.tidy.contains(handle) || !q.dirty.insert(handle.clone()) {
                return;
            }
            q.pending = true;
        })
    }

    /// Stops tracking `handle` and returns it to the pool. False if it was not tracked.
    pub fn remove(&self, handle: &LightHandle) -> bool {
        let (queued, in_flight) = self.mutate(|q| {
            let queued = q.dirty.remove(handle) || q.take_from_tidy(handle);
            let in_flight = !queued
                && match q.in_flight_mut(handle) {
                    Some(f) if !f.removed => {
                        f.removed = true;
                        true
                    }
                    _ => false,
                };
            if queued || in_flight {
                q.request_restart();
            }
            (queued, in_flight)
        });
        // In-flight sources are released by the worker once it is done with them.
        if queued {
            self.shared.pool.release_light(handle);
        }
        queued || in_flight
    }

    /// Re-dirties tidy sources whose square covers `location`.
    pub fn notify_change(&self, location: Location) {
        self.mutate(|q| {
            let mut moved = q.demote_tidy(|h| h.lock().notify_change(location));
            if let Some(f) = q.in_flight.as_mut() {
                let hit = f
                    .location
                    .planar_reach(location)
                    .is_some_and(|reach| reach <= f.size as u32);
                if hit && !f.removed {
                    f.dirtied = true;
                    f.handle.lock().refresh();
                    moved += 1;
                }
            }
            if moved > 0 {
                log::debug!(target: "tracer", "change at {:?} dirtied {} light(s)", location, moved);
                q.request_restart();
            }
        })
    }

    /// Recomputes every light from scratch.
    pub fn refresh(&self) {
        self.mutate(|q| {
            for h in q.dirty.iter() {
                h.lock().refresh();
            }
            q.demote_tidy(|h| {
                h.lock().refresh();
                true
            });
            if let Some(f) = q.in_flight.as_mut().filter(|f| !f.removed) {
                f.dirtied = true;
                f.handle.lock().refresh();
            }
            q.request_restart();
        })
    }

    pub fn refresh_light(&self, handle: &LightHandle) {
        self.mutate(|q| {
            let tracked = if let Some(f) = q.in_flight_mut(handle) {
                f.dirtied = !f.removed;
                !f.removed
            } else if q.take_from_tidy(handle) {
                q.dirty.insert(handle.clone());
                true
            } else {
                q.dirty.contains(handle)
            };
            if !tracked {
                log::warn!(target: "tracer", "refresh of untracked light {:?}", handle);
                return;
            }
            handle.lock().refresh();
            q.request_restart();
        })
    }

    /// Drops every light, returning them to the pool.
    pub fn clear(&self) {
        let released: Vec<LightHandle> = self.mutate(|q| {
            let mut out: Vec<LightHandle> = q.dirty.drain().collect();
            out.append(&mut q.tidy);
            q.cursor = 0;
            if let Some(f) = q.in_flight.as_mut() {
                f.removed = true;
            }
            q.request_restart();
            out
        });
        log::debug!(target: "tracer", "cleared {} light(s)", released.len());
        for h in &released {
            self.shared.pool.release_light(h);
        }
    }

    /// One full pass on the calling thread: compute all dirty lights, then reset the map
    /// and apply everything. Leaves the worker's run state alone. False if the map is gone.
    pub fn render_lights(&self) -> bool {
        let Some(map) = self.shared.map.upgrade() else {
            return false;
        };
        let map: &dyn LightingMap = map.as_ref();
        let mut q = self.shared.lock();
        let fresh: Vec<LightHandle> = q.dirty.drain().collect();
        let shared = &self.shared;
        fresh.par_iter().for_each(|h| {
            shared.compute(map, h);
        });
        {
            let _lights = map.light_lock().lock();
            map.reset_lights();
            for h in q.tidy.iter().chain(fresh.iter()) {
                shared.apply(map, h);
            }
            map.render_lights();
        }
        q.tidy.extend(fresh);
        if !q.restart {
            q.cursor = q.tidy.len();
        }
        drop(q);
        self.shared.passes.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Alias of [`render_lights`](Self::render_lights).
    pub fn calculate(&self) -> bool {
        self.render_lights()
    }

    /// Snapshot of the (dirty, tidy) partitions.
    pub fn partitions(&self) -> (Vec<LightHandle>, Vec<LightHandle>) {
        let q = self.shared.lock();
        (q.dirty.iter().cloned().collect(), q.tidy.clone())
    }

    pub fn stats(&self) -> TracerStats {
        let (state, dirty, tidy) = {
            let q = self.shared.lock();
            (q.state, q.dirty.len(), q.tidy.len())
        };
        TracerStats {
            state,
            dirty,
            tidy,
            passes: self.shared.passes.load(Ordering::Relaxed),
            computed: self.shared.computed.load(Ordering::Relaxed),
            applied: self.shared.applied.load(Ordering::Relaxed),
            restarts: self.shared.restarts.load(Ordering::Relaxed),
            faults: self.shared.faults.load(Ordering::Relaxed),
        }
    }

    pub fn drain_events(&self) -> Vec<TracerEvent> {
        self.events.try_iter().collect()
    }

    /// Blocks until all queued work is applied, consuming events meanwhile.
    /// False on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shared.lock().is_drained() {
                return true;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            // Any event means the worker made progress; recheck. Poll in case of a full backlog.
            let _ = self.events.recv_timeout(left.min(Duration::from_millis(20)));
        }
    }
}

impl Drop for LightTracer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
