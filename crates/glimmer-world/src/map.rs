use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use glimmer_geom::{Location, Rgb};
use glimmer_lighting::{LightLock, LightingMap, Obscurity, SourcePool};
use glimmer_runtime::LightTracer;

use crate::tile::Tile;

/// A `width x height x depth` grid of tiles with a per-tile light accumulator.
///
/// Tile reads and writes go through the tile lock. Accumulated colour is only touched
/// with the [`LightLock`] held; its own mutex is a leaf beneath it.
pub struct TileMap {
    width: usize,
    height: usize,
    depth: usize,
    tiles: RwLock<Vec<Tile>>,
    lights: Mutex<Vec<Rgb>>,
    light_lock: LightLock,
    render_passes: AtomicU64,
    tracer: LightTracer,
}

/// Largest map, in tiles, that [`TileMap::new`] will allocate.
pub const MAX_TILES: usize = 1 << 24;

impl TileMap {
    /// Tile count for the given dimensions; `None` if it overflows or exceeds [`MAX_TILES`].
    pub fn tile_count(width: usize, height: usize, depth: usize) -> Option<usize> {
        width
            .checked_mul(height)?
            .checked_mul(depth)
            .filter(|&n| n <= MAX_TILES)
    }

    /// Builds an all-floor map and its (stopped) tracer.
    ///
    /// Panics if the map would exceed [`MAX_TILES`]; check with [`tile_count`](Self::tile_count).
    pub fn new(width: usize, height: usize, depth: usize, pool: Arc<SourcePool>) -> Arc<Self> {
        let Some(cells) = Self::tile_count(width, height, depth) else {
            panic!("tile map {width}x{height}x{depth} exceeds {MAX_TILES} tiles");
        };
        log::info!(target: "world", "tile map {}x{}x{} ({} tiles)", width, height, depth, cells);
        Arc::new_cyclic(|this: &Weak<TileMap>| {
            let map: Weak<dyn LightingMap> = this.clone();
            TileMap {
                width,
                height,
                depth,
                tiles: RwLock::new(vec![Tile::FLOOR; cells]),
                lights: Mutex::new(vec![Rgb::BLACK; cells]),
                light_lock: LightLock::new(),
                render_passes: AtomicU64::new(0),
                tracer: LightTracer::new(map, pool),
            }
        })
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    #[inline]
    fn index(&self, loc: Location) -> Option<usize> {
        if loc.x < 0 || loc.y < 0 || loc.z < 0 {
            return None;
        }
        let (x, y, z) = (loc.x as usize, loc.y as usize, loc.z as usize);
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        Some((z * self.height + y) * self.width + x)
    }

    #[inline]
    pub fn contains(&self, loc: Location) -> bool {
        self.index(loc).is_some()
    }

    pub fn tracer(&self) -> &LightTracer {
        &self.tracer
    }

    fn tiles(&self) -> std::sync::RwLockReadGuard<'_, Vec<Tile>> {
        self.tiles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lights(&self) -> MutexGuard<'_, Vec<Rgb>> {
        self.lights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The tile at `loc`; [`Tile::VOID`] outside the map.
    pub fn tile(&self, loc: Location) -> Tile {
        match self.index(loc) {
            Some(i) => self.tiles()[i],
            None => Tile::VOID,
        }
    }

    /// Replaces a tile and tells the tracer. False (and no notification) outside the map.
    pub fn set_tile(&self, loc: Location, tile: Tile) -> bool {
        let Some(i) = self.index(loc) else {
            log::warn!(target: "world", "set_tile outside map at {:?}", loc);
            return false;
        };
        {
            let mut tiles = self.tiles.write().unwrap_or_else(PoisonError::into_inner);
            if tiles[i] == tile {
                return true;
            }
            tiles[i] = tile;
        }
        self.tracer.notify_change(loc);
        true
    }

    /// Accumulated colour at `loc`; black outside the map.
    pub fn light_at(&self, loc: Location) -> Rgb {
        let Some(i) = self.index(loc) else {
            return Rgb::BLACK;
        };
        let _lights = self.light_lock.lock();
        self.lights()[i]
    }

    /// Row-major copy of one layer's accumulated colour, taken under the light lock.
    pub fn snapshot_layer(&self, z: i32) -> Vec<Rgb> {
        if z < 0 || z as usize >= self.depth {
            return Vec::new();
        }
        let plane = self.width * self.height;
        let start = z as usize * plane;
        let _lights = self.light_lock.lock();
        self.lights()[start..start + plane].to_vec()
    }

    /// Completed full passes delivered to this map.
    pub fn render_passes(&self) -> u64 {
        self.render_passes.load(Ordering::Relaxed)
    }
}

impl LightingMap for TileMap {
    fn accepts_light(&self, loc: Location, dx: i32, dy: i32) -> bool {
        self.tile(loc).faces.admits(dx, dy)
    }

    fn blocks_view(&self, loc: Location) -> Obscurity {
        self.tile(loc).obscurity
    }

    fn set_light(&self, loc: Location, color: Rgb) {
        if let Some(i) = self.index(loc) {
            self.lights()[i] += color;
        }
    }

    fn reset_lights(&self) {
        self.lights().fill(Rgb::BLACK);
    }

    fn render_lights(&self) {
        let n = self.render_passes.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!(target: "world", "render pass {}", n);
    }

    fn light_lock(&self) -> &LightLock {
        &self.light_lock
    }
}
