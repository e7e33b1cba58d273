use std::fs;
use std::path::{Path, PathBuf};

use glimmer_geom::Location;
use glimmer_lighting::{Obscurity, VIEW_BLOCKED};
use glimmer_world::{MAX_TILES, Tile, TileMap};
use serde::Deserialize;

const BUILTIN_SCENE: &str = include_str!("../scenes/default.toml");

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to read scene {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scene")]
    Parse(#[from] toml::de::Error),
    #[error("map must be at least 1x1x1, got {width}x{height}x{depth}")]
    EmptyMap { width: usize, height: usize, depth: usize },
    #[error("map {width}x{height}x{depth} exceeds {max} tiles", max = MAX_TILES)]
    MapTooLarge { width: usize, height: usize, depth: usize },
    #[error("{what} at ({x}, {y}, {z}) lies outside the map")]
    OutOfBounds { what: &'static str, x: i32, y: i32, z: i32 },
}

#[derive(Clone, Debug, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub map: MapSection,
    #[serde(default)]
    pub tracer: TracerSection,
    #[serde(default)]
    pub lights: Vec<LightEntry>,
    #[serde(default)]
    pub walls: Vec<WallEntry>,
    /// Walls placed after the first frame.
    #[serde(default)]
    pub edits: Vec<WallEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MapSection {
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
    #[serde(default = "default_depth")]
    pub depth: usize,
}

impl Default for MapSection {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            depth: default_depth(),
        }
    }
}

fn default_width() -> usize {
    24
}

fn default_height() -> usize {
    12
}

fn default_depth() -> usize {
    1
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TracerMode {
    #[default]
    Background,
    Sync,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TracerSection {
    #[serde(default)]
    pub mode: TracerMode,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct LightEntry {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: i32,
    pub param: u32,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct WallEntry {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: i32,
    #[serde(default = "default_obscurity")]
    pub obscurity: Obscurity,
}

fn default_obscurity() -> Obscurity {
    VIEW_BLOCKED
}

impl LightEntry {
    pub fn location(&self) -> Location {
        Location::new(self.x, self.y, self.z)
    }
}

impl WallEntry {
    pub fn location(&self) -> Location {
        Location::new(self.x, self.y, self.z)
    }

    pub fn tile(&self) -> Tile {
        Tile::screen(self.obscurity)
    }
}

impl SceneConfig {
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let s = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    pub fn builtin() -> Result<Self, SceneError> {
        Self::from_toml_str(BUILTIN_SCENE)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, SceneError> {
        let cfg: SceneConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), SceneError> {
        let MapSection { width, height, depth } = self.map;
        if width == 0 || height == 0 || depth == 0 {
            return Err(SceneError::EmptyMap { width, height, depth });
        }
        if TileMap::tile_count(width, height, depth).is_none() {
            return Err(SceneError::MapTooLarge { width, height, depth });
        }
        let inside = |x: i32, y: i32, z: i32| {
            x >= 0
                && y >= 0
                && z >= 0
                && (x as usize) < width
                && (y as usize) < height
                && (z as usize) < depth
        };
        let placed = self
            .lights
            .iter()
            .map(|l| ("light", l.x, l.y, l.z))
            .chain(self.walls.iter().map(|w| ("wall", w.x, w.y, w.z)))
            .chain(self.edits.iter().map(|w| ("edit", w.x, w.y, w.z)));
        for (what, x, y, z) in placed {
            if !inside(x, y, z) {
                return Err(SceneError::OutOfBounds { what, x, y, z });
            }
        }
        Ok(())
    }

    /// Places walls then queues lights. Returns how many lights were accepted.
    pub fn populate(&self, map: &TileMap) -> usize {
        for w in &self.walls {
            map.set_tile(w.location(), w.tile());
        }
        let mut added = 0;
        for l in &self.lights {
            match map.tracer().add_light(l.location(), l.param) {
                Ok(_) => added += 1,
                Err(e) => log::warn!("skipping light at {:?}: {}", l.location(), e),
            }
        }
        log::info!(
            "scene placed {} wall(s), {} of {} light(s)",
            self.walls.len(),
            added,
            self.lights.len()
        );
        added
    }

    pub fn apply_edits(&self, map: &TileMap) {
        for w in &self.edits {
            map.set_tile(w.location(), w.tile());
        }
        log::info!("applied {} edit(s)", self.edits.len());
    }
}
