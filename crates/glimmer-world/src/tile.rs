use glimmer_lighting::{Obscurity, VIEW_BLOCKED, VIEW_CLEAR};
use serde::{Deserialize, Serialize};

/// Sides of a tile that let light in, named by the side the light enters through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileFaces(u8);

impl TileFaces {
    pub const NONE: TileFaces = TileFaces(0);
    /// Entered by light travelling towards +x.
    pub const WEST: TileFaces = TileFaces(1 << 0);
    pub const EAST: TileFaces = TileFaces(1 << 1);
    /// Entered by light travelling towards +y.
    pub const NORTH: TileFaces = TileFaces(1 << 2);
    pub const SOUTH: TileFaces = TileFaces(1 << 3);
    pub const ALL: TileFaces = TileFaces(0b1111);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        TileFaces(bits & Self::ALL.0)
    }

    #[inline]
    pub const fn contains(self, other: TileFaces) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: TileFaces) -> Self {
        TileFaces(self.0 | other.0)
    }

    /// Whether light moving along `(dx, dy)` gets in. A diagonal arrival needs
    /// either of its two sides open; the emitter's own tile needs any side open.
    pub fn admits(self, dx: i32, dy: i32) -> bool {
        if self.0 == 0 {
            return false;
        }
        let horizontal = match dx.signum() {
            1 => self.contains(Self::WEST),
            -1 => self.contains(Self::EAST),
            _ => false,
        };
        let vertical = match dy.signum() {
            1 => self.contains(Self::NORTH),
            -1 => self.contains(Self::SOUTH),
            _ => false,
        };
        (dx == 0 && dy == 0) || horizontal || vertical
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub obscurity: Obscurity,
    pub faces: TileFaces,
}

impl Tile {
    pub const FLOOR: Tile = Tile { obscurity: VIEW_CLEAR, faces: TileFaces::ALL };
    /// Opaque, but its faces still catch light.
    pub const WALL: Tile = Tile { obscurity: VIEW_BLOCKED, faces: TileFaces::ALL };
    /// Opaque and never lit. Used for everything outside the map.
    pub const VOID: Tile = Tile { obscurity: VIEW_BLOCKED, faces: TileFaces::NONE };

    pub const fn new(obscurity: Obscurity, faces: TileFaces) -> Self {
        Self { obscurity, faces }
    }

    /// A lit, partially see-through tile such as glass or foliage.
    pub const fn screen(obscurity: Obscurity) -> Self {
        Self { obscurity, faces: TileFaces::ALL }
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.obscurity >= VIEW_BLOCKED
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::FLOOR
    }
}
