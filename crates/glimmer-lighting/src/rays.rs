//! Precomputed shadow-ray geometry, one table per light radius.

use std::sync::OnceLock;

use crate::MAX_RADIUS;

/// One cell along a ray, relative to the emitter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayStep {
    pub dx: i8,
    pub dy: i8,
    /// Unit direction of travel into this cell (each component in -1..=1).
    pub sx: i8,
    pub sy: i8,
    /// Euclidean distance from the emitter, in tiles.
    pub dist: f32,
}

pub struct RayTable {
    radius: usize,
    rays: Vec<Vec<RayStep>>,
}

impl RayTable {
    /// Shared table for `radius`. Panics outside `1..=MAX_RADIUS`.
    pub fn for_radius(radius: usize) -> &'static RayTable {
        assert!(
            (1..=MAX_RADIUS).contains(&radius),
            "no ray table for radius {radius}"
        );
        static TABLES: OnceLock<[RayTable; MAX_RADIUS]> = OnceLock::new();
        let t = TABLES.get_or_init(build_tables);
        &t[radius - 1]
    }

    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    #[inline]
    pub fn rays(&self) -> impl Iterator<Item = &[RayStep]> {
        self.rays.iter().map(Vec::as_slice)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rays.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    fn build(radius: usize) -> Self {
        let r = radius as i32;
        let mut rays = Vec::with_capacity(8 * radius);
        // Walk the square perimeter clockwise from the top-left corner.
        for x in -r..r {
            rays.push(line_to(x, -r));
        }
        for y in -r..r {
            rays.push(line_to(r, y));
        }
        for x in (-r + 1..=r).rev() {
            rays.push(line_to(x, r));
        }
        for y in (-r + 1..=r).rev() {
            rays.push(line_to(-r, y));
        }
        Self { radius, rays }
    }
}

fn build_tables() -> [RayTable; MAX_RADIUS] {
    std::array::from_fn(|i| RayTable::build(i + 1))
}

// Bresenham from the origin to (tx, ty), origin excluded.
fn line_to(tx: i32, ty: i32) -> Vec<RayStep> {
    let (ax, ay) = (tx.abs(), ty.abs());
    let (sx, sy) = (tx.signum(), ty.signum());
    let mut out = Vec::with_capacity(ax.max(ay) as usize);
    let (mut x, mut y) = (0i32, 0i32);
    let mut err = ax - ay;
    while (x, y) != (tx, ty) {
        let e2 = 2 * err;
        let (mut mx, mut my) = (0, 0);
        if e2 > -ay {
            err -= ay;
            x += sx;
            mx = sx;
        }
        if e2 < ax {
            err += ax;
            y += sy;
            my = sy;
        }
        out.push(RayStep {
            dx: x as i8,
            dy: y as i8,
            sx: mx as i8,
            sy: my as i8,
            dist: ((x * x + y * y) as f32).sqrt(),
        });
    }
    out
}
