use std::sync::Arc;

use glimmer_geom::{Location, Rgb};
use glimmer_lighting::{LightingMap, SourcePool, VIEW_BLOCKED};

use crate::{MAX_TILES, Tile, TileFaces, TileMap};

fn map(w: usize, h: usize, d: usize) -> Arc<TileMap> {
    TileMap::new(w, h, d, Arc::new(SourcePool::new()))
}

#[test]
fn faces_admit_by_arrival_direction() {
    let west = TileFaces::WEST;
    assert!(west.admits(1, 0));
    assert!(!west.admits(-1, 0));
    assert!(west.admits(1, 1));
    assert!(!west.admits(0, 1));
    assert!(west.admits(0, 0));
    assert!(!TileFaces::NONE.admits(0, 0));
    let ns = TileFaces::NORTH.union(TileFaces::SOUTH);
    assert!(ns.admits(0, 1) && ns.admits(0, -1) && !ns.admits(1, 0));
    assert_eq!(TileFaces::from_bits(0xff), TileFaces::ALL);
}

#[test]
fn out_of_bounds_is_void() {
    let m = map(4, 3, 2);
    for loc in [Location::new(-1, 0, 0), Location::new(4, 0, 0), Location::new(0, 3, 0), Location::new(0, 0, 2)] {
        assert!(!m.contains(loc));
        assert_eq!(m.tile(loc), Tile::VOID);
        assert_eq!(m.blocks_view(loc), VIEW_BLOCKED);
        assert!(!m.accepts_light(loc, 0, 0));
        assert!(!m.set_tile(loc, Tile::WALL));
        let _g = m.light_lock().lock();
        m.set_light(loc, Rgb::WHITE);
    }
    assert!(m.snapshot_layer(0).iter().all(|c| c.is_black()));
    assert!(m.snapshot_layer(2).is_empty());
    assert!(m.snapshot_layer(-1).is_empty());
}

#[test]
fn index_layout_is_row_major_per_layer() {
    let m = map(3, 2, 2);
    {
        let _g = m.light_lock().lock();
        m.set_light(Location::new(2, 1, 1), Rgb::new(0.5, 0.0, 0.0));
        m.set_light(Location::new(2, 1, 1), Rgb::new(0.25, 0.0, 0.0));
    }
    let layer = m.snapshot_layer(1);
    assert_eq!(layer.len(), 6);
    assert_eq!(layer[5], Rgb::new(0.75, 0.0, 0.0));
    assert_eq!(m.light_at(Location::new(2, 1, 1)), Rgb::new(0.75, 0.0, 0.0));
    assert!(m.snapshot_layer(0).iter().all(|c| c.is_black()));

    {
        let _g = m.light_lock().lock();
        m.reset_lights();
    }
    assert!(m.light_at(Location::new(2, 1, 1)).is_black());
}

#[test]
fn set_tile_dirties_nearby_light() {
    let m = map(10, 10, 1);
    let h = m.tracer().add_light(Location::new(5, 5, 0), 29990).unwrap();
    assert!(m.tracer().render_lights());
    assert_eq!(m.render_passes(), 1);
    assert!(!h.lock().is_dirty());

    assert!(m.set_tile(Location::new(9, 9, 0), Tile::WALL));
    assert!(!h.lock().is_dirty());
    assert!(m.set_tile(Location::new(6, 5, 0), Tile::WALL));
    assert!(h.lock().is_dirty());
    assert_eq!(m.tile(Location::new(6, 5, 0)), Tile::WALL);
}

#[test]
fn unchanged_tile_does_not_notify() {
    let m = map(6, 6, 1);
    let h = m.tracer().add_light(Location::new(2, 2, 0), 19990).unwrap();
    m.tracer().render_lights();
    assert!(m.set_tile(Location::new(2, 3, 0), Tile::FLOOR));
    assert!(!h.lock().is_dirty());
    assert!(m.tracer().partitions().0.is_empty());
}

#[test]
fn screen_tile_dims_light_behind_it() {
    let m = map(9, 3, 1);
    m.set_tile(Location::new(4, 1, 0), Tile::screen(128));
    m.tracer().add_light(Location::new(2, 1, 0), 49990).unwrap();
    m.tracer().render_lights();
    let front = m.light_at(Location::new(4, 1, 0)).r;
    let behind = m.light_at(Location::new(5, 1, 0)).r;
    assert!(front > 0.0);
    assert!(behind > 0.0);

    let open = map(9, 3, 1);
    open.tracer().add_light(Location::new(2, 1, 0), 49990).unwrap();
    open.tracer().render_lights();
    assert!(behind < open.light_at(Location::new(5, 1, 0)).r);
}

#[test]
fn one_sided_tile_only_lit_from_its_open_face() {
    let m = map(7, 1, 1);
    m.set_tile(Location::new(5, 0, 0), Tile::new(0, TileFaces::EAST));
    m.tracer().add_light(Location::new(3, 0, 0), 39990).unwrap();
    m.tracer().render_lights();
    assert!(m.light_at(Location::new(5, 0, 0)).is_black());
    // Clear tile: light still passes through to the far side.
    assert!(m.light_at(Location::new(6, 0, 0)).r > 0.0);
}

#[test]
fn tile_count_rejects_overflow_and_huge_maps() {
    assert_eq!(TileMap::tile_count(4, 3, 2), Some(24));
    assert_eq!(TileMap::tile_count(MAX_TILES, 1, 1), Some(MAX_TILES));
    assert_eq!(TileMap::tile_count(MAX_TILES, 2, 1), None);
    assert_eq!(TileMap::tile_count(usize::MAX, 2, 1), None);
    assert_eq!(TileMap::tile_count(1 << 20, 1 << 20, 1), None);
}

#[test]
#[should_panic(expected = "exceeds")]
fn new_refuses_oversized_map() {
    map(usize::MAX, 2, 1);
}
