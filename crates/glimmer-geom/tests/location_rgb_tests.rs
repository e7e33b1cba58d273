use glimmer_geom::{Location, Rgb};
use std::collections::BTreeSet;

fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn rgb_approx_eq(a: Rgb, b: Rgb, eps: f32) -> bool {
    approx_eq(a.r, b.r, eps) && approx_eq(a.g, b.g, eps) && approx_eq(a.b, b.b, eps)
}

#[test]
fn location_equality_is_componentwise() {
    assert_eq!(Location::new(1, 2, 3), Location::from((1, 2, 3)));
    assert_ne!(Location::new(1, 2, 3), Location::new(1, 2, 4));
    assert_ne!(Location::new(1, 2, 3), Location::new(2, 1, 3));
}

#[test]
fn location_orders_by_layer_then_row() {
    let set: BTreeSet<Location> = [
        Location::new(5, 0, 1),
        Location::new(0, 1, 0),
        Location::new(9, 0, 0),
        Location::new(0, 0, 0),
    ]
    .into_iter()
    .collect();
    let order: Vec<_> = set.into_iter().collect();
    assert_eq!(
        order,
        vec![
            Location::new(0, 0, 0),
            Location::new(9, 0, 0),
            Location::new(0, 1, 0),
            Location::new(5, 0, 1),
        ]
    );
}

#[test]
fn location_key_handles_negatives() {
    let a = Location::new(-1, 0, 0);
    let b = Location::new(0, -1, 0);
    let c = Location::new(0, 0, -1);
    assert_ne!(a.key(), b.key());
    assert_ne!(b.key(), c.key());
    assert_ne!(a.key(), c.key());
}

#[test]
fn planar_reach_ignores_other_layers() {
    let here = Location::new(10, 10, 0);
    assert_eq!(here.planar_reach(Location::new(13, 9, 0)), Some(3));
    assert_eq!(here.planar_reach(Location::new(10, 10, 1)), None);
    assert_eq!(here.offset(-2, 1), Location::new(8, 11, 0));
}

#[test]
fn reach_and_offset_at_axis_limits() {
    let low = Location::new(i32::MIN, 0, 0);
    let high = Location::new(i32::MAX, 0, 0);
    assert_eq!(low.planar_reach(high), Some(u32::MAX));
    assert_eq!(Location::new(10, 10, 0).planar_reach(Location::new(i32::MIN, 10, 0)), Some(2_147_483_658));
    assert_eq!(high.checked_offset(1, 0), None);
    assert_eq!(low.checked_offset(0, -1), Some(Location::new(i32::MIN, -1, 0)));
    assert_eq!(low.checked_offset(-1, 0), None);
}

#[test]
fn rgb_arithmetic() {
    let mut c = Rgb::new(1.0, 0.0, 0.0) * 0.5;
    assert!(rgb_approx_eq(c, Rgb::new(0.5, 0.0, 0.0), 1e-6));
    c += Rgb::splat(0.25);
    assert!(rgb_approx_eq(c, Rgb::new(0.75, 0.25, 0.25), 1e-6));
    c -= Rgb::WHITE;
    assert!(rgb_approx_eq(c, Rgb::new(-0.25, -0.75, -0.75), 1e-6));
    assert!(rgb_approx_eq(c.clamped(), Rgb::BLACK, 1e-6));
    assert!(Rgb::BLACK.is_black());
    assert!(approx_eq(Rgb::WHITE.luminance(), 1.0, 1e-4));
}
