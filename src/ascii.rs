use glimmer_geom::Location;
use glimmer_world::TileMap;

// Dark to bright.
const RAMP: &[u8] = b" .:-=+*%@";
const OPAQUE: char = '#';
const SCREEN: char = '|';

/// Glyph for a luminance; values outside `0.0..=1.0` are clamped.
pub fn shade(luminance: f32) -> char {
    let v = luminance.clamp(0.0, 1.0);
    let i = (v * (RAMP.len() - 1) as f32).round() as usize;
    RAMP[i] as char
}

/// One z layer as text, a line per row. Opaque tiles and unlit screens get their own glyphs.
pub fn render_layer(map: &TileMap, z: i32) -> String {
    let (width, height, _) = map.dims();
    let lights = map.snapshot_layer(z);
    let mut out = String::with_capacity((width + 1) * height);
    for y in 0..height {
        for x in 0..width {
            let loc = Location::new(x as i32, y as i32, z);
            let tile = map.tile(loc);
            let lum = lights
                .get(y * width + x)
                .map(|c| c.luminance())
                .unwrap_or(0.0);
            let glyph = if tile.is_opaque() {
                OPAQUE
            } else if tile.obscurity > 0 && lum <= 0.0 {
                SCREEN
            } else {
                shade(lum)
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}
