//! Packed decimal light parameters.
//!
//! Digits, least significant first: blue, green, red, brightness, size, invert.
//! Colour and brightness digits map 0..=9 onto 0.0..=1.0.

use glimmer_geom::Rgb;

use crate::MAX_RADIUS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LightError {
    #[error("invalid light encoding {packed}: size digit {size} outside 1..={max}", max = MAX_RADIUS)]
    InvalidLightEncoding { packed: u32, size: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightParams {
    pub color: Rgb,
    pub brightness: f32,
    pub size: usize,
    pub invert: bool,
}

#[inline]
fn digit(packed: u32, place: u32) -> u32 {
    (packed / 10u32.pow(place)) % 10
}

#[inline]
fn unit(d: u32) -> f32 {
    d as f32 / 9.0
}

#[inline]
fn to_digit(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * 9.0).round() as u32
}

impl LightParams {
    pub fn decode(packed: u32) -> Result<Self, LightError> {
        let size = digit(packed, 4);
        if size == 0 || size as usize > MAX_RADIUS {
            return Err(LightError::InvalidLightEncoding { packed, size });
        }
        Ok(Self {
            color: Rgb::new(
                unit(digit(packed, 2)),
                unit(digit(packed, 1)),
                unit(digit(packed, 0)),
            ),
            brightness: unit(digit(packed, 3)),
            size: size as usize,
            invert: digit(packed, 5) == 1,
        })
    }

    /// Inverse of [`decode`](Self::decode), quantising each channel to the nearest ninth.
    pub fn encode(&self) -> u32 {
        to_digit(self.color.b)
            + 10 * to_digit(self.color.g)
            + 100 * to_digit(self.color.r)
            + 1_000 * to_digit(self.brightness)
            + 10_000 * self.size.clamp(1, MAX_RADIUS) as u32
            + 100_000 * u32::from(self.invert)
    }

    /// Side length of the intensity grid for this radius.
    #[inline]
    pub fn side(&self) -> usize {
        2 * self.size + 1
    }
}
