/*
 *  glyphs.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Icon glyph sets addressable by (set, glyph)
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

/// 1bpp bitmap, rows packed MSB first, ((w + 7) / 8) bytes per row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub width: u32,
    pub height: u32,
    pub bits: &'static [u8],
}

impl Glyph {
    pub const fn new_8x8(bits: &'static [u8; 8]) -> Self {
        Self { width: 8, height: 8, bits }
    }

    /// Whether the pixel at (x, y) is set
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let stride = ((self.width + 7) / 8) as usize;
        let byte = self.bits.get(y as usize * stride + (x / 8) as usize).copied().unwrap_or(0);
        byte & (0x80 >> (x % 8)) != 0
    }
}

pub const GLYPH_VOLUME_OFF: [u8; 8] = [0x10, 0x30, 0xe5, 0xe2, 0xe2, 0xe5, 0x30, 0x10,];
pub const GLYPH_VOLUME_ON: [u8; 8] = [0x10, 0x31, 0xe5, 0xe5, 0xe5, 0xe5, 0x31, 0x10,];

pub const GLYPH_NONE: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,];
pub const GLYPH_WARNING: [u8; 8] = [0x18, 0x3c, 0x24, 0x66, 0x66, 0xff, 0xe7, 0xff,];

pub const GLYPH_PLAY: [u8; 8] = [0x40, 0x60, 0x70, 0x78, 0x78, 0x70, 0x60, 0x40,];
pub const GLYPH_PAUSE: [u8; 8] = [0x00, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x00,];
pub const GLYPH_STOP: [u8; 8] = [0x00, 0x7e, 0x7e, 0x7e, 0x7e, 0x7e, 0x7e, 0x00,];
pub const GLYPH_NO_PLAYER: [u8; 8] = [0x0f, 0x0f, 0x08, 0x08, 0x08, 0x78, 0xf8, 0x70,];

pub const GLYPH_CLEAR: [u8; 8] = [0x10, 0x54, 0x38, 0xfe, 0x38, 0x54, 0x10, 0x00,];
pub const GLYPH_PARTLY: [u8; 8] = [0x44, 0x28, 0x10, 0x3c, 0x7e, 0xff, 0xff, 0x00,];
pub const GLYPH_CLOUD: [u8; 8] = [0x00, 0x00, 0x30, 0x78, 0x7e, 0xff, 0xff, 0x00,];
pub const GLYPH_FOG: [u8; 8] = [0x00, 0x7e, 0x00, 0xff, 0x00, 0x7e, 0x00, 0x00,];
pub const GLYPH_RAIN: [u8; 8] = [0x30, 0x7c, 0xfe, 0xff, 0x00, 0x49, 0x92, 0x00,];
pub const GLYPH_SNOW: [u8; 8] = [0x30, 0x7c, 0xfe, 0xff, 0x00, 0x55, 0x00, 0xaa,];
pub const GLYPH_STORM: [u8; 8] = [0x30, 0x7c, 0xfe, 0xff, 0x0c, 0x18, 0x0c, 0x18,];
pub const GLYPH_UNKNOWN: [u8; 8] = [0x3c, 0x66, 0x06, 0x0c, 0x18, 0x00, 0x18, 0x00,];

/// Look up a glyph by set and name, e.g. ("weather", "rain")
pub fn glyph(set: &str, name: &str) -> Option<Glyph> {
    let bits: &'static [u8; 8] = match (set, name) {
        ("status", "warning") => &GLYPH_WARNING,
        ("status", "none") => &GLYPH_NONE,
        ("volume", "on") => &GLYPH_VOLUME_ON,
        ("volume", "off") | ("volume", "muted") => &GLYPH_VOLUME_OFF,
        ("media", "play") | ("media", "playing") => &GLYPH_PLAY,
        ("media", "pause") | ("media", "paused") => &GLYPH_PAUSE,
        ("media", "stop") | ("media", "stopped") => &GLYPH_STOP,
        ("media", "absent") => &GLYPH_NO_PLAYER,
        ("weather", "clear") => &GLYPH_CLEAR,
        ("weather", "partly") => &GLYPH_PARTLY,
        ("weather", "cloud") => &GLYPH_CLOUD,
        ("weather", "fog") => &GLYPH_FOG,
        ("weather", "rain") => &GLYPH_RAIN,
        ("weather", "snow") => &GLYPH_SNOW,
        ("weather", "storm") => &GLYPH_STORM,
        ("weather", "unknown") => &GLYPH_UNKNOWN,
        _ => return None,
    };
    Some(Glyph::new_8x8(bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_lookup() {
        assert!(glyph("weather", "rain").is_some());
        assert!(glyph("weather", "hail").is_none());
        assert!(glyph("nope", "rain").is_none());
    }

    #[test]
    fn test_pixel_msb_first() {
        let g = glyph("media", "play").unwrap();
        // row 0 = 0x40 -> only x=1 set
        assert!(!g.pixel(0, 0));
        assert!(g.pixel(1, 0));
        assert!(!g.pixel(2, 0));
        assert!(!g.pixel(8, 0));
    }
}
