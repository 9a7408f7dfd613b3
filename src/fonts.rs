/*
 *  fonts.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Font lookup by (name, size) onto the embedded-graphics mono fonts
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

use embedded_graphics::mono_font::{ascii, MonoFont};

/// Fonts are static and read-only, share them freely between widgets.
pub type Font = &'static MonoFont<'static>;

/// Font used for placeholders and error frames
pub const DEFAULT_FONT: Font = &ascii::FONT_6X10;

// (name, face), ordered by glyph height
const REGULAR: &[(&str, Font)] = &[
    ("4x6", &ascii::FONT_4X6),
    ("5x7", &ascii::FONT_5X7),
    ("5x8", &ascii::FONT_5X8),
    ("6x9", &ascii::FONT_6X9),
    ("6x10", &ascii::FONT_6X10),
    ("6x12", &ascii::FONT_6X12),
    ("6x13", &ascii::FONT_6X13),
    ("7x13", &ascii::FONT_7X13),
    ("8x13", &ascii::FONT_8X13),
    ("7x14", &ascii::FONT_7X14),
    ("9x15", &ascii::FONT_9X15),
    ("9x18", &ascii::FONT_9X18),
    ("10x20", &ascii::FONT_10X20),
];

const BOLD: &[(&str, Font)] = &[
    ("6x13_bold", &ascii::FONT_6X13_BOLD),
    ("7x13_bold", &ascii::FONT_7X13_BOLD),
    ("8x13_bold", &ascii::FONT_8X13_BOLD),
    ("7x14_bold", &ascii::FONT_7X14_BOLD),
    ("9x15_bold", &ascii::FONT_9X15_BOLD),
    ("9x18_bold", &ascii::FONT_9X18_BOLD),
];

/// Resolve a font face.
///
/// An explicit face name ("6x10", "7x13_bold") wins; otherwise the tallest
/// face whose glyph height fits `size` pixels is chosen, bold faces when the
/// name asks for bold. Never fails, the smallest face is the floor.
pub fn load_font(name: &str, size: u32) -> Font {
    let key = name.trim().to_ascii_lowercase();
    if let Some((_, font)) = REGULAR.iter().chain(BOLD.iter()).find(|(n, _)| *n == key) {
        return font;
    }

    let table = if key.contains("bold") { BOLD } else { REGULAR };
    table
        .iter()
        .rev()
        .find(|(_, f)| f.character_size.height <= size)
        .or_else(|| table.first())
        .map(|(_, f)| *f)
        .unwrap_or(DEFAULT_FONT)
}

/// Pixel extent of a single line of text
pub fn measure_text(text: &str, font: Font) -> (u32, u32) {
    let n = text.chars().count() as u32;
    if n == 0 {
        return (0, font.character_size.height);
    }
    let w = n * font.character_size.width + (n - 1) * font.character_spacing;
    (w, font.character_size.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_face_name() {
        let f = load_font("7x13_bold", 0);
        assert_eq!(f.character_size.width, 7);
        assert_eq!(f.character_size.height, 13);
    }

    #[test]
    fn test_size_picks_tallest_fitting() {
        assert_eq!(load_font("", 10).character_size.height, 10);
        assert_eq!(load_font("mono", 11).character_size.height, 10);
        assert_eq!(load_font("any", 2).character_size.height, 6);
        assert_eq!(load_font("x", 100).character_size.height, 20);
    }

    #[test]
    fn test_measure_text() {
        let (w, h) = measure_text("abc", &ascii::FONT_6X10);
        assert_eq!((w, h), (18, 10));
        assert_eq!(measure_text("", &ascii::FONT_6X10).0, 0);
    }
}
