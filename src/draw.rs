/*
 *  draw.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Grayscale drawing primitives: lines, bars, graphs, gauges and text boxes
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

use embedded_graphics::{
    mono_font::MonoTextStyle,
    pixelcolor::Gray8,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};

use embedded_text::{
    alignment::{HorizontalAlignment, VerticalAlignment}, style::TextBoxStyleBuilder, TextBox
};

use std::f64::consts::PI;

use crate::fonts::Font;
use crate::glyphs::Glyph;

/// Horizontal text placement inside a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HAlign {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Some(HAlign::Left),
            "center" | "centre" | "middle" => Some(HAlign::Center),
            "right" => Some(HAlign::Right),
            _ => None,
        }
    }
}

impl From<HAlign> for HorizontalAlignment {
    fn from(a: HAlign) -> Self {
        match a {
            HAlign::Left => HorizontalAlignment::Left,
            HAlign::Center => HorizontalAlignment::Center,
            HAlign::Right => HorizontalAlignment::Right,
        }
    }
}

/// Vertical text placement inside a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

impl VAlign {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Some(VAlign::Top),
            "center" | "centre" | "middle" => Some(VAlign::Center),
            "bottom" => Some(VAlign::Bottom),
            _ => None,
        }
    }
}

impl From<VAlign> for VerticalAlignment {
    fn from(a: VAlign) -> Self {
        match a {
            VAlign::Top => VerticalAlignment::Top,
            VAlign::Center => VerticalAlignment::Middle,
            VAlign::Bottom => VerticalAlignment::Bottom,
        }
    }
}

/// Fill direction of a bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarDirection {
    /// fills left to right
    #[default]
    Horizontal,
    /// fills bottom to top
    Vertical,
}

impl BarDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "h" => Some(BarDirection::Horizontal),
            "vertical" | "v" => Some(BarDirection::Vertical),
            _ => None,
        }
    }
}

#[inline]
pub fn gray(v: u8) -> Gray8 {
    Gray8::new(v)
}

/// Clamp into [0, 1], NaN reads as 0
#[inline]
pub fn clamp_fraction(f: f64) -> f64 {
    if f.is_nan() { 0.0 } else { f.clamp(0.0, 1.0) }
}

/// Shrink a rectangle by `by` pixels on every side, never below zero size
pub fn inset(rect: Rectangle, by: u32) -> Rectangle {
    let w = rect.size.width.saturating_sub(by * 2);
    let h = rect.size.height.saturating_sub(by * 2);
    Rectangle::new(rect.top_left + Point::new(by as i32, by as i32), Size::new(w, h))
}

pub fn fill_rect<D>(target: &mut D, rect: Rectangle, color: u8) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    target.fill_solid(&rect, gray(color))
}

pub fn draw_hline<D>(target: &mut D, x: i32, y: i32, len: u32, color: u8) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    fill_rect(target, Rectangle::new(Point::new(x, y), Size::new(len, 1)), color)
}

pub fn draw_vline<D>(target: &mut D, x: i32, y: i32, len: u32, color: u8) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    fill_rect(target, Rectangle::new(Point::new(x, y), Size::new(1, len)), color)
}

pub fn draw_line<D>(
    target: &mut D,
    start: Point,
    end: Point,
    color: u8,
    width: u32,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    Line::new(start, end)
        .into_styled(PrimitiveStyle::with_stroke(gray(color), width.max(1)))
        .draw(target)
}

/// 1-pixel rectangle outline
pub fn draw_rect<D>(target: &mut D, rect: Rectangle, color: u8) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    rect.into_styled(PrimitiveStyle::with_stroke(gray(color), 1))
        .draw(target)
}

/// 1-pixel frame around the whole target
pub fn draw_border<D>(target: &mut D, color: u8) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8> + OriginDimensions,
{
    let bounds = target.bounding_box();
    draw_rect(target, bounds, color)
}

/// Bar filled to `fraction` of the rectangle, fraction is clamped to [0, 1]
pub fn draw_bar<D>(
    target: &mut D,
    rect: Rectangle,
    fraction: f64,
    color: u8,
    border: bool,
    direction: BarDirection,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    let f = clamp_fraction(fraction);
    let mut inner = rect;
    if border {
        draw_rect(target, rect, color)?;
        inner = inset(rect, 1);
    }
    let Size { width, height } = inner.size;
    if width == 0 || height == 0 {
        return Ok(());
    }
    let fill = match direction {
        BarDirection::Horizontal => {
            let w = (f * width as f64).round() as u32;
            Rectangle::new(inner.top_left, Size::new(w, height))
        }
        BarDirection::Vertical => {
            let h = (f * height as f64).round() as u32;
            Rectangle::new(
                inner.top_left + Point::new(0, (height - h) as i32),
                Size::new(width, h),
            )
        }
    };
    fill_rect(target, fill, color)
}

/// Time-series graph of normalised samples, oldest first.
///
/// The x axis spans `capacity` slots so a partially filled history hugs the
/// right edge and older samples sit further left. Fewer than two samples
/// draw nothing.
pub fn draw_graph<D>(
    target: &mut D,
    rect: Rectangle,
    samples: &[f64],
    capacity: usize,
    color: u8,
    filled: bool,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    let Size { width, height } = rect.size;
    if samples.len() < 2 || width < 2 || height == 0 {
        return Ok(());
    }
    let cap = capacity.max(2);
    let take = samples.len().min(cap);
    let visible = &samples[samples.len() - take..];
    let first_slot = cap - take;
    let bottom = rect.top_left.y + height as i32 - 1;

    let points: Vec<Point> = visible
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let slot = (first_slot + i) as f64;
            let x = rect.top_left.x + (slot * (width - 1) as f64 / (cap - 1) as f64).round() as i32;
            let y = bottom - (clamp_fraction(s) * (height - 1) as f64).round() as i32;
            Point::new(x, y)
        })
        .collect();

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if filled {
            let span = (b.x - a.x).max(1);
            for x in a.x..=b.x {
                let t = (x - a.x) as f64 / span as f64;
                let y = (a.y as f64 + t * (b.y - a.y) as f64).round() as i32;
                draw_vline(target, x, y, (bottom - y + 1).max(0) as u32, color)?;
            }
        } else {
            draw_line(target, a, b, color, 1)?;
        }
    }
    Ok(())
}

/// Half-dial gauge with the pivot at the bottom centre of `rect`
pub fn draw_gauge<D>(
    target: &mut D,
    rect: Rectangle,
    fraction: f64,
    arc_color: u8,
    needle_color: u8,
    show_ticks: bool,
    ticks_color: u8,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    let Size { width, height } = rect.size;
    let r = (width.saturating_sub(1) / 2).min(height.saturating_sub(1)) as i32;
    if r < 3 {
        return Ok(());
    }
    let cx = rect.top_left.x + width as i32 / 2;
    let cy = rect.top_left.y + height as i32 - 1;
    // angle 0 = 3 o'clock, PI = 9 o'clock, y grows downward
    let at = |angle: f64, radius: f64| {
        Point::new(
            cx + (radius * angle.cos()).round() as i32,
            cy - (radius * angle.sin()).round() as i32,
        )
    };

    let steps = (r * 3).max(12);
    let mut prev = at(PI, r as f64);
    for i in 1..=steps {
        let p = at(PI - PI * i as f64 / steps as f64, r as f64);
        draw_line(target, prev, p, arc_color, 1)?;
        prev = p;
    }

    if show_ticks {
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let a = PI * (1.0 - t);
            draw_line(target, at(a, (r - 3) as f64), at(a, r as f64), ticks_color, 1)?;
        }
    }

    let a = PI * (1.0 - clamp_fraction(fraction));
    draw_line(target, Point::new(cx, cy), at(a, (r - 2) as f64), needle_color, 1)
}

/// Single line of text with its top-left corner at (x, y)
pub fn draw_text<D>(
    target: &mut D,
    text: &str,
    font: Font,
    x: i32,
    y: i32,
    color: u8,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    let style = MonoTextStyle::new(font, gray(color));
    Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(target)?;
    Ok(())
}

/// Text aligned inside `rect`, `baseline_adjust` nudges it vertically
pub fn draw_text_in_rect<D>(
    target: &mut D,
    text: &str,
    font: Font,
    rect: Rectangle,
    halign: HAlign,
    valign: VAlign,
    color: u8,
    baseline_adjust: i32,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    let character_style = MonoTextStyle::new(font, gray(color));
    let textbox_style = TextBoxStyleBuilder::new()
        .alignment(halign.into())
        .vertical_alignment(valign.into())
        .build();
    let area = Rectangle::new(rect.top_left + Point::new(0, baseline_adjust), rect.size);
    let text_box = TextBox::with_textbox_style(text, area, character_style, textbox_style);
    text_box.draw(target)?;
    Ok(())
}

/// Set pixels of `glyph` drawn in `color`, clear pixels left untouched
pub fn draw_glyph<D>(target: &mut D, glyph: &Glyph, x: i32, y: i32, color: u8) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Gray8>,
{
    let c = gray(color);
    let pixels = (0..glyph.height).flat_map(move |gy| {
        (0..glyph.width).filter_map(move |gx| {
            glyph
                .pixel(gx, gy)
                .then(|| Pixel(Point::new(x + gx as i32, y + gy as i32), c))
        })
    });
    target.draw_iter(pixels)
}
