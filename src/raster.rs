/*
 *  raster.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Runtime-sized 8-bit grayscale raster, an embedded-graphics draw target
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::Gray8;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// Grayscale frame, 0 = background, 255 = full foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayRaster {
    buf: Vec<u8>,
    w: u32,
    h: u32,
}

impl GrayRaster {
    pub fn new(width: u32, height: u32, background: u8) -> Self {
        let (w, h) = (width.max(1), height.max(1));
        Self { buf: vec![background; (w * h) as usize], w, h }
    }

    pub fn width(&self) -> u32 { self.w }
    pub fn height(&self) -> u32 { self.h }

    /// Pixel count
    pub fn len(&self) -> usize { self.buf.len() }

    pub fn is_empty(&self) -> bool { self.buf.is_empty() }

    pub fn as_slice(&self) -> &[u8] { &self.buf }

    pub fn as_mut_slice(&mut self) -> &mut [u8] { &mut self.buf }

    /// Out of bounds reads as 0
    pub fn get(&self, x: i32, y: i32) -> u8 {
        self.idx(x, y).map(|i| self.buf[i]).unwrap_or(0)
    }

    /// Out of bounds writes are clipped
    pub fn set(&mut self, x: i32, y: i32, value: u8) {
        if let Some(i) = self.idx(x, y) {
            self.buf[i] = value;
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.buf.fill(value);
    }

    /// Copy `src` with its top-left at (x, y), clipped to this raster
    pub fn blit(&mut self, src: &GrayRaster, x: i32, y: i32) {
        for sy in 0..src.h as i32 {
            let dy = y + sy;
            if dy < 0 || dy >= self.h as i32 {
                continue;
            }
            for sx in 0..src.w as i32 {
                let dx = x + sx;
                if dx < 0 || dx >= self.w as i32 {
                    continue;
                }
                self.buf[(dy as u32 * self.w + dx as u32) as usize] =
                    src.buf[(sy as u32 * src.w + sx as u32) as usize];
            }
        }
    }

    /// Number of pixels matching `pred`, handy for coverage checks
    pub fn count(&self, pred: impl Fn(u8) -> bool) -> usize {
        self.buf.iter().filter(|&&v| pred(v)).count()
    }

    /// Binary PGM (P5) encoding of the frame
    pub fn to_pgm(&self) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", self.w, self.h).into_bytes();
        out.extend_from_slice(&self.buf);
        out
    }

    #[inline]
    fn idx(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as u32) < self.w && (y as u32) < self.h {
            return Some((y as u32 * self.w + x as u32) as usize);
        }
        None
    }
}

impl OriginDimensions for GrayRaster {
    fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }
}

impl DrawTarget for GrayRaster {
    type Color = Gray8;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            self.set(p.x, p.y, c.luma());
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.luma());
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        for (p, c) in area.points().zip(colors) {
            self.set(p.x, p.y, c.luma());
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        // fast path for the rectangular fills bars and backgrounds use
        let clipped = area.intersection(&self.bounding_box());
        let Size { width, height } = clipped.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let (x0, y0) = (clipped.top_left.x as u32, clipped.top_left.y as u32);
        let luma = color.luma();
        for row in y0..y0 + height {
            let base = (row * self.w + x0) as usize;
            self.buf[base..base + width as usize].fill(luma);
        }
        Ok(())
    }
}
