/*
 *  lib.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Widget runtime for small grayscale dashboard displays
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

pub mod config;
pub mod timebase;
pub mod raster;
pub mod draw;
pub mod fonts;
pub mod glyphs;
pub mod pacer;
pub mod sensors;
pub mod widgets;
pub mod compositor;

// Re-exports for convenience
pub use config::{Config, ConfigError, WidgetConfig, Properties};
pub use raster::GrayRaster;
pub use timebase::{Timebase, SystemTimebase, ManualTimebase};
pub use widgets::{Widget, WidgetError, WidgetContext, Rect, Style, Registry};
pub use compositor::Compositor;
