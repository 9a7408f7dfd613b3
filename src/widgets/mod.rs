/*
 *  widgets/mod.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Widget contract, geometry and construction context
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

use std::sync::Arc;
use std::time::{Duration, Instant};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use serde::{Deserialize, Serialize};

use crate::raster::GrayRaster;
use crate::sensors::SensorSet;
use crate::timebase::{SystemTimebase, Timebase};

pub mod error;
pub mod base;
pub mod helper;
pub mod registry;
pub mod autohide;
pub mod scroller;
pub mod transition;
pub mod units;
pub mod dualio;
pub mod poller;
pub mod render;

pub mod clock;
pub mod io_monitor;
pub mod cpu;
pub mod memory;
pub mod battery;
pub mod volume;
pub mod volume_meter;
pub mod media;
pub mod weather;
pub mod weather_format;
pub mod error_proxy;

pub use error::WidgetError;
pub use base::BaseWidget;
pub use helper::{ConfigHelper, DisplayMode};
pub use registry::{global, register_builtin, CreatedWidgets, Registry, WidgetFactory};
pub use autohide::AutoHide;
pub use scroller::{ScrollDirection, ScrollMode, Scroller, ScrollSettings};
pub use transition::{Transition, TransitionEffect};
pub use units::RateUnit;
pub use dualio::{DualIoCore, SampleOutcome};
pub use error_proxy::ErrorProxyWidget;

/// Placement on the composite frame. `z` orders compositing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub z: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h, z: 0 }
    }

    pub const fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    /// Widget-local bounds, origin at (0, 0)
    pub fn local(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.w, self.h))
    }
}

fn no_border() -> i16 { -1 }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default)]
    pub background: u8,
    /// -1 for none, otherwise the colour of a 1px frame drawn last
    #[serde(default = "no_border")]
    pub border: i16,
    #[serde(default)]
    pub padding: u32,
}

impl Default for Style {
    fn default() -> Self {
        Self { background: 0, border: -1, padding: 0 }
    }
}

impl Style {
    pub fn border_color(&self) -> Option<u8> {
        u8::try_from(self.border).ok()
    }
}

/// A rectangular element of the dashboard.
///
/// `update` and `render` may run concurrently with each other and with a
/// widget-owned polling thread, hence `&self` everywhere and interior locks.
pub trait Widget: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> &str;
    fn position(&self) -> Rect;
    fn style(&self) -> Style;
    fn update_interval(&self) -> Duration;

    /// Advance state from sensors and time. Data errors are absorbed here.
    fn update(&self) -> Result<(), WidgetError>;

    /// Current image, `None` when hidden
    fn render(&self) -> Result<Option<GrayRaster>, WidgetError>;

    /// Release background threads and handles; idempotent
    fn stop(&self) {}
}

/// What every factory gets besides its config
#[derive(Clone)]
pub struct WidgetContext {
    pub timebase: Arc<dyn Timebase>,
    pub sensors: SensorSet,
}

impl WidgetContext {
    pub fn new(timebase: Arc<dyn Timebase>, sensors: SensorSet) -> Self {
        Self { timebase, sensors }
    }

    /// Wall clock and platform sensors
    pub fn system() -> Self {
        Self::new(Arc::new(SystemTimebase), SensorSet::system())
    }

    pub fn now(&self) -> Instant {
        self.timebase.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_defaults_from_yaml() {
        let s: Style = serde_yaml::from_str("background: 10").unwrap();
        assert_eq!(s, Style { background: 10, border: -1, padding: 0 });
        assert_eq!(s.border_color(), None);
        let s: Style = serde_yaml::from_str("border: 200").unwrap();
        assert_eq!(s.border_color(), Some(200));
    }

    #[test]
    fn test_rect_local() {
        let r = Rect::new(5, 6, 20, 10).with_z(3);
        assert_eq!(r.z, 3);
        assert_eq!(r.local(), Rectangle::new(Point::zero(), Size::new(20, 10)));
    }
}
