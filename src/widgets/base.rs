/*
 *  widgets/base.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Lifecycle bookkeeping shared by every widget
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
use embedded_graphics::primitives::Rectangle;

use crate::config::WidgetConfig;
use crate::draw::{self, HAlign, VAlign};
use crate::fonts::DEFAULT_FONT;
use crate::raster::GrayRaster;
use crate::timebase::Timebase;
use super::autohide::AutoHide;
use super::helper::{AutoHideSettings, ConfigHelper};
use super::{Rect, Style, WidgetContext, WidgetError};

/// Identity, geometry, cadence and style, fixed at construction.
///
/// Only the auto-hide settings live here. The running `AutoHide` of a
/// polled widget sits in its shared `PolledState`, where the polling
/// thread triggers it on change.
pub struct BaseWidget {
    id: String,
    kind: String,
    position: Rect,
    style: Style,
    padding: u32,
    update_interval: Duration,
    auto_hide: AutoHideSettings,
    timebase: Arc<dyn Timebase>,
}

impl BaseWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        Ok(Self {
            id: cfg.id.clone(),
            kind: cfg.kind.clone(),
            position: h.position()?,
            style: h.style(),
            padding: h.padding(),
            update_interval: h.update_interval(),
            auto_hide: h.auto_hide(),
            timebase: ctx.timebase.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn position(&self) -> Rect {
        self.position
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn now(&self) -> Instant {
        self.timebase.now()
    }

    pub fn timebase(&self) -> Arc<dyn Timebase> {
        self.timebase.clone()
    }

    pub fn auto_hide(&self) -> AutoHideSettings {
        self.auto_hide
    }

    /// Auto-hide controller starting now
    pub fn new_autohide(&self, start_visible: bool) -> AutoHide {
        AutoHide::new(self.auto_hide, start_visible, self.now())
    }

    /// Background-filled raster of the widget's size
    pub fn blank(&self) -> GrayRaster {
        GrayRaster::new(self.position.w, self.position.h, self.style.background)
    }

    /// Drawable area after padding, and after the border when there is one
    pub fn content_area(&self) -> Rectangle {
        let border = u32::from(self.style.border_color().is_some());
        draw::inset(self.position.local(), self.padding + border)
    }

    /// The border is always drawn last
    pub fn finish(&self, mut raster: GrayRaster) -> GrayRaster {
        if let Some(color) = self.style.border_color() {
            let _ = draw::draw_border(&mut raster, color);
        }
        raster
    }

    /// Best-effort frame, e.g. "..." before data or "ERR" on internal failure
    pub fn placeholder(&self, message: &str) -> GrayRaster {
        let mut raster = self.blank();
        let area = self.content_area();
        let _ = draw::draw_text_in_rect(
            &mut raster, message, DEFAULT_FONT, area, HAlign::Center, VAlign::Center, 255, 0,
        );
        self.finish(raster)
    }
}
