/*
 *  widgets/error_proxy.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Flashing warning that holds the slot of a failed widget
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

use crate::config::WidgetConfig;
use crate::draw::{self, HAlign, VAlign};
use crate::fonts::DEFAULT_FONT;
use crate::glyphs;
use crate::raster::GrayRaster;
use crate::timebase::Timebase;
use super::helper::ConfigHelper;
use super::registry::Registry;
use super::{Rect, Style, Widget, WidgetContext, WidgetError};

pub const FLASH_PHASE: Duration = Duration::from_millis(500);

pub fn register(registry: &Registry) {
    registry.register("error", create);
}

pub fn create(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    let h = ConfigHelper::new(cfg);
    let message = h.props().str("message").unwrap_or("ERROR");
    Ok(Box::new(ErrorProxyWidget::new(&cfg.id, h.position()?, message, ctx.timebase.clone())))
}

/// On for the first 500 ms of every second since `since`
pub fn flash_on(since: Instant, now: Instant) -> bool {
    let phase = now.saturating_duration_since(since).as_millis() / FLASH_PHASE.as_millis();
    phase % 2 == 0
}

/// Warning glyph followed by `message`, drawn only in the on phase
pub fn draw_error_frame(raster: &mut GrayRaster, area: Rectangle, message: &str, on: bool)
    -> Result<(), WidgetError> {
    if !on {
        return Ok(());
    }
    let mut text_area = area;
    if let Some(icon) = glyphs::glyph("status", "warning") {
        let y = area.top_left.y + (area.size.height as i32 - icon.height as i32) / 2;
        draw::draw_glyph(raster, &icon, area.top_left.x, y, 255)?;
        let shift = icon.width + 2;
        text_area = Rectangle::new(
            area.top_left + Point::new(shift as i32, 0),
            Size::new(area.size.width.saturating_sub(shift), area.size.height),
        );
    }
    draw::draw_text_in_rect(raster, message, DEFAULT_FONT, text_area, HAlign::Left, VAlign::Center, 255, 0)?;
    Ok(())
}

pub struct ErrorProxyWidget {
    id: String,
    position: Rect,
    message: String,
    timebase: Arc<dyn Timebase>,
    since: Instant,
}

impl ErrorProxyWidget {
    pub fn new(id: &str, position: Rect, message: &str, timebase: Arc<dyn Timebase>) -> Self {
        Self {
            id: id.to_string(),
            position,
            message: message.to_string(),
            since: timebase.now(),
            timebase,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Widget for ErrorProxyWidget {
    fn name(&self) -> &str { &self.id }
    fn kind(&self) -> &str { "error" }
    fn position(&self) -> Rect { self.position }
    fn style(&self) -> Style { Style::default() }

    fn update_interval(&self) -> Duration {
        FLASH_PHASE
    }

    fn update(&self) -> Result<(), WidgetError> {
        Ok(())
    }

    fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
        let mut raster = GrayRaster::new(self.position.w, self.position.h, 0);
        let on = flash_on(self.since, self.timebase.now());
        draw_error_frame(&mut raster, self.position.local(), &self.message, on)?;
        Ok(Some(raster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebase::ManualTimebase;

    #[test]
    fn test_flash_cadence() {
        let tb = ManualTimebase::new();
        let t0 = tb.origin();
        assert!(flash_on(t0, tb.at(0.0)));
        assert!(flash_on(t0, tb.at(0.499)));
        assert!(!flash_on(t0, tb.at(0.5)));
        assert!(!flash_on(t0, tb.at(0.999)));
        assert!(flash_on(t0, tb.at(1.0)));
    }

    #[test]
    fn test_render_flashes() {
        let tb = Arc::new(ManualTimebase::new());
        let w = ErrorProxyWidget::new("bad", Rect::new(4, 2, 80, 12), "DISK ERROR", tb.clone());
        assert_eq!(w.position(), Rect::new(4, 2, 80, 12));
        let on = w.render().unwrap().unwrap();
        assert_eq!((on.width(), on.height()), (80, 12));
        assert!(on.count(|v| v != 0) > 0);
        tb.set_secs(0.6);
        let off = w.render().unwrap().unwrap();
        assert_eq!(off.count(|v| v != 0), 0);
    }

    #[test]
    fn test_factory_uses_message() {
        let ctx = WidgetContext::new(Arc::new(ManualTimebase::new()), crate::sensors::SensorSet::unavailable());
        let cfg = WidgetConfig::new("error", "e", Rect::new(0, 0, 40, 10)).with("message", "NOPE");
        let w = create(&cfg, &ctx).unwrap();
        assert_eq!(w.kind(), "error");
    }
}
