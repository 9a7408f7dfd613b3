/*
 *  widgets/clock.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Local time widget
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

use std::time::Duration;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};

use crate::config::WidgetConfig;
use crate::draw;
use crate::fonts::Font;
use crate::raster::GrayRaster;
use super::helper::{Colors, ConfigHelper, DisplayMode, TextSettings};
use super::registry::Registry;
use super::{BaseWidget, Rect, Style, Widget, WidgetContext, WidgetError};

const DEFAULT_FORMAT: &str = "%H:%M:%S";

pub fn register(registry: &Registry) {
    registry.register("clock", create);
}

pub fn create(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    Ok(Box::new(ClockWidget::new(cfg, ctx)?))
}

pub struct ClockWidget {
    base: BaseWidget,
    format: String,
    text: TextSettings,
    font: Font,
    colors: Colors,
}

/// Reject templates chrono cannot render
pub fn validate_format(format: &str) -> Result<(), WidgetError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(WidgetError::Config(format!("invalid time format '{}'", format)));
    }
    Ok(())
}

impl ClockWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        let format = h.props().str("format").unwrap_or(DEFAULT_FORMAT).to_string();
        validate_format(&format)?;
        let text = h.text();
        Ok(Self {
            base: BaseWidget::new(cfg, ctx)?,
            font: text.font(),
            text,
            colors: h.colors_for(DisplayMode::Text),
            format,
        })
    }

    pub fn format_time<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        at.format(&self.format).to_string()
    }
}

impl Widget for ClockWidget {
    fn name(&self) -> &str { self.base.id() }
    fn kind(&self) -> &str { self.base.kind() }
    fn position(&self) -> Rect { self.base.position() }
    fn style(&self) -> Style { self.base.style() }

    fn update_interval(&self) -> Duration {
        self.base.update_interval()
    }

    fn update(&self) -> Result<(), WidgetError> {
        Ok(())
    }

    fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
        let mut raster = self.base.blank();
        let label = self.format_time(&Local::now());
        draw::draw_text_in_rect(
            &mut raster,
            &label,
            self.font,
            self.base.content_area(),
            self.text.halign,
            self.text.valign,
            self.colors.primary,
            self.text.baseline_adjust,
        )?;
        Ok(Some(self.base.finish(raster)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::Utc;
    use crate::sensors::SensorSet;
    use crate::timebase::ManualTimebase;

    fn ctx() -> WidgetContext {
        WidgetContext::new(Arc::new(ManualTimebase::new()), SensorSet::unavailable())
    }

    #[test]
    fn test_bad_format_is_config_error() {
        let cfg = WidgetConfig::new("clock", "c", Rect::new(0, 0, 64, 16)).with("format", "%Q %H");
        let err = ClockWidget::new(&cfg, &ctx()).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_formats_template() {
        let cfg = WidgetConfig::new("clock", "c", Rect::new(0, 0, 64, 16)).with("format", "%H:%M");
        let w = ClockWidget::new(&cfg, &ctx()).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 14, 9, 5, 0).unwrap();
        assert_eq!(w.format_time(&at), "09:05");
    }

    #[test]
    fn test_render_full_size() {
        let cfg = WidgetConfig::new("clock", "c", Rect::new(0, 0, 64, 16));
        let w = ClockWidget::new(&cfg, &ctx()).unwrap();
        w.update().unwrap();
        let r = w.render().unwrap().unwrap();
        assert_eq!((r.width(), r.height()), (64, 16));
        assert!(r.count(|v| v == 255) > 0);
    }
}
