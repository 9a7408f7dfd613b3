/*
 *  widgets/render.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared text / bar / graph / gauge renderer for percentage metrics
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

use embedded_graphics::primitives::Rectangle;

use crate::draw;
use crate::fonts::Font;
use crate::raster::GrayRaster;
use super::helper::{BarSettings, Colors, ConfigHelper, DisplayMode, GaugeSettings, GraphSettings, TextSettings};
use super::WidgetError;

/// Everything a metric render needs, resolved once at construction
#[derive(Clone)]
pub struct MetricStyle {
    pub mode: DisplayMode,
    pub text: TextSettings,
    /// only resolved for text mode
    pub font: Option<Font>,
    pub bar: BarSettings,
    pub graph: GraphSettings,
    pub gauge: GaugeSettings,
    pub colors: Colors,
}

impl MetricStyle {
    pub fn from_helper(h: &ConfigHelper<'_>, default_mode: DisplayMode) -> Result<Self, WidgetError> {
        let mode = h.display_mode(default_mode)?;
        let text = h.text();
        Ok(Self {
            mode,
            font: (mode == DisplayMode::Text).then(|| text.font()),
            text,
            bar: h.bar(),
            graph: h.graph(),
            gauge: h.gauge(),
            colors: h.colors_for(mode),
        })
    }

    /// Switch mode after construction, e.g. when a widget cannot draw gauges
    pub fn set_mode(&mut self, h: &ConfigHelper<'_>, mode: DisplayMode) {
        self.mode = mode;
        self.colors = h.colors_for(mode);
        if mode == DisplayMode::Text && self.font.is_none() {
            self.font = Some(self.text.font());
        }
    }

    pub fn text_font(&self) -> Font {
        self.font.unwrap_or_else(|| self.text.font())
    }

    pub fn keeps_history(&self) -> bool {
        self.mode == DisplayMode::Graph
    }
}

/// Draw one metric into `area`: `label` in text mode, `fraction` for bars
/// and gauges, normalised `history` for graphs
pub fn draw_metric(
    raster: &mut GrayRaster,
    area: Rectangle,
    style: &MetricStyle,
    label: &str,
    fraction: f64,
    history: &[f64],
) -> Result<(), WidgetError> {
    match style.mode {
        DisplayMode::Text => {
            draw::draw_text_in_rect(
                raster,
                label,
                style.text_font(),
                area,
                style.text.halign,
                style.text.valign,
                style.colors.primary,
                style.text.baseline_adjust,
            )?;
        }
        DisplayMode::BarHorizontal | DisplayMode::BarVertical => {
            let direction = style.mode.bar_direction().unwrap_or(style.bar.direction);
            draw::draw_bar(raster, area, fraction, style.colors.primary, style.bar.border, direction)?;
        }
        DisplayMode::Graph => {
            draw::draw_graph(
                raster,
                area,
                history,
                style.graph.history,
                style.colors.primary,
                style.graph.filled,
            )?;
        }
        DisplayMode::Gauge => {
            let g = &style.gauge;
            draw::draw_gauge(raster, area, fraction, g.arc_color, g.needle_color, g.show_ticks, g.ticks_color)?;
        }
    }
    Ok(())
}
