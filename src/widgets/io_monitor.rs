/*
 *  widgets/io_monitor.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Dual-rate I/O monitor, disk read/write and network rx/tx
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

use std::sync::{Arc, RwLock};
use std::time::Duration;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{debug, warn};

use crate::config::WidgetConfig;
use crate::draw::{self, BarDirection};
use crate::raster::GrayRaster;
use crate::sensors::{DiskSensor, IoCounterMap, NetworkSensor, SensorError};
use super::dualio::{max_bps_from_mbps, DualIoCore, DualIoSnapshot};
use super::helper::{ConfigHelper, DisplayMode};
use super::registry::Registry;
use super::render::MetricStyle;
use super::units::RateUnit;
use super::{BaseWidget, Rect, Style, Widget, WidgetContext, WidgetError};

pub fn register(registry: &Registry) {
    registry.register("disk", create_disk);
    registry.register("network", create_network);
}

pub fn create_disk(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    let source = CounterSource::Disk(ctx.sensors.disk.clone());
    Ok(Box::new(IoMonitorWidget::new(cfg, ctx, source)?))
}

pub fn create_network(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    let source = CounterSource::Network(ctx.sensors.network.clone());
    Ok(Box::new(IoMonitorWidget::new(cfg, ctx, source)?))
}

/// Where the monotone counters come from, and what the two streams are called
#[derive(Clone)]
pub enum CounterSource {
    Disk(Arc<dyn DiskSensor>),
    Network(Arc<dyn NetworkSensor>),
}

impl CounterSource {
    fn read(&self) -> Result<IoCounterMap, SensorError> {
        match self {
            CounterSource::Disk(s) => s.io_counters(),
            CounterSource::Network(s) => s.io_counters_per_interface(),
        }
    }

    fn labels(&self) -> (&'static str, &'static str) {
        match self {
            CounterSource::Disk(_) => ("R", "W"),
            CounterSource::Network(_) => ("Rx", "Tx"),
        }
    }

    fn device_key(&self) -> &'static str {
        match self {
            CounterSource::Disk(_) => "device",
            CounterSource::Network(_) => "interface",
        }
    }
}

/// Configured device, zero when missing; no device sums everything
pub fn select_totals(counters: &IoCounterMap, device: Option<&str>) -> (u64, u64) {
    match device {
        Some(d) => counters.get(d).copied().unwrap_or((0, 0)),
        None => counters
            .values()
            .fold((0, 0), |acc, v| (acc.0.saturating_add(v.0), acc.1.saturating_add(v.1))),
    }
}

pub struct IoMonitorWidget {
    base: BaseWidget,
    source: CounterSource,
    device: Option<String>,
    style: MetricStyle,
    unit: RateUnit,
    show_unit: bool,
    state: RwLock<DualIoCore>,
}

impl IoMonitorWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext, source: CounterSource) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        let base = BaseWidget::new(cfg, ctx)?;
        let mut style = MetricStyle::from_helper(&h, DisplayMode::Text)?;
        if style.mode == DisplayMode::Gauge {
            warn!("{}: gauge mode is not supported for {} widgets, using text", cfg.id, cfg.kind);
            style.set_mode(&h, DisplayMode::Text);
        }

        let p = h.props();
        let max_bps = p.f64("max_speed_mbps").and_then(max_bps_from_mbps);
        let unit = RateUnit::from_config(p.str("unit").unwrap_or_default());
        let device = p
            .str(source.device_key())
            .or_else(|| p.str("device"))
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let core = DualIoCore::new(style.graph.history, style.keeps_history(), max_bps);
        Ok(Self {
            base,
            source,
            device,
            unit,
            show_unit: p.bool("show_unit").unwrap_or(true),
            style,
            state: RwLock::new(core),
        })
    }

    pub fn mode(&self) -> DisplayMode {
        self.style.mode
    }

    fn snapshot(&self) -> DualIoSnapshot {
        self.state.read().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    pub fn rates(&self) -> (f64, f64) {
        self.snapshot().rates
    }

    /// Bar fractions of the current rates, in [0, 1]
    pub fn fractions(&self) -> (f64, f64) {
        self.snapshot().fractions()
    }

    pub fn history_len(&self) -> (usize, usize) {
        self.state.read().unwrap_or_else(|e| e.into_inner()).history_len()
    }

    fn format_text(&self, rates: (f64, f64)) -> String {
        let (a, b) = self.source.labels();
        format!(
            "{} {}  {} {}",
            a,
            self.unit.format(rates.0, self.show_unit),
            b,
            self.unit.format(rates.1, self.show_unit)
        )
    }

    fn paint(&self, raster: &mut GrayRaster, snap: &DualIoSnapshot) -> Result<(), WidgetError> {
        let area = self.base.content_area();
        let colors = self.style.colors;
        match self.style.mode {
            DisplayMode::Text | DisplayMode::Gauge => {
                let text = &self.style.text;
                draw::draw_text_in_rect(
                    raster,
                    &self.format_text(snap.rates),
                    self.style.text_font(),
                    area,
                    text.halign,
                    text.valign,
                    colors.primary,
                    text.baseline_adjust,
                )?;
            }
            DisplayMode::BarHorizontal | DisplayMode::BarVertical => {
                let direction = self.style.mode.bar_direction().unwrap_or_default();
                let (fa, fb) = snap.fractions();
                let (ra, rb) = split(area, direction);
                let border = self.style.bar.border;
                draw::draw_bar(raster, ra, fa, colors.primary, border, direction)?;
                draw::draw_bar(raster, rb, fb, colors.secondary, border, direction)?;
            }
            DisplayMode::Graph => {
                let (ha, hb) = snap.normalized();
                draw::draw_graph(raster, area, &ha, snap.capacity, colors.primary, self.style.graph.filled)?;
                draw::draw_graph(raster, area, &hb, snap.capacity, colors.secondary, false)?;
            }
        }
        Ok(())
    }
}

/// Two bars stacked for horizontal, side by side for vertical
fn split(area: Rectangle, direction: BarDirection) -> (Rectangle, Rectangle) {
    let Size { width, height } = area.size;
    match direction {
        BarDirection::Horizontal => {
            let gap = u32::from(height >= 3);
            let first = (height - gap) / 2;
            let second = height - gap - first;
            (
                Rectangle::new(area.top_left, Size::new(width, first)),
                Rectangle::new(area.top_left + Point::new(0, (first + gap) as i32), Size::new(width, second)),
            )
        }
        BarDirection::Vertical => {
            let gap = u32::from(width >= 3);
            let first = (width - gap) / 2;
            let second = width - gap - first;
            (
                Rectangle::new(area.top_left, Size::new(first, height)),
                Rectangle::new(area.top_left + Point::new((first + gap) as i32, 0), Size::new(second, height)),
            )
        }
    }
}

impl Widget for IoMonitorWidget {
    fn name(&self) -> &str { self.base.id() }
    fn kind(&self) -> &str { self.base.kind() }
    fn position(&self) -> Rect { self.base.position() }
    fn style(&self) -> Style { self.base.style() }

    fn update_interval(&self) -> Duration {
        self.base.update_interval()
    }

    fn update(&self) -> Result<(), WidgetError> {
        // sensor read happens outside the lock
        let counters = match self.source.read() {
            Ok(c) => c,
            Err(e) => {
                debug!("{}: counter read failed: {}", self.base.id(), e);
                return Ok(());
            }
        };
        let totals = select_totals(&counters, self.device.as_deref());
        let now = self.base.now();
        self.state.write().unwrap_or_else(|e| e.into_inner()).sample(totals, now);
        Ok(())
    }

    fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
        let snap = self.snapshot();
        let mut raster = self.base.blank();
        self.paint(&mut raster, &snap)?;
        Ok(Some(self.base.finish(raster)))
    }
}
