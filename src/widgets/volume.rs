/*
 *  widgets/volume.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Volume level and mute, shown for a while after every change
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

use std::sync::mpsc::Receiver;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{debug, info};

use crate::config::WidgetConfig;
use crate::draw::{self, BarDirection};
use crate::glyphs;
use crate::raster::GrayRaster;
use crate::sensors::{SensorError, VolumeSensor, VolumeSensorFactory};
use crate::timebase::Timebase;
use super::error_proxy::{draw_error_frame, flash_on};
use super::helper::{BarSettings, Colors, ConfigHelper, DisplayMode};
use super::poller::{PollTask, PolledFrame, PolledState, Poller, PollerConfig, SensorHealth};
use super::registry::Registry;
use super::{BaseWidget, Rect, Style, Widget, WidgetContext, WidgetError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn register(registry: &Registry) {
    registry.register("volume", create);
}

pub fn create(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    Ok(Box::new(VolumeWidget::new(cfg, ctx)?))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeReading {
    pub level: f64,
    pub muted: bool,
}

type SharedState = Arc<RwLock<PolledState<VolumeReading>>>;

/// Lives on the polling thread together with the sensor handle
struct VolumeTask {
    factory: VolumeSensorFactory,
    sensor: Option<Box<dyn VolumeSensor>>,
    state: SharedState,
    timebase: Arc<dyn Timebase>,
}

impl PollTask for VolumeTask {
    fn init(&mut self) -> Result<(), SensorError> {
        match self.sensor.as_mut() {
            Some(sensor) if sensor.needs_reinitialize() => sensor.reinitialize(),
            _ => {
                self.sensor = None;
                self.sensor = Some((self.factory)()?);
                Ok(())
            }
        }
    }

    fn poll(&mut self, now: Instant) -> Result<(), SensorError> {
        let sensor = self
            .sensor
            .as_mut()
            .ok_or_else(|| SensorError::Unavailable("volume sensor not initialised".into()))?;
        let (level, muted) = sensor.get_volume()?;
        let reading = VolumeReading { level: level.clamp(0.0, 100.0), muted };

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        // the first reading is a baseline, only changes surface the widget
        if state.reading.is_some_and(|prev| prev != reading) {
            debug!("volume changed to {:.0}%{}", reading.level, if muted { " (muted)" } else { "" });
            state.autohide.trigger_show(now);
        }
        state.reading = Some(reading);
        Ok(())
    }

    fn needs_reinitialize(&self) -> bool {
        self.sensor.as_ref().is_some_and(|s| s.needs_reinitialize())
    }

    fn device_changes(&mut self) -> Option<Receiver<()>> {
        self.sensor.as_mut().and_then(|s| s.subscribe_device_change())
    }

    fn on_health(&mut self, health: SensorHealth) {
        let now = self.timebase.now();
        self.state.write().unwrap_or_else(|e| e.into_inner()).record_health(health, now);
    }
}

pub struct VolumeWidget {
    base: BaseWidget,
    bar: BarSettings,
    colors: Colors,
    state: SharedState,
    poller: Poller,
}

impl VolumeWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        let base = BaseWidget::new(cfg, ctx)?;
        let state: SharedState = Arc::new(RwLock::new(PolledState::new(base.new_autohide(false))));

        let poll = PollerConfig::new(&cfg.id, h.poll_interval(DEFAULT_POLL_INTERVAL));
        info!("{}: volume polling every {:?}", cfg.id, poll.interval);
        let task_state = state.clone();
        let factory = ctx.sensors.volume.clone();
        let timebase = ctx.timebase.clone();
        let poller = Poller::spawn(poll, ctx.timebase.clone(), move || VolumeTask {
            factory,
            sensor: None,
            state: task_state,
            timebase,
        })
        .map_err(|e| WidgetError::SensorFatal(format!("{}: cannot start polling thread: {}", cfg.id, e)))?;

        Ok(Self {
            base,
            bar: h.bar(),
            colors: h.colors_for(DisplayMode::BarHorizontal),
            state,
            poller,
        })
    }

    /// Make the widget visible for one auto-hide timeout
    pub fn trigger_show(&self) {
        let now = self.base.now();
        self.state.write().unwrap_or_else(|e| e.into_inner()).autohide.trigger_show(now);
    }

    pub fn reading(&self) -> Option<VolumeReading> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).reading
    }

    pub fn health(&self) -> SensorHealth {
        self.state.read().unwrap_or_else(|e| e.into_inner()).health.clone()
    }

    fn paint(&self, raster: &mut GrayRaster, reading: VolumeReading) -> Result<(), WidgetError> {
        let area = self.base.content_area();
        let mut bar_area = area;
        let icon_name = if reading.muted { "muted" } else { "on" };
        if let Some(icon) = glyphs::glyph("volume", icon_name) {
            let y = area.top_left.y + (area.size.height as i32 - icon.height as i32) / 2;
            draw::draw_glyph(raster, &icon, area.top_left.x, y, self.colors.primary)?;
            let shift = icon.width + 2;
            bar_area = Rectangle::new(
                area.top_left + Point::new(shift as i32, 0),
                Size::new(area.size.width.saturating_sub(shift), area.size.height),
            );
        }
        let color = if reading.muted { self.colors.secondary } else { self.colors.primary };
        draw::draw_bar(raster, bar_area, reading.level / 100.0, color, self.bar.border, BarDirection::Horizontal)?;
        Ok(())
    }
}

impl Widget for VolumeWidget {
    fn name(&self) -> &str { self.base.id() }
    fn kind(&self) -> &str { self.base.kind() }
    fn position(&self) -> Rect { self.base.position() }
    fn style(&self) -> Style { self.base.style() }

    fn update_interval(&self) -> Duration {
        self.base.update_interval()
    }

    // the polling thread does the work
    fn update(&self) -> Result<(), WidgetError> {
        Ok(())
    }

    fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
        let now = self.base.now();
        let frame = self.state.read().unwrap_or_else(|e| e.into_inner()).frame(now);
        match frame {
            PolledFrame::Stopped | PolledFrame::Hidden => Ok(None),
            PolledFrame::Pending => Ok(Some(self.base.placeholder("..."))),
            PolledFrame::Fatal(since) => {
                let mut raster = self.base.blank();
                draw_error_frame(&mut raster, self.base.content_area(), "VOLUME ERROR", flash_on(since, now))?;
                Ok(Some(self.base.finish(raster)))
            }
            PolledFrame::Ready(reading) => {
                let mut raster = self.base.blank();
                self.paint(&mut raster, reading)?;
                Ok(Some(self.base.finish(raster)))
            }
        }
    }

    fn stop(&self) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).stopped = true;
        self.poller.stop();
    }
}
