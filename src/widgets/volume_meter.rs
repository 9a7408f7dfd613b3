/*
 *  widgets/volume_meter.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Peak meter, one bar per channel plus a clipping lamp
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
use std::time::{Duration, Instant};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::info;

use crate::config::WidgetConfig;
use crate::draw::{self, BarDirection};
use crate::raster::GrayRaster;
use crate::sensors::{MeterData, MeterSensorFactory, SensorError, VolumeMeterSensor};
use crate::timebase::Timebase;
use super::error_proxy::{draw_error_frame, flash_on};
use super::helper::{BarSettings, Colors, ConfigHelper, DisplayMode};
use super::poller::{PollTask, PolledFrame, PolledState, Poller, PollerConfig, SensorHealth};
use super::registry::Registry;
use super::{BaseWidget, Rect, Style, Widget, WidgetContext, WidgetError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_CLIPPING: f64 = 0.99;
pub const DEFAULT_SILENCE: f64 = 0.01;

/// Width of the clipping lamp at the far end of the bars
const CLIP_LAMP: u32 = 3;

pub fn register(registry: &Registry) {
    registry.register("volume_meter", create);
}

pub fn create(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    Ok(Box::new(VolumeMeterWidget::new(cfg, ctx)?))
}

type SharedState = Arc<RwLock<PolledState<MeterData>>>;

struct MeterTask {
    factory: MeterSensorFactory,
    sensor: Option<Box<dyn VolumeMeterSensor>>,
    clipping: f64,
    silence: f64,
    state: SharedState,
    timebase: Arc<dyn Timebase>,
}

impl PollTask for MeterTask {
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
            .ok_or_else(|| SensorError::Unavailable("meter not initialised".into()))?;
        let data = sensor.get_meter_data(self.clipping, self.silence)?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if data.has_audio {
            state.autohide.trigger_show(now);
        }
        state.reading = Some(data);
        Ok(())
    }

    fn needs_reinitialize(&self) -> bool {
        self.sensor.as_ref().is_some_and(|s| s.needs_reinitialize())
    }

    fn on_health(&mut self, health: SensorHealth) {
        let now = self.timebase.now();
        self.state.write().unwrap_or_else(|e| e.into_inner()).record_health(health, now);
    }
}

/// Bar rectangles for `n` channels, leaving room for the clipping lamp
pub fn channel_rects(area: Rectangle, n: usize, direction: BarDirection) -> Vec<Rectangle> {
    if n == 0 {
        return Vec::new();
    }
    let n32 = n as u32;
    match direction {
        BarDirection::Horizontal => {
            let width = area.size.width.saturating_sub(CLIP_LAMP + 1);
            let h = (area.size.height / n32).max(1);
            (0..n32)
                .map(|i| Rectangle::new(area.top_left + Point::new(0, (i * h) as i32), Size::new(width, h)))
                .collect()
        }
        BarDirection::Vertical => {
            let height = area.size.height.saturating_sub(CLIP_LAMP + 1);
            let w = (area.size.width / n32).max(1);
            let top = area.top_left + Point::new(0, (CLIP_LAMP + 1) as i32);
            (0..n32)
                .map(|i| Rectangle::new(top + Point::new((i * w) as i32, 0), Size::new(w, height)))
                .collect()
        }
    }
}

fn lamp_rect(area: Rectangle, direction: BarDirection) -> Rectangle {
    match direction {
        BarDirection::Horizontal => Rectangle::new(
            area.top_left + Point::new(area.size.width.saturating_sub(CLIP_LAMP) as i32, 0),
            Size::new(CLIP_LAMP.min(area.size.width), area.size.height),
        ),
        BarDirection::Vertical => {
            Rectangle::new(area.top_left, Size::new(area.size.width, CLIP_LAMP.min(area.size.height)))
        }
    }
}

pub struct VolumeMeterWidget {
    base: BaseWidget,
    bar: BarSettings,
    direction: BarDirection,
    colors: Colors,
    state: SharedState,
    poller: Poller,
}

impl VolumeMeterWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        let base = BaseWidget::new(cfg, ctx)?;
        let mode = h.display_mode(DisplayMode::BarHorizontal)?;
        let bar = h.bar();
        let p = h.props();
        let clipping = p.f64("clipping_threshold").unwrap_or(DEFAULT_CLIPPING);
        let silence = p.f64("silence_threshold").unwrap_or(DEFAULT_SILENCE);

        let state: SharedState = Arc::new(RwLock::new(PolledState::new(base.new_autohide(false))));
        let poll = PollerConfig::new(&cfg.id, h.poll_interval(DEFAULT_POLL_INTERVAL));
        info!("{}: meter polling every {:?}", cfg.id, poll.interval);
        let task_state = state.clone();
        let factory = ctx.sensors.meter.clone();
        let timebase = ctx.timebase.clone();
        let poller = Poller::spawn(poll, ctx.timebase.clone(), move || MeterTask {
            factory,
            sensor: None,
            clipping,
            silence,
            state: task_state,
            timebase,
        })
        .map_err(|e| WidgetError::SensorFatal(format!("{}: cannot start polling thread: {}", cfg.id, e)))?;

        Ok(Self {
            base,
            direction: mode.bar_direction().unwrap_or(bar.direction),
            bar,
            colors: h.colors_for(mode),
            state,
            poller,
        })
    }

    pub fn reading(&self) -> Option<MeterData> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).reading.clone()
    }

    fn paint(&self, raster: &mut GrayRaster, data: &MeterData) -> Result<(), WidgetError> {
        let area = self.base.content_area();
        // a sensor without channel detail still has an overall peak
        let peaks = if data.channel_peaks.is_empty() { vec![data.peak] } else { data.channel_peaks.clone() };
        for (rect, peak) in channel_rects(area, peaks.len(), self.direction).into_iter().zip(&peaks) {
            draw::draw_bar(raster, rect, *peak, self.colors.primary, self.bar.border, self.direction)?;
        }
        if data.is_clipping {
            draw::fill_rect(raster, lamp_rect(area, self.direction), self.colors.primary)?;
        }
        Ok(())
    }
}

impl Widget for VolumeMeterWidget {
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
        let now = self.base.now();
        let frame = self.state.read().unwrap_or_else(|e| e.into_inner()).frame(now);
        match frame {
            PolledFrame::Stopped | PolledFrame::Hidden => Ok(None),
            PolledFrame::Pending => Ok(Some(self.base.placeholder("..."))),
            PolledFrame::Fatal(since) => {
                let mut raster = self.base.blank();
                draw_error_frame(&mut raster, self.base.content_area(), "METER ERROR", flash_on(since, now))?;
                Ok(Some(self.base.finish(raster)))
            }
            PolledFrame::Ready(data) => {
                let mut raster = self.base.blank();
                self.paint(&mut raster, &data)?;
                Ok(Some(self.base.finish(raster)))
            }
        }
    }

    fn stop(&self) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).stopped = true;
        self.poller.stop();
    }
}
