/*
 *  widgets/battery.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Battery charge and power source
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
use log::debug;

use crate::config::WidgetConfig;
use crate::raster::GrayRaster;
use crate::sensors::{BatterySensor, BatteryStat, BatteryState};
use super::dualio::HistoryRing;
use super::helper::{ConfigHelper, DisplayMode};
use super::registry::Registry;
use super::render::{draw_metric, MetricStyle};
use super::{BaseWidget, Rect, Style, Widget, WidgetContext, WidgetError};

pub fn register(registry: &Registry) {
    registry.register("battery", create);
}

pub fn create(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    Ok(Box::new(BatteryWidget::new(cfg, ctx)?))
}

/// Suffix after the percentage, `+` charging and `=` on mains
fn state_mark(stat: &BatteryStat) -> &'static str {
    match stat.state {
        BatteryState::Charging => "+",
        BatteryState::Full | BatteryState::NotCharging => "=",
        _ if stat.ac_online => "=",
        _ => "",
    }
}

struct BatteryReadings {
    stat: Option<BatteryStat>,
    history: Option<HistoryRing>,
}

pub struct BatteryWidget {
    base: BaseWidget,
    sensor: Arc<dyn BatterySensor>,
    style: MetricStyle,
    label: String,
    state: RwLock<BatteryReadings>,
}

impl BatteryWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        let style = MetricStyle::from_helper(&h, DisplayMode::Text)?;
        let history = style.keeps_history().then(|| HistoryRing::new(style.graph.history));
        Ok(Self {
            base: BaseWidget::new(cfg, ctx)?,
            sensor: ctx.sensors.battery.clone(),
            label: h.props().str("label").unwrap_or("BAT").to_string(),
            state: RwLock::new(BatteryReadings { stat: None, history }),
            style,
        })
    }

    pub fn stat(&self) -> Option<BatteryStat> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).stat
    }

    fn caption(&self, stat: &BatteryStat) -> String {
        format!("{} {:.0}%{}", self.label, stat.percent, state_mark(stat))
    }
}

impl Widget for BatteryWidget {
    fn name(&self) -> &str { self.base.id() }
    fn kind(&self) -> &str { self.base.kind() }
    fn position(&self) -> Rect { self.base.position() }
    fn style(&self) -> Style { self.base.style() }

    fn update_interval(&self) -> Duration {
        self.base.update_interval()
    }

    fn update(&self) -> Result<(), WidgetError> {
        let stat = match self.sensor.battery() {
            Ok(s) => s,
            Err(e) => {
                debug!("{}: battery read failed: {}", self.base.id(), e);
                return Ok(());
            }
        };
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(ring) = state.history.as_mut() {
            ring.push(stat.percent / 100.0);
        }
        state.stat = Some(stat);
        Ok(())
    }

    fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
        let (stat, history) = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            (state.stat, state.history.as_ref().map(HistoryRing::to_vec).unwrap_or_default())
        };
        let Some(stat) = stat else {
            return Ok(Some(self.base.placeholder("...")));
        };
        let mut raster = self.base.blank();
        let caption = self.caption(&stat);
        draw_metric(&mut raster, self.base.content_area(), &self.style, &caption, stat.percent / 100.0, &history)?;
        Ok(Some(self.base.finish(raster)))
    }
}
