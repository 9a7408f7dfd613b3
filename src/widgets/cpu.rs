/*
 *  widgets/cpu.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  CPU utilisation, overall or per-core grid
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
use log::debug;

use crate::config::WidgetConfig;
use crate::draw;
use crate::raster::GrayRaster;
use crate::sensors::CpuSensor;
use super::dualio::HistoryRing;
use super::helper::{ConfigHelper, DisplayMode, PerCoreSettings};
use super::registry::Registry;
use super::render::{draw_metric, MetricStyle};
use super::{BaseWidget, Rect, Style, Widget, WidgetContext, WidgetError};

pub fn register(registry: &Registry) {
    registry.register("cpu", create);
}

pub fn create(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    Ok(Box::new(CpuWidget::new(cfg, ctx)?))
}

/// Per-core grid shape, columns first
pub fn grid_dims(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let mut cols = (n as f64).sqrt().ceil() as usize;
    // guard float rounding on perfect squares
    while cols * cols < n {
        cols += 1;
    }
    while cols > 1 && (cols - 1) * (cols - 1) >= n {
        cols -= 1;
    }
    (cols, n.div_ceil(cols))
}

/// Cell rectangles of a `cols` x `rows` grid inside `area`, row major
pub fn grid_cells(area: Rectangle, n: usize, margin: u32) -> Vec<Rectangle> {
    let (cols, rows) = grid_dims(n);
    if cols == 0 {
        return Vec::new();
    }
    let (c, r) = (cols as u32, rows as u32);
    let cell_w = area.size.width.saturating_sub(margin * (c - 1)) / c;
    let cell_h = area.size.height.saturating_sub(margin * (r - 1)) / r;
    (0..n)
        .map(|i| {
            let (col, row) = ((i % cols) as u32, (i / cols) as u32);
            let origin = area.top_left + Point::new((col * (cell_w + margin)) as i32, (row * (cell_h + margin)) as i32);
            Rectangle::new(origin, Size::new(cell_w.max(1), cell_h.max(1)))
        })
        .collect()
}

/// History storage, one ring overall or one ring per core
#[derive(Debug, Clone)]
pub enum CpuHistory {
    Scalar(HistoryRing),
    PerCore(Vec<HistoryRing>),
}

impl CpuHistory {
    fn push(&mut self, values: &[f64], capacity: usize) {
        match self {
            CpuHistory::Scalar(ring) => {
                if let Some(v) = values.first() {
                    ring.push(*v / 100.0);
                }
            }
            CpuHistory::PerCore(rings) => {
                // core count can change on hotplug
                rings.resize_with(values.len(), || HistoryRing::new(capacity));
                for (ring, v) in rings.iter_mut().zip(values) {
                    ring.push(*v / 100.0);
                }
            }
        }
    }

    pub fn series(&self, index: usize) -> Vec<f64> {
        match self {
            CpuHistory::Scalar(ring) => ring.to_vec(),
            CpuHistory::PerCore(rings) => rings.get(index).map(HistoryRing::to_vec).unwrap_or_default(),
        }
    }

    pub fn is_per_core(&self) -> bool {
        matches!(self, CpuHistory::PerCore(_))
    }
}

struct CpuState {
    percent: Vec<f64>,
    history: Option<CpuHistory>,
}

pub struct CpuWidget {
    base: BaseWidget,
    sensor: Arc<dyn CpuSensor>,
    style: MetricStyle,
    per_core: PerCoreSettings,
    label: String,
    sample: Duration,
    state: RwLock<CpuState>,
}

impl CpuWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        let style = MetricStyle::from_helper(&h, DisplayMode::Text)?;
        let per_core = h.per_core();
        let capacity = style.graph.history;
        let history = style.keeps_history().then(|| {
            if per_core.enabled {
                let cores = ctx.sensors.cpu.core_count();
                CpuHistory::PerCore((0..cores).map(|_| HistoryRing::new(capacity)).collect())
            } else {
                CpuHistory::Scalar(HistoryRing::new(capacity))
            }
        });
        let p = h.props();
        Ok(Self {
            base: BaseWidget::new(cfg, ctx)?,
            sensor: ctx.sensors.cpu.clone(),
            label: p.str("label").unwrap_or("CPU").to_string(),
            sample: Duration::from_millis(p.u64("sample_ms").unwrap_or(0)),
            state: RwLock::new(CpuState { percent: Vec::new(), history }),
            style,
            per_core,
        })
    }

    /// Latest percentages, one per core in per-core mode
    pub fn percent(&self) -> Vec<f64> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).percent.clone()
    }

    pub fn history(&self) -> Option<CpuHistory> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).history.clone()
    }

    fn paint_cell(&self, raster: &mut GrayRaster, cell: Rectangle, label: &str, percent: f64, hist: &[f64])
        -> Result<(), WidgetError> {
        let cell = if self.per_core.enabled && self.per_core.border {
            draw::draw_rect(raster, cell, self.style.colors.secondary)?;
            draw::inset(cell, 1)
        } else {
            cell
        };
        draw_metric(raster, cell, &self.style, label, percent / 100.0, hist)
    }
}

impl Widget for CpuWidget {
    fn name(&self) -> &str { self.base.id() }
    fn kind(&self) -> &str { self.base.kind() }
    fn position(&self) -> Rect { self.base.position() }
    fn style(&self) -> Style { self.base.style() }

    fn update_interval(&self) -> Duration {
        self.base.update_interval()
    }

    fn update(&self) -> Result<(), WidgetError> {
        let values = match self.sensor.percent(self.sample, self.per_core.enabled) {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return Ok(()),
            Err(e) => {
                debug!("{}: cpu read failed: {}", self.base.id(), e);
                return Ok(());
            }
        };
        let values: Vec<f64> = values.into_iter().map(|v| v.clamp(0.0, 100.0)).collect();
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let capacity = self.style.graph.history;
        if let Some(history) = state.history.as_mut() {
            history.push(&values, capacity);
        }
        state.percent = values;
        Ok(())
    }

    fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
        let (percent, history) = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            (state.percent.clone(), state.history.clone())
        };
        if percent.is_empty() {
            return Ok(Some(self.base.placeholder("...")));
        }

        let mut raster = self.base.blank();
        let area = self.base.content_area();
        if self.per_core.enabled {
            let cells = grid_cells(area, percent.len(), self.per_core.margin);
            for (i, (cell, value)) in cells.into_iter().zip(&percent).enumerate() {
                let hist = history.as_ref().map(|h| h.series(i)).unwrap_or_default();
                self.paint_cell(&mut raster, cell, &format!("{:.0}%", value), *value, &hist)?;
            }
        } else {
            let value = percent[0];
            let hist = history.as_ref().map(|h| h.series(0)).unwrap_or_default();
            let label = format!("{} {:.0}%", self.label, value);
            self.paint_cell(&mut raster, area, &label, value, &hist)?;
        }
        Ok(Some(self.base.finish(raster)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::sensors::{SensorError, SensorSet};
    use crate::timebase::ManualTimebase;

    struct FakeCpu {
        cores: usize,
        value: Mutex<f64>,
    }

    impl CpuSensor for FakeCpu {
        fn percent(&self, _sample: Duration, per_core: bool) -> Result<Vec<f64>, SensorError> {
            let v = *self.value.lock().unwrap();
            Ok(if per_core { vec![v; self.cores] } else { vec![v] })
        }

        fn core_count(&self) -> usize {
            self.cores
        }
    }

    fn widget(cfg: WidgetConfig, cores: usize) -> CpuWidget {
        let mut sensors = SensorSet::unavailable();
        sensors.cpu = Arc::new(FakeCpu { cores, value: Mutex::new(40.0) });
        let ctx = WidgetContext::new(Arc::new(ManualTimebase::new()), sensors);
        CpuWidget::new(&cfg, &ctx).unwrap()
    }

    #[test]
    fn test_grid_dims() {
        assert_eq!(grid_dims(0), (0, 0));
        assert_eq!(grid_dims(1), (1, 1));
        assert_eq!(grid_dims(4), (2, 2));
        assert_eq!(grid_dims(6), (3, 2));
        assert_eq!(grid_dims(8), (3, 3));
        assert_eq!(grid_dims(9), (3, 3));
        assert_eq!(grid_dims(16), (4, 4));
    }

    #[test]
    fn test_grid_cells_fit_area() {
        let area = Rectangle::new(Point::zero(), Size::new(64, 32));
        let cells = grid_cells(area, 4, 2);
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0].size, Size::new(31, 15));
        assert_eq!(cells[3].top_left, Point::new(33, 17));
    }

    #[test]
    fn test_per_core_history_variant() {
        let cfg = WidgetConfig::new("cpu", "c", Rect::new(0, 0, 64, 32))
            .with("mode", "graph")
            .with("per_core", true);
        let w = widget(cfg, 4);
        w.update().unwrap();
        w.update().unwrap();
        assert_eq!(w.percent().len(), 4);
        match w.history().unwrap() {
            CpuHistory::PerCore(rings) => {
                assert_eq!(rings.len(), 4);
                assert_eq!(rings[0].len(), 2);
            }
            CpuHistory::Scalar(_) => panic!("expected per-core history"),
        }
    }

    #[test]
    fn test_scalar_history_and_no_history_in_text() {
        let cfg = WidgetConfig::new("cpu", "c", Rect::new(0, 0, 64, 16)).with("mode", "graph");
        let w = widget(cfg, 4);
        w.update().unwrap();
        assert!(!w.history().unwrap().is_per_core());

        let w = widget(WidgetConfig::new("cpu", "c", Rect::new(0, 0, 64, 16)), 4);
        w.update().unwrap();
        assert!(w.history().is_none());
        assert_eq!(w.percent(), vec![40.0]);
    }

    #[test]
    fn test_render_before_data_is_placeholder() {
        let w = widget(WidgetConfig::new("cpu", "c", Rect::new(0, 0, 64, 16)), 2);
        let r = w.render().unwrap().unwrap();
        assert_eq!((r.width(), r.height()), (64, 16));
    }

    #[test]
    fn test_per_core_gauges_render() {
        let cfg = WidgetConfig::new("cpu", "c", Rect::new(0, 0, 64, 32))
            .with("mode", "gauge")
            .with("per_core", true);
        let w = widget(cfg, 4);
        w.update().unwrap();
        let r = w.render().unwrap().unwrap();
        assert!(r.count(|v| v != 0) > 0);
    }
}
