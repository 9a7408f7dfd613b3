/*
 *  widgets/weather.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Current conditions and forecast, rotating between format strings
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

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use chrono::NaiveDate;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{debug, info, warn};

use crate::config::WidgetConfig;
use crate::draw;
use crate::fonts::{measure_text, Font};
use crate::glyphs;
use crate::raster::GrayRaster;
use crate::sensors::{AirQuality, CurrentWeather, ForecastDay, SensorError, WeatherProvider, WeatherQuery};
use crate::timebase::Timebase;
use super::error_proxy::{draw_error_frame, flash_on};
use super::helper::{Colors, ConfigHelper, DisplayMode};
use super::poller::{PollTask, PolledFrame, PolledState, Poller, PollerConfig, SensorHealth};
use super::registry::Registry;
use super::transition::{Transition, TransitionEffect};
use super::weather_format::{tokenize, Needs, Token};
use super::{BaseWidget, Rect, Style, Widget, WidgetContext, WidgetError};

pub const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_ROTATE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(500);
const DEFAULT_FORMAT: &str = "{icon} {temp}C {desc}";
const MISSING: &str = "--";

pub fn register(registry: &Registry) {
    registry.register("weather", create);
}

pub fn create(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    Ok(Box::new(WeatherWidget::new(cfg, ctx)?))
}

/// Everything one fetch cycle produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherData {
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastDay>,
    pub air: Option<AirQuality>,
    pub uv: Option<f64>,
}

/// Provider selection from config; open-meteo cannot work without a location
pub fn query_from_config(h: &ConfigHelper<'_>) -> Result<WeatherQuery, WidgetError> {
    let p = h.props();
    let d = WeatherQuery::default();
    let query = WeatherQuery {
        provider: p.str("provider").map_or(d.provider, |s| s.trim().to_ascii_lowercase()),
        latitude: p.f64("latitude").or_else(|| p.f64("lat")),
        longitude: p.f64("longitude").or_else(|| p.f64("lon")),
        units: p.str("units").map_or(d.units, str::to_string),
        days: p.u64("days").map_or(d.days, |n| n as usize),
    };
    let open_meteo = matches!(query.provider.as_str(), "open-meteo" | "openmeteo");
    if open_meteo && (query.latitude.is_none() || query.longitude.is_none()) {
        return Err(WidgetError::Config(format!(
            "{}: the open-meteo provider needs latitude and longitude",
            h.id()
        )));
    }
    Ok(query)
}

fn compass(degrees: f64) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let idx = ((degrees.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    POINTS[idx]
}

fn fixed(v: f64, param: Option<&str>) -> String {
    let decimals = param.and_then(|p| p.parse::<usize>().ok()).unwrap_or(0).min(3);
    format!("{:.*}", decimals, v)
}

fn day_index(param: Option<&str>) -> usize {
    param.and_then(|p| p.parse().ok()).unwrap_or(0)
}

/// Text for one `{name[:param]}` value; unknown names and missing data
/// render as "--"
pub fn resolve_value(name: &str, param: Option<&str>, data: &WeatherData) -> String {
    let c = &data.current;
    let day = || data.forecast.get(day_index(param));
    let resolved = match name {
        "temp" => Some(fixed(c.temperature, param)),
        "feels" | "feels_like" => Some(fixed(c.feels_like, param)),
        "humidity" => Some(fixed(c.humidity, param)),
        "pressure" => Some(fixed(c.pressure, param)),
        "wind" => Some(fixed(c.wind_speed, param)),
        "wind_dir" => Some(compass(c.wind_direction).to_string()),
        "desc" => Some(c.description.clone()),
        "code" => Some(c.weather_code.to_string()),
        "max" => day().map(|d| fixed(d.temp_max, None)),
        "min" => day().map(|d| fixed(d.temp_min, None)),
        "pop" => day().map(|d| fixed(d.precipitation_chance, None)),
        "day" => day().map(|d| {
            NaiveDate::parse_from_str(&d.date, "%Y-%m-%d")
                .map(|date| date.format("%a").to_string())
                .unwrap_or_else(|_| d.date.clone())
        }),
        "aqi" => data.air.as_ref().map(|a| fixed(a.aqi, param)),
        "pm25" => data.air.as_ref().map(|a| fixed(a.pm2_5, param)),
        "pm10" => data.air.as_ref().map(|a| fixed(a.pm10, param)),
        "uv" => data.uv.map(|u| fixed(u, param)),
        _ => None,
    };
    resolved.unwrap_or_else(|| MISSING.to_string())
}

/// Glyph name for `{icon}` or `{icon:N}`
pub fn resolve_icon<'a>(param: Option<&str>, data: &'a WeatherData) -> &'a str {
    match param {
        None => &data.current.icon,
        Some(_) => data.forecast.get(day_index(param)).map_or("unknown", |d| d.icon.as_str()),
    }
}

struct FetchTask {
    provider: Arc<dyn WeatherProvider>,
    needs: Needs,
    state: Arc<RwLock<PolledState<WeatherData>>>,
    timebase: Arc<dyn Timebase>,
}

impl PollTask for FetchTask {
    fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn poll(&mut self, now: Instant) -> Result<(), SensorError> {
        let (current, forecast) = self.provider.fetch_weather(self.needs.forecast)?;
        let previous = self.state.read().unwrap_or_else(|e| e.into_inner()).reading.clone();

        // secondary feeds keep their last good value on failure
        let air = if self.needs.air_quality {
            match self.provider.fetch_air_quality() {
                Ok(a) => Some(a),
                Err(e) => {
                    debug!("air quality fetch failed: {}", e);
                    previous.as_ref().and_then(|p| p.air.clone())
                }
            }
        } else {
            None
        };
        let uv = if self.needs.uv {
            match self.provider.fetch_uv_index() {
                Ok(u) => Some(u),
                Err(e) => {
                    debug!("uv fetch failed: {}", e);
                    previous.as_ref().and_then(|p| p.uv)
                }
            }
        } else {
            None
        };

        let data = WeatherData { current, forecast, air, uv };
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.reading.as_ref() != Some(&data) {
            state.autohide.trigger_show(now);
        }
        state.reading = Some(data);
        Ok(())
    }

    fn on_health(&mut self, health: SensorHealth) {
        let now = self.timebase.now();
        self.state.write().unwrap_or_else(|e| e.into_inner()).record_health(health, now);
    }
}

struct Rotation {
    index: usize,
    last_switch: Option<Instant>,
    transition: Transition,
}

pub struct WeatherWidget {
    base: BaseWidget,
    formats: Vec<Vec<Token>>,
    font: Font,
    colors: Colors,
    rotate_every: Duration,
    effect: TransitionEffect,
    transition_time: Duration,
    state: Arc<RwLock<PolledState<WeatherData>>>,
    rotation: Mutex<Rotation>,
    poller: Poller,
}

impl WeatherWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        let base = BaseWidget::new(cfg, ctx)?;
        let query = query_from_config(&h)?;
        let p = h.props();

        let raw = p
            .strings("formats")
            .or_else(|| p.strings("format"))
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_FORMAT.to_string()]);
        let formats: Vec<Vec<Token>> = raw.iter().map(|f| tokenize(f)).collect();
        let needs = formats.iter().fold(Needs::default(), |n, t| n.union(Needs::of(t)));

        let effect = match p.str("transition") {
            None => TransitionEffect::Random,
            Some(name) => TransitionEffect::parse(name).unwrap_or_else(|| {
                warn!("{}: unknown transition '{}', using fade", cfg.id, name);
                TransitionEffect::DissolveFade
            }),
        };
        let seconds = |key: &str, default: Duration| {
            p.f64(key)
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map_or(default, Duration::from_secs_f64)
        };

        let provider = (ctx.sensors.weather)(&query)
            .map_err(|e| WidgetError::Config(format!("{}: weather provider: {}", cfg.id, e)))?;
        let state = Arc::new(RwLock::new(PolledState::new(base.new_autohide(true))));
        let poll = PollerConfig::new(&cfg.id, h.poll_interval(DEFAULT_FETCH_INTERVAL));
        info!("{}: {} weather every {:?}, {} format(s)", cfg.id, query.provider, poll.interval, formats.len());
        let task_state = state.clone();
        let timebase = ctx.timebase.clone();
        let poller = Poller::spawn(poll, ctx.timebase.clone(), move || FetchTask {
            provider,
            needs,
            state: task_state,
            timebase,
        })
        .map_err(|e| WidgetError::SensorFatal(format!("{}: cannot start fetch thread: {}", cfg.id, e)))?;

        Ok(Self {
            font: h.text().font(),
            colors: h.colors_for(DisplayMode::Text),
            rotate_every: seconds("rotate_interval", DEFAULT_ROTATE_INTERVAL).max(Duration::from_millis(100)),
            transition_time: seconds("transition_duration", DEFAULT_TRANSITION),
            effect,
            formats,
            base,
            state,
            rotation: Mutex::new(Rotation { index: 0, last_switch: None, transition: Transition::new() }),
            poller,
        })
    }

    pub fn data(&self) -> Option<WeatherData> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).reading.clone()
    }

    pub fn format_index(&self) -> usize {
        self.rotation.lock().unwrap_or_else(|e| e.into_inner()).index
    }

    pub fn is_transitioning(&self) -> bool {
        self.rotation.lock().unwrap_or_else(|e| e.into_inner()).transition.is_active()
    }

    /// One format on a fresh raster, tokens laid out left to right
    fn paint_format(&self, index: usize, data: &WeatherData) -> Result<GrayRaster, WidgetError> {
        let mut raster = self.base.blank();
        let area = self.base.content_area();
        let Some(tokens) = self.formats.get(index) else {
            return Ok(raster);
        };
        let right = area.top_left.x + area.size.width as i32;
        let (_, th) = measure_text("0", self.font);
        let ty = area.top_left.y + (area.size.height as i32 - th as i32) / 2;
        let mut x = area.top_left.x;

        for token in tokens {
            if x >= right {
                break;
            }
            match token {
                Token::Literal(text) => x += self.paint_text(&mut raster, text, x, ty)?,
                Token::Value { name, param } => {
                    let text = resolve_value(name, param.as_deref(), data);
                    x += self.paint_text(&mut raster, &text, x, ty)?;
                }
                Token::Icon { param } => {
                    let name = resolve_icon(param.as_deref(), data);
                    if let Some(icon) = glyphs::glyph("weather", name).or_else(|| glyphs::glyph("weather", "unknown")) {
                        let gy = area.top_left.y + (area.size.height as i32 - icon.height as i32) / 2;
                        draw::draw_glyph(&mut raster, &icon, x, gy, self.colors.primary)?;
                        x += icon.width as i32 + 1;
                    }
                }
                Token::Large { name, param } => {
                    let panel = Rectangle::new(
                        Point::new(x, area.top_left.y),
                        Size::new((right - x) as u32, area.size.height),
                    );
                    let days = param.as_deref().and_then(|p| p.parse::<usize>().ok());
                    self.paint_large(&mut raster, name, panel, data, days)?;
                    x = right;
                }
            }
        }
        Ok(raster)
    }

    fn paint_text(&self, raster: &mut GrayRaster, text: &str, x: i32, y: i32) -> Result<i32, WidgetError> {
        draw::draw_text(raster, text, self.font, x, y, self.colors.primary)?;
        let (w, _) = measure_text(text, self.font);
        Ok(w as i32 + self.font.character_spacing as i32)
    }

    /// Forecast columns or a high-temperature trend graph
    fn paint_large(&self, raster: &mut GrayRaster, name: &str, panel: Rectangle, data: &WeatherData,
                   days: Option<usize>) -> Result<(), WidgetError> {
        let forecast = &data.forecast[..days.unwrap_or(data.forecast.len()).min(data.forecast.len())];
        if forecast.is_empty() || panel.size.width == 0 {
            return Ok(());
        }
        match name {
            "graph" => {
                let (lo, hi) = forecast
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| (lo.min(d.temp_max), hi.max(d.temp_max)));
                let span = (hi - lo).max(1.0);
                let series: Vec<f64> = forecast.iter().map(|d| (d.temp_max - lo) / span).collect();
                draw::draw_graph(raster, panel, &series, series.len(), self.colors.primary, false)?;
            }
            _ => {
                let n = forecast.len() as u32;
                let col_w = (panel.size.width / n).max(1);
                for (i, day) in forecast.iter().enumerate() {
                    let col = Rectangle::new(
                        panel.top_left + Point::new((i as u32 * col_w) as i32, 0),
                        Size::new(col_w, panel.size.height),
                    );
                    let glyph = glyphs::glyph("weather", &day.icon).or_else(|| glyphs::glyph("weather", "unknown"));
                    let mut text_top = col.top_left.y;
                    if let Some(icon) = glyph {
                        let gx = col.top_left.x + (col_w as i32 - icon.width as i32) / 2;
                        draw::draw_glyph(raster, &icon, gx, col.top_left.y, self.colors.primary)?;
                        text_top += icon.height as i32 + 1;
                    }
                    let label = format!("{:.0}/{:.0}", day.temp_max, day.temp_min);
                    let text_area = Rectangle::new(
                        Point::new(col.top_left.x, text_top),
                        Size::new(col_w, (col.top_left.y + col.size.height as i32 - text_top).max(1) as u32),
                    );
                    draw::draw_text_in_rect(
                        raster, &label, self.font, text_area,
                        draw::HAlign::Center, draw::VAlign::Top, self.colors.secondary, 0,
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl Widget for WeatherWidget {
    fn name(&self) -> &str { self.base.id() }
    fn kind(&self) -> &str { self.base.kind() }
    fn position(&self) -> Rect { self.base.position() }
    fn style(&self) -> Style { self.base.style() }

    fn update_interval(&self) -> Duration {
        self.base.update_interval()
    }

    /// Rotate to the next format once `rotate_interval` has passed
    fn update(&self) -> Result<(), WidgetError> {
        if self.formats.len() < 2 {
            return Ok(());
        }
        let now = self.base.now();
        let index = {
            let mut rot = self.rotation.lock().unwrap_or_else(|e| e.into_inner());
            let Some(last) = rot.last_switch else {
                rot.last_switch = Some(now);
                return Ok(());
            };
            if now.saturating_duration_since(last) < self.rotate_every {
                return Ok(());
            }
            rot.index
        };
        let Some(data) = self.data() else {
            return Ok(());
        };
        // the outgoing frame is painted without holding the rotation lock
        let old = self.paint_format(index, &data)?;
        let mut rot = self.rotation.lock().unwrap_or_else(|e| e.into_inner());
        rot.index = (index + 1) % self.formats.len();
        rot.last_switch = Some(now);
        rot.transition.start(self.effect, self.transition_time, old, now);
        debug!("{}: rotating to format {}", self.base.id(), rot.index);
        Ok(())
    }

    fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
        let now = self.base.now();
        let frame = self.state.read().unwrap_or_else(|e| e.into_inner()).frame(now);
        let data = match frame {
            PolledFrame::Stopped | PolledFrame::Hidden => return Ok(None),
            PolledFrame::Pending => return Ok(Some(self.base.placeholder("..."))),
            PolledFrame::Fatal(since) => {
                let mut raster = self.base.blank();
                draw_error_frame(&mut raster, self.base.content_area(), "WEATHER ERROR", flash_on(since, now))?;
                return Ok(Some(self.base.finish(raster)));
            }
            PolledFrame::Ready(data) => data,
        };

        let (index, transition) = {
            let mut rot = self.rotation.lock().unwrap_or_else(|e| e.into_inner());
            rot.transition.step(now);
            (rot.index, rot.transition.snapshot(now))
        };
        let fresh = self.paint_format(index, &data)?;
        let raster = match transition {
            Some(t) => t.compose(&fresh),
            None => fresh,
        };
        Ok(Some(self.base.finish(raster)))
    }

    fn stop(&self) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).stopped = true;
        self.poller.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorSet;
    use crate::timebase::ManualTimebase;

    struct Fixed;

    impl WeatherProvider for Fixed {
        fn fetch_weather(&self, need_forecast: bool) -> Result<(CurrentWeather, Vec<ForecastDay>), SensorError> {
            let current = CurrentWeather {
                temperature: 12.4,
                feels_like: 10.9,
                humidity: 81.0,
                wind_direction: 225.0,
                description: "Drizzle".into(),
                icon: "rain".into(),
                ..Default::default()
            };
            let forecast = if need_forecast {
                vec![
                    ForecastDay { date: "2026-10-14".into(), temp_max: 14.0, temp_min: 6.0, icon: "cloud".into(), ..Default::default() },
                    ForecastDay { date: "2026-10-15".into(), temp_max: 16.0, temp_min: 8.0, icon: "clear".into(), ..Default::default() },
                ]
            } else {
                Vec::new()
            };
            Ok((current, forecast))
        }

        fn fetch_air_quality(&self) -> Result<AirQuality, SensorError> {
            Err(SensorError::NotSupported("air quality"))
        }

        fn fetch_uv_index(&self) -> Result<f64, SensorError> {
            Ok(3.2)
        }
    }

    fn wait_for(pred: impl Fn() -> bool) {
        for _ in 0..400 {
            if pred() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached");
    }

    fn ctx(tb: Arc<ManualTimebase>) -> WidgetContext {
        let mut sensors = SensorSet::unavailable();
        sensors.weather = Arc::new(|_: &WeatherQuery| Ok(Arc::new(Fixed) as Arc<dyn WeatherProvider>));
        WidgetContext::new(tb, sensors)
    }

    fn located(id: &str) -> WidgetConfig {
        WidgetConfig::new("weather", id, Rect::new(0, 0, 128, 20))
            .with("latitude", 53.35)
            .with("longitude", -6.26)
    }

    #[test]
    fn test_open_meteo_requires_location() {
        let cfg = WidgetConfig::new("weather", "w", Rect::new(0, 0, 128, 20));
        let err = WeatherWidget::new(&cfg, &ctx(Arc::new(ManualTimebase::new()))).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_resolve_values() {
        let (current, forecast) = Fixed.fetch_weather(true).unwrap();
        let data = WeatherData { current, forecast, air: None, uv: Some(3.2) };
        assert_eq!(resolve_value("temp", None, &data), "12");
        assert_eq!(resolve_value("temp", Some("1"), &data), "12.4");
        assert_eq!(resolve_value("feels_like", Some("1"), &data), "10.9");
        assert_eq!(resolve_value("wind_dir", None, &data), "SW");
        assert_eq!(resolve_value("max", Some("1"), &data), "16");
        assert_eq!(resolve_value("day", Some("0"), &data), "Wed");
        assert_eq!(resolve_value("aqi", None, &data), "--");
        assert_eq!(resolve_value("uv", Some("1"), &data), "3.2");
        assert_eq!(resolve_value("nonsense", None, &data), "--");
        assert_eq!(resolve_icon(None, &data), "rain");
        assert_eq!(resolve_icon(Some("1"), &data), "clear");
        assert_eq!(resolve_icon(Some("9"), &data), "unknown");
    }

    #[test]
    fn test_rotation_runs_transition() {
        let tb = Arc::new(ManualTimebase::new());
        let cfg = located("w")
            .with("formats", serde_yaml::from_str::<serde_yaml::Value>("['{temp}C', '{forecast}']").unwrap())
            .with("rotate_interval", 1.0)
            .with("transition", "fade")
            .with("transition_duration", 0.5);
        let w = WeatherWidget::new(&cfg, &ctx(tb.clone())).unwrap();
        wait_for(|| w.data().is_some());
        assert_eq!(w.data().unwrap().forecast.len(), 2);

        w.update().unwrap();
        assert_eq!(w.format_index(), 0);
        tb.set_secs(1.0);
        w.update().unwrap();
        assert_eq!(w.format_index(), 1);
        assert!(w.is_transitioning());

        tb.set_secs(1.25);
        assert!(w.render().unwrap().is_some());
        assert!(w.is_transitioning());
        tb.set_secs(1.6);
        let done = w.render().unwrap().unwrap();
        assert!(!w.is_transitioning());
        assert_eq!((done.width(), done.height()), (128, 20));
        w.stop();
        assert!(w.render().unwrap().is_none());
    }

    #[test]
    fn test_transition_names() {
        let tb = Arc::new(ManualTimebase::new());
        let w = WeatherWidget::new(&located("w").with("transition", "bogus"), &ctx(tb.clone())).unwrap();
        assert_eq!(w.effect, TransitionEffect::DissolveFade);
        w.stop();
        let w = WeatherWidget::new(&located("w"), &ctx(tb.clone())).unwrap();
        assert_eq!(w.effect, TransitionEffect::Random);
        w.stop();
        let w = WeatherWidget::new(&located("w").with("transition", "clock_wipe"), &ctx(tb)).unwrap();
        assert_eq!(w.effect, TransitionEffect::ClockWipe);
        w.stop();
    }

    #[test]
    fn test_single_format_never_rotates() {
        let tb = Arc::new(ManualTimebase::new());
        let w = WeatherWidget::new(&located("w").with("rotate_interval", 0.1), &ctx(tb.clone())).unwrap();
        w.update().unwrap();
        tb.set_secs(5.0);
        w.update().unwrap();
        assert_eq!(w.format_index(), 0);
        assert!(!w.is_transitioning());
        w.stop();
    }
}
