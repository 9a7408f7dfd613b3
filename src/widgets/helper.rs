/*
 *  widgets/helper.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Typed projection of a widget config, every default lives here
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
use serde_yaml::Value;

use crate::config::{Properties, WidgetConfig};
use crate::draw::{BarDirection, HAlign, VAlign};
use crate::fonts::{load_font, Font};
use super::scroller::{ScrollDirection, ScrollMode, ScrollSettings};
use super::{Rect, Style, WidgetError};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(1);
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);
pub const DEFAULT_FONT_SIZE: u32 = 10;
pub const DEFAULT_HISTORY: usize = 30;
pub const DEFAULT_PRIMARY: u8 = 255;
pub const DEFAULT_SECONDARY: u8 = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Text,
    BarHorizontal,
    BarVertical,
    Graph,
    Gauge,
}

impl DisplayMode {
    /// Plain "bar" takes its direction from the bar settings
    pub fn parse(s: &str, bar_direction: BarDirection) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "text" => Some(DisplayMode::Text),
            "bar" => Some(match bar_direction {
                BarDirection::Horizontal => DisplayMode::BarHorizontal,
                BarDirection::Vertical => DisplayMode::BarVertical,
            }),
            "bar-horizontal" | "hbar" => Some(DisplayMode::BarHorizontal),
            "bar-vertical" | "vbar" => Some(DisplayMode::BarVertical),
            "graph" => Some(DisplayMode::Graph),
            "gauge" => Some(DisplayMode::Gauge),
            _ => None,
        }
    }

    pub fn bar_direction(&self) -> Option<BarDirection> {
        match self {
            DisplayMode::BarHorizontal => Some(BarDirection::Horizontal),
            DisplayMode::BarVertical => Some(BarDirection::Vertical),
            _ => None,
        }
    }

    /// Key of the mode-specific colour block
    pub fn color_key(&self) -> &'static str {
        match self {
            DisplayMode::Text => "text",
            DisplayMode::BarHorizontal | DisplayMode::BarVertical => "bar",
            DisplayMode::Graph => "graph",
            DisplayMode::Gauge => "gauge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSettings {
    pub font_name: String,
    pub font_size: u32,
    pub halign: HAlign,
    pub valign: VAlign,
    pub baseline_adjust: i32,
}

impl TextSettings {
    pub fn font(&self) -> Font {
        load_font(&self.font_name, self.font_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarSettings {
    pub direction: BarDirection,
    pub border: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphSettings {
    pub history: usize,
    pub filled: bool,
    pub primary: u8,
    pub secondary: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeSettings {
    pub arc_color: u8,
    pub needle_color: u8,
    pub show_ticks: bool,
    pub ticks_color: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerCoreSettings {
    pub enabled: bool,
    pub border: bool,
    pub margin: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoHideSettings {
    pub enabled: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colors {
    pub primary: u8,
    pub secondary: u8,
}

/// Stateless view over a `WidgetConfig`. Factories read config only through
/// this type so defaults stay in one place.
pub struct ConfigHelper<'a> {
    cfg: &'a WidgetConfig,
}

fn color(v: u64) -> u8 {
    v.min(255) as u8
}

fn seconds(p: &Properties, key: &str) -> Option<Duration> {
    p.f64(key)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

/// A section that may also be written as a bare bool (`auto_hide: true`)
fn toggled_section(p: &Properties, key: &str) -> (Option<bool>, Properties) {
    match p.get(key) {
        Some(Value::Bool(b)) => (Some(*b), Properties::default()),
        _ => {
            let s = p.section(key).unwrap_or_default();
            (s.bool("enabled"), s)
        }
    }
}

impl<'a> ConfigHelper<'a> {
    pub fn new(cfg: &'a WidgetConfig) -> Self {
        Self { cfg }
    }

    pub fn id(&self) -> &str {
        &self.cfg.id
    }

    pub fn kind(&self) -> &str {
        &self.cfg.kind
    }

    pub fn props(&self) -> &Properties {
        &self.cfg.properties
    }

    pub fn position(&self) -> Result<Rect, WidgetError> {
        let p = self.cfg.position;
        if p.w == 0 || p.h == 0 {
            return Err(WidgetError::Config(format!(
                "{}: position needs w >= 1 and h >= 1, got {}x{}",
                self.cfg.id, p.w, p.h
            )));
        }
        Ok(p)
    }

    pub fn style(&self) -> Style {
        self.cfg.style.unwrap_or_default()
    }

    pub fn update_interval(&self) -> Duration {
        seconds(self.props(), "update_interval")
            .unwrap_or(DEFAULT_UPDATE_INTERVAL)
            .max(MIN_INTERVAL)
    }

    /// Background poll cadence, `default` supplied by the widget
    pub fn poll_interval(&self, default: Duration) -> Duration {
        seconds(self.props(), "poll_interval").unwrap_or(default).max(MIN_INTERVAL)
    }

    /// `mode` key, `default` when absent, configuration error when invalid
    pub fn display_mode(&self, default: DisplayMode) -> Result<DisplayMode, WidgetError> {
        let Some(raw) = self.props().str("mode").or_else(|| self.props().str("display_mode")) else {
            return Ok(default);
        };
        DisplayMode::parse(raw, self.bar().direction).ok_or_else(|| {
            WidgetError::Config(format!("{}: invalid display mode '{}'", self.cfg.id, raw))
        })
    }

    pub fn text(&self) -> TextSettings {
        let t = self.props().section("text").unwrap_or_default();
        TextSettings {
            font_name: t.str("font").unwrap_or_default().to_string(),
            font_size: t.u64("size").map_or(DEFAULT_FONT_SIZE, |s| s as u32),
            halign: t.str("align").and_then(HAlign::parse).unwrap_or(HAlign::Center),
            valign: t.str("valign").and_then(VAlign::parse).unwrap_or(VAlign::Center),
            baseline_adjust: t.f64("baseline").map_or(0, |b| b as i32),
        }
    }

    /// Style padding wins over a bare `padding` key
    pub fn padding(&self) -> u32 {
        match self.cfg.style {
            Some(s) if s.padding > 0 => s.padding,
            _ => self.props().u64("padding").map_or(0, |p| p as u32),
        }
    }

    pub fn bar(&self) -> BarSettings {
        let b = self.props().section("bar").unwrap_or_default();
        BarSettings {
            direction: b.str("direction").and_then(BarDirection::parse).unwrap_or_default(),
            border: b.bool("border").unwrap_or(false),
        }
    }

    pub fn graph(&self) -> GraphSettings {
        let g = self.props().section("graph").unwrap_or_default();
        let colors = self.colors_for(DisplayMode::Graph);
        GraphSettings {
            history: g.u64("history").map_or(DEFAULT_HISTORY, |h| (h as usize).max(2)),
            filled: g.bool("filled").unwrap_or(true),
            primary: colors.primary,
            secondary: colors.secondary,
        }
    }

    pub fn gauge(&self) -> GaugeSettings {
        let g = self.props().section("gauge").unwrap_or_default();
        GaugeSettings {
            arc_color: g.u64("arc").map_or(DEFAULT_SECONDARY, color),
            needle_color: g.u64("needle").map_or(DEFAULT_PRIMARY, color),
            show_ticks: g.bool("ticks").unwrap_or(true),
            ticks_color: g.u64("ticks_color").map_or(DEFAULT_SECONDARY, color),
        }
    }

    pub fn per_core(&self) -> PerCoreSettings {
        let (enabled, s) = toggled_section(self.props(), "per_core");
        PerCoreSettings {
            enabled: enabled.unwrap_or(false),
            border: s.bool("border").unwrap_or(false),
            margin: s.u64("margin").map_or(1, |m| m as u32),
        }
    }

    pub fn auto_hide(&self) -> AutoHideSettings {
        let (enabled, s) = toggled_section(self.props(), "auto_hide");
        AutoHideSettings {
            enabled: enabled.unwrap_or(false),
            timeout: seconds(&s, "timeout").unwrap_or(Duration::from_secs(3)),
        }
    }

    pub fn scroll(&self) -> ScrollSettings {
        let s = self.props().section("scroll").unwrap_or_default();
        let d = ScrollSettings::default();
        ScrollSettings {
            speed: s.f64("speed").filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(d.speed),
            mode: s.str("mode").and_then(ScrollMode::parse).unwrap_or(d.mode),
            direction: s.str("direction").and_then(ScrollDirection::parse).unwrap_or(d.direction),
            pause: s.u64("pause_ms").map_or(d.pause, Duration::from_millis),
            gap: s.f64("gap").filter(|g| *g >= 0.0).unwrap_or(d.gap),
        }
    }

    /// `colors.<mode>.{primary,secondary}` falling back to `colors.{primary,secondary}`
    pub fn colors_for(&self, mode: DisplayMode) -> Colors {
        let all = self.props().section("colors").unwrap_or_default();
        let block = all.section(mode.color_key()).unwrap_or_default();
        let pick = |key: &str, default: u8| {
            block.u64(key).or_else(|| all.u64(key)).map_or(default, color)
        };
        Colors {
            primary: pick("primary", DEFAULT_PRIMARY),
            secondary: pick("secondary", DEFAULT_SECONDARY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(yaml: &str) -> WidgetConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    const BASE: &str = "type: disk\nid: d\nposition: {x: 0, y: 0, w: 64, h: 16}\n";

    #[test]
    fn test_defaults() {
        let c = cfg(BASE);
        let h = ConfigHelper::new(&c);
        assert_eq!(h.update_interval(), Duration::from_secs(1));
        assert_eq!(h.padding(), 0);
        assert_eq!(h.display_mode(DisplayMode::Text).unwrap(), DisplayMode::Text);
        let t = h.text();
        assert_eq!((t.font_size, t.halign, t.valign), (10, HAlign::Center, VAlign::Center));
        assert_eq!(h.bar(), BarSettings { direction: BarDirection::Horizontal, border: false });
        let g = h.graph();
        assert_eq!((g.history, g.filled), (30, true));
        assert!(h.gauge().show_ticks);
        assert!(!h.per_core().enabled);
        assert!(!h.auto_hide().enabled);
        assert_eq!(h.poll_interval(Duration::from_millis(100)), Duration::from_millis(100));
        assert_eq!(h.style(), Style::default());
    }

    #[test]
    fn test_bar_mode_follows_direction() {
        let c = cfg(&format!("{}mode: bar\nbar: {{direction: vertical, border: true}}\n", BASE));
        let h = ConfigHelper::new(&c);
        assert_eq!(h.display_mode(DisplayMode::Text).unwrap(), DisplayMode::BarVertical);
        assert!(h.bar().border);
    }

    #[test]
    fn test_invalid_mode_is_config_error() {
        let c = cfg(&format!("{}mode: sparkle\n", BASE));
        let err = ConfigHelper::new(&c).display_mode(DisplayMode::Text).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_size_position_rejected() {
        let c = cfg("type: clock\nid: c\nposition: {x: 0, y: 0, w: 0, h: 4}\n");
        assert!(ConfigHelper::new(&c).position().is_err());
    }

    #[test]
    fn test_toggle_sections_accept_bool() {
        let c = cfg(&format!("{}auto_hide: true\nper_core: {{enabled: true, margin: 2}}\n", BASE));
        let h = ConfigHelper::new(&c);
        assert!(h.auto_hide().enabled);
        assert_eq!(h.auto_hide().timeout, Duration::from_secs(3));
        assert_eq!(h.per_core(), PerCoreSettings { enabled: true, border: false, margin: 2 });
    }

    #[test]
    fn test_colors_mode_block_then_shared() {
        let c = cfg(&format!(
            "{}colors: {{secondary: 90, graph: {{primary: 200}}}}\n",
            BASE
        ));
        let h = ConfigHelper::new(&c);
        assert_eq!(h.colors_for(DisplayMode::Graph), Colors { primary: 200, secondary: 90 });
        assert_eq!(h.colors_for(DisplayMode::Text), Colors { primary: 255, secondary: 90 });
    }

    #[test]
    fn test_update_interval_floor() {
        let c = cfg(&format!("{}update_interval: 0\n", BASE));
        assert_eq!(ConfigHelper::new(&c).update_interval(), MIN_INTERVAL);
    }
}
