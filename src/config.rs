/*
 *  config.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  YAML configuration with CLI overrides, plus the per-widget records
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

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::collections::{BTreeMap, HashSet};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::widgets::{Rect, Style};

/// Failure to read, parse or validate the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// default log filter when RUST_LOG is unset
    pub log_level: Option<String>,
    /// composited frame geometry
    pub display: Option<DisplayConfig>,
    /// compositor ticks per second
    pub frame_rate: Option<u32>,
    /// write the composited frame here as PGM after every tick
    pub snapshot: Option<PathBuf>,
    /// widgets in configuration order
    #[serde(default)]
    pub widgets: Vec<WidgetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub background: Option<u8>,
}

pub const DEFAULT_DISPLAY_WIDTH: u32 = 128;
pub const DEFAULT_DISPLAY_HEIGHT: u32 = 40;
pub const DEFAULT_FRAME_RATE: u32 = 10;

impl Config {
    pub fn display_size(&self) -> (u32, u32) {
        let d = self.display.as_ref();
        (
            d.and_then(|d| d.width).unwrap_or(DEFAULT_DISPLAY_WIDTH),
            d.and_then(|d| d.height).unwrap_or(DEFAULT_DISPLAY_HEIGHT),
        )
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate.unwrap_or(DEFAULT_FRAME_RATE).max(1)
    }
}

fn default_enabled() -> bool { true }

/// One configured widget: identity, placement, style and a kind-dependent bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub position: Rect,
    #[serde(default)]
    pub style: Option<Style>,
    /// everything else the widget kind understands
    #[serde(flatten)]
    pub properties: Properties,
}

impl WidgetConfig {
    pub fn new(kind: &str, id: &str, position: Rect) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.to_string(),
            enabled: true,
            position,
            style: None,
            properties: Properties::default(),
        }
    }

    /// Builder-style property setter
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.set(key, value);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Loosely typed key/value bundle, read through the typed accessors
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)))
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// List of strings, a lone string reads as a one-element list
    pub fn strings(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Sequence(seq) => Some(
                seq.iter().filter_map(Value::as_str).map(str::to_string).collect()
            ),
            _ => None,
        }
    }

    /// Nested mapping as its own bundle
    pub fn section(&self, key: &str) -> Option<Properties> {
        match self.get(key)? {
            Value::Mapping(m) => Some(Properties(
                m.iter()
                    .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// Command line. Every field is optional and layers over the YAML file.
#[derive(Debug, Parser, Clone)]
#[command(name = "lydash", about = "lydash dashboard compositor", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long)]
    pub frame_rate: Option<u32>,
    /// write each composited frame to this PGM file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,
    /// stop after this many frames (runs until signalled otherwise)
    #[arg(long)]
    pub frames: Option<u64>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// defaults, then YAML, then CLI, then validation
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// First existing file of the search list
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/lydash/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/lydash/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/lydash.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["lydash.yaml", "config.yaml", "config/lydash.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Overlay the set fields of `src` onto `dst`
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()   { dst.log_level = src.log_level; }
    if src.frame_rate.is_some()  { dst.frame_rate = src.frame_rate; }
    if src.snapshot.is_some()    { dst.snapshot = src.snapshot; }
    if !src.widgets.is_empty()   { dst.widgets = src.widgets; }
    // display
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.width.is_some()       { dst.width = src.width; }
    if src.height.is_some()      { dst.height = src.height; }
    if src.background.is_some()  { dst.background = src.background; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()   { cfg.log_level = cli.log_level.clone(); }
    if cli.frame_rate.is_some()  { cfg.frame_rate = cli.frame_rate; }
    if cli.snapshot.is_some()    { cfg.snapshot = cli.snapshot.clone(); }
    let any_case = cli.display_width.is_some() || cli.display_height.is_some();

    if any_case && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.display_width.is_some()   { display.width = cli.display_width; }
        if cli.display_height.is_some()  { display.height = cli.display_height; }
    }
}

/// Display geometry, widget sizes and id uniqueness
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let (w, h) = cfg.display_size();
    if w == 0 || h == 0 {
        return Err(ConfigError::Validation("display width/height must be > 0".into()));
    }
    let mut seen = HashSet::new();
    for widget in &cfg.widgets {
        if !seen.insert(widget.id.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate widget id: {}", widget.id)));
        }
        if widget.position.w == 0 || widget.position.h == 0 {
            return Err(ConfigError::Validation(format!(
                "widget {} width/height must be >= 1", widget.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level: debug
display:
  width: 128
  height: 40
widgets:
  - type: clock
    id: clock
    position: { x: 0, y: 0, w: 64, h: 20 }
    format: "%H:%M"
  - type: disk
    id: disk0
    enabled: false
    position: { x: 64, y: 0, w: 64, h: 20, z: 2 }
    style: { background: 0, border: 255 }
    graph:
      history: 45
      filled: false
"#;

    #[test]
    fn test_parse_widget_records() {
        let cfg = parse_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.widgets.len(), 2);
        let clock = &cfg.widgets[0];
        assert_eq!(clock.kind, "clock");
        assert!(clock.enabled);
        assert_eq!(clock.properties.str("format"), Some("%H:%M"));

        let disk = &cfg.widgets[1];
        assert!(!disk.enabled);
        assert_eq!(disk.position.z, 2);
        assert_eq!(disk.style.map(|s| s.border), Some(255));
        let graph = disk.properties.section("graph").unwrap();
        assert_eq!(graph.u64("history"), Some(45));
        assert_eq!(graph.bool("filled"), Some(false));
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let mut cfg = parse_yaml(SAMPLE).unwrap();
        cfg.widgets[1].id = "clock".into();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_zero_sized_widget() {
        let mut cfg = parse_yaml(SAMPLE).unwrap();
        cfg.widgets[0].position.w = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_display_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.display_size(), (128, 40));
        assert_eq!(cfg.frame_rate(), 10);
    }

    #[test]
    fn test_strings_accepts_scalar_or_list() {
        let w = WidgetConfig::new("weather", "w", Rect::new(0, 0, 10, 10))
            .with("formats", "{temp}");
        assert_eq!(w.properties.strings("formats"), Some(vec!["{temp}".to_string()]));
        let yaml = "type: weather\nid: w\nposition: {x: 0, y: 0, w: 1, h: 1}\nformats: [a, b]\n";
        let w: WidgetConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(w.properties.strings("formats").map(|v| v.len()), Some(2));
    }
}
