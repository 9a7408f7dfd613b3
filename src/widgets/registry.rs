/*
 *  widgets/registry.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Widget kind to factory registry
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

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use log::{debug, info, warn};

use crate::config::WidgetConfig;
use super::error_proxy::ErrorProxyWidget;
use super::{battery, clock, cpu, error_proxy, io_monitor, media, memory, volume, volume_meter, weather};
use super::{Rect, Widget, WidgetContext, WidgetError};

pub type WidgetFactory = fn(&WidgetConfig, &WidgetContext) -> Result<Box<dyn Widget>, WidgetError>;

/// Result of building a whole widget list. Failed entries are represented
/// in `widgets` by an error proxy and listed again in `failures`.
pub struct CreatedWidgets {
    pub widgets: Vec<Box<dyn Widget>>,
    pub failures: Vec<(String, WidgetError)>,
}

/// Populated during single-threaded startup, read-mostly afterwards
#[derive(Default)]
pub struct Registry {
    factories: RwLock<HashMap<String, WidgetFactory>>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Process-wide registry holding every built-in kind
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::with_builtin)
}

/// Single initialisation entry point, one call per widget module
pub fn register_builtin(registry: &Registry) {
    clock::register(registry);
    io_monitor::register(registry);
    cpu::register(registry);
    memory::register(registry);
    battery::register(registry);
    volume::register(registry);
    volume_meter::register(registry);
    weather::register(registry);
    media::register(registry);
    error_proxy::register(registry);
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let registry = Self::new();
        register_builtin(&registry);
        info!("widget registry: {}", registry.kinds().join(", "));
        registry
    }

    /// Re-registration overwrites and warns
    pub fn register(&self, kind: &str, factory: WidgetFactory) {
        let mut map = self.factories.write().unwrap_or_else(|e| e.into_inner());
        if map.insert(kind.to_string(), factory).is_some() {
            warn!("widget type '{}' registered again, replacing factory", kind);
        } else {
            debug!("registered widget type '{}'", kind);
        }
    }

    pub fn len(&self) -> usize {
        self.factories.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.read().unwrap_or_else(|e| e.into_inner()).contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        kinds.sort();
        kinds
    }

    pub fn create_widget(&self, cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
        if !cfg.enabled {
            return Err(WidgetError::Disabled(cfg.id.clone()));
        }
        let factory = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&cfg.kind)
            .copied();
        match factory {
            Some(factory) => factory(cfg, ctx),
            None => Err(WidgetError::UnknownKind { kind: cfg.kind.clone(), known: self.kinds() }),
        }
    }

    /// Build every enabled entry in order. A failed entry is logged and
    /// replaced by an error proxy at its position; only an all-failed list
    /// is an error.
    pub fn create_widgets(&self, configs: &[WidgetConfig], ctx: &WidgetContext)
        -> Result<CreatedWidgets, WidgetError> {
        let mut widgets: Vec<Box<dyn Widget>> = Vec::with_capacity(configs.len());
        let mut failures = Vec::new();
        let mut enabled = 0usize;

        for cfg in configs.iter().filter(|c| c.enabled) {
            enabled += 1;
            match self.create_widget(cfg, ctx) {
                Ok(widget) => widgets.push(widget),
                Err(e) => {
                    warn!("widget '{}' ({}) failed: {}", cfg.id, cfg.kind, e);
                    let p = cfg.position;
                    let slot = Rect { w: p.w.max(1), h: p.h.max(1), ..p };
                    let message = format!("{} ERROR", cfg.kind.to_uppercase());
                    widgets.push(Box::new(ErrorProxyWidget::new(&cfg.id, slot, &message, ctx.timebase.clone())));
                    failures.push((cfg.id.clone(), e));
                }
            }
        }

        if enabled > 0 && failures.len() == enabled {
            let reasons = failures.iter().map(|(id, e)| format!("{}: {}", id, e)).collect();
            return Err(WidgetError::NoWidgetsConstructed(reasons));
        }
        info!("constructed {} widgets ({} failed)", widgets.len(), failures.len());
        Ok(CreatedWidgets { widgets, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::sensors::SensorSet;
    use crate::timebase::ManualTimebase;

    fn ctx() -> WidgetContext {
        WidgetContext::new(Arc::new(ManualTimebase::new()), SensorSet::unavailable())
    }

    fn failing(_: &WidgetConfig, _: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
        Err(WidgetError::Config("always fails".into()))
    }

    #[test]
    fn test_reregistration_keeps_set_size() {
        let r = Registry::new();
        r.register("clock", clock::create);
        r.register("cpu", cpu::create);
        r.register("clock", clock::create);
        assert_eq!(r.len(), 2);
        assert_eq!(r.kinds(), vec!["clock".to_string(), "cpu".to_string()]);
    }

    #[test]
    fn test_unknown_kind_lists_sorted_kinds() {
        let r = Registry::new();
        r.register("disk", io_monitor::create_disk);
        r.register("clock", clock::create);
        r.register("cpu", cpu::create);
        let cfg = WidgetConfig::new("zzz", "z", Rect::new(0, 0, 10, 10));
        let err = r.create_widget(&cfg, &ctx()).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("unknown widget type: zzz"));
        assert!(msg.contains("clock, cpu, disk"));
    }

    #[test]
    fn test_disabled_entry() {
        let r = Registry::with_builtin();
        let cfg = WidgetConfig::new("clock", "c", Rect::new(0, 0, 10, 10)).disabled();
        assert!(matches!(r.create_widget(&cfg, &ctx()), Err(WidgetError::Disabled(_))));
    }

    #[test]
    fn test_all_failed_is_error() {
        let r = Registry::new();
        r.register("bad", failing);
        let cfgs = vec![
            WidgetConfig::new("bad", "a", Rect::new(0, 0, 10, 10)),
            WidgetConfig::new("bad", "b", Rect::new(0, 0, 10, 10)),
        ];
        match r.create_widgets(&cfgs, &ctx()) {
            Err(WidgetError::NoWidgetsConstructed(reasons)) => assert_eq!(reasons.len(), 2),
            _ => panic!("expected NoWidgetsConstructed"),
        }
    }

    #[test]
    fn test_only_disabled_entries_is_empty_ok() {
        let r = Registry::with_builtin();
        let cfgs = vec![WidgetConfig::new("clock", "c", Rect::new(0, 0, 10, 10)).disabled()];
        let out = r.create_widgets(&cfgs, &ctx()).unwrap();
        assert!(out.widgets.is_empty());
        assert!(out.failures.is_empty());
    }

    #[test]
    fn test_builtin_kinds() {
        let kinds = Registry::with_builtin().kinds();
        for k in ["battery", "clock", "cpu", "disk", "error", "memory", "network", "volume", "volume_meter", "weather", "winamp"] {
            assert!(kinds.iter().any(|x| x == k), "missing {}", k);
        }
    }
}
