/*
 *  compositor.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Reference compositor, update + render + blit by z-order
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

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use log::{debug, error, info};

use crate::raster::GrayRaster;
use crate::timebase::Timebase;
use crate::widgets::Widget;

struct Slot {
    widget: Box<dyn Widget>,
    last_update: Option<Instant>,
}

pub struct Compositor {
    frame: GrayRaster,
    background: u8,
    slots: Vec<Slot>,
    timebase: Arc<dyn Timebase>,
    stopped: bool,
}

impl Compositor {
    /// Widgets are drawn lowest `z` first; equal `z` keeps config order
    pub fn new(width: u32, height: u32, widgets: Vec<Box<dyn Widget>>, timebase: Arc<dyn Timebase>) -> Self {
        let mut slots: Vec<Slot> = widgets
            .into_iter()
            .map(|widget| Slot { widget, last_update: None })
            .collect();
        slots.sort_by_key(|s| s.widget.position().z);
        info!("compositor {}x{} with {} widgets", width, height, slots.len());
        Self {
            frame: GrayRaster::new(width, height, 0),
            background: 0,
            slots,
            timebase,
            stopped: false,
        }
    }

    pub fn with_background(mut self, background: u8) -> Self {
        self.background = background;
        self.frame.fill(background);
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Widget names in draw order
    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.widget.name().to_string()).collect()
    }

    pub fn frame(&self) -> &GrayRaster {
        &self.frame
    }

    /// Update widgets whose interval elapsed, then render and blit all of them
    pub fn tick(&mut self) -> &GrayRaster {
        let now = self.timebase.now();
        self.frame.fill(self.background);
        for slot in self.slots.iter_mut() {
            let due = slot
                .last_update
                .is_none_or(|last| now.saturating_duration_since(last) >= slot.widget.update_interval());
            if due {
                if let Err(e) = slot.widget.update() {
                    debug!("{}: update failed: {}", slot.widget.name(), e);
                }
                slot.last_update = Some(now);
            }
            match slot.widget.render() {
                Ok(Some(raster)) => {
                    let p = slot.widget.position();
                    self.frame.blit(&raster, p.x, p.y);
                }
                Ok(None) => {}
                Err(e) => error!("{}: render failed: {}", slot.widget.name(), e),
            }
        }
        &self.frame
    }

    /// Write the last composed frame as a binary PGM
    pub fn snapshot(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.frame.to_pgm())
    }

    /// Stop every widget once
    pub fn stop_all(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for slot in &self.slots {
            slot.widget.stop();
        }
        info!("stopped {} widgets", self.slots.len());
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use crate::timebase::ManualTimebase;
    use crate::widgets::{Rect, Style, WidgetError};

    struct Solid {
        name: String,
        pos: Rect,
        value: u8,
        updates: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        fail_render: bool,
    }

    fn solid(name: &str, pos: Rect, value: u8) -> Solid {
        Solid {
            name: name.into(),
            pos,
            value,
            updates: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
            fail_render: false,
        }
    }

    impl Widget for Solid {
        fn name(&self) -> &str { &self.name }
        fn kind(&self) -> &str { "solid" }
        fn position(&self) -> Rect { self.pos }
        fn style(&self) -> Style { Style::default() }

        fn update_interval(&self) -> Duration {
            Duration::from_secs(1)
        }

        fn update(&self) -> Result<(), WidgetError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
            if self.fail_render {
                return Err(WidgetError::Drawing("boom".into()));
            }
            Ok(Some(GrayRaster::new(self.pos.w, self.pos.h, self.value)))
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_z_order_and_blit() {
        let tb = Arc::new(ManualTimebase::new());
        let top = solid("top", Rect::new(2, 0, 4, 4).with_z(5), 200);
        let bottom = solid("bottom", Rect::new(0, 0, 4, 4), 100);
        let mut c = Compositor::new(8, 4, vec![Box::new(top), Box::new(bottom)], tb);
        assert_eq!(c.names(), vec!["bottom".to_string(), "top".to_string()]);
        let f = c.tick();
        assert_eq!(f.get(0, 0), 100);
        assert_eq!(f.get(2, 0), 200);
        assert_eq!(f.get(7, 3), 0);
    }

    #[test]
    fn test_update_respects_interval() {
        let tb = Arc::new(ManualTimebase::new());
        let w = solid("w", Rect::new(0, 0, 2, 2), 1);
        let updates = w.updates.clone();
        let mut c = Compositor::new(4, 4, vec![Box::new(w)], tb.clone());
        c.tick();
        tb.set_secs(0.5);
        c.tick();
        assert_eq!(updates.load(Ordering::SeqCst), 1);
        tb.set_secs(1.0);
        c.tick();
        assert_eq!(updates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_render_error_skips_slot() {
        let tb = Arc::new(ManualTimebase::new());
        let mut bad = solid("bad", Rect::new(0, 0, 4, 4), 50);
        bad.fail_render = true;
        let mut c = Compositor::new(4, 4, vec![Box::new(bad)], tb);
        assert_eq!(c.tick().count(|v| v != 0), 0);
    }

    #[test]
    fn test_stop_all_once() {
        let tb = Arc::new(ManualTimebase::new());
        let w = solid("w", Rect::new(0, 0, 2, 2), 1);
        let stops = w.stops.clone();
        let mut c = Compositor::new(4, 4, vec![Box::new(w)], tb);
        c.stop_all();
        c.stop_all();
        drop(c);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
