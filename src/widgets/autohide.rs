/*
 *  widgets/autohide.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Visible-for-N-seconds-after-an-event gate
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

use std::time::{Duration, Instant};

use super::helper::AutoHideSettings;

#[derive(Debug, Clone)]
pub struct AutoHide {
    enabled: bool,
    timeout: Duration,
    visible_until: Option<Instant>,
    last_event: Option<Instant>,
}

impl AutoHide {
    /// Hidden until the first event unless `start_visible`
    pub fn new(settings: AutoHideSettings, start_visible: bool, now: Instant) -> Self {
        Self {
            enabled: settings.enabled,
            timeout: settings.timeout,
            visible_until: start_visible.then(|| now + settings.timeout),
            last_event: None,
        }
    }

    pub fn disabled() -> Self {
        Self { enabled: false, timeout: Duration::ZERO, visible_until: None, last_event: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Restart the visible window at `now`
    pub fn trigger_show(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        self.visible_until = Some(now + self.timeout);
        self.last_event = Some(now);
    }

    pub fn should_hide(&self, now: Instant) -> bool {
        self.enabled && self.visible_until.map_or(true, |until| now > until)
    }

    pub fn last_event(&self) -> Option<Instant> {
        self.last_event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secs: f64) -> AutoHideSettings {
        AutoHideSettings { enabled: true, timeout: Duration::from_secs_f64(secs) }
    }

    #[test]
    fn test_disabled_never_hides() {
        let mut a = AutoHide::disabled();
        let t = Instant::now();
        assert!(!a.should_hide(t));
        a.trigger_show(t);
        assert!(a.last_event().is_none());
        assert!(!a.should_hide(t + Duration::from_secs(999)));
    }

    #[test]
    fn test_starts_hidden() {
        let t = Instant::now();
        let a = AutoHide::new(settings(1.0), false, t);
        assert!(a.should_hide(t));
        let b = AutoHide::new(settings(1.0), true, t);
        assert!(!b.should_hide(t + Duration::from_millis(500)));
    }

    #[test]
    fn test_window_after_event() {
        let t0 = Instant::now();
        let mut a = AutoHide::new(settings(1.0), false, t0);
        a.trigger_show(t0);
        assert!(!a.should_hide(t0 + Duration::from_millis(1)));
        assert!(!a.should_hide(t0 + Duration::from_secs(1)));
        assert!(a.should_hide(t0 + Duration::from_millis(1001)));
    }

    #[test]
    fn test_retrigger_restarts_not_stacks() {
        let t0 = Instant::now();
        let mut a = AutoHide::new(settings(1.0), false, t0);
        a.trigger_show(t0);
        a.trigger_show(t0 + Duration::from_millis(500));
        assert!(!a.should_hide(t0 + Duration::from_millis(1500)));
        assert!(a.should_hide(t0 + Duration::from_millis(1501)));
    }
}
