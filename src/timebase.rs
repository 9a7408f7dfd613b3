/*
 *  timebase.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Injectable monotonic clock for widgets and their subsystems
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

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of "now" for everything time driven.
pub trait Timebase: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed timebase used at runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimebase;

impl Timebase for SystemTimebase {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-cranked timebase, time only moves when told to.
///
/// `origin()` is t=0; `set_secs(1.2)` puts the clock at t=1.2s.
#[derive(Debug)]
pub struct ManualTimebase {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualTimebase {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Instant at `secs` past the origin
    pub fn at(&self, secs: f64) -> Instant {
        self.origin + Duration::from_secs_f64(secs.max(0.0))
    }

    pub fn set_secs(&self, secs: f64) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset = Duration::from_secs_f64(secs.max(0.0));
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualTimebase {
    fn default() -> Self {
        Self::new()
    }
}

impl Timebase for ManualTimebase {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timebase_moves_only_when_told() {
        let tb = ManualTimebase::new();
        assert_eq!(tb.now(), tb.origin());
        tb.set_secs(1.5);
        assert_eq!(tb.now() - tb.origin(), Duration::from_millis(1500));
        tb.advance(Duration::from_millis(500));
        assert_eq!(tb.now(), tb.at(2.0));
    }
}
