/*
 *  widgets/scroller.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Marquee, bounce and pause-at-ends text offset
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMode {
    /// endless marquee, tail followed by `gap` then the head again
    Continuous,
    /// back and forth between the ends, pausing at each
    Bounce,
    /// run to the end, jump home, pause
    PauseEnds,
}

impl ScrollMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "continuous" | "marquee" | "loop" => Some(ScrollMode::Continuous),
            "bounce" | "cylon" => Some(ScrollMode::Bounce),
            "pause_ends" | "pause" => Some(ScrollMode::PauseEnds),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Left,
    Right,
    Up,
    Down,
}

impl ScrollDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Some(ScrollDirection::Left),
            "right" => Some(ScrollDirection::Right),
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            _ => None,
        }
    }

    pub fn is_vertical(&self) -> bool {
        matches!(self, ScrollDirection::Up | ScrollDirection::Down)
    }

    fn sign(&self) -> f64 {
        match self {
            ScrollDirection::Left | ScrollDirection::Up => -1.0,
            ScrollDirection::Right | ScrollDirection::Down => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSettings {
    /// pixels per second
    pub speed: f64,
    pub mode: ScrollMode,
    pub direction: ScrollDirection,
    pub pause: Duration,
    /// pixels between tail and head in continuous mode
    pub gap: f64,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            speed: 20.0,
            mode: ScrollMode::Continuous,
            direction: ScrollDirection::Left,
            pause: Duration::from_millis(1000),
            gap: 20.0,
        }
    }
}

/// Deterministic given the sequence of `update` instants.
///
/// `offset` is the distance travelled along the configured direction; the
/// signed shift to apply to the text origin comes from `pixel_offset`.
#[derive(Debug, Clone)]
pub struct Scroller {
    settings: ScrollSettings,
    offset: f64,
    bounce_sign: f64,
    pause_until: Option<Instant>,
    last_update: Option<Instant>,
    period: f64,
}

impl Scroller {
    pub fn new(settings: ScrollSettings) -> Self {
        Self {
            settings,
            offset: 0.0,
            bounce_sign: 1.0,
            pause_until: None,
            last_update: None,
            period: 0.0,
        }
    }

    pub fn settings(&self) -> &ScrollSettings {
        &self.settings
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn is_paused(&self, now: Instant) -> bool {
        self.pause_until.is_some_and(|p| now < p)
    }

    pub fn update(&mut self, now: Instant, text_size: u32, viewport_size: u32) {
        let (text, view) = (text_size as f64, viewport_size as f64);
        if text <= view {
            self.offset = 0.0;
            self.bounce_sign = 1.0;
            self.pause_until = None;
            self.last_update = Some(now);
            return;
        }
        let Some(last) = self.last_update.replace(now) else {
            return;
        };
        let mut from = last;
        if let Some(until) = self.pause_until {
            // time spent paused is not travelled
            if now < until {
                return;
            }
            self.pause_until = None;
            from = from.max(until);
        }

        let delta = self.settings.speed * now.saturating_duration_since(from).as_secs_f64();
        let end = text - view;
        match self.settings.mode {
            ScrollMode::Continuous => {
                self.period = text + self.settings.gap;
                self.offset = (self.offset + delta).rem_euclid(self.period);
            }
            ScrollMode::Bounce => {
                self.offset += delta * self.bounce_sign;
                if self.bounce_sign > 0.0 && self.offset >= end {
                    self.offset = end;
                    self.bounce_sign = -1.0;
                    self.pause_until = Some(now + self.settings.pause);
                } else if self.bounce_sign < 0.0 && self.offset <= 0.0 {
                    self.offset = 0.0;
                    self.bounce_sign = 1.0;
                    self.pause_until = Some(now + self.settings.pause);
                }
            }
            ScrollMode::PauseEnds => {
                self.offset += delta;
                if self.offset >= end {
                    self.offset = 0.0;
                    self.pause_until = Some(now + self.settings.pause);
                }
            }
        }
    }

    /// Signed shift for the text origin along the scroll axis
    pub fn pixel_offset(&self) -> i32 {
        (self.offset * self.settings.direction.sign()).round() as i32
    }

    /// Origins to draw the text at; continuous mode wraps with a second copy
    pub fn draw_origins(&self) -> Vec<i32> {
        let shift = self.pixel_offset();
        match self.settings.mode {
            ScrollMode::Continuous if self.period > 0.0 => {
                let period = self.period.round() as i32;
                let follow = shift - period * self.settings.direction.sign() as i32;
                vec![shift, follow]
            }
            _ => vec![shift],
        }
    }

    pub fn reset(&mut self) {
        self.offset = 0.0;
        self.bounce_sign = 1.0;
        self.pause_until = None;
        self.last_update = None;
        self.period = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    fn scroller(mode: ScrollMode) -> Scroller {
        Scroller::new(ScrollSettings {
            speed: 100.0,
            mode,
            direction: ScrollDirection::Left,
            pause: Duration::from_millis(500),
            gap: 10.0,
        })
    }

    #[test]
    fn test_fits_viewport_stays_home() {
        let t0 = Instant::now();
        let mut s = scroller(ScrollMode::Continuous);
        for i in 0..10 {
            s.update(at(t0, i * 100), 40, 40);
            assert_eq!(s.offset(), 0.0);
        }
    }

    #[test]
    fn test_first_update_primes_only() {
        let t0 = Instant::now();
        let mut s = scroller(ScrollMode::Continuous);
        s.update(t0, 200, 50);
        assert_eq!(s.offset(), 0.0);
        s.update(at(t0, 100), 200, 50);
        assert!((s.offset() - 10.0).abs() < 1e-9);
        assert_eq!(s.pixel_offset(), -10);
    }

    #[test]
    fn test_continuous_wraps_and_is_monotone_between_wraps() {
        let t0 = Instant::now();
        let mut s = scroller(ScrollMode::Continuous);
        s.update(t0, 100, 50);
        let mut prev = 0.0;
        let mut wrapped = false;
        for i in 1..=20 {
            s.update(at(t0, i * 100), 100, 50);
            let o = s.offset();
            assert!(o < 110.0);
            if o < prev {
                wrapped = true;
            }
            prev = o;
        }
        // 2 s at 100 px/s over a 110 px period wraps once
        assert!(wrapped);
        assert!((s.offset() - 90.0).abs() < 1e-6);
        assert_eq!(s.draw_origins(), vec![-90, 20]);
    }

    #[test]
    fn test_bounce_clamps_flips_and_pauses() {
        let t0 = Instant::now();
        let mut s = scroller(ScrollMode::Bounce);
        s.update(t0, 80, 50);
        s.update(at(t0, 400), 80, 50); // would be 40, clamps to 30
        assert_eq!(s.offset(), 30.0);
        assert!(s.is_paused(at(t0, 500)));
        s.update(at(t0, 800), 80, 50); // still paused
        assert_eq!(s.offset(), 30.0);
        s.update(at(t0, 900), 80, 50); // pause over, no travel credited
        assert_eq!(s.offset(), 30.0);
        s.update(at(t0, 1000), 80, 50);
        assert!((s.offset() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_pause_ends_resets_home() {
        let t0 = Instant::now();
        let mut s = scroller(ScrollMode::PauseEnds);
        s.update(t0, 80, 50);
        s.update(at(t0, 200), 80, 50);
        assert!((s.offset() - 20.0).abs() < 1e-9);
        s.update(at(t0, 400), 80, 50);
        assert_eq!(s.offset(), 0.0);
        assert!(s.is_paused(at(t0, 600)));
    }

    #[test]
    fn test_reset_during_pause() {
        let t0 = Instant::now();
        let mut s = scroller(ScrollMode::Bounce);
        s.update(t0, 80, 50);
        s.update(at(t0, 400), 80, 50);
        assert!(s.is_paused(at(t0, 450)));
        s.reset();
        assert_eq!(s.offset(), 0.0);
        assert!(!s.is_paused(at(t0, 450)));
    }

    #[test]
    fn test_parse() {
        assert_eq!(ScrollMode::parse("pause-ends"), Some(ScrollMode::PauseEnds));
        assert_eq!(ScrollDirection::parse("Up"), Some(ScrollDirection::Up));
        assert!(ScrollDirection::Down.is_vertical());
        assert_eq!(ScrollMode::parse("wobble"), None);
    }
}
