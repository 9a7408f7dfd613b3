/*
 *  pacer.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame pacing for the compositor loop
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

fn frame_of(fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(fps.max(1)))
}

pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
}

impl Pacer {
    pub fn new(target_fps: u32, now: Instant) -> Self {
        Self { next_deadline: now, frame: frame_of(target_fps) }
    }

    #[inline]
    pub fn set_fps(&mut self, fps: u32) {
        self.frame = frame_of(fps);
    }

    pub fn frame(&self) -> Duration {
        self.frame
    }

    /// True when a frame is due; also schedules the next deadline
    #[inline]
    pub fn should_flush(&mut self, now: Instant) -> bool {
        if now >= self.next_deadline {
            self.next_deadline = now + self.frame;
            true
        } else {
            false
        }
    }

    /// How long the loop may sleep before the next frame is due
    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }
}

/// Pacer that backs off when composing a frame takes longer than the
/// frame budget, and recovers towards `max_fps` when it gets cheap again
pub struct AutoPacer {
    pacer: Pacer,
    ema_ms: f32,
    alpha: f32,
    headroom: f32,
    max_fps: u32,
    min_fps: u32,
}

impl AutoPacer {
    pub fn new(initial_fps: u32, max_fps: u32, min_fps: u32, now: Instant) -> Self {
        Self {
            pacer: Pacer::new(initial_fps, now),
            ema_ms: 0.0,
            alpha: 0.2,
            headroom: 1.25,
            max_fps: max_fps.max(1),
            min_fps: min_fps.clamp(1, max_fps.max(1)),
        }
    }

    pub fn should_flush(&mut self, now: Instant) -> bool {
        self.pacer.should_flush(now)
    }

    pub fn until_next(&self, now: Instant) -> Duration {
        self.pacer.until_next(now)
    }

    pub fn frame(&self) -> Duration {
        self.pacer.frame()
    }

    /// Feed the time one compose + output took
    pub fn record_frame_ms(&mut self, frame_ms: f32) {
        self.ema_ms = if self.ema_ms == 0.0 {
            frame_ms
        } else {
            self.alpha * frame_ms + (1.0 - self.alpha) * self.ema_ms
        };
        if self.ema_ms > 0.0 {
            let safe = (1000.0 / (self.ema_ms * self.headroom))
                .clamp(self.min_fps as f32, self.max_fps as f32) as u32;
            self.pacer.set_fps(safe);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_deadlines() {
        let t0 = Instant::now();
        let mut p = Pacer::new(10, t0);
        assert!(p.should_flush(t0));
        assert!(!p.should_flush(t0 + Duration::from_millis(50)));
        assert_eq!(p.until_next(t0 + Duration::from_millis(40)), Duration::from_millis(60));
        assert!(p.should_flush(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn test_auto_pacer_backs_off_and_clamps() {
        let t0 = Instant::now();
        let mut p = AutoPacer::new(30, 30, 5, t0);
        p.record_frame_ms(40.0);
        // 1000 / (40 * 1.25) = 20 fps
        assert_eq!(p.frame(), Duration::from_micros(50_000));
        for _ in 0..50 {
            p.record_frame_ms(1000.0);
        }
        assert_eq!(p.frame(), Duration::from_micros(200_000));
        for _ in 0..100 {
            p.record_frame_ms(0.5);
        }
        assert_eq!(p.frame(), Duration::from_micros(33_333));
    }
}
