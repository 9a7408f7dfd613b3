/*
 *  widgets/transition.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Full-frame transitions between an old and a new raster
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

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::raster::GrayRaster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionEffect {
    None,
    PushLeft,
    PushRight,
    PushUp,
    PushDown,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    DissolveFade,
    DissolvePixel,
    DissolveDither,
    BoxIn,
    BoxOut,
    ClockWipe,
    /// resolved to one of `CONCRETE` at start
    Random,
}

impl TransitionEffect {
    /// Everything `Random` may pick
    pub const CONCRETE: [TransitionEffect; 14] = [
        TransitionEffect::PushLeft,
        TransitionEffect::PushRight,
        TransitionEffect::PushUp,
        TransitionEffect::PushDown,
        TransitionEffect::SlideLeft,
        TransitionEffect::SlideRight,
        TransitionEffect::SlideUp,
        TransitionEffect::SlideDown,
        TransitionEffect::DissolveFade,
        TransitionEffect::DissolvePixel,
        TransitionEffect::DissolveDither,
        TransitionEffect::BoxIn,
        TransitionEffect::BoxOut,
        TransitionEffect::ClockWipe,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let e = match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => TransitionEffect::None,
            "push_left" => TransitionEffect::PushLeft,
            "push_right" => TransitionEffect::PushRight,
            "push_up" => TransitionEffect::PushUp,
            "push_down" => TransitionEffect::PushDown,
            "slide_left" => TransitionEffect::SlideLeft,
            "slide_right" => TransitionEffect::SlideRight,
            "slide_up" => TransitionEffect::SlideUp,
            "slide_down" => TransitionEffect::SlideDown,
            "dissolve_fade" | "fade" => TransitionEffect::DissolveFade,
            "dissolve_pixel" => TransitionEffect::DissolvePixel,
            "dissolve_dither" | "dither" => TransitionEffect::DissolveDither,
            "box_in" => TransitionEffect::BoxIn,
            "box_out" => TransitionEffect::BoxOut,
            "clock_wipe" => TransitionEffect::ClockWipe,
            "random" => TransitionEffect::Random,
            _ => return None,
        };
        Some(e)
    }

    fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        match self {
            TransitionEffect::Random => Self::CONCRETE[rng.random_range(0..Self::CONCRETE.len())],
            e => e,
        }
    }
}

const BAYER_8X8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

struct Activation {
    effect: TransitionEffect,
    started_at: Instant,
    duration: Duration,
    old: Arc<GrayRaster>,
    /// dissolve_pixel only: rank of each pixel in the shuffled reveal order
    order: Option<Arc<Vec<u32>>>,
    last_progress: f64,
}

impl Activation {
    fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

/// Owned copy of the live activation, composited without holding any lock
#[derive(Clone)]
pub struct TransitionFrame {
    pub effect: TransitionEffect,
    pub progress: f64,
    old: Arc<GrayRaster>,
    order: Option<Arc<Vec<u32>>>,
}

impl TransitionFrame {
    pub fn compose(&self, new: &GrayRaster) -> GrayRaster {
        let mut dst = new.clone();
        compose_into(&mut dst, self.effect, &self.old, new, self.progress, self.order.as_deref().map(Vec::as_slice));
        dst
    }
}

/// idle -> active -> idle
#[derive(Default)]
pub struct Transition {
    active: Option<Activation>,
}

impl Transition {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn start(&mut self, effect: TransitionEffect, duration: Duration, old_frame: GrayRaster, now: Instant) {
        self.start_with_rng(effect, duration, old_frame, now, &mut rand::rng());
    }

    pub fn start_with_rng<R: Rng + ?Sized>(
        &mut self,
        effect: TransitionEffect,
        duration: Duration,
        old_frame: GrayRaster,
        now: Instant,
        rng: &mut R,
    ) {
        let effect = effect.resolve(rng);
        let order = (effect == TransitionEffect::DissolvePixel).then(|| {
            let total = old_frame.len() as u32;
            let mut perm: Vec<u32> = (0..total).collect();
            perm.shuffle(rng);
            let mut rank = vec![0u32; perm.len()];
            for (k, &pixel) in perm.iter().enumerate() {
                rank[pixel as usize] = k as u32;
            }
            Arc::new(rank)
        });
        self.active = Some(Activation {
            effect,
            started_at: now,
            duration,
            old: Arc::new(old_frame),
            order,
            last_progress: 0.0,
        });
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Effect of the live activation, random already resolved
    pub fn effect(&self) -> Option<TransitionEffect> {
        self.active.as_ref().map(|a| a.effect)
    }

    /// Advance to `now`; `done` implies progress 1 and returns to idle
    pub fn step(&mut self, now: Instant) -> (f64, bool) {
        let Some(act) = self.active.as_mut() else {
            return (1.0, true);
        };
        let p = act.progress(now).max(act.last_progress);
        act.last_progress = p;
        if p >= 1.0 {
            self.active = None;
            return (1.0, true);
        }
        (p, false)
    }

    pub fn progress(&self, now: Instant) -> f64 {
        self.active
            .as_ref()
            .map_or(1.0, |a| a.progress(now).max(a.last_progress))
    }

    pub fn snapshot(&self, now: Instant) -> Option<TransitionFrame> {
        self.active.as_ref().map(|a| TransitionFrame {
            effect: a.effect,
            progress: a.progress(now).max(a.last_progress),
            old: a.old.clone(),
            order: a.order.clone(),
        })
    }

    /// Composite the live activation at `progress` into `dst`; idle copies `new`
    pub fn apply(&self, dst: &mut GrayRaster, new: &GrayRaster, progress: f64) {
        match &self.active {
            Some(a) => {
                *dst = new.clone();
                compose_into(dst, a.effect, &a.old, new, progress, a.order.as_deref().map(Vec::as_slice));
            }
            None => *dst = new.clone(),
        }
    }
}

/// `dst` arrives as a copy of `new` and is sized like it
fn compose_into(
    dst: &mut GrayRaster,
    effect: TransitionEffect,
    old: &GrayRaster,
    new: &GrayRaster,
    progress: f64,
    order: Option<&[u32]>,
) {
    let p = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    let (w, h) = (new.width() as i32, new.height() as i32);

    if p >= 1.0 {
        return;
    }
    if p <= 0.0 {
        for y in 0..h {
            for x in 0..w {
                dst.set(x, y, old.get(x, y));
            }
        }
        return;
    }

    let total = (w * h) as usize;
    let revealed = (p * total as f64).floor() as u32;
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let sx = (p * w as f64).round() as i32;
    let sy = (p * h as f64).round() as i32;
    let ox = (w as f64 * (1.0 - p)).round() as i32;
    let oy = (h as f64 * (1.0 - p)).round() as i32;

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let value = match effect {
                TransitionEffect::None | TransitionEffect::Random => {
                    if p < 0.5 { old.get(x, y) } else { new.get(x, y) }
                }
                TransitionEffect::PushLeft => {
                    let src = x + sx;
                    if src < w { old.get(src, y) } else { new.get(src - w, y) }
                }
                TransitionEffect::PushRight => {
                    if x >= sx { old.get(x - sx, y) } else { new.get(x - sx + w, y) }
                }
                TransitionEffect::PushUp => {
                    let src = y + sy;
                    if src < h { old.get(x, src) } else { new.get(x, src - h) }
                }
                TransitionEffect::PushDown => {
                    if y >= sy { old.get(x, y - sy) } else { new.get(x, y - sy + h) }
                }
                TransitionEffect::SlideLeft => {
                    if x >= ox { new.get(x - ox, y) } else { old.get(x, y) }
                }
                TransitionEffect::SlideRight => {
                    if x < w - ox { new.get(x + ox, y) } else { old.get(x, y) }
                }
                TransitionEffect::SlideUp => {
                    if y >= oy { new.get(x, y - oy) } else { old.get(x, y) }
                }
                TransitionEffect::SlideDown => {
                    if y < h - oy { new.get(x, y + oy) } else { old.get(x, y) }
                }
                TransitionEffect::DissolveFade => {
                    let v = old.get(x, y) as f64 * (1.0 - p) + new.get(x, y) as f64 * p;
                    v.round().clamp(0.0, 255.0) as u8
                }
                TransitionEffect::DissolvePixel => {
                    let shows_new = order
                        .and_then(|o| o.get(idx))
                        .is_some_and(|&rank| rank < revealed);
                    if shows_new { new.get(x, y) } else { old.get(x, y) }
                }
                TransitionEffect::DissolveDither => {
                    let threshold = BAYER_8X8[(y % 8) as usize][(x % 8) as usize] as f64;
                    if threshold < p * 64.0 { new.get(x, y) } else { old.get(x, y) }
                }
                TransitionEffect::BoxOut | TransitionEffect::BoxIn => {
                    let dx = (x as f64 + 0.5 - cx).abs();
                    let dy = (y as f64 + 0.5 - cy).abs();
                    let grow = if effect == TransitionEffect::BoxOut { p } else { 1.0 - p };
                    let inside = dx < grow * cx && dy < grow * cy;
                    match (effect == TransitionEffect::BoxOut, inside) {
                        (true, true) | (false, false) => new.get(x, y),
                        _ => old.get(x, y),
                    }
                }
                TransitionEffect::ClockWipe => {
                    // clockwise from 12 o'clock, y grows downward
                    let dx = x as f64 + 0.5 - cx;
                    let dy = y as f64 + 0.5 - cy;
                    let theta = dx.atan2(-dy).rem_euclid(TAU);
                    if theta < TAU * p { new.get(x, y) } else { old.get(x, y) }
                }
            };
            dst.set(x, y, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn solid(v: u8) -> GrayRaster {
        GrayRaster::new(128, 40, v)
    }

    fn pattern(seed: u8) -> GrayRaster {
        let mut r = GrayRaster::new(32, 12, 0);
        for y in 0..12 {
            for x in 0..32 {
                r.set(x, y, (x as u8).wrapping_mul(7).wrapping_add(y as u8 * 13).wrapping_add(seed));
            }
        }
        r
    }

    #[test]
    fn test_endpoints_are_exact_for_every_effect() {
        let t0 = Instant::now();
        let old = pattern(1);
        let new = pattern(99);
        let mut rng = StdRng::seed_from_u64(7);
        let mut effects = TransitionEffect::CONCRETE.to_vec();
        effects.push(TransitionEffect::None);
        for effect in effects {
            let mut tr = Transition::new();
            tr.start_with_rng(effect, Duration::from_secs(1), old.clone(), t0, &mut rng);
            let mut dst = GrayRaster::new(1, 1, 0);
            tr.apply(&mut dst, &new, 0.0);
            assert_eq!(dst, old, "{:?} at 0", effect);
            tr.apply(&mut dst, &new, 1.0);
            assert_eq!(dst, new, "{:?} at 1", effect);
        }
    }

    #[test]
    fn test_clock_wipe_quarter_is_top_right_quadrant() {
        let t0 = Instant::now();
        let mut tr = Transition::new();
        tr.start(TransitionEffect::ClockWipe, Duration::from_secs(1), solid(0), t0);
        let frame = tr.snapshot(t0 + Duration::from_millis(250)).unwrap();
        assert!((frame.progress - 0.25).abs() < 1e-9);
        let out = frame.compose(&solid(255));
        assert_eq!(out.count(|v| v == 255), 64 * 20);
        for y in 0..40 {
            for x in 0..128 {
                let expect = if x >= 64 && y < 20 { 255 } else { 0 };
                assert_eq!(out.get(x, y), expect, "pixel {},{}", x, y);
            }
        }
    }

    #[test]
    fn test_dissolve_pixel_exact_count() {
        let t0 = Instant::now();
        let mut tr = Transition::new();
        tr.start(TransitionEffect::DissolvePixel, Duration::from_secs(1), solid(0), t0);
        let new = solid(255);
        let mut dst = GrayRaster::new(1, 1, 0);
        tr.apply(&mut dst, &new, 0.999);
        let total = 128 * 40;
        assert_eq!(dst.count(|v| v == 255), (0.999 * total as f64).floor() as usize);
        tr.apply(&mut dst, &new, 0.5);
        assert_eq!(dst.count(|v| v == 255), total / 2);
    }

    #[test]
    fn test_dissolve_fade_midpoint() {
        let t0 = Instant::now();
        let mut tr = Transition::new();
        tr.start(TransitionEffect::DissolveFade, Duration::from_secs(1), solid(0), t0);
        let mut dst = GrayRaster::new(1, 1, 0);
        tr.apply(&mut dst, &solid(200), 0.5);
        assert_eq!(dst.get(10, 10), 100);
    }

    #[test]
    fn test_push_left_half() {
        let t0 = Instant::now();
        let mut tr = Transition::new();
        tr.start(TransitionEffect::PushLeft, Duration::from_secs(1), solid(0), t0);
        let mut dst = GrayRaster::new(1, 1, 0);
        tr.apply(&mut dst, &solid(255), 0.5);
        assert_eq!(dst.get(63, 5), 0);
        assert_eq!(dst.get(64, 5), 255);
    }

    #[test]
    fn test_none_swaps_at_half() {
        let t0 = Instant::now();
        let mut tr = Transition::new();
        tr.start(TransitionEffect::None, Duration::from_secs(1), solid(0), t0);
        let mut dst = GrayRaster::new(1, 1, 0);
        tr.apply(&mut dst, &solid(255), 0.49);
        assert_eq!(dst.get(0, 0), 0);
        tr.apply(&mut dst, &solid(255), 0.5);
        assert_eq!(dst.get(0, 0), 255);
    }

    #[test]
    fn test_step_monotone_then_idle() {
        let t0 = Instant::now();
        let mut tr = Transition::new();
        tr.start(TransitionEffect::BoxOut, Duration::from_secs(1), solid(0), t0);
        let mut prev = 0.0;
        for ms in [0u64, 100, 400, 300, 900] {
            let (p, done) = tr.step(t0 + Duration::from_millis(ms));
            assert!(p >= prev);
            assert!(!done);
            prev = p;
        }
        assert_eq!(tr.step(t0 + Duration::from_millis(1000)), (1.0, true));
        assert!(!tr.is_active());
    }

    #[test]
    fn test_random_covers_catalogue_uniformly() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts: HashMap<TransitionEffect, usize> = HashMap::new();
        let mut tr = Transition::new();
        let tiny = GrayRaster::new(2, 2, 0);
        for _ in 0..10_000 {
            tr.start_with_rng(TransitionEffect::Random, Duration::from_secs(1), tiny.clone(), t0, &mut rng);
            *counts.entry(tr.effect().unwrap()).or_default() += 1;
        }
        assert_eq!(counts.len(), 14);
        assert!(!counts.contains_key(&TransitionEffect::None));
        assert!(!counts.contains_key(&TransitionEffect::Random));
        // expected 714 each, binomial sd ~26
        for (effect, n) in counts {
            assert!((550..=880).contains(&n), "{:?} drawn {} times", effect, n);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(TransitionEffect::parse("clock-wipe"), Some(TransitionEffect::ClockWipe));
        assert_eq!(TransitionEffect::parse("random"), Some(TransitionEffect::Random));
        assert_eq!(TransitionEffect::parse("spin"), None);
    }
}
