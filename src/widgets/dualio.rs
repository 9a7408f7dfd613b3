/*
 *  widgets/dualio.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Two-stream byte counter to rate core with bounded history
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

use std::collections::VecDeque;
use std::time::Instant;

use crate::draw::clamp_fraction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// first sample, counters stored, rates still 0
    Primed,
    /// same instant as the previous sample, nothing changed
    Duplicate,
    Updated,
}

/// `max_speed_mbps` is read as megabytes per second
pub fn max_bps_from_mbps(max_speed_mbps: f64) -> Option<f64> {
    (max_speed_mbps.is_finite() && max_speed_mbps > 0.0).then(|| max_speed_mbps * 1e6)
}

/// Oldest-first ring of fixed capacity
#[derive(Debug, Clone)]
pub struct HistoryRing {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, v: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(v);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max(&self) -> f64 {
        self.samples.iter().copied().fold(0.0, f64::max)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}

/// Rates, history and scale copied out for lock-free rendering
#[derive(Debug, Clone, PartialEq)]
pub struct DualIoSnapshot {
    pub rates: (f64, f64),
    pub primary_hist: Vec<f64>,
    pub secondary_hist: Vec<f64>,
    pub capacity: usize,
    pub scale: f64,
}

impl DualIoSnapshot {
    pub fn fraction(&self, rate: f64) -> f64 {
        if self.scale > 0.0 { clamp_fraction(rate / self.scale) } else { 0.0 }
    }

    pub fn fractions(&self) -> (f64, f64) {
        (self.fraction(self.rates.0), self.fraction(self.rates.1))
    }

    pub fn normalized(&self) -> (Vec<f64>, Vec<f64>) {
        let norm = |h: &[f64]| h.iter().map(|&v| self.fraction(v)).collect();
        (norm(&self.primary_hist), norm(&self.secondary_hist))
    }
}

/// Monotone counter pair to bytes-per-second.
///
/// Counters that step backwards (wrap, device swap) yield a zero delta for
/// that cycle; history still advances.
#[derive(Debug, Clone)]
pub struct DualIoCore {
    last: Option<(u64, u64, Instant)>,
    rates: (f64, f64),
    primary: HistoryRing,
    secondary: HistoryRing,
    keep_history: bool,
    max_bps: Option<f64>,
}

impl DualIoCore {
    /// `keep_history` is set for graph mode only
    pub fn new(history_len: usize, keep_history: bool, max_bps: Option<f64>) -> Self {
        Self {
            last: None,
            rates: (0.0, 0.0),
            primary: HistoryRing::new(history_len),
            secondary: HistoryRing::new(history_len),
            keep_history,
            max_bps,
        }
    }

    pub fn sample(&mut self, totals: (u64, u64), now: Instant) -> SampleOutcome {
        let Some((last_r, last_w, last_t)) = self.last else {
            self.last = Some((totals.0, totals.1, now));
            return SampleOutcome::Primed;
        };
        let dt = now.saturating_duration_since(last_t).as_secs_f64();
        if dt <= 0.0 {
            return SampleOutcome::Duplicate;
        }
        let dr = totals.0.saturating_sub(last_r);
        let dw = totals.1.saturating_sub(last_w);
        self.rates = (dr as f64 / dt, dw as f64 / dt);
        self.last = Some((totals.0, totals.1, now));
        if self.keep_history {
            self.primary.push(self.rates.0);
            self.secondary.push(self.rates.1);
        }
        SampleOutcome::Updated
    }

    pub fn rates(&self) -> (f64, f64) {
        self.rates
    }

    pub fn max_bps(&self) -> Option<f64> {
        self.max_bps
    }

    pub fn history_len(&self) -> (usize, usize) {
        (self.primary.len(), self.secondary.len())
    }

    pub fn history(&self) -> (Vec<f64>, Vec<f64>) {
        (self.primary.to_vec(), self.secondary.to_vec())
    }

    /// Manual ceiling, else the largest rate seen now or in history
    pub fn scale(&self) -> f64 {
        match self.max_bps {
            Some(m) => m,
            None => self
                .rates
                .0
                .max(self.rates.1)
                .max(self.primary.max())
                .max(self.secondary.max()),
        }
    }

    pub fn snapshot(&self) -> DualIoSnapshot {
        DualIoSnapshot {
            rates: self.rates,
            primary_hist: self.primary.to_vec(),
            secondary_hist: self.secondary.to_vec(),
            capacity: self.primary.capacity(),
            scale: self.scale(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(t0: Instant, s: f64) -> Instant {
        t0 + Duration::from_secs_f64(s)
    }

    #[test]
    fn test_fixed_ceiling_rates_and_fractions() {
        let t0 = Instant::now();
        let mut core = DualIoCore::new(30, false, max_bps_from_mbps(100.0));
        assert_eq!(core.sample((0, 0), t0), SampleOutcome::Primed);
        assert_eq!(core.rates(), (0.0, 0.0));
        assert_eq!(core.sample((50_000_000, 25_000_000), secs(t0, 1.0)), SampleOutcome::Updated);
        assert_eq!(core.rates(), (5.0e7, 2.5e7));
        assert_eq!(core.snapshot().fractions(), (0.5, 0.25));
    }

    #[test]
    fn test_rate_is_delta_over_dt() {
        let t0 = Instant::now();
        let mut core = DualIoCore::new(30, false, None);
        core.sample((1_000, 2_000), t0);
        core.sample((4_000, 2_500), secs(t0, 0.5));
        let (r, w) = core.rates();
        assert_eq!(r, 3_000.0 / 0.5);
        assert_eq!(w, 500.0 / 0.5);
    }

    #[test]
    fn test_counter_decrease_clamps_and_history_advances() {
        let t0 = Instant::now();
        let mut core = DualIoCore::new(30, true, None);
        core.sample((10_000, 10_000), t0);
        core.sample((20_000, 30_000), secs(t0, 1.0));
        core.sample((5, 40_000), secs(t0, 2.0));
        assert_eq!(core.rates(), (0.0, 10_000.0));
        assert_eq!(core.history_len(), (2, 2));
    }

    #[test]
    fn test_duplicate_instant_is_noop() {
        let t0 = Instant::now();
        let mut core = DualIoCore::new(30, true, None);
        core.sample((0, 0), t0);
        core.sample((100, 100), secs(t0, 1.0));
        let before = core.snapshot();
        assert_eq!(core.sample((500, 500), secs(t0, 1.0)), SampleOutcome::Duplicate);
        assert_eq!(core.snapshot(), before);
    }

    #[test]
    fn test_history_bounded_oldest_first() {
        let t0 = Instant::now();
        let mut core = DualIoCore::new(3, true, None);
        core.sample((0, 0), t0);
        for i in 1..=5u64 {
            core.sample((i * i * 100, 0), secs(t0, i as f64));
        }
        let (r, w) = core.history();
        assert_eq!(r.len(), 3);
        assert_eq!(w.len(), 3);
        // deltas 100,300,500,700,900 per 1s, last three kept
        assert_eq!(r, vec![500.0, 700.0, 900.0]);
    }

    #[test]
    fn test_no_history_outside_graph_mode() {
        let t0 = Instant::now();
        let mut core = DualIoCore::new(30, false, None);
        core.sample((0, 0), t0);
        core.sample((10, 10), secs(t0, 1.0));
        assert_eq!(core.history_len(), (0, 0));
    }

    #[test]
    fn test_auto_scale_all_zero_is_zero_not_nan() {
        let t0 = Instant::now();
        let mut core = DualIoCore::new(30, true, None);
        core.sample((7, 7), t0);
        core.sample((7, 7), secs(t0, 1.0));
        let snap = core.snapshot();
        assert_eq!(snap.scale, 0.0);
        assert_eq!(snap.fractions(), (0.0, 0.0));
    }

    #[test]
    fn test_manual_ceiling_overflow_clamps() {
        let t0 = Instant::now();
        let mut core = DualIoCore::new(30, false, max_bps_from_mbps(1.0));
        core.sample((0, 0), t0);
        core.sample((5_000_000, 0), secs(t0, 1.0));
        assert_eq!(core.snapshot().fractions().0, 1.0);
        assert_eq!(max_bps_from_mbps(0.0), None);
        assert_eq!(max_bps_from_mbps(-3.0), None);
    }
}
