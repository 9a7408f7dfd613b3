/*
 *  widgets/units.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Byte-rate unit families
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateUnit {
    /// largest unit whose value is at least 1
    Auto,
    Bps,
    KBps,
    #[default]
    MBps,
    GBps,
}

const FIXED: [RateUnit; 4] = [RateUnit::Bps, RateUnit::KBps, RateUnit::MBps, RateUnit::GBps];

impl RateUnit {
    /// Empty or unrecognised input reads as MB/s
    pub fn from_config(s: &str) -> Self {
        match s.trim() {
            "auto" | "Auto" | "AUTO" => RateUnit::Auto,
            "B/s" => RateUnit::Bps,
            "KB/s" | "kB/s" => RateUnit::KBps,
            "MB/s" => RateUnit::MBps,
            "GB/s" => RateUnit::GBps,
            _ => RateUnit::MBps,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RateUnit::Auto => "auto",
            RateUnit::Bps => "B/s",
            RateUnit::KBps => "KB/s",
            RateUnit::MBps => "MB/s",
            RateUnit::GBps => "GB/s",
        }
    }

    fn divisor(&self) -> f64 {
        match self {
            RateUnit::Auto | RateUnit::Bps => 1.0,
            RateUnit::KBps => 1e3,
            RateUnit::MBps => 1e6,
            RateUnit::GBps => 1e9,
        }
    }

    /// (value, concrete unit) for a bytes-per-second rate
    pub fn convert(&self, bps: f64) -> (f64, RateUnit) {
        let bps = if bps.is_finite() { bps.max(0.0) } else { 0.0 };
        let unit = match self {
            RateUnit::Auto => FIXED
                .iter()
                .rev()
                .find(|u| bps / u.divisor() >= 1.0)
                .copied()
                .unwrap_or(RateUnit::Bps),
            u => *u,
        };
        (bps / unit.divisor(), unit)
    }

    /// One decimal below 10, none above: "4.2MB/s", "120KB/s"
    pub fn format(&self, bps: f64, show_unit: bool) -> String {
        let (value, unit) = self.convert(bps);
        let number = if value < 10.0 { format!("{:.1}", value) } else { format!("{:.0}", value) };
        if show_unit { format!("{}{}", number, unit.label()) } else { number }
    }
}
