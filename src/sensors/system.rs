/*
 *  sensors/system.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Host metrics: cpu, memory and network via sysinfo, disk via procfs
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
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use log::debug;
use sysinfo::{Networks, System};

use super::{
    BatterySensor, BatteryStat, BatteryState, CpuSensor, DiskSensor, IoCounterMap, MemorySensor, MemoryStat,
    NetworkSensor, SensorError,
};

const SECTOR_BYTES: u64 = 512;

/// sysinfo backed cpu, memory and network provider
pub struct SystemSensors {
    sys: Mutex<System>,
    cores: usize,
}

impl SystemSensors {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_cpu_usage();
        let cores = sys.cpus().len();
        debug!("system sensors ready, {} cores", cores);
        Self { sys: Mutex::new(sys), cores }
    }
}

impl Default for SystemSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSensor for SystemSensors {
    fn percent(&self, sample: Duration, per_core: bool) -> Result<Vec<f64>, SensorError> {
        if !sample.is_zero() {
            {
                let mut sys = self.sys.lock().unwrap_or_else(|e| e.into_inner());
                sys.refresh_cpu_usage();
            }
            std::thread::sleep(sample.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        }
        let mut sys = self.sys.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_cpu_usage();
        if per_core {
            Ok(sys.cpus().iter().map(|c| c.cpu_usage() as f64).collect())
        } else {
            Ok(vec![sys.global_cpu_usage() as f64])
        }
    }

    fn core_count(&self) -> usize {
        self.cores
    }
}

impl MemorySensor for SystemSensors {
    fn virtual_memory(&self) -> Result<MemoryStat, SensorError> {
        let mut sys = self.sys.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(SensorError::Unavailable("memory totals".into()));
        }
        Ok(MemoryStat { total, used: sys.used_memory() })
    }
}

impl NetworkSensor for SystemSensors {
    fn io_counters_per_interface(&self) -> Result<IoCounterMap, SensorError> {
        let networks = Networks::new_with_refreshed_list();
        let map: IoCounterMap = (&networks)
            .into_iter()
            .map(|(name, data)| (name.clone(), (data.total_received(), data.total_transmitted())))
            .collect();
        if map.is_empty() {
            return Err(SensorError::Unavailable("no network interfaces".into()));
        }
        Ok(map)
    }
}

/// Whole-disk counters from /proc/diskstats
pub struct ProcDiskstats;

impl DiskSensor for ProcDiskstats {
    #[cfg(target_os = "linux")]
    fn io_counters(&self) -> Result<IoCounterMap, SensorError> {
        let text = std::fs::read_to_string("/proc/diskstats")?;
        let mut map = parse_diskstats(&text)?;
        // partitions double count their parent disk
        map.retain(|name, _| std::path::Path::new("/sys/block").join(name).exists());
        Ok(map)
    }

    #[cfg(not(target_os = "linux"))]
    fn io_counters(&self) -> Result<IoCounterMap, SensorError> {
        Err(SensorError::NotSupported("disk counters require /proc/diskstats"))
    }
}

/// Parse /proc/diskstats into (read_bytes, write_bytes) per device.
/// Loop and ram devices are skipped.
pub fn parse_diskstats(text: &str) -> Result<IoCounterMap, SensorError> {
    let mut map = IoCounterMap::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let name = fields[2];
        if name.starts_with("loop") || name.starts_with("ram") {
            continue;
        }
        let sectors = |i: usize| -> Result<u64, SensorError> {
            fields[i]
                .parse::<u64>()
                .map_err(|e| SensorError::Parse(format!("diskstats {}: {}", name, e)))
        };
        let read = sectors(5)?.saturating_mul(SECTOR_BYTES);
        let written = sectors(9)?.saturating_mul(SECTOR_BYTES);
        map.insert(name.to_string(), (read, written));
    }
    Ok(map)
}

/// Batteries and AC adapters under /sys/class/power_supply
pub struct SysfsBattery {
    root: PathBuf,
}

impl SysfsBattery {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for SysfsBattery {
    fn default() -> Self {
        Self::with_root("/sys/class/power_supply")
    }
}

fn read_trimmed(dir: &Path, file: &str) -> Option<String> {
    fs::read_to_string(dir.join(file)).ok().map(|s| s.trim().to_string())
}

impl BatterySensor for SysfsBattery {
    fn battery(&self) -> Result<BatteryStat, SensorError> {
        let mut charges = Vec::new();
        let mut states = Vec::new();
        let mut ac_online = false;

        for entry in fs::read_dir(&self.root)?.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            let dir = entry.path();
            if name.starts_with("BAT") || name.starts_with("battery") {
                let Some(capacity) = read_trimmed(&dir, "capacity").and_then(|c| c.parse::<f64>().ok()) else {
                    debug!("{}: no capacity reading", name);
                    continue;
                };
                charges.push(capacity.clamp(0.0, 100.0));
                states.push(read_trimmed(&dir, "status").map_or(BatteryState::Unknown, |s| BatteryState::parse(&s)));
            } else if name.starts_with("AC") || name.starts_with("ADP") {
                ac_online |= read_trimmed(&dir, "online").as_deref() == Some("1");
            }
        }

        if charges.is_empty() {
            return Err(SensorError::Unavailable("no battery present".into()));
        }
        let state = if states.contains(&BatteryState::Charging) {
            BatteryState::Charging
        } else if states.iter().all(|s| *s == BatteryState::Full) {
            BatteryState::Full
        } else if states.contains(&BatteryState::Discharging) {
            BatteryState::Discharging
        } else if states.contains(&BatteryState::NotCharging) {
            BatteryState::NotCharging
        } else {
            BatteryState::Unknown
        };
        Ok(BatteryStat {
            percent: charges.iter().sum::<f64>() / charges.len() as f64,
            state,
            ac_online,
        })
    }
}
