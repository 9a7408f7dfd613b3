/*
 *  sensors/mod.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Sensor provider contracts consumed by the widgets
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
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use thiserror::Error;

pub mod system;
pub mod volume;
pub mod meter;
pub mod media;
pub mod weather;

pub use media::{MediaSensor, PlayStatus, TrackInfo};
pub use meter::{MeterData, VolumeMeterSensor};
pub use weather::{AirQuality, CurrentWeather, ForecastDay, WeatherProvider, WeatherQuery};

/// Error raised by any sensor provider
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
    #[error("sensor I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sensor parse error: {0}")]
    Parse(String),
    #[error("upstream request failed: {0}")]
    Http(String),
    #[error("not supported on this platform: {0}")]
    NotSupported(&'static str),
}

impl From<reqwest::Error> for SensorError {
    fn from(err: reqwest::Error) -> Self {
        SensorError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for SensorError {
    fn from(err: serde_json::Error) -> Self {
        SensorError::Parse(err.to_string())
    }
}

/// Monotone byte counters keyed by device or interface
pub type IoCounterMap = HashMap<String, (u64, u64)>;

/// Disk read/write byte counters
pub trait DiskSensor: Send + Sync {
    fn io_counters(&self) -> Result<IoCounterMap, SensorError>;
}

/// Network receive/transmit byte counters
pub trait NetworkSensor: Send + Sync {
    fn io_counters_per_interface(&self) -> Result<IoCounterMap, SensorError>;
}

pub trait CpuSensor: Send + Sync {
    /// Utilisation percentages, one per core when `per_core`, else a single
    /// overall value. A zero `sample` reports usage since the previous call.
    fn percent(&self, sample: Duration, per_core: bool) -> Result<Vec<f64>, SensorError>;
    fn core_count(&self) -> usize;
}

/// Physical memory in bytes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MemoryStat {
    pub total: u64,
    pub used: u64,
}

impl MemoryStat {
    pub fn percent(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.used as f64 * 100.0 / self.total as f64 }
    }
}

pub trait MemorySensor: Send + Sync {
    fn virtual_memory(&self) -> Result<MemoryStat, SensorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatteryState {
    Charging,
    Discharging,
    Full,
    /// plugged in, not charging
    NotCharging,
    #[default]
    Unknown,
}

impl BatteryState {
    /// sysfs `status` text
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "charging" => BatteryState::Charging,
            "discharging" => BatteryState::Discharging,
            "full" => BatteryState::Full,
            "not charging" => BatteryState::NotCharging,
            _ => BatteryState::Unknown,
        }
    }
}

/// Combined charge over every battery present
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryStat {
    pub percent: f64,
    pub state: BatteryState,
    pub ac_online: bool,
}

pub trait BatterySensor: Send + Sync {
    fn battery(&self) -> Result<BatteryStat, SensorError>;
}

/// Audio endpoint volume.
///
/// Handles may be bound to the thread that created them, so implementations
/// are not required to be `Send`; they are built through a factory on the
/// polling thread and never leave it.
pub trait VolumeSensor {
    /// (level in [0, 100], muted)
    fn get_volume(&mut self) -> Result<(f64, bool), SensorError>;

    fn needs_reinitialize(&self) -> bool {
        false
    }

    fn reinitialize(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    /// Channel fired when the default device changes
    fn subscribe_device_change(&mut self) -> Option<Receiver<()>> {
        None
    }
}

pub type VolumeSensorFactory =
    Arc<dyn Fn() -> Result<Box<dyn VolumeSensor>, SensorError> + Send + Sync>;
pub type MeterSensorFactory =
    Arc<dyn Fn() -> Result<Box<dyn VolumeMeterSensor>, SensorError> + Send + Sync>;
pub type MediaSensorFactory =
    Arc<dyn Fn() -> Result<Box<dyn MediaSensor>, SensorError> + Send + Sync>;
pub type WeatherProviderFactory =
    Arc<dyn Fn(&WeatherQuery) -> Result<Arc<dyn WeatherProvider>, SensorError> + Send + Sync>;

/// Every provider a widget factory may ask for
#[derive(Clone)]
pub struct SensorSet {
    pub disk: Arc<dyn DiskSensor>,
    pub network: Arc<dyn NetworkSensor>,
    pub cpu: Arc<dyn CpuSensor>,
    pub memory: Arc<dyn MemorySensor>,
    pub battery: Arc<dyn BatterySensor>,
    pub volume: VolumeSensorFactory,
    pub meter: MeterSensorFactory,
    pub media: MediaSensorFactory,
    pub weather: WeatherProviderFactory,
}

impl SensorSet {
    /// Platform providers
    pub fn system() -> Self {
        let sys = Arc::new(system::SystemSensors::new());
        Self {
            disk: Arc::new(system::ProcDiskstats),
            network: sys.clone(),
            cpu: sys.clone(),
            memory: sys,
            battery: Arc::new(system::SysfsBattery::default()),
            volume: volume::default_factory(),
            meter: meter::default_factory(),
            media: media::default_factory(),
            weather: weather::default_factory(),
        }
    }

    /// Every provider fails with `Unavailable`; tests swap in the fakes they need
    pub fn unavailable() -> Self {
        let none = Arc::new(Unavailable);
        Self {
            disk: none.clone(),
            network: none.clone(),
            cpu: none.clone(),
            memory: none.clone(),
            battery: none,
            volume: Arc::new(|| Err(SensorError::Unavailable("volume".into()))),
            meter: Arc::new(|| Err(SensorError::Unavailable("volume meter".into()))),
            media: Arc::new(|| Err(SensorError::Unavailable("media player".into()))),
            weather: Arc::new(|_| Err(SensorError::Unavailable("weather".into()))),
        }
    }
}

struct Unavailable;

impl DiskSensor for Unavailable {
    fn io_counters(&self) -> Result<IoCounterMap, SensorError> {
        Err(SensorError::Unavailable("disk".into()))
    }
}

impl NetworkSensor for Unavailable {
    fn io_counters_per_interface(&self) -> Result<IoCounterMap, SensorError> {
        Err(SensorError::Unavailable("network".into()))
    }
}

impl CpuSensor for Unavailable {
    fn percent(&self, _sample: Duration, _per_core: bool) -> Result<Vec<f64>, SensorError> {
        Err(SensorError::Unavailable("cpu".into()))
    }

    fn core_count(&self) -> usize {
        0
    }
}

impl MemorySensor for Unavailable {
    fn virtual_memory(&self) -> Result<MemoryStat, SensorError> {
        Err(SensorError::Unavailable("memory".into()))
    }
}

impl BatterySensor for Unavailable {
    fn battery(&self) -> Result<BatteryStat, SensorError> {
        Err(SensorError::Unavailable("battery".into()))
    }
}
