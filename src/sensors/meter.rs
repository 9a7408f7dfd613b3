/*
 *  sensors/meter.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Audio peak meter contract
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

use std::sync::Arc;

use super::{MeterSensorFactory, SensorError};

/// One meter reading, peaks normalised to [0, 1]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeterData {
    pub peak: f64,
    pub channel_peaks: Vec<f64>,
    pub channel_count: usize,
    pub is_clipping: bool,
    pub has_audio: bool,
}

impl MeterData {
    /// Derive the summary fields from raw channel peaks
    pub fn from_peaks(peaks: &[f64], clipping_thresh: f64, silence_thresh: f64) -> Self {
        let channel_peaks: Vec<f64> = peaks.iter().map(|p| p.clamp(0.0, 1.0)).collect();
        let peak = channel_peaks.iter().copied().fold(0.0, f64::max);
        Self {
            peak,
            channel_count: channel_peaks.len(),
            is_clipping: peak >= clipping_thresh,
            has_audio: peak > silence_thresh,
            channel_peaks,
        }
    }
}

/// Thread-affine like the volume endpoint, built on the polling thread
pub trait VolumeMeterSensor {
    fn get_meter_data(&mut self, clipping_thresh: f64, silence_thresh: f64)
        -> Result<MeterData, SensorError>;

    fn needs_reinitialize(&self) -> bool {
        false
    }

    fn reinitialize(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

/// No portable peak source; platforms plug one in through `SensorSet::meter`
pub fn default_factory() -> MeterSensorFactory {
    Arc::new(|| Err(SensorError::NotSupported("audio peak metering")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_peaks() {
        let m = MeterData::from_peaks(&[0.2, 0.995, 1.4], 0.99, 0.01);
        assert_eq!(m.channel_count, 3);
        assert_eq!(m.peak, 1.0);
        assert!(m.is_clipping);
        assert!(m.has_audio);

        let quiet = MeterData::from_peaks(&[0.0, 0.005], 0.99, 0.01);
        assert!(!quiet.has_audio);
        assert!(!quiet.is_clipping);
    }
}
