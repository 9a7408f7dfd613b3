/*
 *  sensors/volume.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  ALSA mixer volume provider, one probed mixer per process
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

use std::process::Command;
use std::sync::{Arc, OnceLock};
use log::{debug, info};

use super::{SensorError, VolumeSensor, VolumeSensorFactory};

/// Mixer control resolved once at first use
#[derive(Debug)]
pub struct Mixer {
    control: Option<String>,
}

impl Mixer {
    fn probe() -> Self {
        let control = match Command::new("amixer").arg("scontrols").output() {
            Ok(out) if out.status.success() => {
                pick_control(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(out) => {
                debug!("amixer scontrols exited with {}", out.status);
                None
            }
            Err(e) => {
                debug!("amixer not available: {}", e);
                None
            }
        };
        match &control {
            Some(c) => info!("volume mixer control '{}'", c),
            None => info!("no volume mixer control found"),
        }
        Self { control }
    }

    pub fn control(&self) -> Option<&str> {
        self.control.as_deref()
    }

    pub fn read(&self) -> Result<(f64, bool), SensorError> {
        let control = self
            .control
            .as_deref()
            .ok_or_else(|| SensorError::Unavailable("no mixer control".into()))?;
        let out = Command::new("amixer").args(["-M", "get", control]).output()?;
        if !out.status.success() {
            return Err(SensorError::Unavailable(format!("amixer get {} failed", control)));
        }
        parse_amixer(&String::from_utf8_lossy(&out.stdout))
    }
}

static MIXER: OnceLock<Arc<Mixer>> = OnceLock::new();

/// Process-wide mixer, probed exactly once
pub fn shared() -> Arc<Mixer> {
    MIXER.get_or_init(|| Arc::new(Mixer::probe())).clone()
}

struct SharedVolume(Arc<Mixer>);

impl VolumeSensor for SharedVolume {
    fn get_volume(&mut self) -> Result<(f64, bool), SensorError> {
        self.0.read()
    }
}

pub fn default_factory() -> VolumeSensorFactory {
    Arc::new(|| Ok(Box::new(SharedVolume(shared())) as Box<dyn VolumeSensor>))
}

/// Prefer Master, then PCM, then whatever comes first
fn pick_control(scontrols: &str) -> Option<String> {
    let names: Vec<String> = scontrols
        .lines()
        .filter_map(|l| {
            let start = l.find('\'')?;
            let rest = &l[start + 1..];
            let end = rest.find('\'')?;
            Some(rest[..end].to_string())
        })
        .collect();
    ["Master", "PCM"]
        .iter()
        .find_map(|want| names.iter().find(|n| n.as_str() == *want).cloned())
        .or_else(|| names.first().cloned())
}

/// First "[NN%]" and "[on]/[off]" pair of `amixer get` output
pub fn parse_amixer(text: &str) -> Result<(f64, bool), SensorError> {
    for line in text.lines() {
        let Some(pct_start) = line.find('[') else { continue };
        let Some(pct_end) = line[pct_start..].find("%]") else { continue };
        let pct = &line[pct_start + 1..pct_start + pct_end];
        let level: f64 = pct
            .trim()
            .parse()
            .map_err(|_| SensorError::Parse(format!("volume level '{}'", pct)))?;
        let muted = line.contains("[off]");
        return Ok((level.clamp(0.0, 100.0), muted));
    }
    Err(SensorError::Parse("no volume level in mixer output".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_MASTER: &str = "\
Simple mixer control 'Master',0
  Capabilities: pvolume pswitch pswitch-joined
  Playback channels: Front Left - Front Right
  Limits: Playback 0 - 65536
  Mono:
  Front Left: Playback 42597 [65%] [on]
  Front Right: Playback 42597 [65%] [on]
";

    #[test]
    fn test_parse_amixer_level_and_mute() {
        assert_eq!(parse_amixer(GET_MASTER).unwrap(), (65.0, false));
        let muted = GET_MASTER.replace("[on]", "[off]");
        assert_eq!(parse_amixer(&muted).unwrap(), (65.0, true));
    }

    #[test]
    fn test_parse_amixer_garbage() {
        assert!(parse_amixer("nothing here").is_err());
    }

    #[test]
    fn test_pick_control() {
        let s = "Simple mixer control 'Headphone',0\nSimple mixer control 'PCM',0\n";
        assert_eq!(pick_control(s).as_deref(), Some("PCM"));
        assert_eq!(pick_control("Simple mixer control 'Speaker',0\n").as_deref(), Some("Speaker"));
        assert_eq!(pick_control(""), None);
    }
}
