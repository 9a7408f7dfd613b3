/*
 *  sensors/media.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Now-playing provider via playerctl (MPRIS)
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
use std::sync::Arc;

use super::{MediaSensorFactory, SensorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlayStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "playing" => PlayStatus::Playing,
            "paused" => PlayStatus::Paused,
            _ => PlayStatus::Stopped,
        }
    }

    pub fn glyph_name(&self) -> &'static str {
        match self {
            PlayStatus::Playing => "playing",
            PlayStatus::Paused => "paused",
            PlayStatus::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub status: PlayStatus,
}

impl TrackInfo {
    /// "artist - title", or whichever half is present
    pub fn display_line(&self) -> String {
        match (self.artist.is_empty(), self.title.is_empty()) {
            (false, false) => format!("{} - {}", self.artist, self.title),
            (true, false) => self.title.clone(),
            (false, true) => self.artist.clone(),
            (true, true) => String::new(),
        }
    }
}

pub trait MediaSensor {
    /// `Ok(None)` when no player is running
    fn now_playing(&mut self) -> Result<Option<TrackInfo>, SensorError>;
}

const FORMAT: &str = "{{status}}\t{{artist}}\t{{title}}\t{{album}}";

pub struct Playerctl {
    player: Option<String>,
}

impl Playerctl {
    pub fn new(player: Option<String>) -> Self {
        Self { player }
    }
}

impl MediaSensor for Playerctl {
    fn now_playing(&mut self) -> Result<Option<TrackInfo>, SensorError> {
        let mut cmd = Command::new("playerctl");
        if let Some(p) = &self.player {
            cmd.arg("--player").arg(p);
        }
        let out = cmd.args(["metadata", "--format", FORMAT]).output()?;
        if !out.status.success() {
            let err = String::from_utf8_lossy(&out.stderr);
            if err.contains("No player") {
                return Ok(None);
            }
            return Err(SensorError::Unavailable(err.trim().to_string()));
        }
        Ok(parse_metadata(&String::from_utf8_lossy(&out.stdout)))
    }
}

pub fn default_factory() -> MediaSensorFactory {
    Arc::new(|| Ok(Box::new(Playerctl::new(None)) as Box<dyn super::MediaSensor>))
}

/// Decode one tab separated line produced by `FORMAT`
pub fn parse_metadata(line: &str) -> Option<TrackInfo> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    let mut parts = line.split('\t');
    let status = PlayStatus::parse(parts.next().unwrap_or_default());
    let mut field = || parts.next().unwrap_or_default().trim().to_string();
    let artist = field();
    let title = field();
    let album = field();
    Some(TrackInfo { title, artist, album, status })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        let t = parse_metadata("Playing\tNina Simone\tSinnerman\tPastel Blues\n").unwrap();
        assert_eq!(t.status, PlayStatus::Playing);
        assert_eq!(t.title, "Sinnerman");
        assert_eq!(t.display_line(), "Nina Simone - Sinnerman");
    }

    #[test]
    fn test_parse_metadata_partial() {
        let t = parse_metadata("Paused\t\tUntitled").unwrap();
        assert_eq!(t.status, PlayStatus::Paused);
        assert_eq!(t.album, "");
        assert_eq!(t.display_line(), "Untitled");
        assert!(parse_metadata("  \n").is_none());
    }
}
