/*
 *  widgets/error.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Widget runtime error kinds
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

use std::convert::Infallible;
use thiserror::Error;

use crate::sensors::SensorError;

#[derive(Debug, Error)]
pub enum WidgetError {
    /// Missing field, invalid enum or impossible constraint
    #[error("configuration error: {0}")]
    Config(String),

    #[error("widget '{0}' is disabled")]
    Disabled(String),

    #[error("unknown widget type: {kind} (available: {})", .known.join(", "))]
    UnknownKind { kind: String, known: Vec<String> },

    /// Every enabled entry failed, one message per failure
    #[error("no widgets constructed: {}", .0.join("; "))]
    NoWidgetsConstructed(Vec<String>),

    #[error("sensor error: {0}")]
    SensorTransient(String),

    #[error("sensor stale: {0}")]
    SensorStale(String),

    #[error("sensor failed: {0}")]
    SensorFatal(String),

    #[error("drawing error: {0}")]
    Drawing(String),

    #[error("widget stopped")]
    Stopped,
}

impl WidgetError {
    pub fn is_config(&self) -> bool {
        matches!(self, WidgetError::Config(_))
    }
}

impl From<SensorError> for WidgetError {
    fn from(err: SensorError) -> Self {
        WidgetError::SensorTransient(err.to_string())
    }
}

// the raster draw target cannot fail
impl From<Infallible> for WidgetError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_message() {
        let e = WidgetError::UnknownKind {
            kind: "zzz".into(),
            known: vec!["clock".into(), "cpu".into(), "disk".into()],
        };
        assert_eq!(e.to_string(), "unknown widget type: zzz (available: clock, cpu, disk)");
    }

    #[test]
    fn test_sensor_error_is_transient() {
        let e: WidgetError = SensorError::Parse("bad".into()).into();
        assert!(matches!(e, WidgetError::SensorTransient(_)));
        assert!(!e.is_config());
    }
}
