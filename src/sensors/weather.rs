/*
 *  sensors/weather.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Weather provider contract and the open-meteo implementation
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
use std::thread;
use std::time::Duration;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header;
use serde_json::Value;

use super::{SensorError, WeatherProviderFactory};

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
const MAX_RETRIES: u8 = 3;

/// Provider selection and location, projected from the widget config
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherQuery {
    pub provider: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// "metric" or "imperial"
    pub units: String,
    pub days: usize,
}

impl Default for WeatherQuery {
    fn default() -> Self {
        Self {
            provider: "open-meteo".into(),
            latitude: None,
            longitude: None,
            units: "metric".into(),
            days: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub weather_code: i64,
    pub description: String,
    /// glyph name in the "weather" set
    pub icon: String,
    pub is_day: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastDay {
    pub date: String,
    pub temp_max: f64,
    pub temp_min: f64,
    pub precipitation_chance: f64,
    pub weather_code: i64,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AirQuality {
    pub aqi: f64,
    pub pm2_5: f64,
    pub pm10: f64,
}

/// Upstream weather source. Calls block and belong on a background thread.
pub trait WeatherProvider: Send + Sync {
    fn fetch_weather(&self, need_forecast: bool)
        -> Result<(CurrentWeather, Vec<ForecastDay>), SensorError>;
    fn fetch_air_quality(&self) -> Result<AirQuality, SensorError>;
    fn fetch_uv_index(&self) -> Result<f64, SensorError>;
}

pub fn default_factory() -> WeatherProviderFactory {
    Arc::new(|query: &WeatherQuery| {
        match query.provider.as_str() {
            "open-meteo" | "openmeteo" => {
                let provider = OpenMeteo::new(query)?;
                Ok(Arc::new(provider) as Arc<dyn WeatherProvider>)
            }
            _ => Err(SensorError::Unavailable(format!("weather provider '{}'", query.provider))),
        }
    })
}

pub struct OpenMeteo {
    client: Client,
    latitude: f64,
    longitude: f64,
    imperial: bool,
    days: usize,
}

impl OpenMeteo {
    pub fn new(query: &WeatherQuery) -> Result<Self, SensorError> {
        let (Some(latitude), Some(longitude)) = (query.latitude, query.longitude) else {
            return Err(SensorError::Unavailable("open-meteo requires latitude and longitude".into()));
        };
        let mut headers = header::HeaderMap::new();
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;
        info!("open-meteo provider for {:.3},{:.3}", latitude, longitude);
        Ok(Self {
            client,
            latitude,
            longitude,
            imperial: query.units.eq_ignore_ascii_case("imperial"),
            days: query.days.clamp(1, 16),
        })
    }

    fn location(&self) -> [(&'static str, String); 2] {
        [("latitude", self.latitude.to_string()), ("longitude", self.longitude.to_string())]
    }

    fn send_with_retries(&self, url: &str, params: &[(&str, String)]) -> Result<Value, SensorError> {
        let mut retries = 0;
        loop {
            let attempt = self
                .client
                .get(url)
                .query(params)
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.json::<Value>());
            match attempt {
                Ok(value) => return Ok(value),
                Err(e) => {
                    retries += 1;
                    if retries >= MAX_RETRIES {
                        warn!("open-meteo request failed after {} attempts: {}", retries, e);
                        return Err(e.into());
                    }
                    debug!("open-meteo retry {}: {}", retries, e);
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }
}

impl WeatherProvider for OpenMeteo {
    fn fetch_weather(&self, need_forecast: bool)
        -> Result<(CurrentWeather, Vec<ForecastDay>), SensorError> {
        let mut params: Vec<(&str, String)> = self.location().to_vec();
        params.push((
            "current",
            "temperature_2m,apparent_temperature,relative_humidity_2m,pressure_msl,\
             wind_speed_10m,wind_direction_10m,weather_code,is_day"
                .into(),
        ));
        if need_forecast {
            params.push((
                "daily",
                "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max".into(),
            ));
            params.push(("forecast_days", self.days.to_string()));
        }
        if self.imperial {
            params.push(("temperature_unit", "fahrenheit".into()));
            params.push(("wind_speed_unit", "mph".into()));
        }
        params.push(("timezone", "auto".into()));

        let json = self.send_with_retries(FORECAST_URL, &params)?;
        let current = parse_current(&json)?;
        let forecast = if need_forecast { parse_daily(&json)? } else { Vec::new() };
        Ok((current, forecast))
    }

    fn fetch_air_quality(&self) -> Result<AirQuality, SensorError> {
        let mut params: Vec<(&str, String)> = self.location().to_vec();
        params.push(("current", "us_aqi,pm2_5,pm10".into()));
        let json = self.send_with_retries(AIR_QUALITY_URL, &params)?;
        parse_air_quality(&json)
    }

    fn fetch_uv_index(&self) -> Result<f64, SensorError> {
        let mut params: Vec<(&str, String)> = self.location().to_vec();
        params.push(("current", "uv_index".into()));
        let json = self.send_with_retries(FORECAST_URL, &params)?;
        field(&json["current"], "uv_index")
    }
}

fn field(section: &Value, name: &str) -> Result<f64, SensorError> {
    section
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| SensorError::Parse(format!("missing field '{}'", name)))
}

/// WMO weather interpretation code to (description, glyph)
pub fn describe_code(code: i64) -> (&'static str, &'static str) {
    match code {
        0 => ("Clear", "clear"),
        1 => ("Mostly Clear", "partly"),
        2 => ("Partly Cloudy", "partly"),
        3 => ("Overcast", "cloud"),
        45 | 48 => ("Fog", "fog"),
        51 | 53 | 55 | 56 | 57 => ("Drizzle", "rain"),
        61 | 63 | 65 | 66 | 67 | 80 | 81 | 82 => ("Rain", "rain"),
        71 | 73 | 75 | 77 | 85 | 86 => ("Snow", "snow"),
        95 | 96 | 99 => ("Thunderstorm", "storm"),
        _ => ("Unknown", "unknown"),
    }
}

/// `current` block of a forecast response. `feels_like` takes
/// apparent_temperature and falls back to temperature_2m when it is absent.
pub fn parse_current(json: &Value) -> Result<CurrentWeather, SensorError> {
    let cur = json
        .get("current")
        .ok_or_else(|| SensorError::Parse("missing 'current' block".into()))?;
    let temperature = field(cur, "temperature_2m")?;
    let feels_like = field(cur, "apparent_temperature").unwrap_or(temperature);
    let weather_code = cur.get("weather_code").and_then(Value::as_i64).unwrap_or(-1);
    let (description, icon) = describe_code(weather_code);
    Ok(CurrentWeather {
        temperature,
        feels_like,
        humidity: field(cur, "relative_humidity_2m").unwrap_or(0.0),
        pressure: field(cur, "pressure_msl").unwrap_or(0.0),
        wind_speed: field(cur, "wind_speed_10m").unwrap_or(0.0),
        wind_direction: field(cur, "wind_direction_10m").unwrap_or(0.0),
        weather_code,
        description: description.to_string(),
        icon: icon.to_string(),
        is_day: cur.get("is_day").and_then(Value::as_i64).map_or(true, |d| d != 0),
    })
}

/// `daily` block, column arrays zipped into one record per day
pub fn parse_daily(json: &Value) -> Result<Vec<ForecastDay>, SensorError> {
    let daily = json
        .get("daily")
        .ok_or_else(|| SensorError::Parse("missing 'daily' block".into()))?;
    let column = |name: &str| daily.get(name).and_then(Value::as_array).cloned().unwrap_or_default();
    let dates = column("time");
    let maxes = column("temperature_2m_max");
    let mins = column("temperature_2m_min");
    let codes = column("weather_code");
    let rain = column("precipitation_probability_max");

    let days = dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let num = |col: &Vec<Value>| col.get(i).and_then(Value::as_f64).unwrap_or(0.0);
            let weather_code = codes.get(i).and_then(Value::as_i64).unwrap_or(-1);
            ForecastDay {
                date: date.as_str().unwrap_or_default().to_string(),
                temp_max: num(&maxes),
                temp_min: num(&mins),
                precipitation_chance: num(&rain),
                weather_code,
                icon: describe_code(weather_code).1.to_string(),
            }
        })
        .collect();
    Ok(days)
}

pub fn parse_air_quality(json: &Value) -> Result<AirQuality, SensorError> {
    let cur = json
        .get("current")
        .ok_or_else(|| SensorError::Parse("missing 'current' block".into()))?;
    Ok(AirQuality {
        aqi: field(cur, "us_aqi")?,
        pm2_5: field(cur, "pm2_5").unwrap_or(0.0),
        pm10: field(cur, "pm10").unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_current_full() {
        let j = json!({"current": {
            "temperature_2m": 12.5, "apparent_temperature": 9.8,
            "relative_humidity_2m": 81, "pressure_msl": 1012.3,
            "wind_speed_10m": 14.0, "wind_direction_10m": 250,
            "weather_code": 61, "is_day": 0
        }});
        let c = parse_current(&j).unwrap();
        assert_eq!(c.temperature, 12.5);
        assert_eq!(c.feels_like, 9.8);
        assert_eq!(c.icon, "rain");
        assert!(!c.is_day);
    }

    #[test]
    fn test_feels_like_without_apparent_temperature_copies_temperature() {
        let j = json!({"current": {"temperature_2m": 21.0, "weather_code": 0}});
        let c = parse_current(&j).unwrap();
        assert_eq!(c.feels_like, c.temperature);
        assert_eq!(c.description, "Clear");
    }

    #[test]
    fn test_parse_current_missing_block() {
        assert!(matches!(parse_current(&json!({})), Err(SensorError::Parse(_))));
    }

    #[test]
    fn test_parse_daily() {
        let j = json!({"daily": {
            "time": ["2026-10-14", "2026-10-15"],
            "temperature_2m_max": [18.0, 16.5],
            "temperature_2m_min": [9.0, 7.5],
            "weather_code": [3, 95],
            "precipitation_probability_max": [10, 80]
        }});
        let d = parse_daily(&j).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d[1].icon, "storm");
        assert_eq!(d[1].precipitation_chance, 80.0);
    }

    #[test]
    fn test_open_meteo_requires_coordinates() {
        let q = WeatherQuery { latitude: Some(51.5), ..WeatherQuery::default() };
        assert!(OpenMeteo::new(&q).is_err());
    }

    #[test]
    fn test_parse_air_quality() {
        let a = parse_air_quality(&json!({"current": {"us_aqi": 42, "pm2_5": 8.1}})).unwrap();
        assert_eq!(a.aqi, 42.0);
        assert_eq!(a.pm10, 0.0);
    }
}
