use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::{WeatherCategory, classify};

/// Opaque identity of a city returned by the geocoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CityId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl City {
    /// "name, country"
    pub fn full_name(&self) -> String {
        format!("{}, {}", self.name, self.country)
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Temperature and related readings. Temperatures are always Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MainInfo {
    pub temp: f64,
    pub feels_like: f64,
    /// Relative humidity in percent, 0 when not reported.
    ///
    /// In forecast entries this carries the precipitation probability instead.
    pub humidity: u8,
    /// Pressure in hPa, 0 when not reported.
    pub pressure: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionEntry {
    pub code: i32,
    pub description: String,
    pub icon: String,
    pub category: WeatherCategory,
}

impl ConditionEntry {
    pub fn from_code(code: i32) -> Self {
        let info = classify(code);
        Self {
            code,
            description: info.description.to_string(),
            icon: info.icon.to_string(),
            category: WeatherCategory::from_code(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed_kmh: f64,
    pub direction_deg: f64,
}

/// Current conditions for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub main: MainInfo,
    /// Never empty; the first entry is the primary condition.
    pub conditions: Vec<ConditionEntry>,
    pub wind: Option<Wind>,
    pub captured_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn primary_condition(&self) -> Option<&ConditionEntry> {
        self.conditions.first()
    }
}

/// One forecast step, identified by its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub main: MainInfo,
    pub conditions: Vec<ConditionEntry>,
}

impl ForecastEntry {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// Chance of precipitation in percent.
    pub fn precipitation_probability(&self) -> u8 {
        self.main.humidity
    }
}

/// Up to eight entries, three hours apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Forecast {
    pub city: String,
    pub entries: Vec<ForecastEntry>,
}

impl Forecast {
    pub const MAX_ENTRIES: usize = 8;
    pub const STEP_HOURS: usize = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_metric_preference(use_metric: bool) -> Self {
        if use_metric { Self::Celsius } else { Self::Fahrenheit }
    }

    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

/// Format a Celsius reading in `unit`, rounded to a whole degree, e.g. "21°C".
pub fn format_temperature(celsius: f64, unit: TemperatureUnit) -> String {
    let value = unit.convert(celsius).round() as i64;
    format!("{value}{}", unit.symbol())
}
