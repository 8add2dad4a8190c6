//! Mapping from WMO weather interpretation codes to display text and icons.
//!
//! See: https://open-meteo.com/en/docs#weathervariables

use serde::{Deserialize, Serialize};

/// Description and icon identifier for a weather code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionInfo {
    pub description: &'static str,
    pub icon: &'static str,
}

const UNKNOWN: ConditionInfo = ConditionInfo { description: "Unknown", icon: "cloud" };

const fn info(description: &'static str, icon: &'static str) -> ConditionInfo {
    ConditionInfo { description, icon }
}

/// Map a WMO code to its description and icon.
///
/// Total over `i32`: codes outside the published table fall back to
/// `("Unknown", "cloud")`.
pub fn classify(code: i32) -> ConditionInfo {
    match code {
        0 => info("Clear sky", "sun.max"),
        1 => info("Mainly clear", "sun.max"),
        2 => info("Partly cloudy", "cloud.sun"),
        3 => info("Overcast", "cloud"),
        45 => info("Fog", "cloud.fog"),
        48 => info("Depositing rime fog", "cloud.fog"),
        51 => info("Light drizzle", "cloud.drizzle"),
        53 => info("Moderate drizzle", "cloud.drizzle"),
        55 => info("Dense drizzle", "cloud.drizzle"),
        61 => info("Slight rain", "cloud.rain"),
        63 => info("Moderate rain", "cloud.rain"),
        65 => info("Heavy rain", "cloud.heavyrain"),
        71 => info("Slight snow", "cloud.snow"),
        73 => info("Moderate snow", "cloud.snow"),
        75 => info("Heavy snow", "cloud.snow"),
        77 => info("Snow grains", "cloud.snow"),
        80 => info("Slight rain showers", "cloud.sun.rain"),
        82 => info("Violent rain showers", "cloud.heavyrain"),
        85 => info("Slight snow showers", "cloud.snow"),
        95 => info("Thunderstorm", "cloud.bolt"),
        99 => info("Thunderstorm with heavy hail", "cloud.bolt.rain"),
        _ => UNKNOWN,
    }
}

/// Coarse semantic grouping of weather codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCategory {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
    #[default]
    Unknown,
}

impl WeatherCategory {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 | 1 => Self::Clear,
            2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            61 | 63 | 65 | 80 | 82 => Self::Rain,
            71 | 73 | 75 | 77 | 85 => Self::Snow,
            95 | 99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }
}
