//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Mapping of WMO weather codes to descriptions and icons
//! - The normalized weather model (snapshots, forecasts, cities)
//! - City search and weather clients with in-memory caching
//! - A view model that coordinates fetch cycles and exposes display state
//! - Configuration & persisted preferences
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod cache;
pub mod cities;
pub mod condition;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod orchestrator;
pub mod provider;

pub use cache::{CacheEntry, Clock, ManualClock, ResponseCache, SystemClock};
pub use cities::CityTable;
pub use condition::{ConditionInfo, WeatherCategory, classify};
pub use config::{Config, Preferences};
pub use error::{NetworkCause, WeatherError};
pub use location::CityLookup;
pub use model::{
    City, CityId, ConditionEntry, Coordinates, Forecast, ForecastEntry, MainInfo,
    TemperatureUnit, WeatherSnapshot, Wind, format_temperature,
};
pub use orchestrator::{Phase, ViewState, WeatherViewModel};
pub use provider::{CachePolicy, WeatherSource, open_meteo::OpenMeteoClient};
