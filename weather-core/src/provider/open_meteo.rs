use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::{
    cache::{Clock, ResponseCache, SystemClock},
    cities::CityTable,
    config::Config,
    error::WeatherError,
    model::{
        ConditionEntry, Coordinates, Forecast, ForecastEntry, MainInfo, WeatherSnapshot, Wind,
    },
};

use super::{CachePolicy, WeatherSource, endpoint, get_json, http_client};

/// Open-Meteo weather client with a per-city snapshot cache.
#[derive(Debug)]
pub struct OpenMeteoClient {
    http: Client,
    base_url: String,
    cities: Arc<CityTable>,
    cache: ResponseCache<WeatherSnapshot>,
    clock: Arc<dyn Clock>,
}

impl OpenMeteoClient {
    pub fn new(config: &Config, cities: Arc<CityTable>) -> Result<Self, WeatherError> {
        Self::with_clock(config, cities, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &Config,
        cities: Arc<CityTable>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WeatherError> {
        Ok(Self {
            http: http_client(config.request_timeout())?,
            base_url: config.weather.base_url.clone(),
            cities,
            cache: ResponseCache::new(Some(config.cache_ttl()), clock.clone()),
            clock,
        })
    }

    pub fn cities(&self) -> &Arc<CityTable> {
        &self.cities
    }

    /// Canonical table name and coordinates for `city`.
    fn locate(&self, city: &str) -> Result<(String, Coordinates), WeatherError> {
        self.cities
            .resolve(city)
            .ok_or_else(|| WeatherError::InvalidCoordinates(city.to_string()))
    }

    fn current_url(&self, at: Coordinates) -> Result<Url, WeatherError> {
        let mut url = endpoint(&self.base_url, "forecast")?;
        url.query_pairs_mut()
            .append_pair("latitude", &at.latitude.to_string())
            .append_pair("longitude", &at.longitude.to_string())
            .append_pair("current_weather", "true")
            .append_pair("temperature_unit", "celsius")
            .append_pair("windspeed_unit", "kmh")
            .append_pair("precipitation_unit", "mm")
            .append_pair("timezone", "auto");
        Ok(url)
    }

    fn forecast_url(&self, at: Coordinates) -> Result<Url, WeatherError> {
        let mut url = endpoint(&self.base_url, "forecast")?;
        url.query_pairs_mut()
            .append_pair("latitude", &at.latitude.to_string())
            .append_pair("longitude", &at.longitude.to_string())
            .append_pair("hourly", "temperature_2m,weathercode,precipitation_probability")
            .append_pair("temperature_unit", "celsius")
            .append_pair("timezone", "auto");
        Ok(url)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn current(
        &self,
        city: &str,
        policy: CachePolicy,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let (name, at) = self.locate(city)?;

        if policy == CachePolicy::UseCache {
            if let Some(cached) = self.cache.get(&name) {
                tracing::debug!("serving current weather from cache");
                return Ok(cached);
            }
        }

        let parsed: OmCurrentResponse = get_json(&self.http, self.current_url(at)?).await?;
        let snapshot = parsed.current_weather.into_snapshot(&name, self.clock.now());

        self.cache.insert(name, snapshot.clone());
        tracing::info!(temp = snapshot.main.temp, "fetched current weather");
        Ok(snapshot)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn forecast(&self, city: &str) -> Result<Forecast, WeatherError> {
        let (name, at) = self.locate(city)?;

        let parsed: OmForecastResponse = get_json(&self.http, self.forecast_url(at)?).await?;
        let entries = select_forecast(&parsed.hourly, parsed.utc_offset_seconds)?;

        tracing::info!(entries = entries.len(), "fetched forecast");
        Ok(Forecast { city: name, entries })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_current(
        &self,
        city: &str,
        policy: CachePolicy,
    ) -> Result<WeatherSnapshot, WeatherError> {
        self.current(city, policy).await
    }

    async fn fetch_forecast(&self, city: &str) -> Result<Forecast, WeatherError> {
        self.forecast(city).await
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrentResponse {
    current_weather: OmCurrentWeather,
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    temperature: f64,
    weathercode: i32,
    windspeed: Option<f64>,
    winddirection: Option<f64>,
}

impl OmCurrentWeather {
    fn into_snapshot(
        self,
        city: &str,
        captured_at: chrono::DateTime<chrono::Utc>,
    ) -> WeatherSnapshot {
        // This tier reports a single temperature and no humidity/pressure.
        let wind = match (self.windspeed, self.winddirection) {
            (Some(speed_kmh), Some(direction_deg)) => Some(Wind { speed_kmh, direction_deg }),
            _ => None,
        };

        WeatherSnapshot {
            city: city.to_string(),
            main: MainInfo {
                temp: self.temperature,
                feels_like: self.temperature,
                humidity: 0,
                pressure: 0,
            },
            conditions: vec![ConditionEntry::from_code(self.weathercode)],
            wind,
            captured_at,
        }
    }
}

/// Hourly timestamps arrive either as unix seconds or as provider-local
/// `YYYY-MM-DDTHH:MM` strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OmTime {
    Unix(i64),
    Local(String),
}

impl OmTime {
    fn to_epoch(&self, utc_offset_seconds: i64) -> Result<i64, WeatherError> {
        match self {
            OmTime::Unix(ts) => Ok(*ts),
            OmTime::Local(s) => {
                let local = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
                    .map_err(|e| WeatherError::Decoding(format!("bad hourly time '{s}': {e}")))?;
                Ok(local.and_utc().timestamp() - utc_offset_seconds)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    #[serde(default)]
    utc_offset_seconds: i64,
    hourly: OmHourly,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<OmTime>,
    temperature_2m: Vec<f64>,
    weathercode: Vec<i32>,
    #[serde(default)]
    precipitation_probability: Vec<Option<u8>>,
}

/// Every third hour from the start of the series, at most eight entries.
fn select_forecast(
    hourly: &OmHourly,
    utc_offset_seconds: i64,
) -> Result<Vec<ForecastEntry>, WeatherError> {
    let len = hourly.time.len();
    let precipitation_len = hourly.precipitation_probability.len();
    if hourly.temperature_2m.len() != len
        || hourly.weathercode.len() != len
        || (precipitation_len != 0 && precipitation_len != len)
    {
        return Err(WeatherError::Decoding(format!(
            "hourly series misaligned: time={len}, temperature_2m={}, weathercode={}, \
             precipitation_probability={precipitation_len}",
            hourly.temperature_2m.len(),
            hourly.weathercode.len(),
        )));
    }
    if len == 0 {
        return Err(WeatherError::NoData);
    }

    (0..len)
        .step_by(Forecast::STEP_HOURS)
        .take(Forecast::MAX_ENTRIES)
        .map(|i| {
            let temp = hourly.temperature_2m[i];
            let precipitation = hourly.precipitation_probability.get(i).copied().flatten();
            Ok(ForecastEntry {
                timestamp: hourly.time[i].to_epoch(utc_offset_seconds)?,
                main: MainInfo {
                    temp,
                    feels_like: temp,
                    humidity: precipitation.unwrap_or(0),
                    pressure: 0,
                },
                conditions: vec![ConditionEntry::from_code(hourly.weathercode[i])],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::NetworkCause;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE_TS: i64 = 1_735_689_600; // 2025-01-01T00:00:00Z

    fn client(server: &MockServer, clock: Arc<ManualClock>) -> OpenMeteoClient {
        let mut cfg = Config::default();
        cfg.weather.base_url = server.uri();
        OpenMeteoClient::with_clock(&cfg, Arc::new(CityTable::preset()), clock).unwrap()
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()))
    }

    fn current_body(temperature: f64, code: i32) -> serde_json::Value {
        json!({
            "latitude": 35.7,
            "longitude": 139.7,
            "current_weather": {
                "temperature": temperature,
                "weathercode": code,
                "windspeed": 12.5,
                "winddirection": 270.0,
                "time": "2025-01-01T09:00"
            }
        })
    }

    fn hourly_body(hours: usize) -> serde_json::Value {
        json!({
            "utc_offset_seconds": 0,
            "hourly": {
                "time": (0..hours).map(|h| BASE_TS + h as i64 * 3600).collect::<Vec<_>>(),
                "temperature_2m": (0..hours).map(|h| h as f64 * 0.5).collect::<Vec<_>>(),
                "weathercode": (0..hours)
                    .map(|h| if h % 2 == 0 { 0 } else { 61 })
                    .collect::<Vec<_>>(),
                "precipitation_probability": (0..hours).map(|h| h as u8).collect::<Vec<_>>(),
            }
        })
    }

    #[tokio::test]
    async fn current_is_cached_within_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("current_weather", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body(21.4, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let clock = clock();
        let client = client(&server, clock.clone());

        let first = client.current("Tokyo", CachePolicy::UseCache).await.unwrap();
        clock.advance(Duration::seconds(299));
        let second = client.current("Tokyo", CachePolicy::UseCache).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.main.temp, 21.4);
        assert_eq!(first.main.feels_like, 21.4);
        assert_eq!(first.main.humidity, 0);
        assert_eq!(first.main.pressure, 0);
        assert_eq!(first.conditions[0].description, "Partly cloudy");
        assert_eq!(first.wind, Some(Wind { speed_kmh: 12.5, direction_deg: 270.0 }));
    }

    #[tokio::test]
    async fn cache_is_keyed_by_canonical_city_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body(18.0, 1)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, clock());
        let first = client.current("Tokyo", CachePolicy::UseCache).await.unwrap();
        let second = client.current("tokyo", CachePolicy::UseCache).await.unwrap();

        assert_eq!(first.city, "Tokyo");
        assert_eq!(second.city, "Tokyo");
        assert_eq!(client.cache.len(), 1);
    }

    #[tokio::test]
    async fn slow_response_times_out_as_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(current_body(18.0, 1))
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut cfg = Config::default();
        cfg.weather.base_url = server.uri();
        cfg.request_timeout_secs = 1;
        let client =
            OpenMeteoClient::with_clock(&cfg, Arc::new(CityTable::preset()), clock()).unwrap();

        let err = client.current("London", CachePolicy::UseCache).await.unwrap_err();
        assert!(matches!(
            err,
            WeatherError::Network(NetworkCause::Transport(ref e)) if e.is_timeout()
        ));
        assert_eq!(err.user_message(), "The request timed out. Check your connection.");
        assert!(client.cache.is_empty());
    }

    #[tokio::test]
    async fn current_refetches_after_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body(10.0, 3)))
            .expect(2)
            .mount(&server)
            .await;

        let clock = clock();
        let client = client(&server, clock.clone());

        client.current("Tokyo", CachePolicy::UseCache).await.unwrap();
        clock.advance(Duration::seconds(301));
        let again = client.current("Tokyo", CachePolicy::UseCache).await.unwrap();
        assert_eq!(again.captured_at, clock.now());
    }

    #[tokio::test]
    async fn refresh_policy_bypasses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body(10.0, 3)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, clock());
        client.current("Paris", CachePolicy::UseCache).await.unwrap();
        client.current("Paris", CachePolicy::Refresh).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_city_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server, clock());
        let err = client.current("Atlantis", CachePolicy::UseCache).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidCoordinates(ref c) if c == "Atlantis"));

        let err = client.forecast("Atlantis").await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidCoordinates(_)));
    }

    #[tokio::test]
    async fn server_error_leaves_cache_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client(&server, clock());
        let err = client.current("London", CachePolicy::UseCache).await.unwrap_err();
        assert!(matches!(err, WeatherError::ServerError(503)));
        assert!(client.cache.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_network_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"unexpected\": true}"))
            .mount(&server)
            .await;

        let client = client(&server, clock());
        let err = client.current("London", CachePolicy::UseCache).await.unwrap_err();
        assert!(matches!(err, WeatherError::Network(NetworkCause::Decode(_))));
    }

    #[tokio::test]
    async fn empty_body_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client(&server, clock());
        let err = client.current("London", CachePolicy::UseCache).await.unwrap_err();
        assert!(matches!(err, WeatherError::NoData));
    }

    #[tokio::test]
    async fn forecast_takes_every_third_hour() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("hourly", "temperature_2m,weathercode,precipitation_probability"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hourly_body(24)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, clock());
        let forecast = client.forecast("Tokyo").await.unwrap();

        assert_eq!(forecast.city, "Tokyo");
        assert_eq!(forecast.entries.len(), 8);
        for (n, entry) in forecast.entries.iter().enumerate() {
            let hour = n * 3;
            assert_eq!(entry.timestamp, BASE_TS + hour as i64 * 3600);
            assert_eq!(entry.main.temp, hour as f64 * 0.5);
            assert_eq!(entry.main.feels_like, entry.main.temp);
            assert_eq!(entry.precipitation_probability(), hour as u8);
            assert_eq!(entry.main.pressure, 0);
            let code = if hour % 2 == 0 { 0 } else { 61 };
            assert_eq!(entry.conditions[0].code, code);
        }

        // Forecasts are never cached.
        client.forecast("Tokyo").await.unwrap();
    }

    #[test]
    fn short_series_yields_fewer_entries() {
        let hourly: OmHourly =
            serde_json::from_value(hourly_body(7)["hourly"].clone()).unwrap();
        let entries = select_forecast(&hourly, 0).unwrap();
        let timestamps: Vec<i64> = entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![BASE_TS, BASE_TS + 3 * 3600, BASE_TS + 6 * 3600]);
    }

    #[test]
    fn local_times_are_shifted_by_offset() {
        let hourly: OmHourly = serde_json::from_value(json!({
            "time": ["2025-01-01T09:00", "2025-01-01T10:00"],
            "temperature_2m": [5.0, 6.0],
            "weathercode": [45, 48],
            "precipitation_probability": [null, 20]
        }))
        .unwrap();

        let entries = select_forecast(&hourly, 9 * 3600).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, BASE_TS);
        assert_eq!(entries[0].main.humidity, 0);
        assert_eq!(entries[0].conditions[0].description, "Fog");
    }

    #[test]
    fn misaligned_series_is_rejected() {
        let hourly: OmHourly = serde_json::from_value(json!({
            "time": [BASE_TS, BASE_TS + 3600],
            "temperature_2m": [5.0],
            "weathercode": [0, 0]
        }))
        .unwrap();
        assert!(matches!(select_forecast(&hourly, 0), Err(WeatherError::Decoding(_))));
    }

    #[test]
    fn empty_series_is_no_data() {
        let hourly: OmHourly = serde_json::from_value(json!({
            "time": [], "temperature_2m": [], "weathercode": []
        }))
        .unwrap();
        assert!(matches!(select_forecast(&hourly, 0), Err(WeatherError::NoData)));
    }
}
