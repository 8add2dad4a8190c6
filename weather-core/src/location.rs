//! City search against the GeoNames `searchJSON` endpoint.

use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

use crate::{
    cache::ResponseCache,
    config::Config,
    error::WeatherError,
    model::{City, CityId},
    provider::{endpoint, get_json, http_client},
};

const MAX_ROWS: &str = "10";
const MIN_QUERY_CHARS: usize = 2;

/// Resolves free-text queries to city candidates. Results are cached per
/// exact query string for the lifetime of the lookup.
#[derive(Debug)]
pub struct CityLookup {
    http: Client,
    base_url: String,
    username: String,
    cache: ResponseCache<Arc<Vec<City>>>,
}

impl CityLookup {
    pub fn new(config: &Config) -> Result<Self, WeatherError> {
        Ok(Self {
            http: http_client(config.request_timeout())?,
            base_url: config.geocoding.base_url.clone(),
            username: config.geonames_username()?.to_string(),
            cache: ResponseCache::permanent(),
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn search_cities(&self, query: &str) -> Result<Arc<Vec<City>>, WeatherError> {
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Arc::new(Vec::new()));
        }

        if let Some(cached) = self.cache.get(query) {
            tracing::debug!("serving city search from cache");
            return Ok(cached);
        }

        let mut url = endpoint(&self.base_url, "searchJSON")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("maxRows", MAX_ROWS)
            .append_pair("username", &self.username)
            .append_pair("orderby", "relevance")
            .append_pair("cities", "cities1000");

        let parsed: GeoNamesResponse = get_json(&self.http, url).await?;
        let cities: Arc<Vec<City>> =
            Arc::new(parsed.geonames.into_iter().map(City::from).collect());

        tracing::info!(results = cities.len(), "city search complete");
        self.cache.insert(query, cities.clone());
        Ok(cities)
    }
}

#[derive(Debug, Deserialize)]
struct GeoNamesResponse {
    #[serde(default)]
    geonames: Vec<GeoName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoName {
    geoname_id: Option<u64>,
    name: String,
    #[serde(default)]
    country_name: String,
    #[serde(deserialize_with = "number_or_string")]
    lat: f64,
    #[serde(deserialize_with = "number_or_string")]
    lng: f64,
    timezone: Option<GeoTimezone>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoTimezone {
    time_zone_id: Option<String>,
}

impl From<GeoName> for City {
    fn from(raw: GeoName) -> Self {
        let id = match raw.geoname_id {
            Some(id) => id.to_string(),
            None => format!("{}|{}|{}", raw.name, raw.lat, raw.lng),
        };
        let timezone = raw
            .timezone
            .and_then(|tz| tz.time_zone_id)
            .unwrap_or_else(|| "UTC".to_string());

        City {
            id: CityId(id),
            name: raw.name,
            country: raw.country_name,
            latitude: raw.lat,
            longitude: raw.lng,
            timezone,
        }
    }
}

/// GeoNames sends coordinates as strings; accept plain numbers too.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
