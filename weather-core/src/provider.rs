use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{fmt::Debug, time::Duration};
use url::Url;

use crate::{
    error::WeatherError,
    model::{Forecast, WeatherSnapshot},
};

pub mod open_meteo;

const USER_AGENT: &str = concat!("weather-core/", env!("CARGO_PKG_VERSION"));

/// Whether a current-weather call may be answered from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    UseCache,
    /// Skip the cache read; the fresh result is still stored.
    Refresh,
}

#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch_current(
        &self,
        city: &str,
        policy: CachePolicy,
    ) -> Result<WeatherSnapshot, WeatherError>;

    async fn fetch_forecast(&self, city: &str) -> Result<Forecast, WeatherError>;
}

/// HTTP client shared by the lookup and weather clients.
pub fn http_client(timeout: Duration) -> Result<Client, WeatherError> {
    let client = Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?;
    Ok(client)
}

/// `{base}/{path}`, tolerating a trailing slash on `base`.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url, WeatherError> {
    let url = Url::parse(&format!("{}/{}", base.trim_end_matches('/'), path))?;
    Ok(url)
}

/// GET `url` and decode the JSON body into `T`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: Url,
) -> Result<T, WeatherError> {
    tracing::debug!(%url, "GET");

    let res = http.get(url).send().await?;

    let status = res.status();
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "request failed");
        return Err(WeatherError::ServerError(status.as_u16()));
    }

    let body = res.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(WeatherError::NoData);
    }

    Ok(serde_json::from_slice(&body)?)
}
