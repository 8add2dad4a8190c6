use thiserror::Error;

/// Underlying cause of a [`WeatherError::Network`] failure.
#[derive(Debug, Error)]
pub enum NetworkCause {
    /// Connection, TLS, timeout or other transport-level failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The body arrived but was not the JSON shape we expected.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors surfaced by the lookup and weather clients.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("no coordinates known for city '{0}'")]
    InvalidCoordinates(String),

    #[error("server responded with HTTP {0}")]
    ServerError(u16),

    #[error("network error: {0}")]
    Network(#[from] NetworkCause),

    #[error("response contained no data")]
    NoData,

    #[error("inconsistent response: {0}")]
    Decoding(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        WeatherError::Network(NetworkCause::Transport(err))
    }
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        WeatherError::Network(NetworkCause::Decode(err))
    }
}

impl WeatherError {
    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            WeatherError::InvalidUrl(_) | WeatherError::Config(_) => {
                "Weather service is misconfigured.".to_string()
            }
            WeatherError::InvalidCoordinates(city) => format!("Unknown city: {city}."),
            WeatherError::ServerError(code) => {
                format!("Weather service unavailable (HTTP {code}). Try again later.")
            }
            WeatherError::Network(NetworkCause::Transport(e)) if e.is_timeout() => {
                "The request timed out. Check your connection.".to_string()
            }
            WeatherError::Network(NetworkCause::Transport(_)) => {
                "Network error. Check your connection.".to_string()
            }
            WeatherError::Network(NetworkCause::Decode(_))
            | WeatherError::NoData
            | WeatherError::Decoding(_) => "Received unexpected weather data.".to_string(),
        }
    }
}
