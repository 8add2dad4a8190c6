//! Fetch-cycle coordination and presentational state.
//!
//! Each [`WeatherViewModel::request_weather`] call starts a new cycle with a
//! monotonically increasing token. A cycle commits its result only if its
//! token is still the latest one, so a superseded fetch can never overwrite
//! newer state.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    error::WeatherError,
    model::{ForecastEntry, TemperatureUnit, WeatherSnapshot, format_temperature},
    provider::{CachePolicy, WeatherSource},
};

const DEFAULT_DESCRIPTION: &str = "—";
const DEFAULT_ICON: &str = "cloud";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

impl Phase {
    pub fn is_settled(self) -> bool {
        matches!(self, Phase::Loaded | Phase::Failed)
    }
}

/// Observable state. Snapshot and forecast survive a failed cycle.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub cycle: u64,
    pub phase: Phase,
    pub city: Option<String>,
    pub snapshot: Option<WeatherSnapshot>,
    pub forecast: Vec<ForecastEntry>,
    pub error: Option<String>,
}

impl ViewState {
    pub fn temperature(&self, unit: TemperatureUnit) -> Option<f64> {
        self.snapshot.as_ref().map(|s| unit.convert(s.main.temp))
    }

    pub fn feels_like(&self, unit: TemperatureUnit) -> Option<f64> {
        self.snapshot.as_ref().map(|s| unit.convert(s.main.feels_like))
    }

    pub fn temperature_display(&self, unit: TemperatureUnit) -> Option<String> {
        self.snapshot.as_ref().map(|s| format_temperature(s.main.temp, unit))
    }

    pub fn feels_like_display(&self, unit: TemperatureUnit) -> Option<String> {
        self.snapshot.as_ref().map(|s| format_temperature(s.main.feels_like, unit))
    }

    pub fn description(&self) -> &str {
        self.snapshot
            .as_ref()
            .and_then(|s| s.primary_condition())
            .map_or(DEFAULT_DESCRIPTION, |c| c.description.as_str())
    }

    pub fn icon(&self) -> &str {
        self.snapshot
            .as_ref()
            .and_then(|s| s.primary_condition())
            .map_or(DEFAULT_ICON, |c| c.icon.as_str())
    }
}

#[derive(Debug)]
pub struct WeatherViewModel {
    source: Arc<dyn WeatherSource>,
    state: Arc<watch::Sender<ViewState>>,
    cycle: Arc<AtomicU64>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    use_metric: AtomicBool,
}

impl WeatherViewModel {
    pub fn new(source: Arc<dyn WeatherSource>, use_metric: bool) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            source,
            state: Arc::new(state),
            cycle: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(None),
            use_metric: AtomicBool::new(use_metric),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn use_metric(&self) -> bool {
        self.use_metric.load(Ordering::Relaxed)
    }

    pub fn set_use_metric(&self, use_metric: bool) {
        self.use_metric.store(use_metric, Ordering::Relaxed);
    }

    pub fn unit(&self) -> TemperatureUnit {
        TemperatureUnit::from_metric_preference(self.use_metric())
    }

    /// Start a fetch cycle for `city`, superseding any cycle in flight.
    ///
    /// Must be called from within a Tokio runtime. Returns the cycle token.
    pub fn request_weather(&self, city: &str) -> u64 {
        let mut token = 0;
        self.state.send_modify(|s| {
            token = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
            s.cycle = token;
            s.phase = Phase::Loading;
            s.city = Some(city.to_string());
            s.error = None;
        });

        let task = tokio::spawn(run_cycle(
            self.source.clone(),
            self.state.clone(),
            self.cycle.clone(),
            token,
            city.to_string(),
        ));

        if let Some(previous) = self.in_flight.lock().replace(task) {
            previous.abort();
        }

        tracing::debug!(city, token, "weather cycle started");
        token
    }

    /// Wait until the latest cycle has finished, returning the settled state.
    pub async fn settled(&self) -> ViewState {
        let mut rx = self.subscribe();
        let latest = self.cycle.load(Ordering::SeqCst);
        let settled = match rx
            .wait_for(|s| s.cycle == latest && (s.phase.is_settled() || latest == 0))
            .await
        {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so this only happens mid-drop.
            Err(_) => self.state(),
        };
        settled
    }

    pub fn temperature(&self) -> Option<f64> {
        self.state.borrow().temperature(self.unit())
    }

    pub fn feels_like(&self) -> Option<f64> {
        self.state.borrow().feels_like(self.unit())
    }

    pub fn temperature_display(&self) -> Option<String> {
        self.state.borrow().temperature_display(self.unit())
    }

    pub fn feels_like_display(&self) -> Option<String> {
        self.state.borrow().feels_like_display(self.unit())
    }

    pub fn description(&self) -> String {
        self.state.borrow().description().to_string()
    }

    pub fn icon(&self) -> String {
        self.state.borrow().icon().to_string()
    }
}

impl Drop for WeatherViewModel {
    fn drop(&mut self) {
        if let Some(task) = self.in_flight.lock().take() {
            task.abort();
        }
    }
}

type CycleResult = Result<(WeatherSnapshot, Vec<ForecastEntry>), WeatherError>;

async fn run_cycle(
    source: Arc<dyn WeatherSource>,
    state: Arc<watch::Sender<ViewState>>,
    cycle: Arc<AtomicU64>,
    token: u64,
    city: String,
) {
    let result = tokio::try_join!(
        source.fetch_current(&city, CachePolicy::UseCache),
        source.fetch_forecast(&city),
    )
    .map(|(snapshot, forecast)| (snapshot, forecast.entries));

    commit(&state, &cycle, token, result);
}

/// Apply a cycle's result if `token` is still the latest cycle.
fn commit(
    state: &watch::Sender<ViewState>,
    cycle: &AtomicU64,
    token: u64,
    result: CycleResult,
) -> bool {
    // The token comparison runs under the store's write lock, the same lock
    // `request_weather` holds while bumping the counter.
    let committed = state.send_if_modified(|s| {
        if cycle.load(Ordering::SeqCst) != token {
            return false;
        }
        match &result {
            Ok((snapshot, forecast)) => {
                s.snapshot = Some(snapshot.clone());
                s.forecast = forecast.clone();
                s.error = None;
                s.phase = Phase::Loaded;
            }
            Err(err) => {
                s.error = Some(err.user_message());
                s.phase = Phase::Failed;
            }
        }
        true
    });

    match (&result, committed) {
        (_, false) => tracing::debug!(token, "discarding result of superseded cycle"),
        (Ok(_), true) => tracing::info!(token, "weather cycle loaded"),
        (Err(err), true) => tracing::warn!(token, error = %err, "weather cycle failed"),
    }
    committed
}
