use anyhow::{Context, bail};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Select, Text};
use std::sync::Arc;

use weather_core::{
    City, CityLookup, CityTable, Config, ForecastEntry, OpenMeteoClient, Phase,
    ViewState, WeatherViewModel, format_temperature,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Units {
    Metric,
    Imperial,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the GeoNames account and display units.
    Configure,

    /// Show current weather and the next 24 hours for a city.
    Show {
        /// City name, e.g. "Tokyo" or any name `weather search` can find.
        city: String,
    },

    /// Search for cities by name.
    Search {
        query: String,
    },

    /// List the built-in cities.
    Cities,

    /// Persist the preferred temperature units.
    Units {
        #[arg(value_enum)]
        units: Units,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => configure(&mut config)?,
            Command::Show { city } => show(&config, &city).await?,
            Command::Search { query } => search(&config, &query).await?,
            Command::Cities => {
                for name in CityTable::preset().names() {
                    println!("{name}");
                }
            }
            Command::Units { units } => {
                config.set_use_metric(matches!(units, Units::Metric));
                config.save()?;
                println!("Units set to {units:?}.");
            }
        }

        Ok(())
    }
}

fn configure(config: &mut Config) -> anyhow::Result<()> {
    let mut prompt = Text::new("GeoNames username:")
        .with_help_message("Free account at https://www.geonames.org/login");
    if let Some(current) = config.geocoding.username.as_deref() {
        prompt = prompt.with_default(current);
    }
    let username = prompt.prompt().context("Failed to read GeoNames username")?;
    if username.trim().is_empty() {
        bail!("GeoNames username must not be empty");
    }
    config.set_geonames_username(username.trim().to_string());

    let units = Select::new("Temperature units:", vec!["Metric (°C)", "Imperial (°F)"])
        .with_starting_cursor(if config.preferences.use_metric { 0 } else { 1 })
        .prompt()
        .context("Failed to read units")?;
    config.set_use_metric(units.starts_with("Metric"));

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn search(config: &Config, query: &str) -> anyhow::Result<()> {
    let lookup = CityLookup::new(config)?;
    let cities = lookup.search_cities(query).await?;

    if cities.is_empty() {
        println!("No cities found for '{query}'.");
        return Ok(());
    }

    for city in cities.iter() {
        println!(
            "{:<40} {:>9.4} {:>10.4}  {}",
            city.full_name(),
            city.latitude,
            city.longitude,
            city.timezone
        );
    }
    Ok(())
}

/// First search hit for `name`, if a GeoNames account is configured.
async fn geocode(config: &Config, name: &str) -> anyhow::Result<Option<City>> {
    if config.geonames_username().is_err() {
        return Ok(None);
    }
    let lookup = CityLookup::new(config)?;
    let cities = lookup.search_cities(name).await?;
    Ok(cities.first().cloned())
}

async fn show(config: &Config, city: &str) -> anyhow::Result<()> {
    let cities = Arc::new(CityTable::preset());
    let name = match cities.resolve(city) {
        Some((name, _)) => name,
        None => match geocode(config, city).await? {
            Some(found) => {
                tracing::debug!(city = %found.full_name(), "resolved via search");
                cities.register(&found);
                found.name
            }
            None => {
                tracing::debug!(city, "no geocoding match");
                city.to_string()
            }
        },
    };

    let client = OpenMeteoClient::new(config, cities)?;
    let vm = WeatherViewModel::new(Arc::new(client), config.preferences.use_metric);

    vm.request_weather(&name);
    let state = vm.settled().await;

    if state.phase == Phase::Failed {
        bail!(state.error.unwrap_or_else(|| "Weather request failed".to_string()));
    }

    print_state(&vm, &state);
    Ok(())
}

fn print_state(vm: &WeatherViewModel, state: &ViewState) {
    let unit = vm.unit();
    let name = state.city.as_deref().unwrap_or_default();

    println!("{name}: {} [{}]", vm.description(), vm.icon());
    if let (Some(temp), Some(feels)) = (vm.temperature_display(), vm.feels_like_display()) {
        println!("  Temperature: {temp} (feels like {feels})");
    }
    if let Some(wind) = state.snapshot.as_ref().and_then(|s| s.wind) {
        println!("  Wind: {:.0} km/h from {:.0}°", wind.speed_kmh, wind.direction_deg);
    }

    if state.forecast.is_empty() {
        return;
    }
    println!("  Next 24 hours:");
    for entry in &state.forecast {
        println!(
            "    {}  {:>6}  {:>3}%  {}",
            format_time(entry),
            format_temperature(entry.main.temp, unit),
            entry.precipitation_probability(),
            entry.conditions.first().map_or("", |c| c.description.as_str()),
        );
    }
}

fn format_time(entry: &ForecastEntry) -> String {
    match entry.time() {
        Some(t) => t.with_timezone(&Local).format("%a %H:%M").to_string(),
        None => entry.timestamp.to_string(),
    }
}
