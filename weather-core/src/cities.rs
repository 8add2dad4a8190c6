//! Lookup table from city display names to coordinates.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::{City, Coordinates};

const PRESET: &[(&str, f64, f64)] = &[
    ("London", 51.5074, -0.1278),
    ("Paris", 48.8566, 2.3522),
    ("Tokyo", 35.6762, 139.6503),
    ("New York", 40.7128, -74.0060),
    ("Sydney", -33.8688, 151.2093),
    ("Berlin", 52.5200, 13.4050),
    ("Dubai", 25.2048, 55.2708),
    ("Singapore", 1.3521, 103.8198),
    ("Los Angeles", 34.0522, -118.2437),
    ("Rome", 41.9028, 12.4964),
    ("Toronto", 43.6532, -79.3832),
    ("Moscow", 55.7558, 37.6173),
    ("Cairo", 30.0444, 31.2357),
    ("Mumbai", 19.0760, 72.8777),
    ("Rio de Janeiro", -22.9068, -43.1729),
];

#[derive(Debug, Default)]
pub struct CityTable {
    entries: RwLock<HashMap<String, Coordinates>>,
}

impl CityTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table seeded with the built-in demo cities.
    pub fn preset() -> Self {
        let entries = PRESET
            .iter()
            .map(|(name, lat, lon)| (name.to_string(), Coordinates::new(*lat, *lon)))
            .collect();
        Self { entries: RwLock::new(entries) }
    }

    pub fn insert(&self, name: impl Into<String>, coordinates: Coordinates) {
        self.entries.write().insert(name.into(), coordinates);
    }

    /// Make a geocoded city resolvable by its plain name.
    pub fn register(&self, city: &City) {
        self.insert(city.name.clone(), city.coordinates());
    }

    /// Canonical display name and coordinates for `name`.
    ///
    /// Exact display-name match first, then case-insensitive.
    pub fn resolve(&self, name: &str) -> Option<(String, Coordinates)> {
        let entries = self.entries.read();
        entries
            .get_key_value(name)
            .or_else(|| entries.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)))
            .map(|(key, coords)| (key.clone(), *coords))
    }

    /// Known names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CityId;

    #[test]
    fn preset_resolves_known_cities() {
        let table = CityTable::preset();
        let (name, tokyo) = table.resolve("Tokyo").expect("Tokyo is preset");
        assert_eq!(name, "Tokyo");
        assert!((tokyo.latitude - 35.6762).abs() < 1e-9);

        let (name, _) = table.resolve("new york").expect("case-insensitive match");
        assert_eq!(name, "New York");
        assert!(table.resolve("Atlantis").is_none());
    }

    #[test]
    fn register_makes_city_resolvable() {
        let table = CityTable::empty();
        let city = City {
            id: CityId("1".into()),
            name: "Reykjavik".into(),
            country: "Iceland".into(),
            latitude: 64.1466,
            longitude: -21.9426,
            timezone: "Atlantic/Reykjavik".into(),
        };
        table.register(&city);
        assert_eq!(
            table.resolve("reykjavik"),
            Some(("Reykjavik".to_string(), city.coordinates()))
        );
        assert_eq!(table.names(), vec!["Reykjavik".to_string()]);
    }
}
