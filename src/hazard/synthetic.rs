use async_trait::async_trait;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;

use crate::error::EngineResult;
use crate::hazard::{CurrentConditions, DataSource, ForecastDay, HazardProvider};

struct SyntheticConditions {
    key: &'static str,
    temperature: f64,
    condition: &'static str,
    description: &'static str,
    wind_speed: f64,
}

static SYNTHETIC_CONDITIONS: Lazy<Vec<SyntheticConditions>> = Lazy::new(|| {
    vec![
        SyntheticConditions {
            key: "mumbai",
            temperature: 32.0,
            condition: "Clear",
            description: "clear sky",
            wind_speed: 5.0,
        },
        SyntheticConditions {
            key: "kochi",
            temperature: 28.0,
            condition: "Rain",
            description: "heavy intensity rain",
            wind_speed: 12.0,
        },
        SyntheticConditions {
            key: "ho chi minh",
            temperature: 30.0,
            condition: "Clouds",
            description: "scattered clouds",
            wind_speed: 7.0,
        },
        SyntheticConditions {
            key: "california",
            temperature: 22.0,
            condition: "Clear",
            description: "clear sky",
            wind_speed: 4.0,
        },
        SyntheticConditions {
            key: "florida",
            temperature: 27.0,
            condition: "Thunderstorm",
            description: "thunderstorm",
            wind_speed: 18.0,
        },
        SyntheticConditions {
            key: "texas",
            temperature: 35.0,
            condition: "Clear",
            description: "extreme heat",
            wind_speed: 8.0,
        },
    ]
});

/// Deterministic location-keyed conditions used in offline mode and as the
/// fallback whenever the live provider cannot answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticProvider;

impl SyntheticProvider {
    pub fn conditions_for(&self, location: &str) -> CurrentConditions {
        let lowered = location.to_ascii_lowercase();
        let matched = SYNTHETIC_CONDITIONS
            .iter()
            .find(|entry| lowered.contains(entry.key));
        let (temperature, condition, description, wind_speed, humidity) = match matched {
            Some(entry) => (
                entry.temperature,
                entry.condition,
                entry.description,
                entry.wind_speed,
                65.0,
            ),
            None => (25.0, "Clear", "clear sky", 5.0, 60.0),
        };
        CurrentConditions {
            location: location.to_string(),
            condition: condition.to_string(),
            description: description.to_string(),
            wind_speed,
            temperature: Some(temperature),
            humidity: Some(humidity),
            timestamp: Utc::now(),
        }
    }

    pub fn forecast_for(&self, _location: &str, days: u32) -> Vec<ForecastDay> {
        let today = Utc::now().date_naive();
        (0..days)
            .map(|i| {
                let rainy = i % 3 == 0;
                ForecastDay {
                    date: (today + Duration::days(i64::from(i)))
                        .format("%Y-%m-%d")
                        .to_string(),
                    condition: if rainy { "Rain" } else { "Clear" }.to_string(),
                    description: if rainy { "light rain" } else { "clear sky" }.to_string(),
                    wind_speed: 5.0 + f64::from(i % 3),
                    temperature: Some(25.0 + f64::from(i % 5)),
                }
            })
            .collect()
    }
}

#[async_trait]
impl HazardProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    async fn current_conditions(&self, location: &str) -> EngineResult<CurrentConditions> {
        Ok(self.conditions_for(location))
    }

    async fn forecast(&self, location: &str, days: u32) -> EngineResult<Vec<ForecastDay>> {
        Ok(self.forecast_for(location, days))
    }
}
