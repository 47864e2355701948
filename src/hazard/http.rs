use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};
use crate::hazard::{CurrentConditions, ForecastDay, HazardProvider};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const FORECAST_SLOTS_PER_DAY: usize = 8;

/// OpenWeatherMap-compatible provider (`/weather` and `/forecast`).
pub struct OpenWeatherProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> EngineResult<Self> {
        let client = Client::builder()
            .user_agent("supply-guardian/0.1")
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .map_err(|e| EngineError::hazard("*", e))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn fetch_json(&self, location: &str, path: &str, extra: &[(&str, String)]) -> EngineResult<Value> {
        let url = format!("{}/{path}", self.base_url);
        let mut query = vec![
            ("q", city_of(location).to_string()),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ];
        query.extend(extra.iter().map(|(k, v)| (*k, v.clone())));

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| EngineError::hazard(location, format!("failed GET {url}: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::hazard(location, format!("failed reading body: {e}")))?;
        if !status.is_success() {
            let preview: String = body.chars().take(180).collect();
            return Err(EngineError::hazard(
                location,
                format!("GET {url} returned {status}: {preview}"),
            ));
        }
        serde_json::from_str(&body)
            .map_err(|e| EngineError::hazard(location, format!("invalid JSON response: {e}")))
    }
}

#[async_trait]
impl HazardProvider for OpenWeatherProvider {
    fn name(&self) -> &str {
        "openweather"
    }

    async fn current_conditions(&self, location: &str) -> EngineResult<CurrentConditions> {
        let payload = self.fetch_json(location, "weather", &[]).await?;
        parse_current(location, &payload)
    }

    async fn forecast(&self, location: &str, days: u32) -> EngineResult<Vec<ForecastDay>> {
        let count = (days as usize).saturating_mul(FORECAST_SLOTS_PER_DAY);
        let payload = self
            .fetch_json(location, "forecast", &[("cnt", count.to_string())])
            .await?;
        parse_forecast(location, &payload)
    }
}

/// The provider is queried by city name; "Kochi, India" becomes "Kochi".
pub fn city_of(location: &str) -> &str {
    location.split(',').next().unwrap_or(location).trim()
}

pub fn parse_current(location: &str, payload: &Value) -> EngineResult<CurrentConditions> {
    let object = payload
        .as_object()
        .ok_or_else(|| EngineError::hazard(location, "conditions payload is not an object"))?;
    let condition = string_from_paths(object, &["weather.0.main", "condition"])
        .ok_or_else(|| EngineError::hazard(location, "conditions payload has no condition"))?;
    Ok(CurrentConditions {
        location: location.to_string(),
        description: string_from_paths(object, &["weather.0.description", "description"])
            .unwrap_or_else(|| condition.clone()),
        condition,
        wind_speed: number_from_paths(object, &["wind.speed", "wind_speed"]).unwrap_or(0.0),
        temperature: number_from_paths(object, &["main.temp", "temperature"]),
        humidity: number_from_paths(object, &["main.humidity", "humidity"]),
        timestamp: Utc::now(),
    })
}

pub fn parse_forecast(location: &str, payload: &Value) -> EngineResult<Vec<ForecastDay>> {
    let entries = payload
        .as_object()
        .and_then(|object| object_get_case_insensitive(object, "list"))
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::hazard(location, "forecast payload has no list"))?;

    let mut out = Vec::new();
    for entry in entries.iter().step_by(FORECAST_SLOTS_PER_DAY) {
        let Some(object) = entry.as_object() else {
            continue;
        };
        let Some(condition) = string_from_paths(object, &["weather.0.main", "condition"]) else {
            continue;
        };
        let date = string_from_paths(object, &["dt_txt", "date"])
            .map(|raw| raw.split_whitespace().next().unwrap_or_default().to_string())
            .unwrap_or_default();
        out.push(ForecastDay {
            date,
            description: string_from_paths(object, &["weather.0.description", "description"])
                .unwrap_or_else(|| condition.clone()),
            condition,
            wind_speed: number_from_paths(object, &["wind.speed", "wind_speed"]).unwrap_or(0.0),
            temperature: number_from_paths(object, &["main.temp", "temperature"]),
        });
    }
    Ok(out)
}

pub(crate) fn string_from_paths(object: &Map<String, Value>, paths: &[&str]) -> Option<String> {
    for path in paths {
        let Some(value) = object_path_value(object, path) else {
            continue;
        };
        match value {
            Value::String(s) => {
                if !s.trim().is_empty() {
                    return Some(s.trim().to_string());
                }
            }
            Value::Number(n) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn number_from_paths(object: &Map<String, Value>, paths: &[&str]) -> Option<f64> {
    for path in paths {
        let Some(value) = object_path_value(object, path) else {
            continue;
        };
        if let Some(number) = to_f64(value) {
            return Some(number);
        }
    }
    None
}

/// Dotted path lookup; numeric segments index into arrays (`weather.0.main`).
fn object_path_value<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = object_get_case_insensitive(object, first)?;
    for segment in segments {
        current = match current {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(nested) => object_get_case_insensitive(nested, segment)?,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn object_get_case_insensitive<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
