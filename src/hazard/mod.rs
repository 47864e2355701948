pub mod assessor;
pub mod cache;
pub mod events;
pub mod http;
pub mod news;
pub mod synthetic;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::types::Severity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentConditions {
    pub location: String,
    pub condition: String,
    pub description: String,
    pub wind_speed: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastDay {
    pub date: String,
    pub condition: String,
    pub description: String,
    pub wind_speed: f64,
    pub temperature: Option<f64>,
}

/// Where the conditions behind an assessment came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    /// Provider configured as synthetic (offline mode).
    Synthetic,
    /// Provider failed or timed out and synthetic data was substituted.
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub location: String,
    pub risk_level: Severity,
    pub delay_estimate_days: u32,
    pub factors: Vec<String>,
    pub assessed_at: DateTime<Utc>,
    pub source: DataSource,
}

impl RiskAssessment {
    pub fn clear(location: impl Into<String>, source: DataSource) -> Self {
        Self {
            location: location.into(),
            risk_level: Severity::Low,
            delay_estimate_days: 0,
            factors: Vec::new(),
            assessed_at: Utc::now(),
            source,
        }
    }

    pub fn used_fallback(&self) -> bool {
        self.source == DataSource::Fallback
    }

    /// Records a contributing factor. Delay only accumulates and the level
    /// only rises, so later factors never reduce an earlier estimate.
    pub fn add_factor(&mut self, level: Severity, delay_days: u32, factor: impl Into<String>) {
        self.risk_level = self.risk_level.at_least(level);
        self.delay_estimate_days = self.delay_estimate_days.saturating_add(delay_days);
        self.factors.push(factor.into());
    }
}

/// External source of current and forecast disruptive conditions.
#[async_trait]
pub trait HazardProvider: Send + Sync {
    fn name(&self) -> &str;
    fn source(&self) -> DataSource {
        DataSource::Live
    }
    async fn current_conditions(&self, location: &str) -> EngineResult<CurrentConditions>;
    async fn forecast(&self, location: &str, days: u32) -> EngineResult<Vec<ForecastDay>>;
}

/// Per-scan snapshot of location risk, keyed by location string as it
/// appears on products and shipments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskTable {
    entries: BTreeMap<String, RiskAssessment>,
}

impl RiskTable {
    pub fn insert(&mut self, assessment: RiskAssessment) {
        self.entries.insert(assessment.location.clone(), assessment);
    }

    pub fn get(&self, location: &str) -> Option<&RiskAssessment> {
        self.entries.get(location)
    }

    /// Assessment for `location`, or a clear one when the location was never
    /// assessed (empty location strings on a product, for instance).
    pub fn get_or_clear(&self, location: &str) -> RiskAssessment {
        self.get(location)
            .cloned()
            .unwrap_or_else(|| RiskAssessment::clear(location, DataSource::Synthetic))
    }

    pub fn contains(&self, location: &str) -> bool {
        self.entries.contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RiskAssessment> {
        self.entries.values()
    }

    pub fn fallback_locations(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|a| a.used_fallback())
            .map(|a| a.location.clone())
            .collect()
    }
}

impl FromIterator<RiskAssessment> for RiskTable {
    fn from_iter<T: IntoIterator<Item = RiskAssessment>>(iter: T) -> Self {
        let mut table = RiskTable::default();
        for assessment in iter {
            table.insert(assessment);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::{DataSource, RiskAssessment, RiskTable};
    use crate::types::Severity;

    #[test]
    fn factors_only_raise_level_and_delay() {
        let mut assessment = RiskAssessment::clear("Florida", DataSource::Live);
        assessment.add_factor(Severity::High, 3, "Severe weather: thunderstorm");
        assessment.add_factor(Severity::Medium, 2, "Upcoming: snow");
        assert_eq!(assessment.risk_level, Severity::High);
        assert_eq!(assessment.delay_estimate_days, 5);
        assert_eq!(assessment.factors.len(), 2);
    }

    #[test]
    fn table_reports_fallback_locations() {
        let table: RiskTable = vec![
            RiskAssessment::clear("Mumbai", DataSource::Live),
            RiskAssessment::clear("Kochi", DataSource::Fallback),
        ]
        .into_iter()
        .collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.fallback_locations(), vec!["Kochi".to_string()]);
        assert_eq!(table.get_or_clear("Nowhere").delay_estimate_days, 0);
    }
}
