use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::HazardConfig;
use crate::error::{EngineError, EngineResult};
use crate::hazard::cache::AssessmentCache;
use crate::hazard::http::OpenWeatherProvider;
use crate::hazard::synthetic::SyntheticProvider;
use crate::hazard::{
    CurrentConditions, DataSource, ForecastDay, HazardProvider, RiskAssessment, RiskTable,
};
use crate::types::Severity;

/// Thresholds and increments used to turn raw conditions into a risk level
/// and a delay estimate.
#[derive(Debug, Clone)]
pub struct HazardRules {
    pub severe_conditions: Vec<String>,
    pub adverse_conditions: Vec<String>,
    pub forecast_severe_conditions: Vec<String>,
    pub adverse_wind_threshold: f64,
    pub wind_threshold: f64,
    pub severe_delay_days: u32,
    pub adverse_delay_days: u32,
    pub forecast_delay_days: u32,
}

impl Default for HazardRules {
    fn default() -> Self {
        Self::from(&HazardConfig::default())
    }
}

impl From<&HazardConfig> for HazardRules {
    fn from(config: &HazardConfig) -> Self {
        let lower = |items: &[String]| {
            items
                .iter()
                .map(|c| c.trim().to_ascii_lowercase())
                .collect::<Vec<_>>()
        };
        Self {
            severe_conditions: lower(&config.severe_conditions),
            adverse_conditions: lower(&config.adverse_conditions),
            forecast_severe_conditions: lower(&config.forecast_severe_conditions),
            adverse_wind_threshold: config.adverse_wind_threshold,
            wind_threshold: config.wind_threshold,
            severe_delay_days: config.severe_delay_days,
            adverse_delay_days: config.adverse_delay_days,
            forecast_delay_days: config.forecast_delay_days,
        }
    }
}

fn condition_in(condition: &str, set: &[String]) -> bool {
    let lowered = condition.trim().to_ascii_lowercase();
    set.iter().any(|c| *c == lowered)
}

/// Classifies current conditions and forecast into a [`RiskAssessment`].
///
/// The current-condition rules are exclusive and checked from most to least
/// severe. Every forecast day with a severe condition adds its own delay and
/// lifts the level to at least `Medium`.
pub fn classify(
    location: &str,
    current: &CurrentConditions,
    forecast: &[ForecastDay],
    rules: &HazardRules,
    source: DataSource,
) -> RiskAssessment {
    let mut assessment = RiskAssessment::clear(location, source);

    if condition_in(&current.condition, &rules.severe_conditions) {
        assessment.add_factor(
            Severity::High,
            rules.severe_delay_days,
            format!("Severe weather: {}", current.description),
        );
    } else if condition_in(&current.condition, &rules.adverse_conditions)
        && current.wind_speed > rules.adverse_wind_threshold
    {
        assessment.add_factor(
            Severity::Medium,
            rules.adverse_delay_days,
            format!("Adverse conditions: {}", current.description),
        );
    } else if current.wind_speed > rules.wind_threshold {
        assessment.add_factor(
            Severity::Medium,
            rules.adverse_delay_days,
            format!("High winds: {} m/s", current.wind_speed),
        );
    }

    for day in forecast {
        if condition_in(&day.condition, &rules.forecast_severe_conditions) {
            assessment.add_factor(
                Severity::Medium,
                rules.forecast_delay_days,
                format!("Upcoming: {} on {}", day.description, day.date),
            );
        }
    }

    assessment
}

/// Queries a hazard provider for a location and converts the answer into a
/// normalized risk assessment. Provider failures and timeouts fall back to
/// [`SyntheticProvider`] data; `assess` itself never fails.
pub struct HazardAssessor {
    provider: Arc<dyn HazardProvider>,
    fallback: SyntheticProvider,
    rules: HazardRules,
    timeout: Duration,
    forecast_days: u32,
    cache: AssessmentCache,
}

impl HazardAssessor {
    pub fn new(provider: Arc<dyn HazardProvider>, rules: HazardRules) -> Self {
        Self {
            provider,
            fallback: SyntheticProvider,
            rules,
            timeout: Duration::from_secs(10),
            forecast_days: 7,
            cache: AssessmentCache::new(Duration::ZERO),
        }
    }

    /// Builds the live provider when a key is configured, synthetic otherwise.
    pub fn from_config(config: &HazardConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let provider: Arc<dyn HazardProvider> = if config.live_enabled() {
            match OpenWeatherProvider::new(&config.base_url, &config.api_key, timeout) {
                Ok(provider) => Arc::new(provider),
                Err(err) => {
                    warn!("hazard provider unavailable, using synthetic data: {err}");
                    Arc::new(SyntheticProvider)
                }
            }
        } else {
            Arc::new(SyntheticProvider)
        };
        Self::new(provider, HazardRules::from(config))
            .with_timeout(timeout)
            .with_forecast_days(config.forecast_days)
            .with_cache_ttl(Duration::from_secs(config.cache_ttl_secs))
    }

    pub fn offline() -> Self {
        Self::new(Arc::new(SyntheticProvider), HazardRules::default())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_forecast_days(mut self, days: u32) -> Self {
        self.forecast_days = days;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = AssessmentCache::new(ttl);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn assess(&self, location: &str) -> RiskAssessment {
        if let Some(cached) = self.cache.get(location) {
            debug!(location, "hazard assessment served from cache");
            return cached;
        }

        match self.fetch_live(location).await {
            Ok((current, forecast)) => {
                let assessment = classify(
                    location,
                    &current,
                    &forecast,
                    &self.rules,
                    self.provider.source(),
                );
                debug!(
                    location,
                    level = %assessment.risk_level,
                    delay = assessment.delay_estimate_days,
                    "hazard assessment"
                );
                self.cache.put(assessment.clone());
                assessment
            }
            Err(err) => {
                warn!(location, provider = self.provider.name(), "{err}; using synthetic data");
                self.fallback_assessment(location)
            }
        }
    }

    /// Deterministic assessment from synthetic data, tagged as a fallback.
    pub fn fallback_assessment(&self, location: &str) -> RiskAssessment {
        let current = self.fallback.conditions_for(location);
        let forecast = self.fallback.forecast_for(location, self.forecast_days);
        classify(location, &current, &forecast, &self.rules, DataSource::Fallback)
    }

    async fn fetch_live(
        &self,
        location: &str,
    ) -> EngineResult<(CurrentConditions, Vec<ForecastDay>)> {
        let lookup = async {
            tokio::try_join!(
                self.provider.current_conditions(location),
                self.provider.forecast(location, self.forecast_days),
            )
        };
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::hazard(
                location,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Assesses every distinct non-empty location, at most `concurrency` at
    /// a time. Locations whose task fails get a fallback assessment.
    pub async fn assess_many<I, S>(self: &Arc<Self>, locations: I, concurrency: usize) -> RiskTable
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique = locations
            .into_iter()
            .map(Into::into)
            .filter(|l: &String| !l.trim().is_empty())
            .collect::<BTreeSet<_>>();

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for location in unique.iter().cloned() {
            let assessor = Arc::clone(self);
            let permits = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                assessor.assess(&location).await
            });
        }

        let mut table = RiskTable::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(assessment) => table.insert(assessment),
                Err(err) => warn!("hazard assessment task failed: {err}"),
            }
        }
        for location in &unique {
            if !table.contains(location) {
                table.insert(self.fallback_assessment(location));
            }
        }
        table
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{classify, HazardAssessor, HazardRules};
    use crate::error::{EngineError, EngineResult};
    use crate::hazard::{CurrentConditions, DataSource, ForecastDay, HazardProvider};
    use crate::types::Severity;

    pub(crate) fn conditions(condition: &str, wind_speed: f64) -> CurrentConditions {
        CurrentConditions {
            location: "test".to_string(),
            condition: condition.to_string(),
            description: condition.to_ascii_lowercase(),
            wind_speed,
            temperature: None,
            humidity: None,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn day(condition: &str) -> ForecastDay {
        ForecastDay {
            date: "2026-10-20".to_string(),
            condition: condition.to_string(),
            description: condition.to_ascii_lowercase(),
            wind_speed: 3.0,
            temperature: None,
        }
    }

    /// Scripted provider: fixed answers per location, errors for unknown ones.
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        pub current: HashMap<String, CurrentConditions>,
        pub forecast: HashMap<String, Vec<ForecastDay>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub(crate) fn with(mut self, location: &str, current: CurrentConditions, days: Vec<ForecastDay>) -> Self {
            self.current.insert(location.to_string(), current);
            self.forecast.insert(location.to_string(), days);
            self
        }
    }

    #[async_trait]
    impl HazardProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn current_conditions(&self, location: &str) -> EngineResult<CurrentConditions> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.current
                .get(location)
                .cloned()
                .ok_or_else(|| EngineError::hazard(location, "401 unauthorized"))
        }

        async fn forecast(&self, location: &str, _days: u32) -> EngineResult<Vec<ForecastDay>> {
            self.forecast
                .get(location)
                .cloned()
                .ok_or_else(|| EngineError::hazard(location, "401 unauthorized"))
        }
    }

    pub(crate) struct UnreachableProvider;

    #[async_trait]
    impl HazardProvider for UnreachableProvider {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn current_conditions(&self, location: &str) -> EngineResult<CurrentConditions> {
            Err(EngineError::hazard(location, "connection refused"))
        }

        async fn forecast(&self, location: &str, _days: u32) -> EngineResult<Vec<ForecastDay>> {
            Err(EngineError::hazard(location, "connection refused"))
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl HazardProvider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn current_conditions(&self, _location: &str) -> EngineResult<CurrentConditions> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("timeout should fire first")
        }

        async fn forecast(&self, _location: &str, _days: u32) -> EngineResult<Vec<ForecastDay>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("timeout should fire first")
        }
    }

    #[test]
    fn severe_current_condition_is_high_with_base_delay() {
        let rules = HazardRules::default();
        let out = classify(
            "Florida",
            &conditions("Thunderstorm", 18.0),
            &[],
            &rules,
            DataSource::Live,
        );
        assert_eq!(out.risk_level, Severity::High);
        assert_eq!(out.delay_estimate_days, 3);
        assert_eq!(out.factors, vec!["Severe weather: thunderstorm".to_string()]);
    }

    #[test]
    fn adverse_precipitation_needs_wind() {
        let rules = HazardRules::default();
        let calm = classify("Kochi", &conditions("Rain", 8.0), &[], &rules, DataSource::Live);
        assert_eq!(calm.risk_level, Severity::Low);
        assert_eq!(calm.delay_estimate_days, 0);

        let windy = classify("Kochi", &conditions("Rain", 12.0), &[], &rules, DataSource::Live);
        assert_eq!(windy.risk_level, Severity::Medium);
        assert_eq!(windy.delay_estimate_days, 1);
    }

    #[test]
    fn wind_alone_above_threshold_is_medium() {
        let rules = HazardRules::default();
        let out = classify("Coast", &conditions("Clear", 16.0), &[], &rules, DataSource::Live);
        assert_eq!(out.risk_level, Severity::Medium);
        assert_eq!(out.delay_estimate_days, 1);
        assert!(out.factors[0].starts_with("High winds"));
    }

    #[test]
    fn forecast_storms_accumulate_delay() {
        let rules = HazardRules::default();
        let forecast = vec![day("Clear"), day("Snow"), day("Hurricane")];
        let out = classify("Port", &conditions("Clear", 2.0), &forecast, &rules, DataSource::Live);
        assert_eq!(out.risk_level, Severity::Medium);
        assert_eq!(out.delay_estimate_days, 4);
        assert_eq!(out.factors.len(), 2);

        let with_storm = classify(
            "Port",
            &conditions("Tornado", 2.0),
            &forecast,
            &rules,
            DataSource::Live,
        );
        assert_eq!(with_storm.risk_level, Severity::High);
        assert_eq!(with_storm.delay_estimate_days, 7);
    }

    #[test]
    fn delay_never_decreases_as_forecast_grows() {
        let rules = HazardRules::default();
        let pattern = ["Snow", "Clear", "Thunderstorm", "Rain", "Hurricane", "Clouds"];
        let mut forecast = Vec::new();
        let mut previous = 0;
        for condition in pattern {
            forecast.push(day(condition));
            let out = classify("X", &conditions("Rain", 11.0), &forecast, &rules, DataSource::Live);
            assert!(out.delay_estimate_days >= previous);
            previous = out.delay_estimate_days;
        }
        assert_eq!(previous, 1 + 3 * 2);
    }

    #[tokio::test]
    async fn unreachable_provider_falls_back_to_synthetic() {
        let assessor = HazardAssessor::new(Arc::new(UnreachableProvider), HazardRules::default());
        let out = assessor.assess("Florida, USA").await;
        assert_eq!(out.source, DataSource::Fallback);
        assert_eq!(out.risk_level, Severity::High);
        assert!(out.used_fallback());
    }

    #[tokio::test]
    async fn hanging_provider_times_out_to_fallback() {
        let assessor = HazardAssessor::new(Arc::new(HangingProvider), HazardRules::default())
            .with_timeout(Duration::from_millis(50));
        let out = assessor.assess("Texas").await;
        assert_eq!(out.source, DataSource::Fallback);
        assert_eq!(out.delay_estimate_days, 0);
    }

    #[tokio::test]
    async fn live_results_are_cached_within_ttl() {
        let provider = Arc::new(ScriptedProvider::default().with(
            "Kochi",
            conditions("Thunderstorm", 5.0),
            vec![],
        ));
        let assessor = HazardAssessor::new(provider.clone(), HazardRules::default())
            .with_cache_ttl(Duration::from_secs(60));
        let first = assessor.assess("Kochi").await;
        let second = assessor.assess("Kochi").await;
        assert_eq!(first.delay_estimate_days, second.delay_estimate_days);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn assess_many_dedupes_and_skips_blank_locations() {
        let assessor = Arc::new(HazardAssessor::offline());
        let table = assessor
            .assess_many(
                vec!["Kochi, India", "Kochi, India", "", "Texas, USA"],
                2,
            )
            .await;
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Kochi, India").unwrap().risk_level, Severity::Medium);
        assert_eq!(table.get("Kochi, India").unwrap().source, DataSource::Synthetic);
        assert!(table.fallback_locations().is_empty());
    }
}
