use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::Severity;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub hazard: HazardConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HazardProviderKind {
    Openweather,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardConfig {
    #[serde(default = "default_provider")]
    pub provider: HazardProviderKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_severe_conditions")]
    pub severe_conditions: Vec<String>,
    #[serde(default = "default_adverse_conditions")]
    pub adverse_conditions: Vec<String>,
    #[serde(default = "default_forecast_severe_conditions")]
    pub forecast_severe_conditions: Vec<String>,
    #[serde(default = "default_adverse_wind_threshold")]
    pub adverse_wind_threshold: f64,
    #[serde(default = "default_wind_threshold")]
    pub wind_threshold: f64,
    #[serde(default = "default_severe_delay_days")]
    pub severe_delay_days: u32,
    #[serde(default = "default_adverse_delay_days")]
    pub adverse_delay_days: u32,
    #[serde(default = "default_forecast_delay_days")]
    pub forecast_delay_days: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventProviderKind {
    Newsapi,
    Synthetic,
}

/// Supply-chain news feed. Headlines are graded by keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_event_provider")]
    pub provider: EventProviderKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_news_page_size")]
    pub page_size: u32,
    #[serde(default = "default_news_search_terms")]
    pub search_terms: Vec<String>,
    #[serde(default = "default_high_event_keywords")]
    pub high_keywords: Vec<String>,
    #[serde(default = "default_medium_event_keywords")]
    pub medium_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_shipment_delay_alert_days")]
    pub shipment_delay_alert_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_safety_margin")]
    pub safety_margin: u32,
    #[serde(default = "default_consumption_rate")]
    pub consumption_rate: u32,
    #[serde(default = "default_urgency_window_days")]
    pub urgency_window_days: u32,
    #[serde(default = "default_min_order_quantity")]
    pub min_order_quantity: u32,
    #[serde(default = "default_high_risk_confidence")]
    pub high_risk_confidence: f64,
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
    #[serde(default = "default_true")]
    pub enable_log: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_publish_topic")]
    pub publish_topic: String,
    #[serde(default = "default_notify_min_severity")]
    pub notify_min_severity: Severity,
    #[serde(default)]
    pub strict_invariants: bool,
    #[serde(default)]
    pub rules: AlertRulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRulesConfig {
    #[serde(default = "default_true")]
    pub low_stock: bool,
    #[serde(default = "default_true")]
    pub critical_stock: bool,
    #[serde(default = "default_true")]
    pub delayed_shipment: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub offline: bool,
    pub weather_api_key: Option<String>,
    pub news_api_key: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/supply-guardian/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(key) = overrides.weather_api_key {
            if self.hazard.api_key.trim().is_empty() {
                self.hazard.api_key = key;
            }
        }
        if let Some(key) = overrides.news_api_key {
            if self.events.api_key.trim().is_empty() {
                self.events.api_key = key;
            }
        }
        if overrides.offline {
            self.hazard.provider = HazardProviderKind::Synthetic;
            self.events.provider = EventProviderKind::Synthetic;
        }
    }

    /// Picks up `WEATHER_API_KEY` and `NEWS_API_KEY` when the file leaves
    /// the keys empty.
    pub fn env_overrides() -> ConfigOverrides {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        ConfigOverrides {
            weather_api_key: non_empty("WEATHER_API_KEY"),
            news_api_key: non_empty("NEWS_API_KEY"),
            ..ConfigOverrides::default()
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn default_template() -> String {
        let template = r#"[storage]
db_path = "~/.local/share/supply-guardian/guardian.db"

[hazard]
# "openweather" falls back to synthetic data when the key is missing or the API fails
provider = "openweather"
api_key = ""
base_url = "https://api.openweathermap.org/data/2.5"
timeout_secs = 10
forecast_days = 7
cache_ttl_secs = 600
severe_conditions = ["thunderstorm", "tornado", "hurricane"]
adverse_conditions = ["rain", "snow", "drizzle"]
forecast_severe_conditions = ["thunderstorm", "snow", "hurricane"]
adverse_wind_threshold = 10.0
wind_threshold = 15.0
severe_delay_days = 3
adverse_delay_days = 1
forecast_delay_days = 2

[scan]
concurrency = 4
interval_secs = 300
shipment_delay_alert_days = 3

[planner]
safety_margin = 5
consumption_rate = 2
urgency_window_days = 7
min_order_quantity = 50
high_risk_confidence = 0.85
default_confidence = 0.7

[events]
# "newsapi" falls back to the built-in headlines when the key is missing or the API fails
provider = "newsapi"
api_key = ""
base_url = "https://newsapi.org/v2"
timeout_secs = 10
page_size = 10
search_terms = ["supply chain", "port strike", "shipping delay", "logistics"]
high_keywords = ["cyclone", "hurricane", "strike", "shutdown"]
medium_keywords = ["delay", "warning", "congestion"]

[alerts]
enable_stdout = true
enable_log = true
webhook_url = ""
publish_topic = "supply-chain-alerts"
notify_min_severity = "high"
strict_invariants = false

[alerts.rules]
low_stock = true
critical_stock = true
delayed_shipment = true
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl HazardConfig {
    /// Live lookups need both the openweather provider and a key.
    pub fn live_enabled(&self) -> bool {
        self.provider == HazardProviderKind::Openweather && !self.api_key.trim().is_empty()
    }
}

impl EventsConfig {
    pub fn live_enabled(&self) -> bool {
        self.provider == EventProviderKind::Newsapi && !self.api_key.trim().is_empty()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            base_url: default_weather_base_url(),
            timeout_secs: default_timeout_secs(),
            forecast_days: default_forecast_days(),
            cache_ttl_secs: default_cache_ttl_secs(),
            severe_conditions: default_severe_conditions(),
            adverse_conditions: default_adverse_conditions(),
            forecast_severe_conditions: default_forecast_severe_conditions(),
            adverse_wind_threshold: default_adverse_wind_threshold(),
            wind_threshold: default_wind_threshold(),
            severe_delay_days: default_severe_delay_days(),
            adverse_delay_days: default_adverse_delay_days(),
            forecast_delay_days: default_forecast_delay_days(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            provider: default_event_provider(),
            api_key: String::new(),
            base_url: default_news_base_url(),
            timeout_secs: default_timeout_secs(),
            page_size: default_news_page_size(),
            search_terms: default_news_search_terms(),
            high_keywords: default_high_event_keywords(),
            medium_keywords: default_medium_event_keywords(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            interval_secs: default_interval_secs(),
            shipment_delay_alert_days: default_shipment_delay_alert_days(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            safety_margin: default_safety_margin(),
            consumption_rate: default_consumption_rate(),
            urgency_window_days: default_urgency_window_days(),
            min_order_quantity: default_min_order_quantity(),
            high_risk_confidence: default_high_risk_confidence(),
            default_confidence: default_confidence(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            enable_log: true,
            webhook_url: String::new(),
            publish_topic: default_publish_topic(),
            notify_min_severity: default_notify_min_severity(),
            strict_invariants: false,
            rules: AlertRulesConfig::default(),
        }
    }
}

impl Default for AlertRulesConfig {
    fn default() -> Self {
        Self {
            low_stock: true,
            critical_stock: true,
            delayed_shipment: true,
        }
    }
}

fn default_db_path() -> String {
    "~/.local/share/supply-guardian/guardian.db".to_string()
}

fn default_provider() -> HazardProviderKind {
    HazardProviderKind::Openweather
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_forecast_days() -> u32 {
    7
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_severe_conditions() -> Vec<String> {
    vec![
        "thunderstorm".to_string(),
        "tornado".to_string(),
        "hurricane".to_string(),
    ]
}

fn default_adverse_conditions() -> Vec<String> {
    vec!["rain".to_string(), "snow".to_string(), "drizzle".to_string()]
}

fn default_forecast_severe_conditions() -> Vec<String> {
    vec![
        "thunderstorm".to_string(),
        "snow".to_string(),
        "hurricane".to_string(),
    ]
}

fn default_adverse_wind_threshold() -> f64 {
    10.0
}

fn default_wind_threshold() -> f64 {
    15.0
}

fn default_severe_delay_days() -> u32 {
    3
}

fn default_adverse_delay_days() -> u32 {
    1
}

fn default_forecast_delay_days() -> u32 {
    2
}

fn default_event_provider() -> EventProviderKind {
    EventProviderKind::Newsapi
}

fn default_news_base_url() -> String {
    "https://newsapi.org/v2".to_string()
}

fn default_news_page_size() -> u32 {
    10
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_news_search_terms() -> Vec<String> {
    to_strings(&["supply chain", "port strike", "shipping delay", "logistics"])
}

fn default_high_event_keywords() -> Vec<String> {
    to_strings(&["cyclone", "hurricane", "strike", "shutdown"])
}

fn default_medium_event_keywords() -> Vec<String> {
    to_strings(&["delay", "warning", "congestion"])
}

fn default_concurrency() -> usize {
    4
}

fn default_interval_secs() -> u64 {
    300
}

fn default_shipment_delay_alert_days() -> u32 {
    3
}

fn default_safety_margin() -> u32 {
    5
}

fn default_consumption_rate() -> u32 {
    2
}

fn default_urgency_window_days() -> u32 {
    7
}

fn default_min_order_quantity() -> u32 {
    50
}

fn default_high_risk_confidence() -> f64 {
    0.85
}

fn default_confidence() -> f64 {
    0.7
}

fn default_publish_topic() -> String {
    "supply-chain-alerts".to_string()
}

fn default_notify_min_severity() -> Severity {
    Severity::High
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigOverrides, EventProviderKind, HazardProviderKind};
    use crate::types::Severity;

    #[test]
    fn template_round_trips_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).expect("template parses");
        let defaults = Config::default();
        assert_eq!(parsed.scan.concurrency, defaults.scan.concurrency);
        assert_eq!(parsed.hazard.severe_conditions, defaults.hazard.severe_conditions);
        assert_eq!(parsed.alerts.notify_min_severity, Severity::High);
        assert_eq!(parsed.planner.min_order_quantity, 50);
        assert_eq!(parsed.events.high_keywords, defaults.events.high_keywords);
        assert_eq!(parsed.events.search_terms.len(), 4);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let parsed: Config = toml::from_str("").expect("empty config parses");
        assert_eq!(parsed.hazard.provider, HazardProviderKind::Openweather);
        assert!(!parsed.hazard.live_enabled());
        assert!(parsed.alerts.rules.delayed_shipment);
    }

    #[test]
    fn overrides_force_offline_and_fill_missing_key() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            db_path: Some("/tmp/guardian.db".to_string()),
            offline: false,
            weather_api_key: Some("k".to_string()),
            news_api_key: Some("n".to_string()),
        });
        assert!(config.events.live_enabled());
        assert!(config.hazard.live_enabled());
        config.apply_overrides(ConfigOverrides {
            offline: true,
            ..ConfigOverrides::default()
        });
        assert!(!config.hazard.live_enabled());
        assert_eq!(config.events.provider, EventProviderKind::Synthetic);
        assert!(!config.events.live_enabled());
        assert_eq!(config.storage.db_path, "/tmp/guardian.db");
    }

    #[test]
    fn notify_level_accepts_lowercase_and_critical() {
        for (raw, expected) in [
            ("critical", Severity::High),
            ("high", Severity::High),
            ("High", Severity::High),
            ("medium", Severity::Medium),
            ("low", Severity::Low),
        ] {
            let parsed: Config =
                toml::from_str(&format!("[alerts]\nnotify_min_severity = \"{raw}\"\n"))
                    .expect("notify level parses");
            assert_eq!(parsed.alerts.notify_min_severity, expected, "{raw}");
        }
        assert!(toml::from_str::<Config>("[alerts]\nnotify_min_severity = \"severe\"\n").is_err());
    }
}
