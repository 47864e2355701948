use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EventsConfig;
use crate::error::{EngineError, EngineResult};
use crate::hazard::news::NewsApiProvider;
use crate::hazard::DataSource;
use crate::types::Severity;

/// A headline as returned by a news feed, before grading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplyChainEvent {
    pub title: String,
    pub description: String,
    pub source: String,
    pub severity: Severity,
    pub published_at: DateTime<Utc>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDigest {
    pub provider: String,
    pub source: DataSource,
    pub fetched_at: DateTime<Utc>,
    pub events: Vec<SupplyChainEvent>,
}

impl EventDigest {
    pub fn count_at_least(&self, floor: Severity) -> usize {
        self.events.iter().filter(|e| e.severity >= floor).count()
    }
}

#[async_trait]
pub trait EventProvider: Send + Sync {
    fn name(&self) -> &str;
    fn source(&self) -> DataSource {
        DataSource::Live
    }
    async fn recent_articles(&self, search_terms: &[String]) -> EngineResult<Vec<NewsArticle>>;
}

/// Fixed headlines used offline and whenever the live feed fails.
pub struct SyntheticEventProvider;

impl SyntheticEventProvider {
    pub fn articles(&self) -> Vec<NewsArticle> {
        let now = Utc::now();
        vec![
            NewsArticle {
                title: "Cyclone Approaching Indian West Coast - Port Operations Suspended"
                    .to_string(),
                description:
                    "Major ports in Mumbai and Kochi suspend operations due to severe cyclone warning."
                        .to_string(),
                source: "Global Logistics News".to_string(),
                published_at: now,
                url: None,
            },
            NewsArticle {
                title: "Semiconductor Demand Surges in Q4".to_string(),
                description:
                    "AI chip manufacturers report record orders, leading to supply constraints."
                        .to_string(),
                source: "Tech Industry Today".to_string(),
                published_at: now - chrono::Duration::days(1),
                url: None,
            },
            NewsArticle {
                title: "Port Workers Strike in Southeast Asia Ports".to_string(),
                description:
                    "Labor disputes cause delays in Ho Chi Minh City and Bangkok shipping hubs."
                        .to_string(),
                source: "Maritime News".to_string(),
                published_at: now - chrono::Duration::days(2),
                url: None,
            },
        ]
    }
}

#[async_trait]
impl EventProvider for SyntheticEventProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    async fn recent_articles(&self, _search_terms: &[String]) -> EngineResult<Vec<NewsArticle>> {
        Ok(self.articles())
    }
}

/// Keyword lists used to grade a headline. Matching is case-insensitive on
/// the title only; the high list is checked first.
#[derive(Debug, Clone)]
pub struct EventKeywords {
    pub high: Vec<String>,
    pub medium: Vec<String>,
}

impl Default for EventKeywords {
    fn default() -> Self {
        Self::from(&EventsConfig::default())
    }
}

impl From<&EventsConfig> for EventKeywords {
    fn from(config: &EventsConfig) -> Self {
        let lower = |items: &[String]| {
            items
                .iter()
                .map(|k| k.trim().to_ascii_lowercase())
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            high: lower(&config.high_keywords),
            medium: lower(&config.medium_keywords),
        }
    }
}

pub fn classify_headline(title: &str, keywords: &EventKeywords) -> Severity {
    let lowered = title.to_ascii_lowercase();
    let mentions = |words: &[String]| words.iter().any(|w| lowered.contains(w.as_str()));
    if mentions(&keywords.high) {
        Severity::High
    } else if mentions(&keywords.medium) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

pub fn grade(article: NewsArticle, keywords: &EventKeywords) -> SupplyChainEvent {
    SupplyChainEvent {
        severity: classify_headline(&article.title, keywords),
        title: article.title,
        description: article.description,
        source: article.source,
        published_at: article.published_at,
        url: article.url,
    }
}

/// Fetches and grades supply-chain headlines. Like hazard assessment, a
/// failing or slow provider is replaced by the synthetic headlines.
pub struct EventFeed {
    provider: Arc<dyn EventProvider>,
    fallback: SyntheticEventProvider,
    keywords: EventKeywords,
    search_terms: Vec<String>,
    timeout: Duration,
}

impl EventFeed {
    pub fn new(provider: Arc<dyn EventProvider>, keywords: EventKeywords) -> Self {
        Self {
            provider,
            fallback: SyntheticEventProvider,
            keywords,
            search_terms: EventsConfig::default().search_terms,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &EventsConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let provider: Arc<dyn EventProvider> = if config.live_enabled() {
            match NewsApiProvider::new(&config.base_url, &config.api_key, config.page_size, timeout)
            {
                Ok(provider) => Arc::new(provider),
                Err(err) => {
                    warn!("news provider unavailable, using built-in headlines: {err}");
                    Arc::new(SyntheticEventProvider)
                }
            }
        } else {
            Arc::new(SyntheticEventProvider)
        };
        Self::new(provider, EventKeywords::from(config))
            .with_search_terms(config.search_terms.clone())
            .with_timeout(timeout)
    }

    pub fn offline() -> Self {
        Self::new(Arc::new(SyntheticEventProvider), EventKeywords::default())
    }

    pub fn with_search_terms(mut self, terms: Vec<String>) -> Self {
        self.search_terms = terms;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Graded events, most severe first; ties keep feed order.
    pub async fn digest(&self) -> EventDigest {
        let (articles, source) = match self.fetch().await {
            Ok(articles) => (articles, self.provider.source()),
            Err(err) => {
                warn!(provider = self.provider.name(), "{err}; using built-in headlines");
                (self.fallback.articles(), DataSource::Fallback)
            }
        };
        let mut events = articles
            .into_iter()
            .map(|a| grade(a, &self.keywords))
            .collect::<Vec<_>>();
        events.sort_by(|a, b| b.severity.cmp(&a.severity));
        debug!(count = events.len(), "supply chain events graded");
        EventDigest {
            provider: self.provider.name().to_string(),
            source,
            fetched_at: Utc::now(),
            events,
        }
    }

    async fn fetch(&self) -> EngineResult<Vec<NewsArticle>> {
        match tokio::time::timeout(self.timeout, self.provider.recent_articles(&self.search_terms))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(EngineError::hazard(
                "news feed",
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{
        classify_headline, EventFeed, EventKeywords, EventProvider, NewsArticle,
        SyntheticEventProvider,
    };
    use crate::config::EventsConfig;
    use crate::error::{EngineError, EngineResult};
    use crate::hazard::DataSource;
    use crate::types::Severity;

    struct DownFeed;

    #[async_trait]
    impl EventProvider for DownFeed {
        fn name(&self) -> &str {
            "down"
        }

        async fn recent_articles(&self, _terms: &[String]) -> EngineResult<Vec<NewsArticle>> {
            Err(EngineError::hazard("news feed", "connection refused"))
        }
    }

    struct StalledFeed;

    #[async_trait]
    impl EventProvider for StalledFeed {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn recent_articles(&self, _terms: &[String]) -> EngineResult<Vec<NewsArticle>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn grades_headlines_by_keyword() {
        let keywords = EventKeywords::default();
        assert_eq!(
            classify_headline("Hurricane forces Gulf terminal SHUTDOWN", &keywords),
            Severity::High
        );
        assert_eq!(
            classify_headline("Congestion builds at Rotterdam", &keywords),
            Severity::Medium
        );
        assert_eq!(
            classify_headline("Strike warning at Felixstowe", &keywords),
            Severity::High
        );
        assert_eq!(
            classify_headline("Chip demand surges", &keywords),
            Severity::Low
        );
    }

    #[test]
    fn keywords_follow_config() {
        let config = EventsConfig {
            high_keywords: vec![" Embargo ".to_string()],
            medium_keywords: Vec::new(),
            ..EventsConfig::default()
        };
        let keywords = EventKeywords::from(&config);
        assert_eq!(classify_headline("New embargo announced", &keywords), Severity::High);
        assert_eq!(classify_headline("Cyclone nears coast", &keywords), Severity::Low);
    }

    #[tokio::test]
    async fn synthetic_digest_orders_by_severity() {
        let digest = EventFeed::offline().digest().await;
        assert_eq!(digest.source, DataSource::Synthetic);
        assert_eq!(digest.events.len(), 3);
        assert_eq!(digest.count_at_least(Severity::High), 2);
        assert!(digest.events[0].title.starts_with("Cyclone"));
        assert!(digest.events[1].title.starts_with("Port Workers Strike"));
        assert_eq!(digest.events[2].severity, Severity::Low);
    }

    #[tokio::test]
    async fn failing_feed_falls_back_to_built_in_headlines() {
        let feed = EventFeed::new(Arc::new(DownFeed), EventKeywords::default());
        let digest = feed.digest().await;
        assert_eq!(digest.source, DataSource::Fallback);
        assert_eq!(digest.provider, "down");
        assert_eq!(digest.events.len(), SyntheticEventProvider.articles().len());
    }

    #[tokio::test]
    async fn stalled_feed_times_out_to_fallback() {
        let feed = EventFeed::new(Arc::new(StalledFeed), EventKeywords::default())
            .with_timeout(Duration::from_millis(20));
        let digest = feed.digest().await;
        assert_eq!(digest.source, DataSource::Fallback);
        assert_eq!(digest.count_at_least(Severity::Low), 3);
    }
}
