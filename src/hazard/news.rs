use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::hazard::events::{EventProvider, NewsArticle};
use crate::hazard::http::{object_get_case_insensitive, string_from_paths};

const FEED: &str = "news feed";

/// NewsAPI-compatible provider (`/everything`).
pub struct NewsApiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
}

impl NewsApiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        page_size: u32,
        timeout: Duration,
    ) -> EngineResult<Self> {
        let client = Client::builder()
            .user_agent("supply-guardian/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::hazard(FEED, e))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            page_size: page_size.max(1),
        })
    }
}

#[async_trait]
impl EventProvider for NewsApiProvider {
    fn name(&self) -> &str {
        "newsapi"
    }

    async fn recent_articles(&self, search_terms: &[String]) -> EngineResult<Vec<NewsArticle>> {
        let url = format!("{}/everything", self.base_url);
        let query = [
            ("q", search_terms.join(" OR ")),
            ("apiKey", self.api_key.clone()),
            ("language", "en".to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| EngineError::hazard(FEED, format!("failed GET {url}: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::hazard(FEED, format!("failed reading body: {e}")))?;
        if !status.is_success() {
            let preview: String = body.chars().take(180).collect();
            return Err(EngineError::hazard(
                FEED,
                format!("GET {url} returned {status}: {preview}"),
            ));
        }
        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| EngineError::hazard(FEED, format!("invalid JSON response: {e}")))?;
        parse_articles(&payload)
    }
}

/// Articles without a title are skipped; a missing or unparseable
/// `publishedAt` is stamped with the current time.
pub fn parse_articles(payload: &Value) -> EngineResult<Vec<NewsArticle>> {
    let entries = payload
        .as_object()
        .and_then(|object| object_get_case_insensitive(object, "articles"))
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::hazard(FEED, "payload has no articles"))?;

    let mut out = Vec::new();
    for entry in entries {
        let Some(object) = entry.as_object() else {
            continue;
        };
        let Some(title) = string_from_paths(object, &["title"]) else {
            continue;
        };
        let published_at = string_from_paths(object, &["publishedAt", "published_at"])
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        out.push(NewsArticle {
            title,
            description: string_from_paths(object, &["description"]).unwrap_or_default(),
            source: string_from_paths(object, &["source.name", "source"])
                .unwrap_or_else(|| "unknown".to_string()),
            published_at,
            url: string_from_paths(object, &["url"]),
        });
    }
    Ok(out)
}
