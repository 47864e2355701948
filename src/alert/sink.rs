use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::alert::AlertPayload;
use crate::error::{EngineError, EngineResult};

/// A pluggable, independently failable notification target.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        attributes: &BTreeMap<String, String>,
    ) -> EngineResult<()>;
}

fn describe(payload: &[u8]) -> String {
    match serde_json::from_slice::<AlertPayload>(payload) {
        Ok(alert) => format!("[{}] {}: {}", alert.severity, alert.product_id, alert.message),
        Err(_) => String::from_utf8_lossy(payload).into_owned(),
    }
}

/// Structured log record; also the dispatcher's fallback.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        attributes: &BTreeMap<String, String>,
    ) -> EngineResult<()> {
        info!(
            target: "supply_guardian::alerts",
            topic,
            severity = attributes.get("severity").map(String::as_str).unwrap_or("-"),
            alert_type = attributes.get("alert_type").map(String::as_str).unwrap_or("-"),
            dedup_key = attributes.get("dedup_key").map(String::as_str).unwrap_or("-"),
            "{}",
            describe(payload)
        );
        Ok(())
    }
}

pub struct StdoutChannel;

#[async_trait]
impl NotificationChannel for StdoutChannel {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn publish(
        &self,
        _topic: &str,
        payload: &[u8],
        _attributes: &BTreeMap<String, String>,
    ) -> EngineResult<()> {
        println!("ALERT {}", describe(payload));
        Ok(())
    }
}

/// Publishes over HTTP. Discord webhooks get a `content` message; any other
/// endpoint receives the `{topic, attributes, data}` envelope.
pub struct WebhookChannel {
    client: Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> EngineResult<Self> {
        let client = Client::builder()
            .user_agent("supply-guardian/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::dispatch("webhook", e))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn is_discord(&self) -> bool {
        self.url.contains("discord.com/api/webhooks")
            || self.url.contains("discordapp.com/api/webhooks")
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        attributes: &BTreeMap<String, String>,
    ) -> EngineResult<()> {
        let body = if self.is_discord() {
            serde_json::json!({ "content": describe(payload) })
        } else {
            let data = serde_json::from_slice::<serde_json::Value>(payload)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(payload).into_owned()));
            serde_json::json!({
                "topic": topic,
                "attributes": attributes,
                "data": data,
            })
        };

        self.client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| EngineError::dispatch(self.name(), e))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{describe, NotificationChannel};
    use crate::alert::{AlertPayload, AlertType};
    use crate::error::{EngineError, EngineResult};
    use crate::types::Severity;

    /// Records every publish; optionally fails them all.
    #[derive(Default)]
    pub struct RecordingChannel {
        pub fail: bool,
        pub published: Mutex<Vec<(String, AlertPayload, BTreeMap<String, String>)>>,
    }

    impl RecordingChannel {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn count(&self) -> usize {
            self.published.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            if self.fail {
                "broken"
            } else {
                "recording"
            }
        }

        async fn publish(
            &self,
            topic: &str,
            payload: &[u8],
            attributes: &BTreeMap<String, String>,
        ) -> EngineResult<()> {
            if self.fail {
                return Err(EngineError::dispatch(self.name(), "connection refused"));
            }
            let decoded: AlertPayload = serde_json::from_slice(payload)?;
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), decoded, attributes.clone()));
            Ok(())
        }
    }

    #[test]
    fn describes_alert_payloads_and_raw_bytes() {
        let payload = AlertPayload {
            alert_id: 3,
            product_id: "CHIP-X".to_string(),
            alert_type: AlertType::CriticalStock,
            severity: Severity::High,
            message: "X-Series Microchip is OUT OF STOCK! Immediate action required.".to_string(),
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&payload).unwrap();
        assert_eq!(
            describe(&bytes),
            "[High] CHIP-X: X-Series Microchip is OUT OF STOCK! Immediate action required."
        );
        assert_eq!(describe(b"plain text"), "plain text");
    }
}
