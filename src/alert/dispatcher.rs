use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::alert::sink::{LogChannel, NotificationChannel, StdoutChannel, WebhookChannel};
use crate::alert::AlertPayload;
use crate::config::AlertsConfig;
use crate::error::EngineResult;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChannelFailure {
    pub channel: String,
    pub reason: String,
}

/// Outcome of one best-effort delivery across every configured channel.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DispatchResult {
    pub delivered: Vec<String>,
    pub failed: Vec<ChannelFailure>,
    pub used_fallback: bool,
}

impl DispatchResult {
    pub fn delivered_any(&self) -> bool {
        !self.delivered.is_empty()
    }
}

pub struct NotificationDispatcher {
    topic: String,
    channels: Vec<Arc<dyn NotificationChannel>>,
    fallback: LogChannel,
}

impl NotificationDispatcher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            channels: Vec::new(),
            fallback: LogChannel,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Builds the channel list in a fixed order: log, stdout, webhook.
    pub fn from_config(config: &AlertsConfig) -> EngineResult<Self> {
        let mut dispatcher = Self::new(config.publish_topic.clone());
        if config.enable_log {
            dispatcher = dispatcher.with_channel(Arc::new(LogChannel));
        }
        if config.enable_stdout {
            dispatcher = dispatcher.with_channel(Arc::new(StdoutChannel));
        }
        let webhook = config.webhook_url.trim();
        if !webhook.is_empty() {
            dispatcher =
                dispatcher.with_channel(Arc::new(WebhookChannel::new(webhook, WEBHOOK_TIMEOUT)?));
        }
        Ok(dispatcher)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn attributes(payload: &AlertPayload) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("severity".to_string(), payload.severity.to_string()),
            ("alert_type".to_string(), payload.alert_type.as_slug().to_string()),
            ("product_id".to_string(), payload.product_id.clone()),
            ("dedup_key".to_string(), payload.dedup_key()),
        ])
    }

    /// Attempts every channel in order. A failing channel is logged and
    /// recorded; the rest are still tried. With no channels configured the
    /// alert goes to the log.
    pub async fn dispatch(&self, payload: &AlertPayload) -> DispatchResult {
        let mut result = DispatchResult::default();
        let attributes = Self::attributes(payload);
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(alert_id = payload.alert_id, error = %e, "failed to encode alert payload");
                result.failed.push(ChannelFailure {
                    channel: "encode".to_string(),
                    reason: e.to_string(),
                });
                return result;
            }
        };

        if self.channels.is_empty() {
            result.used_fallback = true;
            if self.fallback.publish(&self.topic, &body, &attributes).await.is_ok() {
                result.delivered.push(self.fallback.name().to_string());
            }
            return result;
        }

        for channel in &self.channels {
            match channel.publish(&self.topic, &body, &attributes).await {
                Ok(()) => {
                    debug!(channel = channel.name(), alert_id = payload.alert_id, "alert published");
                    result.delivered.push(channel.name().to_string());
                }
                Err(e) => {
                    warn!(channel = channel.name(), alert_id = payload.alert_id, error = %e, "alert dispatch failed");
                    result.failed.push(ChannelFailure {
                        channel: channel.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        result
    }
}
