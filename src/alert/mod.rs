pub mod dispatcher;
pub mod engine;
pub mod locks;
pub mod rules;
pub mod sink;
pub mod summary;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::Severity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    CriticalStock,
    DelayedShipment,
}

impl AlertType {
    pub const ALL: [AlertType; 3] = [
        AlertType::CriticalStock,
        AlertType::LowStock,
        AlertType::DelayedShipment,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::LowStock => "low_stock",
            Self::CriticalStock => "critical_stock",
            Self::DelayedShipment => "delayed_shipment",
        }
    }
}

impl Display for AlertType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown alert type: {0}")]
pub struct AlertTypeParseError(pub String);

impl FromStr for AlertType {
    type Err = AlertTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "low_stock" => Ok(Self::LowStock),
            "critical_stock" => Ok(Self::CriticalStock),
            "delayed_shipment" => Ok(Self::DelayedShipment),
            _ => Err(AlertTypeParseError(s.to_string())),
        }
    }
}

/// Deduplication key: at most one unresolved alert exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertKey {
    pub product_id: String,
    pub alert_type: AlertType,
}

impl AlertKey {
    pub fn new(product_id: impl Into<String>, alert_type: AlertType) -> Self {
        Self {
            product_id: product_id.into(),
            alert_type,
        }
    }
}

impl Display for AlertKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.product_id, self.alert_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub product_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn key(&self) -> AlertKey {
        AlertKey::new(self.product_id.clone(), self.alert_type)
    }

    pub fn is_active(&self) -> bool {
        !self.resolved
    }
}

/// Fields of an alert about to be inserted; the store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAlert {
    pub product_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
}

/// Structured body handed to notification channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub alert_id: i64,
    pub product_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl AlertPayload {
    /// Stable per alert identity, so downstream consumers can drop redeliveries.
    pub fn dedup_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.product_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.alert_type.as_slug().as_bytes());
        hasher.update(b"|");
        hasher.update(self.alert_id.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl From<&Alert> for AlertPayload {
    fn from(alert: &Alert) -> Self {
        Self {
            alert_id: alert.id,
            product_id: alert.product_id.clone(),
            alert_type: alert.alert_type,
            severity: alert.severity,
            message: alert.message.clone(),
            created_at: alert.created_at,
        }
    }
}
