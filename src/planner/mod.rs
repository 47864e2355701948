pub mod delay;
pub mod reorder;
pub mod resilience;

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Severity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelayPrediction {
    pub shipment_id: i64,
    pub product_id: String,
    pub origin: String,
    pub destination: String,
    pub expected_date: DateTime<Utc>,
    pub predicted_delay_days: u32,
    pub risk_level: Severity,
    pub risk_factors: Vec<String>,
    pub confidence: f64,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReorderRecommendation {
    pub product_id: String,
    pub product_name: String,
    pub current_stock: u32,
    pub reorder_threshold: u32,
    pub normal_lead_time_days: u32,
    pub adjusted_lead_time_days: u32,
    pub days_until_stockout: u32,
    pub urgency: Severity,
    pub reorder_now: bool,
    pub recommended_quantity: u32,
    pub reasoning: String,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthBand {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "At Risk")]
    AtRisk,
}

impl HealthBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Excellent,
            60..=79 => Self::Good,
            40..=59 => Self::Fair,
            _ => Self::AtRisk,
        }
    }
}

impl Display for HealthBand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::AtRisk => "At Risk",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryBreakdown {
    pub total: usize,
    pub critical: usize,
    pub low: usize,
    pub ok: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationRisk {
    pub location: String,
    pub risk_level: Severity,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResilienceScore {
    pub score: u8,
    pub health_band: HealthBand,
    pub inventory_breakdown: InventoryBreakdown,
    pub active_alerts: usize,
    pub high_risk_locations: Vec<LocationRisk>,
    pub assessed_at: DateTime<Utc>,
}
