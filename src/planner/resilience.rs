use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::alert::Alert;
use crate::hazard::assessor::HazardAssessor;
use crate::hazard::RiskTable;
use crate::inventory::{Product, StockStatus};
use crate::planner::{HealthBand, InventoryBreakdown, LocationRisk, ResilienceScore};
use crate::types::Severity;

const CRITICAL_PENALTY: i64 = 15;
const LOW_PENALTY: i64 = 5;
const RISKY_LOCATION_PENALTY: i64 = 10;
const ACTIVE_ALERT_PENALTY: i64 = 5;

pub struct ResilienceScorer {
    assessor: Arc<HazardAssessor>,
    concurrency: usize,
}

impl ResilienceScorer {
    pub fn new(assessor: Arc<HazardAssessor>, concurrency: usize) -> Self {
        Self {
            assessor,
            concurrency,
        }
    }

    pub async fn score(&self, products: &[Product], alerts: &[Alert]) -> ResilienceScore {
        let locations = products
            .iter()
            .map(|p| p.supplier_location.clone())
            .collect::<Vec<_>>();
        let risks = self.assessor.assess_many(locations, self.concurrency).await;
        score_with_risks(products, alerts, &risks)
    }
}

pub fn score_with_risks(products: &[Product], alerts: &[Alert], risks: &RiskTable) -> ResilienceScore {
    let mut breakdown = InventoryBreakdown {
        total: products.len(),
        ..InventoryBreakdown::default()
    };
    for product in products {
        match product.status() {
            StockStatus::Critical => breakdown.critical += 1,
            StockStatus::Low => breakdown.low += 1,
            StockStatus::Ok => breakdown.ok += 1,
        }
    }

    let suppliers = products
        .iter()
        .map(|p| p.supplier_location.as_str())
        .filter(|l| !l.trim().is_empty())
        .collect::<BTreeSet<_>>();
    let high_risk_locations = suppliers
        .into_iter()
        .filter_map(|location| risks.get(location))
        .filter(|risk| risk.risk_level >= Severity::Medium)
        .map(|risk| LocationRisk {
            location: risk.location.clone(),
            risk_level: risk.risk_level,
            factors: risk.factors.clone(),
        })
        .collect::<Vec<_>>();

    let active_alerts = alerts.iter().filter(|a| a.is_active()).count();

    let raw = 100
        - breakdown.critical as i64 * CRITICAL_PENALTY
        - breakdown.low as i64 * LOW_PENALTY
        - high_risk_locations.len() as i64 * RISKY_LOCATION_PENALTY
        - active_alerts as i64 * ACTIVE_ALERT_PENALTY;
    let score = raw.clamp(0, 100) as u8;

    ResilienceScore {
        score,
        health_band: HealthBand::from_score(score),
        inventory_breakdown: breakdown,
        active_alerts,
        high_risk_locations,
        assessed_at: Utc::now(),
    }
}
