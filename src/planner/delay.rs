use std::sync::Arc;

use crate::config::PlannerConfig;
use crate::hazard::assessor::HazardAssessor;
use crate::hazard::{RiskAssessment, RiskTable};
use crate::inventory::{ShipmentRecord, ShipmentStatus};
use crate::planner::DelayPrediction;
use crate::types::Severity;

pub struct DelayPredictor {
    assessor: Arc<HazardAssessor>,
    settings: PlannerConfig,
    concurrency: usize,
}

impl DelayPredictor {
    pub fn new(assessor: Arc<HazardAssessor>, settings: PlannerConfig, concurrency: usize) -> Self {
        Self {
            assessor,
            settings,
            concurrency,
        }
    }

    /// Assesses origin and destination of every in-transit shipment and
    /// predicts its delay.
    pub async fn predict(
        &self,
        shipments: &[ShipmentRecord],
        product_filter: Option<&str>,
    ) -> Vec<DelayPrediction> {
        let candidates = in_transit(shipments, product_filter);
        let locations = candidates
            .iter()
            .flat_map(|s| [s.origin.clone(), s.destination.clone()])
            .collect::<Vec<_>>();
        let risks = self.assessor.assess_many(locations, self.concurrency).await;
        predict_with_risks(shipments, product_filter, &risks, &self.settings)
    }
}

fn in_transit<'a>(
    shipments: &'a [ShipmentRecord],
    product_filter: Option<&str>,
) -> Vec<&'a ShipmentRecord> {
    shipments
        .iter()
        .filter(|s| s.status == ShipmentStatus::InTransit)
        .filter(|s| {
            product_filter
                .map(|pid| s.product_id.eq_ignore_ascii_case(pid.trim()))
                .unwrap_or(true)
        })
        .collect()
}

/// The side with the larger delay dominates; on a tie the origin wins.
fn dominant<'a>(origin: &'a RiskAssessment, destination: &'a RiskAssessment) -> &'a RiskAssessment {
    if destination.delay_estimate_days > origin.delay_estimate_days {
        destination
    } else {
        origin
    }
}

pub fn predict_with_risks(
    shipments: &[ShipmentRecord],
    product_filter: Option<&str>,
    risks: &RiskTable,
    settings: &PlannerConfig,
) -> Vec<DelayPrediction> {
    in_transit(shipments, product_filter)
        .into_iter()
        .map(|shipment| {
            let origin = risks.get_or_clear(&shipment.origin);
            let destination = risks.get_or_clear(&shipment.destination);
            let worst = dominant(&origin, &destination);
            let confidence = if worst.risk_level == Severity::High {
                settings.high_risk_confidence
            } else {
                settings.default_confidence
            };
            DelayPrediction {
                shipment_id: shipment.id,
                product_id: shipment.product_id.clone(),
                origin: shipment.origin.clone(),
                destination: shipment.destination.clone(),
                expected_date: shipment.expected_date,
                predicted_delay_days: worst.delay_estimate_days,
                risk_level: worst.risk_level,
                risk_factors: worst.factors.clone(),
                confidence,
                used_fallback: origin.used_fallback() || destination.used_fallback(),
            }
        })
        .collect()
}
