use std::sync::Arc;

use crate::config::PlannerConfig;
use crate::hazard::assessor::HazardAssessor;
use crate::hazard::RiskTable;
use crate::inventory::Product;
use crate::planner::ReorderRecommendation;
use crate::types::Severity;

pub struct ReorderPlanner {
    assessor: Arc<HazardAssessor>,
    settings: PlannerConfig,
    concurrency: usize,
}

impl ReorderPlanner {
    pub fn new(assessor: Arc<HazardAssessor>, settings: PlannerConfig, concurrency: usize) -> Self {
        Self {
            assessor,
            settings,
            concurrency,
        }
    }

    pub async fn plan(&self, products: &[Product]) -> Vec<ReorderRecommendation> {
        let locations = products
            .iter()
            .map(|p| p.supplier_location.clone())
            .collect::<Vec<_>>();
        let risks = self.assessor.assess_many(locations, self.concurrency).await;
        plan_with_risks(products, &risks, &self.settings)
    }
}

/// Days of cover left above the safety margin at a flat consumption rate.
/// Non-decreasing in `stock_level`.
pub fn days_until_stockout(stock_level: u32, settings: &PlannerConfig) -> u32 {
    stock_level.saturating_sub(settings.safety_margin) / settings.consumption_rate.max(1)
}

pub fn plan_with_risks(
    products: &[Product],
    risks: &RiskTable,
    settings: &PlannerConfig,
) -> Vec<ReorderRecommendation> {
    let mut out = Vec::new();
    for product in products {
        let supplier_risk = risks.get_or_clear(&product.supplier_location);
        let hazard_delay = supplier_risk.delay_estimate_days;
        let days_left = days_until_stockout(product.stock_level, settings);
        let adjusted_lead_time = product.lead_time_days.saturating_add(hazard_delay);

        let (urgency, reorder_now) = if days_left < adjusted_lead_time {
            (Severity::High, true)
        } else if days_left < adjusted_lead_time.saturating_add(settings.urgency_window_days) {
            (Severity::Medium, true)
        } else {
            (Severity::Low, false)
        };

        let below_threshold = product.stock_level <= product.reorder_threshold;
        if !reorder_now && !below_threshold {
            continue;
        }

        let mut reasoning = if below_threshold {
            format!(
                "Stock {}/{} is at or below the reorder threshold.",
                product.stock_level, product.reorder_threshold
            )
        } else {
            format!(
                "Stock covers about {days_left} days against an adjusted lead time of {adjusted_lead_time} days."
            )
        };
        if hazard_delay > 0 {
            reasoning.push_str(&format!(
                " Hazard risk at {} adds {hazard_delay} days to delivery.",
                product.supplier_location
            ));
        }

        out.push(ReorderRecommendation {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            current_stock: product.stock_level,
            reorder_threshold: product.reorder_threshold,
            normal_lead_time_days: product.lead_time_days,
            adjusted_lead_time_days: adjusted_lead_time,
            days_until_stockout: days_left,
            urgency,
            reorder_now,
            recommended_quantity: settings
                .min_order_quantity
                .max(product.reorder_threshold.saturating_mul(2)),
            reasoning,
            used_fallback: supplier_risk.used_fallback(),
        });
    }
    out
}
