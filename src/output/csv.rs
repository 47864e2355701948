use anyhow::Result;

use crate::alert::Alert;
use crate::hazard::events::SupplyChainEvent;
use crate::inventory::Product;
use crate::planner::{DelayPrediction, ReorderRecommendation};

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn products_to_csv(products: &[Product]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "name",
        "stock_level",
        "reorder_threshold",
        "status",
        "lead_time_days",
        "supplier_location",
        "warehouse_location",
    ])?;
    for p in products {
        writer.write_record([
            p.id.clone(),
            p.name.clone(),
            p.stock_level.to_string(),
            p.reorder_threshold.to_string(),
            p.status().to_string(),
            p.lead_time_days.to_string(),
            p.supplier_location.clone(),
            p.warehouse_location.clone(),
        ])?;
    }
    finish(writer)
}

pub fn reorders_to_csv(recommendations: &[ReorderRecommendation]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "product_id",
        "urgency",
        "reorder_now",
        "recommended_quantity",
        "days_until_stockout",
        "adjusted_lead_time_days",
        "reasoning",
    ])?;
    for r in recommendations {
        writer.write_record([
            r.product_id.clone(),
            r.urgency.to_string(),
            r.reorder_now.to_string(),
            r.recommended_quantity.to_string(),
            r.days_until_stockout.to_string(),
            r.adjusted_lead_time_days.to_string(),
            r.reasoning.clone(),
        ])?;
    }
    finish(writer)
}

pub fn delays_to_csv(predictions: &[DelayPrediction]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "shipment_id",
        "product_id",
        "origin",
        "destination",
        "predicted_delay_days",
        "risk_level",
        "confidence",
    ])?;
    for d in predictions {
        writer.write_record([
            d.shipment_id.to_string(),
            d.product_id.clone(),
            d.origin.clone(),
            d.destination.clone(),
            d.predicted_delay_days.to_string(),
            d.risk_level.to_string(),
            format!("{:.2}", d.confidence),
        ])?;
    }
    finish(writer)
}

pub fn alerts_to_csv(alerts: &[Alert]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "product_id",
        "alert_type",
        "severity",
        "message",
        "created_at",
        "resolved",
    ])?;
    for a in alerts {
        writer.write_record([
            a.id.to_string(),
            a.product_id.clone(),
            a.alert_type.to_string(),
            a.severity.to_string(),
            a.message.clone(),
            a.created_at.to_rfc3339(),
            a.resolved.to_string(),
        ])?;
    }
    finish(writer)
}

pub fn events_to_csv(events: &[SupplyChainEvent]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["severity", "title", "source", "published_at", "url"])?;
    for e in events {
        writer.write_record([
            e.severity.to_string(),
            e.title.clone(),
            e.source.clone(),
            e.published_at.to_rfc3339(),
            e.url.clone().unwrap_or_default(),
        ])?;
    }
    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::{products_to_csv, reorders_to_csv};
    use crate::config::PlannerConfig;
    use crate::hazard::RiskTable;
    use crate::inventory::Product;
    use crate::planner::reorder::plan_with_risks;

    #[test]
    fn quotes_locations_with_commas() {
        let products = vec![Product::new("PWR-MOD", "Power Module", 9, 15)
            .with_locations("Kochi, India", "Florida, USA")];
        let out = products_to_csv(&products).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().starts_with("id,name,stock_level"));
        assert_eq!(
            lines.next().unwrap(),
            "PWR-MOD,Power Module,9,15,Low,7,\"Kochi, India\",\"Florida, USA\""
        );
    }

    #[test]
    fn one_row_per_recommendation() {
        let products = vec![Product::new("CHIP-X", "X-Series Microchip", 0, 20)];
        let recs = plan_with_risks(&products, &RiskTable::default(), &PlannerConfig::default());
        let out = reorders_to_csv(&recs).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("CHIP-X,High,true,50"));
    }
}
