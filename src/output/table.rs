use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::alert::summary::AlertSummary;
use crate::hazard::events::EventDigest;
use crate::hazard::RiskAssessment;
use crate::inventory::{Product, StockStatus};
use crate::planner::{DelayPrediction, HealthBand, ReorderRecommendation, ResilienceScore};
use crate::scan::ScanReport;
use crate::types::Severity;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn severity_cell(severity: Severity) -> Cell {
    let color = match severity {
        Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Green,
    };
    Cell::new(severity.to_string()).fg(color)
}

fn status_cell(status: StockStatus) -> Cell {
    let color = match status {
        StockStatus::Critical => Color::Red,
        StockStatus::Low => Color::Yellow,
        StockStatus::Ok => Color::Green,
    };
    Cell::new(status.to_string()).fg(color)
}

pub fn render_products_table(products: &[Product]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Product",
        "Name",
        "Stock",
        "Threshold",
        "Status",
        "Lead Time",
        "Supplier",
        "Warehouse",
    ]);
    for p in products {
        table.add_row(Row::from(vec![
            Cell::new(&p.id),
            Cell::new(&p.name),
            Cell::new(p.stock_level),
            Cell::new(p.reorder_threshold),
            status_cell(p.status()),
            Cell::new(format!("{}d", p.lead_time_days)),
            Cell::new(&p.supplier_location),
            Cell::new(&p.warehouse_location),
        ]));
    }
    table.to_string()
}

pub fn render_risk_table(assessments: &[RiskAssessment]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Location", "Risk", "Delay", "Source", "Factors"]);
    for a in assessments {
        let factors = if a.factors.is_empty() {
            "-".to_string()
        } else {
            a.factors.join("; ")
        };
        table.add_row(Row::from(vec![
            Cell::new(&a.location),
            severity_cell(a.risk_level),
            Cell::new(format!("+{}d", a.delay_estimate_days)),
            Cell::new(format!("{:?}", a.source).to_lowercase()),
            Cell::new(factors),
        ]));
    }
    table.to_string()
}

pub fn render_events_table(digest: &EventDigest) -> String {
    let mut table = new_table();
    table.set_header(vec!["Severity", "Headline", "Source", "Published"]);
    for e in &digest.events {
        table.add_row(Row::from(vec![
            severity_cell(e.severity),
            Cell::new(&e.title),
            Cell::new(&e.source),
            Cell::new(e.published_at.format("%Y-%m-%d").to_string()),
        ]));
    }
    let source = format!("{:?}", digest.source).to_lowercase();
    format!("{}\nFeed: {} ({source})", table, digest.provider)
}

pub fn render_delays_table(predictions: &[DelayPrediction]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Shipment",
        "Product",
        "Route",
        "Expected",
        "Predicted Delay",
        "Risk",
        "Confidence",
    ]);
    for d in predictions {
        let delay = if d.used_fallback {
            format!("{}d (fallback)", d.predicted_delay_days)
        } else {
            format!("{}d", d.predicted_delay_days)
        };
        table.add_row(Row::from(vec![
            Cell::new(d.shipment_id),
            Cell::new(&d.product_id),
            Cell::new(format!("{} -> {}", d.origin, d.destination)),
            Cell::new(d.expected_date.format("%Y-%m-%d").to_string()),
            Cell::new(delay),
            severity_cell(d.risk_level),
            Cell::new(format!("{:.0}%", d.confidence * 100.0)),
        ]));
    }
    table.to_string()
}

pub fn render_reorder_table(recommendations: &[ReorderRecommendation]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Product",
        "Stock",
        "Days Left",
        "Lead Time",
        "Urgency",
        "Order",
        "Reasoning",
    ]);
    for r in recommendations {
        let order = if r.reorder_now {
            format!("{} now", r.recommended_quantity)
        } else {
            r.recommended_quantity.to_string()
        };
        table.add_row(Row::from(vec![
            Cell::new(&r.product_id),
            Cell::new(format!("{}/{}", r.current_stock, r.reorder_threshold)),
            Cell::new(r.days_until_stockout),
            Cell::new(format!(
                "{}d ({}d base)",
                r.adjusted_lead_time_days, r.normal_lead_time_days
            )),
            severity_cell(r.urgency),
            Cell::new(order),
            Cell::new(&r.reasoning),
        ]));
    }
    table.to_string()
}

pub fn render_resilience_table(score: &ResilienceScore) -> String {
    let band_color = match score.health_band {
        HealthBand::Excellent => Color::Green,
        HealthBand::Good => Color::Cyan,
        HealthBand::Fair => Color::Yellow,
        HealthBand::AtRisk => Color::Red,
    };
    let breakdown = &score.inventory_breakdown;
    let mut table = new_table();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(Row::from(vec![
        Cell::new("Score"),
        Cell::new(format!("{}/100", score.score)).fg(band_color),
    ]));
    table.add_row(Row::from(vec![
        Cell::new("Health"),
        Cell::new(score.health_band.to_string()).fg(band_color),
    ]));
    table.add_row(vec![
        "Inventory".to_string(),
        format!(
            "{} total, {} critical, {} low, {} ok",
            breakdown.total, breakdown.critical, breakdown.low, breakdown.ok
        ),
    ]);
    table.add_row(vec!["Active alerts".to_string(), score.active_alerts.to_string()]);
    let locations = if score.high_risk_locations.is_empty() {
        "none".to_string()
    } else {
        score
            .high_risk_locations
            .iter()
            .map(|l| format!("{} ({})", l.location, l.risk_level))
            .collect::<Vec<_>>()
            .join(", ")
    };
    table.add_row(vec!["High-risk suppliers".to_string(), locations]);
    table.to_string()
}

pub fn render_alerts_table(summary: &AlertSummary) -> String {
    let mut table = new_table();
    table.set_header(vec!["Id", "Severity", "Product", "Type", "Message", "Created"]);
    for group in &summary.by_severity {
        for a in &group.alerts {
            table.add_row(Row::from(vec![
                Cell::new(a.id),
                severity_cell(group.severity),
                Cell::new(&a.product_id),
                Cell::new(a.alert_type.to_string()),
                Cell::new(&a.message),
                Cell::new(a.created_at.format("%Y-%m-%d %H:%M").to_string()),
            ]));
        }
    }
    format!(
        "{}\nActive: {} (high {}, medium {}, low {})",
        table, summary.total, summary.high, summary.medium, summary.low
    )
}

pub fn render_scan_summary(report: &ScanReport) -> String {
    let mut table = new_table();
    table.set_header(vec!["Scan", "Result"]);
    table.add_row(vec![
        "Provider".to_string(),
        report.hazard_provider.clone(),
    ]);
    table.add_row(vec![
        "Scanned".to_string(),
        format!(
            "{} products, {} shipments",
            report.products_scanned, report.shipments_scanned
        ),
    ]);
    table.add_row(vec![
        "Alerts".to_string(),
        format!(
            "{} created, {} refreshed, {} resolved, {} notified",
            report.alerts.created.len(),
            report.alerts.refreshed,
            report.alerts.resolved,
            report.alerts.notified
        ),
    ]);
    if !report.alerts.failures.is_empty() {
        let failed = report
            .alerts
            .failures
            .iter()
            .map(|f| format!("{}/{}", f.product_id, f.alert_type))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(Row::from(vec![
            Cell::new("Failed"),
            Cell::new(failed).fg(Color::Red),
        ]));
    }
    table.add_row(vec![
        "Reorders".to_string(),
        report.reorders.len().to_string(),
    ]);
    table.add_row(vec![
        "Resilience".to_string(),
        format!(
            "{}/100 ({})",
            report.resilience.score, report.resilience.health_band
        ),
    ]);
    if !report.fallback_locations.is_empty() {
        table.add_row(Row::from(vec![
            Cell::new("Fallback data"),
            Cell::new(report.fallback_locations.join(", ")).fg(Color::Yellow),
        ]));
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        render_alerts_table, render_events_table, render_products_table, render_resilience_table,
    };
    use crate::alert::summary::summarize;
    use crate::hazard::events::EventFeed;
    use crate::hazard::RiskTable;
    use crate::inventory::Product;
    use crate::planner::resilience::score_with_risks;

    #[test]
    fn product_table_lists_every_row() {
        let products = vec![
            Product::new("CHIP-X", "X-Series Microchip", 15, 20),
            Product::new("SENS-9", "IoT Sensor Module", 82, 30),
        ];
        let out = render_products_table(&products);
        assert!(out.contains("CHIP-X"));
        assert!(out.contains("SENS-9"));
        assert!(out.contains("Low"));
    }

    #[test]
    fn resilience_table_shows_band() {
        let products = vec![Product::new("A", "A", 100, 10)];
        let score = score_with_risks(&products, &[], &RiskTable::default());
        let out = render_resilience_table(&score);
        assert!(out.contains("100/100"));
        assert!(out.contains("Excellent"));
    }

    #[test]
    fn empty_alert_summary_still_renders_totals() {
        let out = render_alerts_table(&summarize(&[]));
        assert!(out.contains("Active: 0"));
    }

    #[tokio::test]
    async fn events_table_names_the_feed() {
        let digest = EventFeed::offline().digest().await;
        let out = render_events_table(&digest);
        assert!(out.contains("Port Workers Strike"));
        assert!(out.contains("Feed: synthetic (synthetic)"));
    }
}
