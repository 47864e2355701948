use serde::{Deserialize, Serialize};

use crate::alert::{AlertKey, AlertType};
use crate::config::{AlertRulesConfig, ScanConfig};
use crate::inventory::{Product, ShipmentRecord, ShipmentStatus, StockStatus};
use crate::types::Severity;

/// Which alert rules run and the delay past which a shipment alerts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertRules {
    pub low_stock: bool,
    pub critical_stock: bool,
    pub delayed_shipment: bool,
    pub shipment_delay_days: u32,
}

impl AlertRules {
    pub fn from_config(rules: &AlertRulesConfig, scan: &ScanConfig) -> Self {
        Self {
            low_stock: rules.low_stock,
            critical_stock: rules.critical_stock,
            delayed_shipment: rules.delayed_shipment,
            shipment_delay_days: scan.shipment_delay_alert_days,
        }
    }

    pub fn enabled(&self, alert_type: AlertType) -> bool {
        match alert_type {
            AlertType::LowStock => self.low_stock,
            AlertType::CriticalStock => self.critical_stock,
            AlertType::DelayedShipment => self.delayed_shipment,
        }
    }

    pub fn enabled_types(&self) -> Vec<AlertType> {
        AlertType::ALL
            .into_iter()
            .filter(|t| self.enabled(*t))
            .collect()
    }
}

impl Default for AlertRules {
    fn default() -> Self {
        Self::from_config(&AlertRulesConfig::default(), &ScanConfig::default())
    }
}

/// A condition that currently holds for one alert key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub key: AlertKey,
    pub severity: Severity,
    pub message: String,
}

/// Evaluates the stock rules and the delayed-shipment rule for one product.
/// `shipments` may hold any shipments; only this product's delayed ones are
/// considered and several of them collapse into the worst delay.
pub fn evaluate_product(
    product: &Product,
    shipments: &[ShipmentRecord],
    rules: &AlertRules,
) -> Vec<Trigger> {
    let mut out = Vec::new();

    match product.status() {
        StockStatus::Critical if rules.critical_stock => out.push(Trigger {
            key: AlertKey::new(product.id.clone(), AlertType::CriticalStock),
            severity: Severity::High,
            message: format!("{} is OUT OF STOCK! Immediate action required.", product.name),
        }),
        StockStatus::Low if rules.low_stock => out.push(Trigger {
            key: AlertKey::new(product.id.clone(), AlertType::LowStock),
            severity: Severity::Medium,
            message: format!(
                "{} stock is below reorder threshold ({}/{})",
                product.name, product.stock_level, product.reorder_threshold
            ),
        }),
        _ => {}
    }

    if rules.delayed_shipment {
        let worst = shipments
            .iter()
            .filter(|s| s.product_id == product.id)
            .filter(|s| s.status == ShipmentStatus::Delayed)
            .filter(|s| s.delay_days > rules.shipment_delay_days)
            .max_by_key(|s| (s.delay_days, std::cmp::Reverse(s.id)));
        if let Some(shipment) = worst {
            out.push(Trigger {
                key: AlertKey::new(product.id.clone(), AlertType::DelayedShipment),
                severity: Severity::High,
                message: format!(
                    "Shipment delayed by {} days. Reason: {}",
                    shipment.delay_days,
                    shipment.delay_reason.as_deref().unwrap_or("unknown")
                ),
            });
        }
    }

    out
}
