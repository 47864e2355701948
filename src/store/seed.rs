use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::EngineResult;
use crate::inventory::shipment::ShipmentUpdate;
use crate::inventory::{NewShipment, Product};
use crate::store::InventoryStore;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeedReport {
    pub products_added: Vec<String>,
    pub products_skipped: Vec<String>,
    pub shipments_added: usize,
}

struct SampleShipment {
    product_id: &'static str,
    quantity: u32,
    origin: &'static str,
    destination: &'static str,
    due_in_days: i64,
    delay: Option<(u32, &'static str)>,
}

pub fn sample_products() -> Vec<Product> {
    vec![
        Product::new("CHIP-X", "X-Series Microchip", 15, 20)
            .with_category("Electronics")
            .with_unit_price(45.99)
            .with_locations("Mumbai, India", "California, USA")
            .with_lead_time(14),
        Product::new("SENS-9", "IoT Sensor Module", 82, 30)
            .with_category("Electronics")
            .with_unit_price(28.50)
            .with_locations("Ho Chi Minh City, Vietnam", "Texas, USA")
            .with_lead_time(21),
        Product::new("LOGIC-A", "Logic Controller A", 44, 25)
            .with_category("Electronics")
            .with_unit_price(112.00)
            .with_locations("Shenzhen, China", "New York, USA")
            .with_lead_time(18),
        Product::new("PWR-MOD", "Power Module", 9, 15)
            .with_category("Electronics")
            .with_unit_price(67.25)
            .with_locations("Kochi, India", "Florida, USA")
            .with_lead_time(16),
        Product::new("DISPLAY-HD", "HD Display Panel", 55, 20)
            .with_category("Display")
            .with_unit_price(89.99)
            .with_locations("Seoul, South Korea", "California, USA")
            .with_lead_time(12),
    ]
}

fn sample_shipments() -> [SampleShipment; 3] {
    [
        SampleShipment {
            product_id: "CHIP-X",
            quantity: 50,
            origin: "Mumbai, India",
            destination: "California, USA",
            due_in_days: 5,
            delay: None,
        },
        SampleShipment {
            product_id: "PWR-MOD",
            quantity: 30,
            origin: "Kochi, India",
            destination: "Florida, USA",
            due_in_days: 3,
            delay: Some((2, "Cyclone warning in Arabian Sea affecting port operations")),
        },
        SampleShipment {
            product_id: "SENS-9",
            quantity: 100,
            origin: "Ho Chi Minh City, Vietnam",
            destination: "Texas, USA",
            due_in_days: 12,
            delay: None,
        },
    ]
}

/// Loads the sample catalogue. Products already present are left alone, and
/// shipments are only registered for products added by this call, so a
/// second run is a no-op.
pub fn seed_sample_data(store: &dyn InventoryStore) -> EngineResult<SeedReport> {
    let mut report = SeedReport::default();
    for product in sample_products() {
        if store.insert_product(&product)? {
            info!(product = %product.id, status = %product.status(), "seeded product");
            report.products_added.push(product.id);
        } else {
            report.products_skipped.push(product.id);
        }
    }

    let added = report
        .products_added
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<_>>();
    let now = Utc::now();
    for sample in sample_shipments() {
        if !added.contains(sample.product_id) {
            continue;
        }
        let record = store.register_shipment(&NewShipment {
            product_id: sample.product_id.to_string(),
            quantity: sample.quantity,
            origin: sample.origin.to_string(),
            destination: sample.destination.to_string(),
            expected_date: now + Duration::days(sample.due_in_days),
        })?;
        if let Some((days, reason)) = sample.delay {
            store.update_shipment(
                record.id,
                ShipmentUpdate::Delay {
                    days,
                    reason: Some(reason.to_string()),
                },
            )?;
        }
        report.shipments_added += 1;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::seed_sample_data;
    use crate::inventory::{ShipmentStatus, StockStatus};
    use crate::store::sqlite::SqliteStore;
    use crate::store::InventoryStore;

    #[test]
    fn seeds_catalogue_with_derived_statuses() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = seed_sample_data(&store).unwrap();
        assert_eq!(report.products_added.len(), 5);
        assert_eq!(report.shipments_added, 3);

        let pwr = store.get_product("PWR-MOD").unwrap().unwrap();
        assert_eq!(pwr.status(), StockStatus::Low);
        let chip = store.get_product("CHIP-X").unwrap().unwrap();
        assert_eq!(chip.status(), StockStatus::Low);

        let delayed = store.list_shipments(Some(ShipmentStatus::Delayed)).unwrap();
        assert_eq!(delayed.len(), 1);
        assert_eq!(delayed[0].product_id, "PWR-MOD");
        assert_eq!(delayed[0].delay_days, 2);
        assert_eq!(store.list_shipments(Some(ShipmentStatus::InTransit)).unwrap().len(), 2);
    }

    #[test]
    fn reseeding_is_a_no_op() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed_sample_data(&store).unwrap();
        let second = seed_sample_data(&store).unwrap();
        assert!(second.products_added.is_empty());
        assert_eq!(second.products_skipped.len(), 5);
        assert_eq!(second.shipments_added, 0);
        assert_eq!(store.list_shipments(None).unwrap().len(), 3);
    }
}
