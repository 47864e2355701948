pub mod migrations;
pub mod seed;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::alert::{Alert, AlertKey, NewAlert};
use crate::error::EngineResult;
use crate::inventory::shipment::ShipmentUpdate;
use crate::inventory::{NewShipment, Product, ShipmentRecord, ShipmentStatus};
use crate::types::Severity;

/// Read/write operations the engine needs from the inventory store. Products
/// and shipments belong to the store; alerts are written only by the engine.
pub trait InventoryStore: Send + Sync {
    fn list_products(&self) -> EngineResult<Vec<Product>>;
    fn get_product(&self, product_id: &str) -> EngineResult<Option<Product>>;
    /// Inserts `product` unless its id exists. Returns whether it was inserted.
    fn insert_product(&self, product: &Product) -> EngineResult<bool>;
    /// Writes a new stock level and the status derived from it.
    fn update_stock(&self, product_id: &str, stock_level: u32) -> EngineResult<Product>;

    fn list_shipments(&self, status: Option<ShipmentStatus>) -> EngineResult<Vec<ShipmentRecord>>;
    /// Fails with `NotFound` when the product does not exist.
    fn register_shipment(&self, shipment: &NewShipment) -> EngineResult<ShipmentRecord>;
    fn update_shipment(&self, shipment_id: i64, update: ShipmentUpdate) -> EngineResult<ShipmentRecord>;

    fn insert_alert(&self, alert: &NewAlert) -> EngineResult<Alert>;
    fn refresh_alert(&self, alert_id: i64, severity: Severity, message: &str) -> EngineResult<()>;
    fn resolve_alert(&self, alert_id: i64, resolved_at: DateTime<Utc>) -> EngineResult<()>;
    fn active_alerts(&self) -> EngineResult<Vec<Alert>>;
    /// Unresolved alerts for one key, oldest first. More than one is an
    /// invariant violation the caller has to heal.
    fn active_alerts_for(&self, key: &AlertKey) -> EngineResult<Vec<Alert>>;
    fn recent_alerts(&self, limit: usize) -> EngineResult<Vec<Alert>>;
}
