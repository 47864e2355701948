use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::alert::{Alert, AlertKey, AlertType, NewAlert};
use crate::error::{EngineError, EngineResult};
use crate::inventory::shipment::{apply_update, ShipmentUpdate};
use crate::inventory::{NewShipment, Product, ShipmentRecord, ShipmentStatus};
use crate::store::migrations::BASE_MIGRATION;
use crate::store::InventoryStore;
use crate::types::Severity;

const PRODUCT_COLUMNS: &str = "id, name, category, stock_level, reorder_threshold, unit_price, \
     warehouse_location, supplier_location, lead_time_days, last_updated";
const SHIPMENT_COLUMNS: &str = "id, product_id, quantity, origin, destination, expected_date, \
     actual_date, status, delay_days, delay_reason";
const ALERT_COLUMNS: &str =
    "id, product_id, alert_type, severity, message, created_at, resolved, resolved_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> EngineResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(EngineError::data_source)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> EngineResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> EngineResult<()> {
        self.conn().execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl InventoryStore for SqliteStore {
    fn list_products(&self) -> EngineResult<Vec<Product>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))?;
        let rows = stmt
            .query_map([], row_to_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_product(&self, product_id: &str) -> EngineResult<Option<Product>> {
        let conn = self.conn();
        let product = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                params![product_id],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    fn insert_product(&self, product: &Product) -> EngineResult<bool> {
        let changed = self.conn().execute(
            r#"
INSERT OR IGNORE INTO products(
    id, name, category, stock_level, reorder_threshold, unit_price,
    warehouse_location, supplier_location, lead_time_days, last_updated, status
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#,
            params![
                product.id,
                product.name,
                product.category,
                product.stock_level,
                product.reorder_threshold,
                product.unit_price,
                product.warehouse_location,
                product.supplier_location,
                product.lead_time_days,
                product.last_updated.to_rfc3339(),
                product.status().as_slug(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn update_stock(&self, product_id: &str, stock_level: u32) -> EngineResult<Product> {
        let mut product = self
            .get_product(product_id)?
            .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))?;
        product.set_stock_level(stock_level);
        self.conn().execute(
            r#"
UPDATE products
SET stock_level = ?2, status = ?3, last_updated = ?4
WHERE id = ?1
"#,
            params![
                product.id,
                product.stock_level,
                product.status().as_slug(),
                product.last_updated.to_rfc3339(),
            ],
        )?;
        Ok(product)
    }

    fn list_shipments(&self, status: Option<ShipmentStatus>) -> EngineResult<Vec<ShipmentRecord>> {
        let conn = self.conn();
        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE status = ?1 ORDER BY id"
                ))?;
                let rows = stmt
                    .query_map(params![status.as_slug()], row_to_shipment)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {SHIPMENT_COLUMNS} FROM shipments ORDER BY id"))?;
                let rows = stmt
                    .query_map([], row_to_shipment)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    fn register_shipment(&self, shipment: &NewShipment) -> EngineResult<ShipmentRecord> {
        let conn = self.conn();
        let known = conn
            .query_row(
                "SELECT 1 FROM products WHERE id = ?1",
                params![shipment.product_id],
                |_| Ok(()),
            )
            .optional()?;
        if known.is_none() {
            return Err(EngineError::NotFound(format!("product {}", shipment.product_id)));
        }
        conn.execute(
            r#"
INSERT INTO shipments(
    product_id, quantity, origin, destination, expected_date, status, delay_days, created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
"#,
            params![
                shipment.product_id,
                shipment.quantity,
                shipment.origin,
                shipment.destination,
                shipment.expected_date.to_rfc3339(),
                ShipmentStatus::InTransit.as_slug(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(ShipmentRecord {
            id: conn.last_insert_rowid(),
            product_id: shipment.product_id.clone(),
            quantity: shipment.quantity,
            origin: shipment.origin.clone(),
            destination: shipment.destination.clone(),
            expected_date: shipment.expected_date,
            actual_date: None,
            status: ShipmentStatus::InTransit,
            delay_days: 0,
            delay_reason: None,
        })
    }

    fn update_shipment(&self, shipment_id: i64, update: ShipmentUpdate) -> EngineResult<ShipmentRecord> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut record = tx
            .query_row(
                &format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = ?1"),
                params![shipment_id],
                row_to_shipment,
            )
            .optional()?
            .ok_or_else(|| EngineError::NotFound(format!("shipment {shipment_id}")))?;
        apply_update(&mut record, update)?;
        tx.execute(
            r#"
UPDATE shipments
SET status = ?2, delay_days = ?3, delay_reason = ?4, actual_date = ?5
WHERE id = ?1
"#,
            params![
                record.id,
                record.status.as_slug(),
                record.delay_days,
                record.delay_reason,
                record.actual_date.map(|at| at.to_rfc3339()),
            ],
        )?;
        tx.commit()?;
        Ok(record)
    }

    fn insert_alert(&self, alert: &NewAlert) -> EngineResult<Alert> {
        let conn = self.conn();
        let created_at = Utc::now();
        conn.execute(
            r#"
INSERT INTO stock_alerts(product_id, alert_type, severity, message, created_at, resolved)
VALUES (?1, ?2, ?3, ?4, ?5, 0)
"#,
            params![
                alert.product_id,
                alert.alert_type.as_slug(),
                alert.severity.as_slug(),
                alert.message,
                created_at.to_rfc3339(),
            ],
        )?;
        Ok(Alert {
            id: conn.last_insert_rowid(),
            product_id: alert.product_id.clone(),
            alert_type: alert.alert_type,
            severity: alert.severity,
            message: alert.message.clone(),
            created_at,
            resolved: false,
            resolved_at: None,
        })
    }

    fn refresh_alert(&self, alert_id: i64, severity: Severity, message: &str) -> EngineResult<()> {
        let changed = self.conn().execute(
            "UPDATE stock_alerts SET severity = ?2, message = ?3 WHERE id = ?1 AND resolved = 0",
            params![alert_id, severity.as_slug(), message],
        )?;
        if changed == 0 {
            return Err(EngineError::NotFound(format!("active alert {alert_id}")));
        }
        Ok(())
    }

    fn resolve_alert(&self, alert_id: i64, resolved_at: DateTime<Utc>) -> EngineResult<()> {
        let changed = self.conn().execute(
            "UPDATE stock_alerts SET resolved = 1, resolved_at = ?2 WHERE id = ?1 AND resolved = 0",
            params![alert_id, resolved_at.to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(EngineError::NotFound(format!("active alert {alert_id}")));
        }
        Ok(())
    }

    fn active_alerts(&self) -> EngineResult<Vec<Alert>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM stock_alerts WHERE resolved = 0 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], row_to_alert)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn active_alerts_for(&self, key: &AlertKey) -> EngineResult<Vec<Alert>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            r#"
SELECT {ALERT_COLUMNS}
FROM stock_alerts
WHERE product_id = ?1 AND alert_type = ?2 AND resolved = 0
ORDER BY id
"#
        ))?;
        let rows = stmt
            .query_map(params![key.product_id, key.alert_type.as_slug()], row_to_alert)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn recent_alerts(&self, limit: usize) -> EngineResult<Vec<Alert>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM stock_alerts ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_alert)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => parse_time(row, idx).map(Some),
        None => Ok(None),
    }
}

// Status is not read back; it is recomputed from stock and threshold.
fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    let mut product = Product::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, u32>(3)?,
        row.get::<_, u32>(4)?,
    )
    .with_locations(row.get::<_, String>(7)?, row.get::<_, String>(6)?)
    .with_lead_time(row.get::<_, u32>(8)?)
    .with_last_updated(parse_time(row, 9)?);
    product.category = row.get(2)?;
    product.unit_price = row.get(5)?;
    Ok(product)
}

fn row_to_shipment(row: &Row<'_>) -> rusqlite::Result<ShipmentRecord> {
    Ok(ShipmentRecord {
        id: row.get(0)?,
        product_id: row.get(1)?,
        quantity: row.get(2)?,
        origin: row.get(3)?,
        destination: row.get(4)?,
        expected_date: parse_time(row, 5)?,
        actual_date: parse_optional_time(row, 6)?,
        status: parse_column::<ShipmentStatus>(row, 7)?,
        delay_days: row.get(8)?,
        delay_reason: row.get(9)?,
    })
}

fn row_to_alert(row: &Row<'_>) -> rusqlite::Result<Alert> {
    Ok(Alert {
        id: row.get(0)?,
        product_id: row.get(1)?,
        alert_type: parse_column::<AlertType>(row, 2)?,
        severity: parse_column::<Severity>(row, 3)?,
        message: row.get(4)?,
        created_at: parse_time(row, 5)?,
        resolved: row.get::<_, i64>(6)? != 0,
        resolved_at: parse_optional_time(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rusqlite::params;

    use super::SqliteStore;
    use crate::alert::{AlertKey, AlertType, NewAlert};
    use crate::error::EngineError;
    use crate::inventory::shipment::ShipmentUpdate;
    use crate::inventory::{NewShipment, Product, ShipmentStatus, StockStatus};
    use crate::store::InventoryStore;
    use crate::types::Severity;

    fn store_with_product() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let product = Product::new("PWR-MOD", "Power Module", 9, 15)
            .with_locations("Kochi, India", "Florida, USA")
            .with_lead_time(16)
            .with_unit_price(67.25);
        assert!(store.insert_product(&product).unwrap());
        store
    }

    fn low_stock_alert() -> NewAlert {
        NewAlert {
            product_id: "PWR-MOD".to_string(),
            alert_type: AlertType::LowStock,
            severity: Severity::Medium,
            message: "Power Module stock is below reorder threshold (9/15)".to_string(),
        }
    }

    #[test]
    fn product_round_trips_with_derived_status() {
        let store = store_with_product();
        let product = store.get_product("PWR-MOD").unwrap().unwrap();
        assert_eq!(product.status(), StockStatus::Low);
        assert_eq!(product.supplier_location, "Kochi, India");
        assert_eq!(product.warehouse_location, "Florida, USA");
        assert_eq!(product.lead_time_days, 16);
        assert_eq!(product.unit_price, Some(67.25));
        assert!(store.get_product("NOPE").unwrap().is_none());
    }

    #[test]
    fn insert_product_skips_existing_ids() {
        let store = store_with_product();
        let again = Product::new("PWR-MOD", "Renamed", 100, 15);
        assert!(!store.insert_product(&again).unwrap());
        assert_eq!(store.get_product("PWR-MOD").unwrap().unwrap().name, "Power Module");
        assert_eq!(store.list_products().unwrap().len(), 1);
    }

    #[test]
    fn update_stock_recomputes_status() {
        let store = store_with_product();
        let updated = store.update_stock("PWR-MOD", 20).unwrap();
        assert_eq!(updated.status(), StockStatus::Ok);
        let reread = store.get_product("PWR-MOD").unwrap().unwrap();
        assert_eq!(reread.stock_level, 20);
        assert_eq!(reread.status(), StockStatus::Ok);

        let err = store.update_stock("MISSING", 1).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn shipment_lifecycle_is_persisted() {
        let store = store_with_product();
        let shipment = store
            .register_shipment(&NewShipment {
                product_id: "PWR-MOD".to_string(),
                quantity: 30,
                origin: "Kochi, India".to_string(),
                destination: "Florida, USA".to_string(),
                expected_date: Utc::now() + Duration::days(3),
            })
            .unwrap();
        assert_eq!(shipment.status, ShipmentStatus::InTransit);

        store
            .update_shipment(
                shipment.id,
                ShipmentUpdate::Delay {
                    days: 4,
                    reason: Some("Port congestion".to_string()),
                },
            )
            .unwrap();
        let delayed = store.list_shipments(Some(ShipmentStatus::Delayed)).unwrap();
        assert_eq!(delayed.len(), 1);
        assert_eq!(delayed[0].delay_days, 4);
        assert_eq!(delayed[0].delay_reason.as_deref(), Some("Port congestion"));

        let delivered = store
            .update_shipment(shipment.id, ShipmentUpdate::Deliver { at: Utc::now() })
            .unwrap();
        assert!(delivered.actual_date.is_some());

        let err = store
            .update_shipment(shipment.id, ShipmentUpdate::Delay { days: 1, reason: None })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        let all = store.list_shipments(None).unwrap();
        assert_eq!(all[0].status, ShipmentStatus::Delivered);

        let missing = store
            .update_shipment(999, ShipmentUpdate::Deliver { at: Utc::now() })
            .unwrap_err();
        assert!(matches!(missing, EngineError::NotFound(_)));
    }

    #[test]
    fn shipment_for_unknown_product_is_rejected() {
        let store = store_with_product();
        let err = store
            .register_shipment(&NewShipment {
                product_id: "GHOST-1".to_string(),
                quantity: 5,
                origin: "Kochi, India".to_string(),
                destination: "Texas, USA".to_string(),
                expected_date: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(store.list_shipments(None).unwrap().is_empty());
    }

    #[test]
    fn alert_lifecycle_queries() {
        let store = store_with_product();
        let alert = store.insert_alert(&low_stock_alert()).unwrap();
        let key = AlertKey::new("PWR-MOD", AlertType::LowStock);
        assert_eq!(store.active_alerts_for(&key).unwrap().len(), 1);

        store
            .refresh_alert(alert.id, Severity::High, "worse")
            .unwrap();
        let active = store.active_alerts().unwrap();
        assert_eq!(active[0].severity, Severity::High);
        assert_eq!(active[0].message, "worse");
        assert_eq!(active[0].id, alert.id);

        store.resolve_alert(alert.id, Utc::now()).unwrap();
        assert!(store.active_alerts().unwrap().is_empty());
        let recent = store.recent_alerts(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert!(recent[0].resolved);
        assert!(recent[0].resolved_at.is_some());

        let err = store.resolve_alert(alert.id, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn unreadable_rows_surface_as_data_source_errors() {
        let store = store_with_product();
        store
            .conn()
            .execute(
                "INSERT INTO stock_alerts(product_id, alert_type, severity, message, created_at)
                 VALUES (?1, 'bogus', 'Low', 'm', ?2)",
                params!["PWR-MOD", Utc::now().to_rfc3339()],
            )
            .unwrap();
        let err = store.active_alerts().unwrap_err();
        assert!(matches!(err, EngineError::DataSourceUnavailable(_)));
    }
}
