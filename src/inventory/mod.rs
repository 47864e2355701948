pub mod shipment;
pub mod status;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inventory::status::derive_stock_status;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StockStatus {
    #[serde(rename = "OK")]
    Ok,
    Low,
    Critical,
}

impl StockStatus {
    pub const ALL: [StockStatus; 3] = [StockStatus::Ok, StockStatus::Low, StockStatus::Critical];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Low => "Low",
            Self::Critical => "Critical",
        }
    }
}

impl Display for StockStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown stock status: {0}")]
pub struct StockStatusParseError(pub String);

impl FromStr for StockStatus {
    type Err = StockStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "low" => Ok(Self::Low),
            "critical" => Ok(Self::Critical),
            _ => Err(StockStatusParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    InTransit,
    Delayed,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::InTransit => "in_transit",
            Self::Delayed => "delayed",
            Self::Delivered => "delivered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl Display for ShipmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown shipment status: {0}")]
pub struct ShipmentStatusParseError(pub String);

impl FromStr for ShipmentStatus {
    type Err = ShipmentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "in_transit" | "intransit" => Ok(Self::InTransit),
            "delayed" => Ok(Self::Delayed),
            "delivered" => Ok(Self::Delivered),
            _ => Err(ShipmentStatusParseError(s.to_string())),
        }
    }
}

/// Canonical form of a user-supplied product id: trimmed and upper-cased.
pub fn normalize_product_id(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// An inventory item as read from the store. `status` is derived from the
/// stock level and threshold and is only changed through [`Product::set_stock_level`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub stock_level: u32,
    pub reorder_threshold: u32,
    pub lead_time_days: u32,
    pub unit_price: Option<f64>,
    pub supplier_location: String,
    pub warehouse_location: String,
    status: StockStatus,
    pub last_updated: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        stock_level: u32,
        reorder_threshold: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            stock_level,
            reorder_threshold,
            lead_time_days: 7,
            unit_price: None,
            supplier_location: String::new(),
            warehouse_location: String::new(),
            status: derive_stock_status(stock_level, reorder_threshold),
            last_updated: Utc::now(),
        }
    }

    pub fn with_locations(
        mut self,
        supplier_location: impl Into<String>,
        warehouse_location: impl Into<String>,
    ) -> Self {
        self.supplier_location = supplier_location.into();
        self.warehouse_location = warehouse_location.into();
        self
    }

    pub fn with_lead_time(mut self, days: u32) -> Self {
        self.lead_time_days = days;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_unit_price(mut self, price: f64) -> Self {
        self.unit_price = Some(price);
        self
    }

    pub fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = at;
        self
    }

    pub fn status(&self) -> StockStatus {
        self.status
    }

    pub fn set_stock_level(&mut self, level: u32) {
        self.stock_level = level;
        self.status = derive_stock_status(level, self.reorder_threshold);
        self.last_updated = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShipmentRecord {
    pub id: i64,
    pub product_id: String,
    pub quantity: u32,
    pub origin: String,
    pub destination: String,
    pub expected_date: DateTime<Utc>,
    pub actual_date: Option<DateTime<Utc>>,
    pub status: ShipmentStatus,
    pub delay_days: u32,
    pub delay_reason: Option<String>,
}

/// Input for registering a shipment; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShipment {
    pub product_id: String,
    pub quantity: u32,
    pub origin: String,
    pub destination: String,
    pub expected_date: DateTime<Utc>,
}
