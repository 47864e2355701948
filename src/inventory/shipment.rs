use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::inventory::{ShipmentRecord, ShipmentStatus};

/// A requested change to a shipment's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShipmentUpdate {
    Delay {
        days: u32,
        reason: Option<String>,
    },
    Deliver {
        at: DateTime<Utc>,
    },
}

impl ShipmentUpdate {
    pub fn target_status(&self) -> ShipmentStatus {
        match self {
            Self::Delay { .. } => ShipmentStatus::Delayed,
            Self::Deliver { .. } => ShipmentStatus::Delivered,
        }
    }
}

/// Applies `update` in place. `Delivered` is terminal; a delayed shipment may
/// have its delay revised before delivery.
pub fn apply_update(record: &mut ShipmentRecord, update: ShipmentUpdate) -> EngineResult<()> {
    if record.status.is_terminal() {
        return Err(EngineError::InvalidTransition {
            from: record.status.to_string(),
            to: update.target_status().to_string(),
        });
    }
    match update {
        ShipmentUpdate::Delay { days, reason } => {
            record.status = ShipmentStatus::Delayed;
            record.delay_days = days;
            if reason.is_some() {
                record.delay_reason = reason;
            }
        }
        ShipmentUpdate::Deliver { at } => {
            record.status = ShipmentStatus::Delivered;
            record.actual_date = Some(at);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{apply_update, ShipmentUpdate};
    use crate::error::EngineError;
    use crate::inventory::{ShipmentRecord, ShipmentStatus};

    fn in_transit() -> ShipmentRecord {
        ShipmentRecord {
            id: 1,
            product_id: "PWR-MOD".to_string(),
            quantity: 30,
            origin: "Kochi, India".to_string(),
            destination: "Florida, USA".to_string(),
            expected_date: Utc::now(),
            actual_date: None,
            status: ShipmentStatus::InTransit,
            delay_days: 0,
            delay_reason: None,
        }
    }

    #[test]
    fn delays_then_delivers() {
        let mut record = in_transit();
        apply_update(
            &mut record,
            ShipmentUpdate::Delay {
                days: 2,
                reason: Some("Cyclone warning".to_string()),
            },
        )
        .unwrap();
        assert_eq!(record.status, ShipmentStatus::Delayed);
        apply_update(
            &mut record,
            ShipmentUpdate::Delay {
                days: 5,
                reason: None,
            },
        )
        .unwrap();
        assert_eq!(record.delay_days, 5);
        assert_eq!(record.delay_reason.as_deref(), Some("Cyclone warning"));

        apply_update(&mut record, ShipmentUpdate::Deliver { at: Utc::now() }).unwrap();
        assert_eq!(record.status, ShipmentStatus::Delivered);
        assert!(record.actual_date.is_some());
    }

    #[test]
    fn delivered_is_terminal() {
        let mut record = in_transit();
        apply_update(&mut record, ShipmentUpdate::Deliver { at: Utc::now() }).unwrap();
        let err = apply_update(
            &mut record,
            ShipmentUpdate::Delay {
                days: 1,
                reason: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(record.status, ShipmentStatus::Delivered);
    }
}
