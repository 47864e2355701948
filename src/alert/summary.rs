use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertType};
use crate::types::Severity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertBrief {
    pub id: i64,
    pub product_id: String,
    pub alert_type: AlertType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeverityGroup {
    pub severity: Severity,
    pub alerts: Vec<AlertBrief>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub by_severity: Vec<SeverityGroup>,
}

/// Groups the active alerts by severity, highest first, newest first within a group.
pub fn summarize(alerts: &[Alert]) -> AlertSummary {
    let mut by_severity = Severity::ALL
        .into_iter()
        .map(|severity| SeverityGroup {
            severity,
            alerts: Vec::new(),
        })
        .collect::<Vec<_>>();

    for alert in alerts.iter().filter(|a| a.is_active()) {
        if let Some(group) = by_severity.iter_mut().find(|g| g.severity == alert.severity) {
            group.alerts.push(AlertBrief {
                id: alert.id,
                product_id: alert.product_id.clone(),
                alert_type: alert.alert_type,
                message: alert.message.clone(),
                created_at: alert.created_at,
            });
        }
    }
    for group in &mut by_severity {
        group.alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }

    let count = |severity: Severity| {
        by_severity
            .iter()
            .find(|g| g.severity == severity)
            .map(|g| g.alerts.len())
            .unwrap_or(0)
    };
    let (high, medium, low) = (
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low),
    );
    AlertSummary {
        total: high + medium + low,
        high,
        medium,
        low,
        by_severity,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::summarize;
    use crate::alert::{Alert, AlertType};
    use crate::types::Severity;

    fn alert(id: i64, severity: Severity, age_minutes: i64, resolved: bool) -> Alert {
        Alert {
            id,
            product_id: format!("P{id}"),
            alert_type: AlertType::LowStock,
            severity,
            message: format!("alert {id}"),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            resolved,
            resolved_at: None,
        }
    }

    #[test]
    fn counts_and_groups_active_alerts() {
        let alerts = vec![
            alert(1, Severity::High, 30, false),
            alert(2, Severity::Medium, 20, false),
            alert(3, Severity::High, 10, false),
            alert(4, Severity::Low, 5, true),
        ];
        let summary = summarize(&alerts);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.high, 2);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.low, 0);
        assert_eq!(summary.by_severity[0].severity, Severity::High);
        assert_eq!(summary.by_severity[0].alerts[0].id, 3);
        assert!(summary.by_severity[2].alerts.is_empty());
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.by_severity.len(), 3);
    }
}
