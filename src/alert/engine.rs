use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::alert::dispatcher::NotificationDispatcher;
use crate::alert::locks::KeyLocks;
use crate::alert::rules::{evaluate_product, AlertRules, Trigger};
use crate::alert::{Alert, AlertKey, AlertPayload, NewAlert};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::inventory::{Product, ShipmentRecord};
use crate::store::InventoryStore;
use crate::types::Severity;

/// What happened to one alert key during a reconcile pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Absent,
    Created(Alert),
    Refreshed(Alert),
    Unchanged(Alert),
    Resolved(Alert),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeyFailure {
    pub product_id: String,
    pub alert_type: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReconcileReport {
    pub created: Vec<Alert>,
    pub refreshed: usize,
    pub unchanged: usize,
    pub resolved: usize,
    pub notified: usize,
    pub duplicates_resolved: usize,
    pub failures: Vec<KeyFailure>,
}

impl ReconcileReport {
    fn record(&mut self, transition: &Transition) {
        match transition {
            Transition::Absent => {}
            Transition::Created(alert) => self.created.push(alert.clone()),
            Transition::Refreshed(_) => self.refreshed += 1,
            Transition::Unchanged(_) => self.unchanged += 1,
            Transition::Resolved(_) => self.resolved += 1,
        }
    }
}

/// Sole writer of alerts. Drives each `(product, alert type)` key through
/// Absent -> Active -> Resolved and notifies on creation.
pub struct AlertManager {
    store: Arc<dyn InventoryStore>,
    dispatcher: Arc<NotificationDispatcher>,
    locks: KeyLocks,
    rules: AlertRules,
    notify_min_severity: Severity,
    strict_invariants: bool,
}

impl AlertManager {
    pub fn new(store: Arc<dyn InventoryStore>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            locks: KeyLocks::new(),
            rules: AlertRules::default(),
            notify_min_severity: Severity::High,
            strict_invariants: false,
        }
    }

    pub fn from_config(
        store: Arc<dyn InventoryStore>,
        dispatcher: Arc<NotificationDispatcher>,
        config: &Config,
    ) -> Self {
        Self::new(store, dispatcher)
            .with_rules(AlertRules::from_config(&config.alerts.rules, &config.scan))
            .with_notify_min_severity(config.alerts.notify_min_severity)
            .with_strict_invariants(config.alerts.strict_invariants)
    }

    pub fn with_rules(mut self, rules: AlertRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_notify_min_severity(mut self, severity: Severity) -> Self {
        self.notify_min_severity = severity;
        self
    }

    pub fn with_strict_invariants(mut self, strict: bool) -> Self {
        self.strict_invariants = strict;
        self
    }

    /// Reconciles stored alerts against one snapshot. Failures are contained to
    /// the key they occurred on; only a failure to read the active alerts at
    /// all is returned as an error.
    pub async fn reconcile(
        &self,
        products: &[Product],
        shipments: &[ShipmentRecord],
    ) -> EngineResult<ReconcileReport> {
        let active = retry_once("list active alerts", || self.store.active_alerts())?;
        let mut report = ReconcileReport::default();

        let mut desired: BTreeMap<AlertKey, Option<Trigger>> = BTreeMap::new();
        for product in products {
            let triggers = evaluate_product(product, shipments, &self.rules);
            for alert_type in self.rules.enabled_types() {
                let key = AlertKey::new(product.id.clone(), alert_type);
                let trigger = triggers.iter().find(|t| t.key == key).cloned();
                desired.insert(key, trigger);
            }
        }

        // alerts for products that left the snapshot
        let known = products.iter().map(|p| p.id.as_str()).collect::<BTreeSet<_>>();
        for alert in &active {
            if !known.contains(alert.product_id.as_str()) && self.rules.enabled(alert.alert_type) {
                desired.entry(alert.key()).or_insert(None);
            }
        }

        for (key, trigger) in desired {
            match self.apply(&key, trigger.as_ref(), &mut report).await {
                Ok(transition) => {
                    report.record(&transition);
                    if let Transition::Created(alert) = &transition {
                        if self.notify(alert).await {
                            report.notified += 1;
                        }
                    }
                }
                Err(e) => {
                    error!(key = %key, error = %e, "alert transition failed");
                    report.failures.push(KeyFailure {
                        product_id: key.product_id.clone(),
                        alert_type: key.alert_type.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            created = report.created.len(),
            refreshed = report.refreshed,
            resolved = report.resolved,
            notified = report.notified,
            failures = report.failures.len(),
            "alert reconcile complete"
        );
        Ok(report)
    }

    /// Applies one key's transition under its lock. Every store write is a
    /// single statement, so dropping this future never leaves a half-written alert.
    pub async fn apply(
        &self,
        key: &AlertKey,
        trigger: Option<&Trigger>,
        report: &mut ReconcileReport,
    ) -> EngineResult<Transition> {
        let _guard = self.locks.acquire(key).await;
        let mut existing = retry_once("read alerts", || self.store.active_alerts_for(key))?;

        if existing.len() > 1 {
            let message = format!("{} active alerts for {key}", existing.len());
            error!(key = %key, count = existing.len(), "duplicate active alerts");
            if self.strict_invariants {
                return Err(EngineError::InvariantViolation(message));
            }
            let now = Utc::now();
            for duplicate in existing.drain(1..) {
                retry_once("resolve duplicate", || self.store.resolve_alert(duplicate.id, now))?;
                report.duplicates_resolved += 1;
            }
        }

        let current = existing.into_iter().next();
        match (current, trigger) {
            (None, None) => Ok(Transition::Absent),
            (None, Some(trigger)) => {
                let new_alert = NewAlert {
                    product_id: key.product_id.clone(),
                    alert_type: key.alert_type,
                    severity: trigger.severity,
                    message: trigger.message.clone(),
                };
                let alert = retry_once("create alert", || self.store.insert_alert(&new_alert))?;
                info!(key = %key, alert_id = alert.id, severity = %alert.severity, "alert created");
                Ok(Transition::Created(alert))
            }
            (Some(mut alert), Some(trigger)) => {
                if alert.severity == trigger.severity && alert.message == trigger.message {
                    return Ok(Transition::Unchanged(alert));
                }
                retry_once("refresh alert", || {
                    self.store
                        .refresh_alert(alert.id, trigger.severity, &trigger.message)
                })?;
                alert.severity = trigger.severity;
                alert.message = trigger.message.clone();
                info!(key = %key, alert_id = alert.id, "alert refreshed");
                Ok(Transition::Refreshed(alert))
            }
            (Some(mut alert), None) => {
                let now = Utc::now();
                retry_once("resolve alert", || self.store.resolve_alert(alert.id, now))?;
                alert.resolved = true;
                alert.resolved_at = Some(now);
                info!(key = %key, alert_id = alert.id, "alert resolved");
                Ok(Transition::Resolved(alert))
            }
        }
    }

    async fn notify(&self, alert: &Alert) -> bool {
        if alert.severity < self.notify_min_severity {
            return false;
        }
        let result = self.dispatcher.dispatch(&AlertPayload::from(alert)).await;
        result.delivered_any()
    }
}

/// Runs `op`, retrying once when the store reports itself unavailable.
fn retry_once<T>(what: &str, op: impl Fn() -> EngineResult<T>) -> EngineResult<T> {
    match op() {
        Err(EngineError::DataSourceUnavailable(reason)) => {
            warn!(operation = what, %reason, "store write failed, retrying once");
            op()
        }
        other => other,
    }
}
