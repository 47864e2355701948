use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::alert::dispatcher::NotificationDispatcher;
use crate::alert::engine::{AlertManager, ReconcileReport};
use crate::alert::summary::{summarize, AlertSummary};
use crate::config::{Config, PlannerConfig};
use crate::error::{EngineError, EngineResult};
use crate::hazard::assessor::HazardAssessor;
use crate::hazard::{RiskAssessment, RiskTable};
use crate::inventory::{Product, ShipmentRecord, ShipmentStatus};
use crate::planner::delay::predict_with_risks;
use crate::planner::reorder::plan_with_risks;
use crate::planner::resilience::score_with_risks;
use crate::planner::{DelayPrediction, ReorderRecommendation, ResilienceScore};
use crate::store::InventoryStore;

/// Products and shipments read once at scan start and shared immutably by
/// every computation in the scan.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub products: Vec<Product>,
    pub shipments: Vec<ShipmentRecord>,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Every location a scan needs risk for: suppliers, plus both ends of
    /// in-transit shipments.
    pub fn locations(&self) -> Vec<String> {
        let suppliers = self.products.iter().map(|p| p.supplier_location.clone());
        let legs = self
            .shipments
            .iter()
            .filter(|s| s.status == ShipmentStatus::InTransit)
            .flat_map(|s| [s.origin.clone(), s.destination.clone()]);
        suppliers.chain(legs).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hazard_provider: String,
    pub products_scanned: usize,
    pub shipments_scanned: usize,
    pub alerts: ReconcileReport,
    pub delays: Vec<DelayPrediction>,
    pub reorders: Vec<ReorderRecommendation>,
    pub resilience: ResilienceScore,
    pub risks: Vec<RiskAssessment>,
    pub fallback_locations: Vec<String>,
}

pub struct ScanEngine {
    store: Arc<dyn InventoryStore>,
    assessor: Arc<HazardAssessor>,
    alerts: AlertManager,
    planner: PlannerConfig,
    concurrency: usize,
}

impl ScanEngine {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        assessor: Arc<HazardAssessor>,
        alerts: AlertManager,
        planner: PlannerConfig,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            assessor,
            alerts,
            planner,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn InventoryStore>,
        assessor: Arc<HazardAssessor>,
    ) -> EngineResult<Self> {
        let dispatcher = Arc::new(NotificationDispatcher::from_config(&config.alerts)?);
        let alerts = AlertManager::from_config(Arc::clone(&store), dispatcher, config);
        Ok(Self::new(
            store,
            assessor,
            alerts,
            config.planner.clone(),
            config.scan.concurrency,
        ))
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    pub fn assessor(&self) -> &Arc<HazardAssessor> {
        &self.assessor
    }

    pub fn snapshot(&self) -> EngineResult<Snapshot> {
        Ok(Snapshot {
            products: self.store.list_products()?,
            shipments: self.store.list_shipments(None)?,
            taken_at: Utc::now(),
        })
    }

    async fn risk_table(&self, locations: Vec<String>) -> RiskTable {
        self.assessor.assess_many(locations, self.concurrency).await
    }

    /// One full pass. Only an unreadable store aborts; hazard and dispatch
    /// problems degrade into fallback data and report entries.
    pub async fn run(&self) -> EngineResult<ScanReport> {
        let started_at = Utc::now();
        let snapshot = self.snapshot()?;
        let risks = self.risk_table(snapshot.locations()).await;

        let delays = predict_with_risks(&snapshot.shipments, None, &risks, &self.planner);
        let reorders = plan_with_risks(&snapshot.products, &risks, &self.planner);
        let alerts = self
            .alerts
            .reconcile(&snapshot.products, &snapshot.shipments)
            .await?;
        let active = self.store.active_alerts()?;
        let resilience = score_with_risks(&snapshot.products, &active, &risks);

        let fallback_locations = risks.fallback_locations();
        let report = ScanReport {
            started_at,
            finished_at: Utc::now(),
            hazard_provider: self.assessor.provider_name().to_string(),
            products_scanned: snapshot.products.len(),
            shipments_scanned: snapshot.shipments.len(),
            alerts,
            delays,
            reorders,
            resilience,
            risks: risks.iter().cloned().collect(),
            fallback_locations,
        };
        info!(
            products = report.products_scanned,
            alerts_created = report.alerts.created.len(),
            alerts_resolved = report.alerts.resolved,
            reorders = report.reorders.len(),
            score = report.resilience.score,
            fallback_locations = report.fallback_locations.len(),
            "scan complete"
        );
        Ok(report)
    }

    pub async fn risk(&self, location: &str) -> RiskAssessment {
        self.assessor.assess(location).await
    }

    pub async fn delays(&self, product_filter: Option<&str>) -> EngineResult<Vec<DelayPrediction>> {
        let shipments = self.store.list_shipments(Some(ShipmentStatus::InTransit))?;
        let locations = shipments
            .iter()
            .flat_map(|s| [s.origin.clone(), s.destination.clone()])
            .collect();
        let risks = self.risk_table(locations).await;
        Ok(predict_with_risks(&shipments, product_filter, &risks, &self.planner))
    }

    pub async fn reorders(&self) -> EngineResult<Vec<ReorderRecommendation>> {
        let products = self.store.list_products()?;
        let locations = products.iter().map(|p| p.supplier_location.clone()).collect();
        let risks = self.risk_table(locations).await;
        Ok(plan_with_risks(&products, &risks, &self.planner))
    }

    pub async fn resilience(&self) -> EngineResult<ResilienceScore> {
        let products = self.store.list_products()?;
        let active = self.store.active_alerts()?;
        let locations = products.iter().map(|p| p.supplier_location.clone()).collect();
        let risks = self.risk_table(locations).await;
        Ok(score_with_risks(&products, &active, &risks))
    }

    pub fn alert_summary(&self) -> EngineResult<AlertSummary> {
        Ok(summarize(&self.store.active_alerts()?))
    }

    pub fn product(&self, product_id: &str) -> EngineResult<Product> {
        self.store
            .get_product(product_id)?
            .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ScanEngine;
    use crate::alert::dispatcher::NotificationDispatcher;
    use crate::alert::engine::AlertManager;
    use crate::alert::sink::tests::RecordingChannel;
    use crate::config::PlannerConfig;
    use crate::error::EngineError;
    use crate::hazard::assessor::tests::UnreachableProvider;
    use crate::hazard::assessor::{HazardAssessor, HazardRules};
    use crate::inventory::StockStatus;
    use crate::planner::HealthBand;
    use crate::store::seed::seed_sample_data;
    use crate::store::sqlite::SqliteStore;
    use crate::store::InventoryStore;
    use crate::types::Severity;

    fn engine(assessor: HazardAssessor) -> (ScanEngine, Arc<SqliteStore>, Arc<RecordingChannel>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        seed_sample_data(store.as_ref()).unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher =
            Arc::new(NotificationDispatcher::new("supply-chain-alerts").with_channel(channel.clone()));
        let alerts = AlertManager::new(store.clone(), dispatcher);
        let engine = ScanEngine::new(
            store.clone(),
            Arc::new(assessor),
            alerts,
            PlannerConfig::default(),
            4,
        );
        (engine, store, channel)
    }

    #[tokio::test]
    async fn sample_data_scan_produces_alerts_and_score() {
        let (engine, _, channel) = engine(HazardAssessor::offline());
        let report = engine.run().await.unwrap();

        assert_eq!(report.products_scanned, 5);
        assert_eq!(report.shipments_scanned, 3);
        let mut created = report
            .alerts
            .created
            .iter()
            .map(|a| a.product_id.as_str())
            .collect::<Vec<_>>();
        created.sort_unstable();
        assert_eq!(created, vec!["CHIP-X", "PWR-MOD"]);
        // both are LowStock / Medium: nothing to notify
        assert_eq!(channel.count(), 0);

        // two Low products, Kochi at Medium, two active alerts
        assert_eq!(report.resilience.score, 70);
        assert_eq!(report.resilience.health_band, HealthBand::Good);
        assert_eq!(report.delays.len(), 2);
        assert!(report.fallback_locations.is_empty());
        assert!(report.reorders.iter().any(|r| r.product_id == "PWR-MOD"));
    }

    #[tokio::test]
    async fn second_scan_is_idempotent() {
        let (engine, store, _) = engine(HazardAssessor::offline());
        engine.run().await.unwrap();
        let second = engine.run().await.unwrap();
        assert!(second.alerts.created.is_empty());
        assert_eq!(second.alerts.unchanged, 2);
        assert_eq!(store.active_alerts().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stock_update_resolves_on_next_scan() {
        let (engine, store, _) = engine(HazardAssessor::offline());
        engine.run().await.unwrap();
        let product = store.update_stock("PWR-MOD", 20).unwrap();
        assert_eq!(product.status(), StockStatus::Ok);

        let report = engine.run().await.unwrap();
        assert_eq!(report.alerts.resolved, 1);
        let summary = engine.alert_summary().unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.medium, 1);
    }

    #[tokio::test]
    async fn unreachable_provider_still_completes() {
        let assessor = HazardAssessor::new(Arc::new(UnreachableProvider), HazardRules::default());
        let (engine, _, _) = engine(assessor);
        let report = engine.run().await.unwrap();
        assert!(!report.fallback_locations.is_empty());
        assert_eq!(report.fallback_locations.len(), report.risks.len());
        assert!(report.resilience.score <= 100);
        assert!(report.delays.iter().all(|d| d.used_fallback));

        let kochi = engine.risk("Kochi, India").await;
        assert!(kochi.used_fallback());
        assert_eq!(kochi.risk_level, Severity::Medium);
    }

    #[tokio::test]
    async fn query_views_read_through_the_store() {
        let (engine, _, _) = engine(HazardAssessor::offline());
        let delays = engine.delays(Some("SENS-9")).await.unwrap();
        assert_eq!(delays.len(), 1);
        assert_eq!(delays[0].origin, "Ho Chi Minh City, Vietnam");

        let reorders = engine.reorders().await.unwrap();
        assert!(reorders.iter().any(|r| r.product_id == "CHIP-X"));

        let score = engine.resilience().await.unwrap();
        assert_eq!(score.active_alerts, 0);

        assert_eq!(engine.product("LOGIC-A").unwrap().stock_level, 44);
        assert!(matches!(engine.product("NOPE"), Err(EngineError::NotFound(_))));
    }
}
