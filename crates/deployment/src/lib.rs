use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::{DBService, models::tenant::Tenant};
use serde::Serialize;
use services::services::{
    config::{Config, ConfigError},
    lifecycle::TaskLifecycleManager,
    lookups::LookupService,
    notifications::EventBus,
    reference::ReferenceDataService,
    repeat::RepeatScheduler,
};
use smart_task::SmartTaskAgent;
use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outcome of one deadline/repeat sweep for a tenant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub tenant_id: Uuid,
    pub rejected: Vec<Uuid>,
    pub generated: Vec<Uuid>,
}

#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<Config>;

    fn db(&self) -> &DBService;

    fn events(&self) -> &EventBus;

    fn lifecycle(&self) -> &TaskLifecycleManager;

    fn reference(&self) -> &ReferenceDataService;

    fn repeat(&self) -> &RepeatScheduler;

    fn lookups(&self) -> &LookupService;

    fn smart_task(&self) -> &Arc<SmartTaskAgent>;

    /// Persist deadline rejections and generate due repeat occurrences for
    /// one tenant.
    async fn sweep_tenant(&self, tenant_id: Uuid, now: DateTime<Utc>) -> Result<SweepReport, DeploymentError> {
        let rejected = self
            .lifecycle()
            .deadlines()
            .enforce_deadlines(tenant_id, now)
            .await?;
        let generated = self
            .repeat()
            .generate_due_occurrences(tenant_id, now)
            .await?
            .into_iter()
            .map(|occurrence| occurrence.task_id)
            .collect();

        Ok(SweepReport {
            tenant_id,
            rejected,
            generated,
        })
    }

    /// Sweep every tenant. A failing tenant is logged and skipped.
    async fn sweep_all(&self, now: DateTime<Utc>) -> Result<Vec<SweepReport>, DeploymentError> {
        let mut reports = Vec::new();
        for tenant_id in Tenant::list_ids(&self.db().pool).await? {
            match self.sweep_tenant(tenant_id, now).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(%tenant_id, "Sweep failed for tenant: {}", e),
            }
        }
        Ok(reports)
    }

    /// Periodic sweep, enabled by `sweep_interval_secs`.
    fn spawn_sweeper(&self) -> Option<tokio::task::JoinHandle<()>> {
        let secs = self.config().sweep_interval_secs?;
        let deployment = self.clone();
        tracing::info!("Starting deadline/repeat sweeper every {}s", secs);

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            loop {
                interval.tick().await;
                match deployment.sweep_all(Utc::now()).await {
                    Ok(reports) => {
                        let rejected: usize = reports.iter().map(|r| r.rejected.len()).sum();
                        let generated: usize = reports.iter().map(|r| r.generated.len()).sum();
                        if rejected + generated > 0 {
                            tracing::info!(rejected, generated, "Sweep completed");
                        }
                    }
                    Err(e) => tracing::error!("Sweep failed: {}", e),
                }
            }
        }))
    }
}
