use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    config::Config,
    lifecycle::TaskLifecycleManager,
    lookups::LookupService,
    notifications::{EventBus, spawn_notification_worker},
    reference::ReferenceDataService,
    repeat::RepeatScheduler,
};
use smart_task::{SmartTaskAgent, api::LocalTaskApi};

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    events: EventBus,
    lifecycle: TaskLifecycleManager,
    reference: ReferenceDataService,
    repeat: RepeatScheduler,
    lookups: LookupService,
    smart_task: Arc<SmartTaskAgent>,
}

impl LocalDeployment {
    /// Wire every service over an already migrated database. Must be called
    /// inside a Tokio runtime: the notification worker is spawned here.
    pub fn from_parts(config: Config, db: DBService) -> Self {
        let events = EventBus::default();
        spawn_notification_worker(db.pool.clone(), &events);

        let lifecycle = TaskLifecycleManager::new(db.pool.clone(), events.clone())
            .with_uploads_dir(config.uploads_dir());
        let reference = ReferenceDataService::new(db.pool.clone());
        let repeat = RepeatScheduler::new(db.pool.clone(), events.clone());
        let lookups = LookupService::new(db.pool.clone());
        let smart_task = Arc::new(SmartTaskAgent::from_config(
            Arc::new(LocalTaskApi::new(lifecycle.clone())),
            &config,
        ));

        Self {
            config: Arc::new(config),
            db,
            events,
            lifecycle,
            reference,
            repeat,
            lookups,
            smart_task,
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::load()?;
        let db = match config.database_url.as_deref() {
            Some(url) => DBService::new_with_url(url).await?,
            None => DBService::new().await?,
        };
        tokio::fs::create_dir_all(config.uploads_dir()).await?;
        tracing::info!(
            uploads = %config.uploads_dir().display(),
            assistant_oracle = config.oracle.is_configured(),
            "Local deployment ready"
        );
        Ok(Self::from_parts(config, db))
    }

    fn config(&self) -> &Arc<Config> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn lifecycle(&self) -> &TaskLifecycleManager {
        &self.lifecycle
    }

    fn reference(&self) -> &ReferenceDataService {
        &self.reference
    }

    fn repeat(&self) -> &RepeatScheduler {
        &self.repeat
    }

    fn lookups(&self) -> &LookupService {
        &self.lookups
    }

    fn smart_task(&self) -> &Arc<SmartTaskAgent> {
        &self.smart_task
    }
}
