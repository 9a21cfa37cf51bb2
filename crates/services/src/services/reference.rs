//! Deletion of tenant reference data (priorities, statuses, task types).
//!
//! A row still referenced by any task is refused with a business-rule error
//! rather than surfacing the foreign-key failure.

use db::models::{priority::Priority, status::Status, task_type::TaskType};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Priority,
    Status,
    TaskType,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Priority => write!(f, "priority"),
            ReferenceKind::Status => write!(f, "status"),
            ReferenceKind::TaskType => write!(f, "task type"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("The {0} was not found")]
    NotFound(ReferenceKind),
    #[error("Cannot delete this {kind} because it is assigned to {count} task(s)")]
    InUse { kind: ReferenceKind, count: i64 },
    #[error("Only admins can delete reference data")]
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkDeleteReport {
    pub deleted: Vec<Uuid>,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Clone)]
pub struct ReferenceDataService {
    pool: SqlitePool,
}

impl ReferenceDataService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn delete(
        &self,
        principal: &Principal,
        kind: ReferenceKind,
        id: Uuid,
    ) -> Result<(), ReferenceError> {
        if !principal.is_tenant_wide() {
            return Err(ReferenceError::Forbidden);
        }
        let tenant_id = principal.tenant_id;

        let (exists, count) = match kind {
            ReferenceKind::Priority => (
                Priority::find_in_tenant(&self.pool, tenant_id, id).await?.is_some(),
                Priority::usage_count(&self.pool, id).await?,
            ),
            ReferenceKind::Status => (
                Status::find_in_tenant(&self.pool, tenant_id, id).await?.is_some(),
                Status::usage_count(&self.pool, id).await?,
            ),
            ReferenceKind::TaskType => (
                TaskType::find_in_tenant(&self.pool, tenant_id, id).await?.is_some(),
                TaskType::usage_count(&self.pool, id).await?,
            ),
        };
        if !exists {
            return Err(ReferenceError::NotFound(kind));
        }
        if count > 0 {
            return Err(ReferenceError::InUse { kind, count });
        }

        match kind {
            ReferenceKind::Priority => Priority::delete(&self.pool, id).await?,
            ReferenceKind::Status => Status::delete(&self.pool, id).await?,
            ReferenceKind::TaskType => TaskType::delete(&self.pool, id).await?,
        };
        tracing::info!(%id, %kind, "Reference data deleted");
        Ok(())
    }

    /// Delete what can be deleted and report the rest.
    pub async fn delete_multiple(
        &self,
        principal: &Principal,
        kind: ReferenceKind,
        ids: &[Uuid],
    ) -> Result<BulkDeleteReport, ReferenceError> {
        if !principal.is_tenant_wide() {
            return Err(ReferenceError::Forbidden);
        }

        let mut report = BulkDeleteReport::default();
        for id in ids {
            match self.delete(principal, kind, *id).await {
                Ok(()) => report.deleted.push(*id),
                Err(ReferenceError::Database(e)) => {
                    tracing::error!(%id, %kind, "Bulk delete failed: {}", e);
                    report.skipped.push(SkippedItem {
                        id: *id,
                        reason: format!("Could not delete {}", kind),
                    });
                }
                Err(e) => report.skipped.push(SkippedItem {
                    id: *id,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(report)
    }
}
