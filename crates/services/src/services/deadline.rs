//! Strict-deadline evaluation.
//!
//! Reads never write: they get a view-corrected status from
//! [`effective_status`]. The persisted transition happens on write paths
//! through [`DeadlineEvaluator::enforce`] and in bulk through
//! [`DeadlineEvaluator::enforce_deadlines`].

use chrono::{DateTime, Utc};
use db::models::{status::Status, task::Task};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DeadlineError {
    #[error("This task is past its strict deadline and can no longer be modified")]
    Expired,
}

pub fn is_expired(task: &Task, now: DateTime<Utc>) -> bool {
    task.close_deadline && task.end_date.is_some_and(|end| now > end)
}

/// Reject collaborative writes on an expired task, whether or not the status
/// transition has been persisted yet.
pub fn ensure_writable(task: &Task, now: DateTime<Utc>) -> Result<(), DeadlineError> {
    if is_expired(task, now) {
        Err(DeadlineError::Expired)
    } else {
        Ok(())
    }
}

pub fn effective_status(task: &Task, now: DateTime<Utc>, rejected_status_id: Option<Uuid>) -> Uuid {
    match rejected_status_id {
        Some(rejected) if is_expired(task, now) => rejected,
        _ => task.status_id,
    }
}

#[derive(Clone)]
pub struct DeadlineEvaluator {
    pool: SqlitePool,
}

impl DeadlineEvaluator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist the rejected status on an expired task. Returns whether a row
    /// changed; a second call on the same task is a no-op.
    pub async fn enforce(
        &self,
        task: &mut Task,
        now: DateTime<Utc>,
        rejected_status_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        if !is_expired(task, now) || task.status_id == rejected_status_id {
            return Ok(false);
        }
        let changed = Task::reject_if_not(&self.pool, task.id, rejected_status_id).await?;
        task.status_id = rejected_status_id;
        if changed {
            tracing::info!(task_id = %task.id, "Task rejected after strict deadline passed");
        }
        Ok(changed)
    }

    /// Look up the tenant's rejected status and enforce against it. Tenants
    /// without one get no persisted transition.
    pub async fn enforce_for_tenant(&self, task: &mut Task, now: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        if !is_expired(task, now) {
            return Ok(false);
        }
        match Status::rejected(&self.pool, task.tenant_id).await? {
            Some(rejected) => self.enforce(task, now, rejected.id).await,
            None => {
                tracing::warn!(tenant_id = %task.tenant_id, "No rejected status defined; skipping deadline enforcement");
                Ok(false)
            }
        }
    }

    /// Sweep every strict-deadline task in the tenant. Returns the ids that
    /// were transitioned by this call.
    pub async fn enforce_deadlines(&self, tenant_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Uuid>, sqlx::Error> {
        let Some(rejected) = Status::rejected(&self.pool, tenant_id).await? else {
            return Ok(Vec::new());
        };

        let mut transitioned = Vec::new();
        for mut task in Task::find_strict_deadline(&self.pool, tenant_id).await? {
            if self.enforce(&mut task, now, rejected.id).await? {
                transitioned.push(task.id);
            }
        }
        if !transitioned.is_empty() {
            tracing::info!(%tenant_id, count = transitioned.len(), "Deadline sweep rejected tasks");
        }
        Ok(transitioned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use db::test_utils::{seed_tenant, setup_test_pool};

    #[tokio::test]
    async fn expiry_requires_strict_flag_and_past_end() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let now = Utc::now();

        let mut data = seed.new_task("Deadline");
        data.end_date = Some(now - Duration::hours(1));
        let mut task = Task::insert(&pool, &data).await.unwrap();

        assert!(!is_expired(&task, now));
        assert_eq!(effective_status(&task, now, Some(seed.rejected.id)), seed.pending.id);

        task.close_deadline = true;
        assert!(is_expired(&task, now));
        assert!(ensure_writable(&task, now).is_err());
        assert_eq!(effective_status(&task, now, Some(seed.rejected.id)), seed.rejected.id);

        task.end_date = None;
        assert!(!is_expired(&task, now));
    }

    #[tokio::test]
    async fn enforce_deadlines_is_idempotent() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let now = Utc::now();

        let mut expired = seed.new_task("Expired");
        expired.close_deadline = true;
        expired.end_date = Some(now - Duration::days(1));
        let expired = Task::insert(&pool, &expired).await.unwrap();

        let mut lenient = seed.new_task("Lenient");
        lenient.end_date = Some(now - Duration::days(1));
        let lenient = Task::insert(&pool, &lenient).await.unwrap();

        let evaluator = DeadlineEvaluator::new(pool.clone());
        let first = evaluator.enforce_deadlines(seed.tenant_id, now).await.unwrap();
        assert_eq!(first, vec![expired.id]);
        let second = evaluator.enforce_deadlines(seed.tenant_id, now).await.unwrap();
        assert!(second.is_empty());

        let reloaded = Task::find_by_id(&pool, expired.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status_id, seed.rejected.id);
        let untouched = Task::find_by_id(&pool, lenient.id).await.unwrap().unwrap();
        assert_eq!(untouched.status_id, seed.pending.id);
    }
}
