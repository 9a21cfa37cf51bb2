//! Repeating task occurrences.
//!
//! The n-th occurrence of a parent starts at `start + n * interval *
//! frequency`, always computed from the parent's own start so month-end
//! clamping does not drift. Progress is the start of the latest existing
//! occurrence, so deleting an occurrence never causes it, or any other, to be
//! generated twice. Generation is explicit; reads never trigger it.

use chrono::{DateTime, Duration, Months, Utc};
use db::models::{
    status::Status,
    task::{NewTask, RepeatFrequency, Task},
};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::notifications::{EventBus, TaskEvent};

/// Upper bound on occurrences created for one parent in a single run.
const MAX_CATCH_UP: usize = 100;

/// Shift `start` by `steps` repeat periods. Monthly and yearly steps clamp to
/// the last day of shorter months.
pub fn shift(start: DateTime<Utc>, frequency: RepeatFrequency, interval: i64, steps: i64) -> Option<DateTime<Utc>> {
    let periods = interval.checked_mul(steps)?;
    match frequency {
        RepeatFrequency::Daily => start.checked_add_signed(Duration::try_days(periods)?),
        RepeatFrequency::Weekly => start.checked_add_signed(Duration::try_weeks(periods)?),
        RepeatFrequency::Monthly => start.checked_add_months(Months::new(u32::try_from(periods).ok()?)),
        RepeatFrequency::Yearly => {
            start.checked_add_months(Months::new(u32::try_from(periods.checked_mul(12)?).ok()?))
        }
    }
}

/// Start of occurrence number `step` (the parent itself is step 0).
pub fn occurrence_start(task: &Task, step: i64) -> Option<DateTime<Utc>> {
    let frequency = task.repeat_frequency?;
    let anchor = task.start_date.unwrap_or(task.created_at);
    shift(anchor, frequency, task.repeat_interval.max(1), step)
}

/// First occurrence starting strictly after `after`, or the first one at all.
pub fn next_occurrence(task: &Task, after: Option<DateTime<Utc>>) -> Option<(i64, DateTime<Utc>)> {
    let mut step = 1;
    loop {
        let start = occurrence_start(task, step)?;
        if after.is_none_or(|after| start > after) {
            return Some((step, start));
        }
        step += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedOccurrence {
    pub parent_id: Uuid,
    pub task_id: Uuid,
    pub start_date: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RepeatScheduler {
    pool: SqlitePool,
    events: EventBus,
}

impl RepeatScheduler {
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        Self { pool, events }
    }

    /// Create every occurrence whose start is due by `now` for the tenant's
    /// active repeating tasks.
    pub async fn generate_due_occurrences(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<GeneratedOccurrence>, sqlx::Error> {
        let Some(initial_status) = Status::default_for_tenant(&self.pool, tenant_id).await? else {
            tracing::warn!(%tenant_id, "No statuses defined; skipping repeat generation");
            return Ok(Vec::new());
        };

        let mut generated = Vec::new();
        for parent in Task::find_repeating_parents(&self.pool, tenant_id).await? {
            // Without any surviving occurrence, the last run time bounds what
            // was already generated.
            let after = match Task::latest_child(&self.pool, parent.id).await? {
                Some(latest) => latest.start_date,
                None => parent.last_repeated_at,
            };
            let Some((mut step, _)) = next_occurrence(&parent, after) else {
                continue;
            };
            let mut created_now = 0;

            while created_now < MAX_CATCH_UP {
                let Some(start) = occurrence_start(&parent, step) else {
                    break;
                };
                if start > now || parent.repeat_until.is_some_and(|until| start > until) {
                    break;
                }
                let child = self.create_occurrence(&parent, start, initial_status.id, now).await?;
                generated.push(GeneratedOccurrence {
                    parent_id: parent.id,
                    task_id: child,
                    start_date: start,
                });
                step += 1;
                created_now += 1;
            }

            if created_now == MAX_CATCH_UP {
                tracing::warn!(parent_id = %parent.id, "Repeat catch-up limit reached");
            }
        }

        if !generated.is_empty() {
            tracing::info!(%tenant_id, count = generated.len(), "Generated repeating task occurrences");
        }
        Ok(generated)
    }

    async fn create_occurrence(
        &self,
        parent: &Task,
        start: DateTime<Utc>,
        status_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Uuid, sqlx::Error> {
        let end = match (parent.start_date, parent.end_date) {
            (Some(parent_start), Some(parent_end)) => Some(start + (parent_end - parent_start)),
            _ => None,
        };

        let data = NewTask {
            tenant_id: parent.tenant_id,
            title: parent.title.clone(),
            description: parent.description.clone(),
            status_id,
            priority_id: parent.priority_id,
            task_type_id: parent.task_type_id,
            project_id: parent.project_id,
            start_date: Some(start),
            end_date: end,
            close_deadline: parent.close_deadline,
            is_repeating: false,
            repeat_frequency: None,
            repeat_interval: 1,
            repeat_until: None,
            parent_task_id: Some(parent.id),
            template_id: parent.template_id,
            template_questions: parent.template_questions.as_ref().map(|q| q.0.clone()),
            template_checklist: parent.template_checklist.as_ref().map(|c| c.0.clone()),
            template_standard_brief: parent.template_standard_brief.clone(),
            template_description: parent.template_description.clone(),
            template_deliverable_quantity: parent.template_deliverable_quantity,
            deliverable_quantity: parent.deliverable_quantity,
            created_by: parent.created_by,
        };

        let users = Task::user_ids(&self.pool, parent.id).await?;
        let clients = Task::client_ids(&self.pool, parent.id).await?;
        let tags = Task::tag_ids(&self.pool, parent.id).await?;

        let mut tx = self.pool.begin().await?;
        let child = Task::insert(&mut *tx, &data).await?;
        Task::sync_users(&mut *tx, child.id, &users).await?;
        Task::sync_clients(&mut *tx, child.id, &clients).await?;
        Task::sync_tags(&mut *tx, child.id, &tags).await?;
        Task::set_last_repeated_at(&mut *tx, parent.id, now).await?;
        tx.commit().await?;

        tracing::debug!(parent_id = %parent.id, child_id = %child.id, %start, "Occurrence created");
        if let Some(assigned_by) = parent.created_by {
            for user_id in users {
                self.events.publish(TaskEvent::Assigned {
                    tenant_id: child.tenant_id,
                    task_id: child.id,
                    task_title: child.title.clone(),
                    user_id,
                    assigned_by,
                });
            }
        }
        Ok(child.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::test_utils::{seed_tenant, setup_test_pool};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn monthly_shift_clamps_to_month_end() {
        let start = at(2025, 1, 31);
        assert_eq!(shift(start, RepeatFrequency::Monthly, 1, 1), Some(at(2025, 2, 28)));
        assert_eq!(shift(start, RepeatFrequency::Monthly, 1, 2), Some(at(2025, 3, 31)));
        assert_eq!(shift(at(2024, 2, 29), RepeatFrequency::Yearly, 1, 1), Some(at(2025, 2, 28)));
    }

    #[test]
    fn interval_multiplies_period() {
        let start = at(2025, 1, 1);
        assert_eq!(shift(start, RepeatFrequency::Weekly, 2, 1), Some(at(2025, 1, 15)));
        assert_eq!(shift(start, RepeatFrequency::Daily, 3, 2), Some(at(2025, 1, 7)));
    }

    #[tokio::test]
    async fn generates_due_occurrences_until_limit() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;

        let mut data = seed.new_task("Daily standup notes");
        data.is_repeating = true;
        data.repeat_frequency = Some(RepeatFrequency::Daily);
        data.start_date = Some(at(2025, 1, 1));
        data.end_date = Some(at(2025, 1, 1) + Duration::hours(8));
        data.repeat_until = Some(at(2025, 1, 3));
        data.status_id = seed.in_progress.id;
        let parent = Task::insert(&pool, &data).await.unwrap();

        let scheduler = RepeatScheduler::new(pool.clone(), EventBus::default());
        let generated = scheduler
            .generate_due_occurrences(seed.tenant_id, at(2025, 1, 10))
            .await
            .unwrap();
        assert_eq!(
            generated.iter().map(|g| g.start_date).collect::<Vec<_>>(),
            vec![at(2025, 1, 2), at(2025, 1, 3)]
        );

        let children = Task::children(&pool, parent.id).await.unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.status_id == seed.pending.id && !c.is_repeating));
        assert_eq!(children[0].end_date, Some(at(2025, 1, 2) + Duration::hours(8)));

        let again = scheduler
            .generate_due_occurrences(seed.tenant_id, at(2025, 1, 10))
            .await
            .unwrap();
        assert!(again.is_empty());

        let parent_after = Task::find_by_id(&pool, parent.id).await.unwrap().unwrap();
        assert_eq!(parent_after.status_id, seed.in_progress.id);
        assert!(parent_after.last_repeated_at.is_some());
    }

    #[tokio::test]
    async fn deleted_occurrence_is_not_regenerated() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;

        let mut data = seed.new_task("Daily inbox sweep");
        data.is_repeating = true;
        data.repeat_frequency = Some(RepeatFrequency::Daily);
        data.start_date = Some(at(2025, 1, 1));
        let parent = Task::insert(&pool, &data).await.unwrap();

        let scheduler = RepeatScheduler::new(pool.clone(), EventBus::default());
        let first = scheduler
            .generate_due_occurrences(seed.tenant_id, at(2025, 1, 4))
            .await
            .unwrap();
        assert_eq!(first.len(), 3);

        Task::delete(&pool, first[0].task_id).await.unwrap();
        let again = scheduler
            .generate_due_occurrences(seed.tenant_id, at(2025, 1, 4))
            .await
            .unwrap();
        assert!(again.is_empty());

        let later = scheduler
            .generate_due_occurrences(seed.tenant_id, at(2025, 1, 5))
            .await
            .unwrap();
        assert_eq!(later.iter().map(|g| g.start_date).collect::<Vec<_>>(), vec![at(2025, 1, 5)]);

        let starts: Vec<_> = Task::children(&pool, parent.id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|c| c.start_date)
            .collect();
        assert_eq!(starts, vec![at(2025, 1, 3), at(2025, 1, 4), at(2025, 1, 5)]);
    }

    #[tokio::test]
    async fn next_occurrence_skips_past_progress() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let mut data = seed.new_task("Weekly report");
        data.is_repeating = true;
        data.repeat_frequency = Some(RepeatFrequency::Weekly);
        data.start_date = Some(at(2025, 1, 1));
        let task = Task::insert(&pool, &data).await.unwrap();

        assert_eq!(next_occurrence(&task, None), Some((1, at(2025, 1, 8))));
        assert_eq!(next_occurrence(&task, Some(at(2025, 1, 8))), Some((2, at(2025, 1, 15))));
        assert_eq!(next_occurrence(&task, Some(at(2025, 1, 9))), Some((2, at(2025, 1, 15))));
    }

    #[tokio::test]
    async fn paused_parents_generate_nothing() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;

        let mut data = seed.new_task("Paused weekly");
        data.is_repeating = true;
        data.repeat_frequency = Some(RepeatFrequency::Weekly);
        data.start_date = Some(at(2025, 1, 1));
        let parent = Task::insert(&pool, &data).await.unwrap();
        Task::set_repeat_active(&pool, parent.id, false).await.unwrap();

        let generated = RepeatScheduler::new(pool.clone(), EventBus::default())
            .generate_due_occurrences(seed.tenant_id, at(2025, 3, 1))
            .await
            .unwrap();
        assert!(generated.is_empty());
    }
}
