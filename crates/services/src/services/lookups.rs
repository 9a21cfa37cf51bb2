//! Read-only lookups: users, projects, dashboard counts and title search.
//! All results are scoped to the principal's visibility.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use db::models::{
    client::Client,
    project::Project,
    status::Status,
    task::{Task, TaskFilter},
    user::{User, UserSummary},
};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{
    deadline,
    principal::Principal,
    visibility::{self, EntityKind, Scope},
};

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status_id: Uuid,
    pub title: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub overdue_tasks: usize,
    pub due_this_week: usize,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchHit {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SearchResults {
    pub tasks: Vec<SearchHit>,
    pub projects: Vec<SearchHit>,
    pub clients: Vec<SearchHit>,
}

const SEARCH_LIMIT: usize = 20;

#[derive(Clone)]
pub struct LookupService {
    pool: SqlitePool,
}

impl LookupService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn users(&self, principal: &Principal) -> Result<Vec<UserSummary>, sqlx::Error> {
        let mut users = User::list_summaries(&self.pool, principal.tenant_id).await?;
        if !visibility::shows_personal_details(principal) {
            users.iter_mut().for_each(UserSummary::redact);
        }
        Ok(users)
    }

    pub async fn projects(&self, principal: &Principal) -> Result<Vec<Project>, sqlx::Error> {
        match visibility::scope(principal, EntityKind::Project) {
            Scope::Tenant => Project::list_by_tenant(&self.pool, principal.tenant_id).await,
            _ => Project::list_for_member(&self.pool, principal.tenant_id, principal.user_id).await,
        }
    }

    async fn visible_tasks(&self, principal: &Principal, filter: &TaskFilter) -> Result<Vec<Task>, sqlx::Error> {
        let visibility = visibility::scope(principal, EntityKind::Task).task_visibility();
        Task::find_visible(&self.pool, principal.tenant_id, visibility, filter).await
    }

    pub async fn dashboard(&self, principal: &Principal, now: DateTime<Utc>) -> Result<Dashboard, sqlx::Error> {
        let tasks = self.visible_tasks(principal, &TaskFilter::default()).await?;
        let statuses = Status::list_by_tenant(&self.pool, principal.tenant_id).await?;
        let rejected = statuses.iter().find(|s| s.is_rejected()).map(|s| s.id);
        let completed_ids: Vec<Uuid> = statuses.iter().filter(|s| s.is_completed()).map(|s| s.id).collect();
        let week_ahead = now + Duration::days(7);

        let mut counts: BTreeMap<Uuid, usize> = BTreeMap::new();
        let mut completed_tasks = 0;
        let mut overdue_tasks = 0;
        let mut due_this_week = 0;

        for task in &tasks {
            let status_id = deadline::effective_status(task, now, rejected);
            *counts.entry(status_id).or_default() += 1;

            let done = completed_ids.contains(&status_id);
            if done {
                completed_tasks += 1;
                continue;
            }
            match task.end_date {
                Some(end) if end < now => overdue_tasks += 1,
                Some(end) if end <= week_ahead => due_this_week += 1,
                _ => {}
            }
        }

        let by_status = statuses
            .iter()
            .map(|s| StatusCount {
                status_id: s.id,
                title: s.title.clone(),
                count: counts.get(&s.id).copied().unwrap_or(0),
            })
            .collect();

        Ok(Dashboard {
            total_tasks: tasks.len(),
            completed_tasks,
            overdue_tasks,
            due_this_week,
            by_status,
        })
    }

    /// Case-insensitive substring search over task, project and client names.
    pub async fn search(&self, principal: &Principal, query: &str) -> Result<SearchResults, sqlx::Error> {
        let needle = utils::text::normalize(query);
        if needle.is_empty() {
            return Ok(SearchResults::default());
        }

        let tasks = self
            .visible_tasks(
                principal,
                &TaskFilter {
                    search: Some(query.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        let projects = self
            .projects(principal)
            .await?
            .into_iter()
            .filter(|p| utils::text::normalize(&p.title).contains(&needle))
            .take(SEARCH_LIMIT)
            .map(|p| SearchHit { id: p.id, title: p.title })
            .collect();

        let clients = if principal.is_tenant_wide() {
            Client::list_by_tenant(&self.pool, principal.tenant_id).await?
        } else {
            let mut ids = Vec::new();
            for task in self.visible_tasks(principal, &TaskFilter::default()).await? {
                for id in Task::client_ids(&self.pool, task.id).await? {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            Client::find_many(&self.pool, &ids).await?
        };
        let clients = clients
            .into_iter()
            .filter(|c| {
                let company = c.company.as_deref().map(utils::text::normalize).unwrap_or_default();
                utils::text::normalize(&c.full_name()).contains(&needle) || company.contains(&needle)
            })
            .take(SEARCH_LIMIT)
            .map(|c| SearchHit {
                id: c.id,
                title: c.full_name(),
            })
            .collect();

        Ok(SearchResults {
            tasks: tasks
                .into_iter()
                .rev()
                .take(SEARCH_LIMIT)
                .map(|t| SearchHit { id: t.id, title: t.title })
                .collect(),
            projects,
            clients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::test_utils::{seed_tenant, setup_test_pool};

    #[tokio::test]
    async fn dashboard_counts_effective_statuses() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let now = Utc::now();

        let mut expired = seed.new_task("Expired");
        expired.close_deadline = true;
        expired.end_date = Some(now - Duration::days(1));
        Task::insert(&pool, &expired).await.unwrap();

        let mut soon = seed.new_task("Due soon");
        soon.end_date = Some(now + Duration::days(2));
        Task::insert(&pool, &soon).await.unwrap();

        let mut done = seed.new_task("Done");
        done.status_id = seed.completed.id;
        done.end_date = Some(now - Duration::days(10));
        Task::insert(&pool, &done).await.unwrap();

        let admin = Principal::new(seed.admin.id, seed.tenant_id, seed.admin.roles.clone());
        let dashboard = LookupService::new(pool.clone()).dashboard(&admin, now).await.unwrap();

        assert_eq!(dashboard.total_tasks, 3);
        assert_eq!(dashboard.completed_tasks, 1);
        assert_eq!(dashboard.overdue_tasks, 1);
        assert_eq!(dashboard.due_this_week, 1);
        let rejected = dashboard
            .by_status
            .iter()
            .find(|s| s.status_id == seed.rejected.id)
            .unwrap();
        assert_eq!(rejected.count, 1);
    }

    #[tokio::test]
    async fn users_are_redacted_for_taskers() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let tasker = Principal::new(seed.tasker.id, seed.tenant_id, seed.tasker.roles.clone());

        let users = LookupService::new(pool.clone()).users(&tasker).await.unwrap();
        assert_eq!(users.len(), 4);
        assert!(users.iter().all(|u| u.email.is_none() && u.phone.is_none()));
    }

    #[tokio::test]
    async fn search_spans_tasks_projects_and_clients() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        Task::insert(&pool, &seed.new_task("Rebrand moodboard")).await.unwrap();
        let admin = Principal::new(seed.admin.id, seed.tenant_id, seed.admin.roles.clone());

        let results = LookupService::new(pool.clone())
            .search(&admin, "rebrand")
            .await
            .unwrap();
        assert_eq!(results.tasks.len(), 1);
        assert_eq!(results.projects[0].id, seed.client_project.id);
        assert!(results.clients.is_empty());

        let results = LookupService::new(pool.clone())
            .search(&admin, "client co")
            .await
            .unwrap();
        assert_eq!(results.clients[0].id, seed.client.id);
    }
}
