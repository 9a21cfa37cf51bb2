use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use uuid::Uuid;

use crate::models::{
    client::{Client, CreateClient},
    priority::Priority,
    project::{CreateProject, Project},
    status::Status,
    task::NewTask,
    task_type::TaskType,
    tenant::Tenant,
    user::{CreateUser, Role, User, UserSummary},
};

/// Private in-memory database with migrations applied. The single connection
/// is never recycled so the schema survives for the whole test.
pub async fn setup_test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("invalid sqlite config")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("failed to open sqlite memory db");

    crate::DBService::migrate(&pool)
        .await
        .expect("failed to run migrations");

    pool
}

/// A tenant with one user per role and the reference data tasks need.
#[derive(Debug, Clone)]
pub struct TestSeed {
    pub tenant_id: Uuid,
    pub admin: UserSummary,
    pub sub_admin: UserSummary,
    pub requester: UserSummary,
    pub tasker: UserSummary,
    pub pending: Status,
    pub in_progress: Status,
    pub completed: Status,
    pub rejected: Status,
    pub priority: Priority,
    pub task_type: TaskType,
    pub client: Client,
    /// Internal project with no client.
    pub project: Project,
    /// Project linked to `client`.
    pub client_project: Project,
}

impl TestSeed {
    pub fn new_task(&self, title: &str) -> NewTask {
        NewTask {
            tenant_id: self.tenant_id,
            title: title.to_string(),
            status_id: self.pending.id,
            priority_id: self.priority.id,
            task_type_id: Some(self.task_type.id),
            project_id: self.project.id,
            repeat_interval: 1,
            created_by: Some(self.admin.id),
            ..Default::default()
        }
    }
}

async fn seed_user(
    pool: &SqlitePool,
    tenant_id: Uuid,
    first_name: &str,
    last_name: &str,
    roles: Vec<Role>,
) -> UserSummary {
    User::create(
        pool,
        &CreateUser {
            tenant_id,
            first_name: first_name.to_string(),
            last_name: Some(last_name.to_string()),
            email: format!("{}@example.com", first_name.to_lowercase()),
            phone: Some("555-0100".to_string()),
            roles,
        },
    )
    .await
    .expect("failed to seed user")
}

pub async fn seed_tenant(pool: &SqlitePool) -> TestSeed {
    let tenant = Tenant::create(pool, "Acme Vendors")
        .await
        .expect("failed to seed tenant");
    let tenant_id = tenant.id;

    let admin = seed_user(pool, tenant_id, "Alice", "Admin", vec![Role::Admin]).await;
    let sub_admin = seed_user(pool, tenant_id, "Sam", "Deputy", vec![Role::SubAdmin]).await;
    let requester = seed_user(pool, tenant_id, "Rita", "Requester", vec![Role::Requester]).await;
    let tasker = seed_user(pool, tenant_id, "Tom", "Tasker", vec![Role::Tasker]).await;

    let pending = Status::create(pool, tenant_id, "Pending", "pending", 0)
        .await
        .expect("failed to seed status");
    let in_progress = Status::create(pool, tenant_id, "In Progress", "in-progress", 1)
        .await
        .expect("failed to seed status");
    let completed = Status::create(pool, tenant_id, "Completed", "completed", 2)
        .await
        .expect("failed to seed status");
    let rejected = Status::create(pool, tenant_id, "Rejected", "rejected", 3)
        .await
        .expect("failed to seed status");

    let priority = Priority::create(pool, tenant_id, "High", "high")
        .await
        .expect("failed to seed priority");
    let task_type = TaskType::create(pool, tenant_id, "Design")
        .await
        .expect("failed to seed task type");

    let client = Client::create(
        pool,
        &CreateClient {
            tenant_id,
            first_name: "Carla".to_string(),
            last_name: Some("Client".to_string()),
            company: Some("Client Co".to_string()),
            email: Some("carla@client.example".to_string()),
            phone: Some("555-0199".to_string()),
        },
    )
    .await
    .expect("failed to seed client");

    let project = Project::create(
        pool,
        &CreateProject {
            tenant_id,
            title: "Internal Ops".to_string(),
            description: None,
            client_id: None,
            created_by: Some(admin.id),
        },
    )
    .await
    .expect("failed to seed project");

    let client_project = Project::create(
        pool,
        &CreateProject {
            tenant_id,
            title: "Client Rebrand".to_string(),
            description: None,
            client_id: Some(client.id),
            created_by: Some(admin.id),
        },
    )
    .await
    .expect("failed to seed project");

    TestSeed {
        tenant_id,
        admin,
        sub_admin,
        requester,
        tasker,
        pending,
        in_progress,
        completed,
        rejected,
        priority,
        task_type,
        client,
        project,
        client_project,
    }
}
