use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    SubAdmin,
    Requester,
    Tasker,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::SubAdmin => write!(f, "sub_admin"),
            Role::Requester => write!(f, "requester"),
            Role::Tasker => write!(f, "tasker"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "admin" => Ok(Role::Admin),
            "sub_admin" | "subadmin" => Ok(Role::SubAdmin),
            "requester" => Ok(Role::Requester),
            "tasker" => Ok(Role::Tasker),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub dob: Option<String>,
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub roles: Vec<Role>,
}

/// User as embedded in task and list responses.
///
/// Personally identifying fields are optional so the visibility layer can
/// strip them for non-admin viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub dob: Option<String>,
    pub status: String,
    pub roles: Vec<Role>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserSummary {
    pub fn from_user(user: User, roles: Vec<Role>) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: Some(user.email),
            phone: user.phone,
            address: user.address,
            dob: user.dob,
            status: user.status,
            roles,
            last_login_at: user.last_login_at,
        }
    }

    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.trim().is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn redact(&mut self) {
        self.email = None;
        self.phone = None;
        self.address = None;
        self.dob = None;
    }
}

impl User {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_in_tenant(
        pool: &SqlitePool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_tenant(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = ?1 ORDER BY first_name, last_name, created_at",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    pub async fn roles<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Role>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, Role>("SELECT role FROM user_roles WHERE user_id = ?1 ORDER BY role")
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    pub async fn summary(pool: &SqlitePool, id: Uuid) -> Result<Option<UserSummary>, sqlx::Error> {
        let Some(user) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let roles = Self::roles(pool, id).await?;
        Ok(Some(UserSummary::from_user(user, roles)))
    }

    /// All users of a tenant with their role sets, in a stable order.
    pub async fn list_summaries(
        pool: &SqlitePool,
        tenant_id: Uuid,
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        let users = Self::list_by_tenant(pool, tenant_id).await?;
        let mut summaries = Vec::with_capacity(users.len());
        for user in users {
            let roles = Self::roles(pool, user.id).await?;
            summaries.push(UserSummary::from_user(user, roles));
        }
        Ok(summaries)
    }

    pub async fn summaries_for_ids(
        pool: &SqlitePool,
        ids: &[Uuid],
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(summary) = Self::summary(pool, *id).await? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    pub async fn create(pool: &SqlitePool, data: &CreateUser) -> Result<UserSummary, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, tenant_id, first_name, last_name, email, phone)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.tenant_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.phone)
        .fetch_one(&mut *tx)
        .await?;

        for role in &data.roles {
            sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)")
                .bind(user.id)
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        let roles = Self::roles(pool, user.id).await?;
        Ok(UserSummary::from_user(user, roles))
    }

    pub async fn ids_in_tenant(
        pool: &SqlitePool,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            let exists: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM users WHERE id = ?1 AND tenant_id = ?2")
                    .bind(id)
                    .bind(tenant_id)
                    .fetch_optional(pool)
                    .await?;
            if let Some(id) = exists {
                found.push(id);
            }
        }
        Ok(found)
    }

    pub async fn touch_last_login(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(())
    }
}
