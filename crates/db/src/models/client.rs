use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub dob: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClient {
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Client {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.trim().is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    /// Drop personally identifying fields before the record leaves the API.
    pub fn redact(&mut self) {
        self.email = None;
        self.phone = None;
        self.address = None;
        self.dob = None;
    }

    pub async fn find_in_tenant(
        pool: &SqlitePool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_tenant(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE tenant_id = ?1 ORDER BY first_name, last_name",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_many(pool: &SqlitePool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        let mut clients = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(client) = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?1")
                .bind(id)
                .fetch_optional(pool)
                .await?
            {
                clients.push(client);
            }
        }
        Ok(clients)
    }

    pub async fn create(pool: &SqlitePool, data: &CreateClient) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Client>(
            r#"INSERT INTO clients (id, tenant_id, first_name, last_name, company, email, phone)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.tenant_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.company)
        .bind(&data.email)
        .bind(&data.phone)
        .fetch_one(pool)
        .await
    }
}
