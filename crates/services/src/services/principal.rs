use db::models::user::{Role, User};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// The authenticated caller, passed explicitly into every core operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(user_id: Uuid, tenant_id: Uuid, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            tenant_id,
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Admins and sub-admins see everything in their tenant.
    pub fn is_tenant_wide(&self) -> bool {
        self.has_role(Role::Admin) || self.has_role(Role::SubAdmin)
    }

    pub async fn load(pool: &SqlitePool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let Some(user) = User::find_by_id(pool, user_id).await? else {
            return Ok(None);
        };
        let roles = User::roles(pool, user_id).await?;
        Ok(Some(Self::new(user.id, user.tenant_id, roles)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::test_utils::{seed_tenant, setup_test_pool};

    #[tokio::test]
    async fn load_resolves_roles_and_tenant() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;

        let principal = Principal::load(&pool, seed.sub_admin.id)
            .await
            .unwrap()
            .expect("principal");
        assert_eq!(principal.tenant_id, seed.tenant_id);
        assert!(principal.is_tenant_wide());
        assert!(Principal::load(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }
}
