//! Role-scoped visibility.
//!
//! Scope is a pure function of the principal. A user holding several roles
//! gets the most permissive scope among them.

use db::models::{
    task::{Task, TaskVisibility},
    user::Role,
};
use uuid::Uuid;

use super::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Tenant,
    CreatedOrAssigned(Uuid),
    AssignedTo(Uuid),
    CreatedOrMember(Uuid),
}

pub fn scope(principal: &Principal, kind: EntityKind) -> Scope {
    if principal.is_tenant_wide() {
        return Scope::Tenant;
    }
    match kind {
        EntityKind::Task if principal.has_role(Role::Requester) => {
            Scope::CreatedOrAssigned(principal.user_id)
        }
        EntityKind::Task => Scope::AssignedTo(principal.user_id),
        EntityKind::Project => Scope::CreatedOrMember(principal.user_id),
    }
}

impl Scope {
    pub fn task_visibility(self) -> TaskVisibility {
        match self {
            Scope::Tenant => TaskVisibility::All,
            Scope::CreatedOrAssigned(user) | Scope::CreatedOrMember(user) => {
                TaskVisibility::CreatedOrAssigned(user)
            }
            Scope::AssignedTo(user) => TaskVisibility::AssignedTo(user),
        }
    }

    pub fn admits_task(self, task: &Task, assignees: &[Uuid]) -> bool {
        match self {
            Scope::Tenant => true,
            Scope::CreatedOrAssigned(user) | Scope::CreatedOrMember(user) => {
                task.created_by == Some(user) || assignees.contains(&user)
            }
            Scope::AssignedTo(user) => assignees.contains(&user),
        }
    }
}

/// Full edit rights: admins always, requesters on tasks they own, taskers on
/// tasks they are assigned to.
pub fn can_edit_task(principal: &Principal, task: &Task, assignees: &[Uuid]) -> bool {
    if principal.is_tenant_wide() {
        return true;
    }
    let owns = task.created_by == Some(principal.user_id);
    let assigned = assignees.contains(&principal.user_id);
    (principal.has_role(Role::Requester) && owns) || (principal.has_role(Role::Tasker) && assigned)
}

pub fn can_create_task(principal: &Principal) -> bool {
    principal.is_tenant_wide() || principal.has_role(Role::Requester)
}

pub fn can_delete_task(principal: &Principal, task: &Task) -> bool {
    principal.is_tenant_wide()
        || (principal.has_role(Role::Requester) && task.created_by == Some(principal.user_id))
}

/// Toggling repetition is open to admins, requesters and the task's creator.
pub fn can_toggle_repetition(principal: &Principal, task: &Task) -> bool {
    principal.is_tenant_wide()
        || principal.has_role(Role::Requester)
        || task.created_by == Some(principal.user_id)
}

/// Whether nested user and client records may carry contact details.
pub fn shows_personal_details(principal: &Principal) -> bool {
    principal.is_tenant_wide()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: Vec<Role>) -> Principal {
        Principal::new(Uuid::new_v4(), Uuid::new_v4(), roles)
    }

    #[test]
    fn most_permissive_role_wins() {
        let p = principal(vec![Role::Tasker, Role::Requester]);
        assert_eq!(scope(&p, EntityKind::Task), Scope::CreatedOrAssigned(p.user_id));

        let p = principal(vec![Role::Tasker, Role::SubAdmin]);
        assert_eq!(scope(&p, EntityKind::Task), Scope::Tenant);
    }

    #[test]
    fn tasker_scope_ignores_ownership() {
        let p = principal(vec![Role::Tasker]);
        let scope = scope(&p, EntityKind::Task);
        assert_eq!(scope, Scope::AssignedTo(p.user_id));
        assert_eq!(scope.task_visibility(), TaskVisibility::AssignedTo(p.user_id));
    }

    #[test]
    fn personal_details_only_for_admins() {
        assert!(shows_personal_details(&principal(vec![Role::Admin])));
        assert!(shows_personal_details(&principal(vec![Role::SubAdmin])));
        assert!(!shows_personal_details(&principal(vec![Role::Requester])));
        assert!(!shows_personal_details(&principal(vec![Role::Tasker])));
    }
}
