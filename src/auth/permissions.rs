//! Centralized capability checks. Every handler asks `can(role, action)`
//! instead of comparing role strings inline.

use crate::auth::AuthUser;
use crate::entities::user::Role;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateTicket,
    TransitionTicket,
    ViewRequesterDashboard,
    ViewMechanicDashboard,
    ViewHistory,
    ManageCatalog,
    ManageUsers,
}

pub fn can(role: Role, action: Action) -> bool {
    use Action::*;
    match action {
        CreateTicket | ViewRequesterDashboard => role == Role::Requester,
        TransitionTicket | ViewMechanicDashboard | ViewHistory | ManageCatalog => {
            role.is_maintenance()
        }
        ManageUsers => role == Role::MechanicAdmin,
    }
}

/// `Forbidden` unless the user's role grants the action.
pub fn require(user: &AuthUser, action: Action) -> Result<(), ServiceError> {
    if can(user.role, action) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Role '{}' may not perform this action",
            user.role.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_matrix() {
        assert!(can(Role::Requester, Action::CreateTicket));
        assert!(can(Role::Requester, Action::ViewRequesterDashboard));
        assert!(!can(Role::Requester, Action::TransitionTicket));
        assert!(!can(Role::Requester, Action::ManageCatalog));

        assert!(can(Role::Mechanic, Action::TransitionTicket));
        assert!(can(Role::Mechanic, Action::ViewMechanicDashboard));
        assert!(can(Role::Mechanic, Action::ManageCatalog));
        assert!(!can(Role::Mechanic, Action::CreateTicket));
        assert!(!can(Role::Mechanic, Action::ManageUsers));

        assert!(can(Role::MechanicAdmin, Action::ManageUsers));
        assert!(can(Role::MechanicAdmin, Action::TransitionTicket));
        assert!(can(Role::MechanicAdmin, Action::ViewHistory));
    }
}
