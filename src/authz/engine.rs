use crate::errors::AppError;

use super::Role;

/// Check whether `actor` may create an account with, or assign, `requested`.
///
/// Decision order:
/// 1. requested == ENV_ADMIN -> deny, regardless of actor
/// 2. requested == WEB_ADMIN -> only ENV_ADMIN
/// 3. actor == ENV_ADMIN -> allow
/// 4. actor == WEB_ADMIN -> only USER and GUEST
/// 5. deny
pub fn can_create_or_assign_role(actor: Role, requested: Role) -> bool {
    // ENV_ADMIN is never grantable through the application.
    if requested == Role::EnvAdmin {
        return false;
    }

    if requested == Role::WebAdmin {
        return actor == Role::EnvAdmin;
    }

    if actor == Role::EnvAdmin {
        return true;
    }

    if actor == Role::WebAdmin {
        return matches!(requested, Role::User | Role::Guest);
    }

    false
}

/// Check whether `actor` may delete an account holding `target`.
///
/// No one deletes an ENV_ADMIN account through the application, not even
/// another ENV_ADMIN.
pub fn can_delete_account(actor: Role, target: Role) -> bool {
    if target == Role::EnvAdmin {
        return false;
    }

    if actor == Role::EnvAdmin {
        return true;
    }

    if actor == Role::WebAdmin {
        return matches!(target, Role::User | Role::Guest);
    }

    false
}

/// Check whether `actor` may move an account holding `target` to `new_role`.
///
/// An ENV_ADMIN account's role is immutable via the app; past that guard the
/// answer is exactly `can_create_or_assign_role(actor, new_role)`.
pub fn can_change_role(actor: Role, target: Role, new_role: Role) -> bool {
    if target == Role::EnvAdmin {
        return false;
    }

    can_create_or_assign_role(actor, new_role)
}

/// Fail with 403 unless `actor` is ENV_ADMIN or WEB_ADMIN.
pub fn require_admin_like(actor: Role) -> Result<(), AppError> {
    if actor.is_admin_like() {
        Ok(())
    } else {
        tracing::debug!(role = %actor, "admin-only operation denied");
        Err(AppError::forbidden("administrator role required"))
    }
}

/// Fail with 403 unless `actor` is ENV_ADMIN, WEB_ADMIN or USER.
pub fn require_registered(actor: Role) -> Result<(), AppError> {
    if actor.is_registered() {
        Ok(())
    } else {
        tracing::debug!(role = %actor, "registered-only operation denied");
        Err(AppError::forbidden("registered account required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 4] = [Role::EnvAdmin, Role::WebAdmin, Role::User, Role::Guest];

    #[test]
    fn env_admin_is_never_grantable() {
        for actor in ALL_ROLES {
            assert!(!can_create_or_assign_role(actor, Role::EnvAdmin));
        }
    }

    #[test]
    fn env_admin_accounts_are_untouchable() {
        for actor in ALL_ROLES {
            assert!(!can_delete_account(actor, Role::EnvAdmin));
            for new_role in ALL_ROLES {
                assert!(!can_change_role(actor, Role::EnvAdmin, new_role));
            }
        }
    }

    #[test]
    fn only_env_admin_creates_web_admins() {
        assert!(can_create_or_assign_role(Role::EnvAdmin, Role::WebAdmin));
        assert!(!can_create_or_assign_role(Role::WebAdmin, Role::WebAdmin));
        assert!(!can_create_or_assign_role(Role::User, Role::WebAdmin));
        assert!(!can_create_or_assign_role(Role::Guest, Role::WebAdmin));
    }

    #[test]
    fn web_admin_manages_users_and_guests() {
        assert!(can_create_or_assign_role(Role::WebAdmin, Role::User));
        assert!(can_create_or_assign_role(Role::WebAdmin, Role::Guest));
        assert!(can_delete_account(Role::WebAdmin, Role::User));
        assert!(can_delete_account(Role::WebAdmin, Role::Guest));
        assert!(!can_delete_account(Role::WebAdmin, Role::WebAdmin));
    }

    #[test]
    fn env_admin_deletes_web_admins() {
        assert!(can_delete_account(Role::EnvAdmin, Role::WebAdmin));
        assert!(can_delete_account(Role::EnvAdmin, Role::User));
        assert!(can_delete_account(Role::EnvAdmin, Role::Guest));
    }

    #[test]
    fn non_admins_hold_no_grants() {
        for actor in [Role::User, Role::Guest] {
            for requested in ALL_ROLES {
                assert!(!can_create_or_assign_role(actor, requested));
            }
            for target in ALL_ROLES {
                assert!(!can_delete_account(actor, target));
            }
        }
    }

    #[test]
    fn web_admin_cannot_promote_to_web_admin() {
        assert!(!can_change_role(Role::WebAdmin, Role::User, Role::WebAdmin));
        assert!(can_change_role(Role::WebAdmin, Role::User, Role::Guest));
        assert!(can_change_role(Role::WebAdmin, Role::Guest, Role::User));
    }

    #[test]
    fn change_role_matches_assignment_once_target_guard_passes() {
        for actor in ALL_ROLES {
            for target in [Role::WebAdmin, Role::User, Role::Guest] {
                for new_role in ALL_ROLES {
                    assert_eq!(
                        can_change_role(actor, target, new_role),
                        can_create_or_assign_role(actor, new_role)
                    );
                }
            }
        }
    }

    #[test]
    fn admin_thresholds() {
        assert!(require_admin_like(Role::EnvAdmin).is_ok());
        assert!(require_admin_like(Role::WebAdmin).is_ok());
        assert!(require_admin_like(Role::User).is_err());
        assert!(require_admin_like(Role::Guest).is_err());

        assert!(require_registered(Role::EnvAdmin).is_ok());
        assert!(require_registered(Role::WebAdmin).is_ok());
        assert!(require_registered(Role::User).is_ok());
        assert!(require_registered(Role::Guest).is_err());
    }
}
