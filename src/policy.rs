//! Who may do what to a business listing or the taxonomy.

use crate::auth::Actor;
use crate::error::DirectoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    SetApproval,
    Edit,
    Remove,
    /// Listing regardless of approval state.
    ListAll,
    ListOwned,
    /// Create, update or delete categories and locations.
    ManageTaxonomy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthenticated,
    Forbidden,
}

/// `owner_id` is the owner of the business being acted on, when there is one.
pub fn evaluate(actor: Option<&Actor>, action: Action, owner_id: Option<i64>) -> Decision {
    let Some(actor) = actor else {
        return Decision::Unauthenticated;
    };

    let allowed = match action {
        Action::Submit | Action::ListOwned => true,
        Action::SetApproval | Action::ListAll | Action::ManageTaxonomy => actor.is_admin(),
        Action::Edit | Action::Remove => actor.is_admin() || owner_id == Some(actor.id),
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Forbidden
    }
}

/// Like [`evaluate`], but turns a denial into the matching error.
pub fn enforce(
    actor: Option<&Actor>,
    action: Action,
    owner_id: Option<i64>,
) -> Result<(), DirectoryError> {
    match evaluate(actor, action, owner_id) {
        Decision::Allow => Ok(()),
        Decision::Unauthenticated => Err(DirectoryError::unauthorized(
            "Access denied. Authentication required.",
        )),
        Decision::Forbidden => {
            log::warn!(
                "Denied {:?} for actor {:?} (owner {:?})",
                action,
                actor.map(|a| a.id),
                owner_id
            );
            Err(DirectoryError::forbidden(denial_message(action)))
        }
    }
}

fn denial_message(action: Action) -> &'static str {
    match action {
        Action::Edit => "Not authorized to update this business",
        Action::Remove => "Not authorized to delete this business",
        Action::SetApproval | Action::ListAll | Action::ManageTaxonomy => {
            "Access denied. Admin privileges required."
        }
        Action::Submit | Action::ListOwned => "Access denied.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    const OWNER: i64 = 10;

    fn user(id: i64) -> Actor {
        Actor::new(id, Role::User)
    }

    fn admin() -> Actor {
        Actor::new(1, Role::Admin)
    }

    #[test]
    fn anonymous_actor_is_never_allowed_to_mutate() {
        for action in [
            Action::Submit,
            Action::SetApproval,
            Action::Edit,
            Action::Remove,
            Action::ListAll,
            Action::ListOwned,
            Action::ManageTaxonomy,
        ] {
            assert_eq!(
                evaluate(None, action, Some(OWNER)),
                Decision::Unauthenticated,
                "{action:?}"
            );
        }
    }

    #[test]
    fn any_authenticated_role_may_submit() {
        for role in [Role::User, Role::BusinessOwner, Role::Admin] {
            let actor = Actor::new(5, role);
            assert_eq!(evaluate(Some(&actor), Action::Submit, None), Decision::Allow);
        }
    }

    #[test]
    fn only_admin_may_set_approval_or_manage_taxonomy() {
        let owner = user(OWNER);
        let business_owner = Actor::new(OWNER, Role::BusinessOwner);
        for action in [Action::SetApproval, Action::ListAll, Action::ManageTaxonomy] {
            assert_eq!(evaluate(Some(&owner), action, Some(OWNER)), Decision::Forbidden);
            assert_eq!(
                evaluate(Some(&business_owner), action, Some(OWNER)),
                Decision::Forbidden
            );
            assert_eq!(evaluate(Some(&admin()), action, Some(OWNER)), Decision::Allow);
        }
    }

    #[test]
    fn edit_and_remove_require_owner_or_admin() {
        for action in [Action::Edit, Action::Remove] {
            assert_eq!(evaluate(Some(&user(OWNER)), action, Some(OWNER)), Decision::Allow);
            assert_eq!(evaluate(Some(&admin()), action, Some(OWNER)), Decision::Allow);
            assert_eq!(
                evaluate(Some(&user(OWNER + 1)), action, Some(OWNER)),
                Decision::Forbidden
            );
            assert_eq!(
                evaluate(Some(&Actor::new(OWNER + 1, Role::BusinessOwner)), action, Some(OWNER)),
                Decision::Forbidden
            );
        }
    }

    #[test]
    fn enforce_maps_decisions_to_errors() {
        assert!(enforce(Some(&admin()), Action::SetApproval, None).is_ok());
        assert!(matches!(
            enforce(None, Action::Submit, None),
            Err(DirectoryError::Unauthorized(_))
        ));
        assert!(matches!(
            enforce(Some(&user(2)), Action::Remove, Some(OWNER)),
            Err(DirectoryError::Forbidden(_))
        ));
    }
}
