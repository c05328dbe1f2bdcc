use crate::{
    error::{Error, HtmlError},
    jwt::SessionData,
    schema::{Id, UserRole},
};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[ActionType::CreateRecipes, ActionType::ManageOwnLists],
    ),
    (
        UserRole::Moderator,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnLists,
            ActionType::ManageAllRecipes,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnLists,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
        ],
    ),
];

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum ActionType {
    CreateRecipes,
    /// Favorites, shopping cart and subscriptions.
    ManageOwnLists,

    ManageAllRecipes,
    ManageTags,
    ManageIngredients,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find(|(role, _)| *role == session.role)
            .map(|(_, actions)| actions.contains(&self))
            .unwrap_or(false)
    }
}

/// Request-level gate applied by each endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Anyone may read.
    ReadOnly,
    /// Writes require a session.
    Authenticated,
    /// Writes require a session belonging to the author, or staff.
    AuthorOrStaff,
}

impl AccessPolicy {
    pub fn check(
        self,
        session: Option<&SessionData>,
        author_id: Option<Id>,
    ) -> Result<(), Error> {
        match self {
            AccessPolicy::ReadOnly => Ok(()),
            AccessPolicy::Authenticated => session
                .map(|_| ())
                .ok_or_else(|| HtmlError::Unauthorized.default()),
            AccessPolicy::AuthorOrStaff => {
                let session = session.ok_or_else(|| HtmlError::Unauthorized.default())?;
                let is_author = author_id == Some(session.user_id);
                if is_author || ActionType::ManageAllRecipes.authenticate(session) {
                    Ok(())
                } else {
                    Err(HtmlError::Forbidden.default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    fn session(user_id: Id, role: UserRole) -> SessionData {
        SessionData {
            user_id,
            email: format!("{user_id}@example.com"),
            role,
            is_staff: role.is_staff(),
            token_id: "jti".into(),
            expires_at: i64::MAX,
        }
    }

    #[test]
    fn only_admins_manage_catalog() {
        assert!(ActionType::ManageTags.authenticate(&session(1, UserRole::Admin)));
        assert!(!ActionType::ManageTags.authenticate(&session(1, UserRole::Moderator)));
        assert!(!ActionType::ManageIngredients.authenticate(&session(1, UserRole::User)));
    }

    #[test]
    fn read_is_open() {
        assert!(AccessPolicy::ReadOnly.check(None, Some(1)).is_ok());
    }

    #[test]
    fn writes_need_session() {
        let error = AccessPolicy::Authenticated.check(None, None).unwrap_err();
        assert_eq!(error.code, StatusCode::UNAUTHORIZED);
        assert!(AccessPolicy::Authenticated
            .check(Some(&session(1, UserRole::User)), None)
            .is_ok());
    }

    #[test]
    fn object_writes_need_author_or_staff() {
        let author = session(1, UserRole::User);
        let stranger = session(2, UserRole::User);
        let moderator = session(3, UserRole::Moderator);

        assert!(AccessPolicy::AuthorOrStaff.check(Some(&author), Some(1)).is_ok());
        assert!(AccessPolicy::AuthorOrStaff.check(Some(&moderator), Some(1)).is_ok());

        let error = AccessPolicy::AuthorOrStaff
            .check(Some(&stranger), Some(1))
            .unwrap_err();
        assert_eq!(error.code, StatusCode::FORBIDDEN);

        let error = AccessPolicy::AuthorOrStaff.check(None, Some(1)).unwrap_err();
        assert_eq!(error.code, StatusCode::UNAUTHORIZED);
    }
}
