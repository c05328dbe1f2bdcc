use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::{Error, HtmlError},
    schema::{Id, User, UserRole},
};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub email: String,
    pub role: UserRole,
    pub jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user: &User, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id: user.id,
            email: user.email.to_owned(),
            role: user.role,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }
}

/// The authenticated requester.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub email: String,
    pub role: UserRole,
    pub is_staff: bool,
    pub token_id: String,
    pub expires_at: i64,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(HtmlError::Forbidden.default());
        }
        Ok(())
    }

    /// Seconds until the token expires, at least one.
    pub fn remaining_lifetime(&self) -> u64 {
        (self.expires_at - Utc::now().timestamp()).max(1) as u64
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            email: value.email,
            is_staff: value.role.is_staff(),
            role: value.role,
            token_id: value.jti,
            expires_at: value.exp,
        }
    }
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, lifetime_hours: i64) -> Result<Self, Error> {
        let key: Hmac<Sha256> = Hmac::new_from_slice(secret.as_bytes())
            .map_err(|_| HtmlError::InternalServerError.new("Invalid token secret"))?;
        Ok(Self {
            key,
            lifetime: Duration::hours(lifetime_hours),
        })
    }

    pub fn generate_jwt_session(&self, user: &User) -> Result<String, Error> {
        JwtSessionData::new(user, self.lifetime)
            .sign_with_key(&self.key)
            .map_err(|e| {
                log::error!("Could not sign session token: {e}");
                HtmlError::InternalServerError.new("Could not sign token")
            })
    }

    pub fn verify_jwt_session(&self, token: &str) -> Result<JwtSessionData, Error> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| HtmlError::InvalidSession.new("Invalid token."))?;

        if (session.exp - Utc::now().timestamp()).is_negative() {
            return Err(HtmlError::InvalidSession.new("Token expired."));
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 42,
            email: "anna@example.com".into(),
            username: "anna".into(),
            first_name: "Anna".into(),
            last_name: "Petrova".into(),
            password: String::new(),
            role,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn round_trips_session() {
        let signer = TokenSigner::new("secret", 1).unwrap();
        let token = signer.generate_jwt_session(&user(UserRole::Moderator)).unwrap();
        let session: SessionData = signer.verify_jwt_session(&token).unwrap().into();

        assert_eq!(session.user_id, 42);
        assert_eq!(session.role, UserRole::Moderator);
        assert!(session.is_staff);
        assert!(session.remaining_lifetime() > 3000);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = TokenSigner::new("one", 1)
            .unwrap()
            .generate_jwt_session(&user(UserRole::User))
            .unwrap();
        let error = TokenSigner::new("two", 1)
            .unwrap()
            .verify_jwt_session(&token)
            .unwrap_err();
        assert_eq!(error.code, warp::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn rejects_expired_token() {
        let signer = TokenSigner::new("secret", -1).unwrap();
        let token = signer.generate_jwt_session(&user(UserRole::User)).unwrap();
        assert!(signer.verify_jwt_session(&token).is_err());
    }

    #[test]
    fn tokens_have_unique_ids() {
        let signer = TokenSigner::new("secret", 1).unwrap();
        let a = signer.verify_jwt_session(&signer.generate_jwt_session(&user(UserRole::User)).unwrap()).unwrap();
        let b = signer.verify_jwt_session(&signer.generate_jwt_session(&user(UserRole::User)).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
