//! User model, roles and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Supervisor,
    Engineer,
    Maintenance,
    Operator,
}

text_enum!(UserRole {
    Admin => "admin",
    Supervisor => "supervisor",
    Engineer => "engineer",
    Maintenance => "maintenance",
    Operator => "operator",
});

impl UserRole {
    /// Roles allowed to approve or reject a repair at audit time.
    pub fn can_audit(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Engineer | UserRole::Supervisor)
    }

    /// Roles allowed to generate tasks and run overdue sweeps.
    pub fn can_schedule(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Engineer)
    }
}

/// User record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Identity of the caller of a service operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: i32, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn require_auditor(&self) -> Result<(), AppError> {
        if self.role.can_audit() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Only admins, engineers and supervisors can audit repairs".to_string(),
            ))
        }
    }

    pub fn require_scheduler(&self) -> Result<(), AppError> {
        if self.role.can_schedule() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Only admins and engineers can schedule tasks".to_string(),
            ))
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_and_schedule_rights() {
        assert!(UserRole::Supervisor.can_audit());
        assert!(!UserRole::Supervisor.can_schedule());
        assert!(UserRole::Engineer.can_schedule());
        assert!(!UserRole::Operator.can_audit());
        assert!(matches!(
            Actor::new(1, UserRole::Maintenance).require_auditor(),
            Err(AppError::Authorization(_))
        ));
    }

    #[test]
    fn token_round_trip_keeps_role() {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: "alice".to_string(),
            user_id: 7,
            role: UserRole::Engineer,
            exp: now + 3600,
            iat: now,
        };
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.actor(), Actor::new(7, UserRole::Engineer));
        assert!(UserClaims::from_token(&token, "other").is_err());
    }
}
