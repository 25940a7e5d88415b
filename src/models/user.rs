//! User model, session claims and related types

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

text_enum! {
    /// Access role carried by every account
    Role {
        Member => "member",
        Librarian => "librarian",
    }
}

text_enum! {
    Gender {
        Male => "male",
        Female => "female",
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Member
    }
}

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{6,18}[0-9]$").expect("valid phone regex"));

/// Empty numbers are allowed and mean "no number on file"
pub fn is_valid_contact_number(number: &str) -> bool {
    number.is_empty() || PHONE_RE.is_match(number)
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    /// Human-facing sequential number
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub gender: Gender,
    pub birth_date: Option<NaiveDate>,
    pub role: Role,
    pub contact_number: Option<String>,
    pub photo: Option<String>,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub verify_token: Option<String>,
    #[serde(skip_serializing)]
    pub verify_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True when the password changed after a token issued at `issued_at` (unix seconds)
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| issued_at < changed.timestamp())
            .unwrap_or(false)
    }

    pub fn require_role(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        self.require_role(&[Role::Librarian])
    }

    pub fn require_member(&self) -> Result<(), AppError> {
        self.require_role(&[Role::Member])
    }

    pub fn is_librarian(&self) -> bool {
        self.role == Role::Librarian
    }
}

/// Short user representation embedded in issues and reviews
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub user_id: i32,
    pub name: String,
    pub photo: Option<String>,
}

/// User list query (librarian)
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub is_verified: Option<bool>,
    /// Case-insensitive search in name and email
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Signup request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    pub gender: Gender,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
}

/// Login request; fields are optional so a missing one maps to a validation error
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Update own profile request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub contact_number: Option<String>,
    pub photo: Option<String>,
    /// Rejected: passwords are changed through the dedicated endpoint
    pub password: Option<String>,
    /// Rejected: passwords are changed through the dedicated endpoint
    pub password_confirm: Option<String>,
}

/// Update role request (librarian only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRole {
    pub role: Role,
}

/// JWT claims for authenticated sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn for_user(user: &User, ttl_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id,
            role: user.role,
            exp: now + (ttl_hours as i64 * 3600),
            iat: now,
        }
    }

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            user_id: 100,
            name: "Rahim".to_string(),
            email: "rahim@example.com".to_string(),
            gender: Gender::Male,
            birth_date: None,
            role,
            contact_number: None,
            photo: None,
            password: "$argon2id$hash".to_string(),
            is_verified: true,
            verify_token: None,
            verify_expires: None,
            password_reset_token: None,
            password_reset_expires: None,
            password_changed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_gate() {
        let member = user(Role::Member);
        assert!(member.require_member().is_ok());
        assert!(matches!(
            member.require_librarian(),
            Err(AppError::Authorization(_))
        ));
        assert!(user(Role::Librarian)
            .require_role(&[Role::Member, Role::Librarian])
            .is_ok());
    }

    #[test]
    fn test_password_never_serialized() {
        let json = serde_json::to_value(user(Role::Member)).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("verify_token").is_none());
        assert!(json.get("password_reset_token").is_none());
        assert_eq!(json["role"], "member");
    }

    #[test]
    fn test_changed_password_after() {
        let mut u = user(Role::Member);
        let issued = Utc::now().timestamp();
        assert!(!u.changed_password_after(issued));

        u.password_changed_at = Some(Utc::now() + Duration::seconds(10));
        assert!(u.changed_password_after(issued));

        u.password_changed_at = Some(Utc::now() - Duration::hours(1));
        assert!(!u.changed_password_after(issued));
    }

    #[test]
    fn test_token_round_trip() {
        let u = user(Role::Librarian);
        let claims = UserClaims::for_user(&u, 1);
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.sub, u.id);
        assert_eq!(parsed.role, Role::Librarian);
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Librarian".parse::<Role>().unwrap(), Role::Librarian);
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Member);
    }

    #[test]
    fn test_contact_number() {
        assert!(is_valid_contact_number(""));
        assert!(is_valid_contact_number("+8801712345678"));
        assert!(!is_valid_contact_number("call me"));
    }

    #[test]
    fn test_signup_validation() {
        let request = SignupRequest {
            name: "Karim".to_string(),
            email: "not-an-email".to_string(),
            gender: Gender::Male,
            password: "short".to_string(),
            password_confirm: "short".to_string(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("password"));
    }
}
