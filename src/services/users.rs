//! Membership service: signup, verification, sessions, passwords and profiles

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{
        is_valid_contact_number, LoginRequest, ResetPasswordRequest, Role, SignupRequest,
        UpdatePasswordRequest, UpdateProfile, User, UserClaims, UserQuery,
    },
    repository::{users::NewUser, Repository},
};

use super::email::EmailService;

const EMAIL_FAILURE: &str = "There was an error sending the email. Try again later!";
const INVALID_TOKEN: &str = "Token is invalid or has expired";

/// A random one-time token and the SHA-256 hex digest that gets stored
pub fn new_one_time_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let hash = hash_token(&token);
    (token, hash)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn passwords_match(password: &str, confirm: &str) -> AppResult<()> {
    if password == confirm {
        Ok(())
    } else {
        Err(AppError::Validation("Passwords are not the same".to_string()))
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Signup result; the account exists even when the email could not be sent
#[derive(Debug)]
pub struct SignupOutcome {
    pub user: User,
    pub verification_email_sent: bool,
}

/// A user together with a freshly issued session token
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    email: EmailService,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig, email: EmailService) -> Self {
        Self {
            repository,
            config,
            email,
        }
    }

    pub fn session_ttl_hours(&self) -> u64 {
        self.config.jwt_expiration_hours
    }

    fn create_session(&self, user: User) -> AppResult<Session> {
        let token = UserClaims::for_user(&user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;
        Ok(Session { user, token })
    }

    fn token_expiry(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::minutes(self.config.token_ttl_minutes)
    }

    /// Resolve a session token to its still-valid user
    pub async fn authenticate_token(&self, token: &str) -> AppResult<User> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret).map_err(|_| {
            AppError::Authentication("Invalid token. Please log in again!".to_string())
        })?;

        let user = self
            .repository
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                AppError::Authentication(
                    "The user belonging to this token no longer exists".to_string(),
                )
            })?;

        if user.changed_password_after(claims.iat) {
            return Err(AppError::Authentication(
                "User recently changed password! Please log in again".to_string(),
            ));
        }

        Ok(user)
    }

    // =========================================================================
    // SIGNUP AND VERIFICATION
    // =========================================================================

    /// Register a member and send the verification link
    pub async fn signup(&self, request: SignupRequest) -> AppResult<SignupOutcome> {
        request.validate()?;
        passwords_match(&request.password, &request.password_confirm)?;

        if self.repository.users.email_exists(&request.email).await? {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;

        let mut tx = self.repository.begin().await?;
        let user_id = self.repository.counters.next_user_id(&mut *tx).await?;
        let user = self
            .repository
            .users
            .create(
                &mut *tx,
                NewUser {
                    user_id,
                    name: &request.name,
                    email: &request.email,
                    gender: request.gender,
                    password_hash: &password_hash,
                },
            )
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = user.user_id, "Member signed up");

        let verification_email_sent = match self.send_verification(&user).await {
            Ok(()) => true,
            Err(AppError::Database(e)) => return Err(AppError::Database(e)),
            Err(_) => false,
        };

        Ok(SignupOutcome {
            user,
            verification_email_sent,
        })
    }

    /// Issue a verification token and mail it; the token is cleared again if mailing fails
    async fn send_verification(&self, user: &User) -> AppResult<()> {
        let (token, hash) = new_one_time_token();
        self.repository
            .users
            .set_verify_token(user.id, Some((hash.as_str(), self.token_expiry())))
            .await?;

        if let Err(e) = self
            .email
            .send(self.email.verification_email(&user.email, &token))
            .await
        {
            tracing::warn!(user_id = user.user_id, "Verification email failed: {}", e);
            self.repository.users.set_verify_token(user.id, None).await?;
            return Err(AppError::Internal(EMAIL_FAILURE.to_string()));
        }
        Ok(())
    }

    pub async fn resend_verification(&self, email: &str) -> AppResult<()> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("There is no user with that email address".to_string())
            })?;

        if user.is_verified {
            return Err(AppError::Conflict("This account is already verified".to_string()));
        }

        self.send_verification(&user).await
    }

    pub async fn verify_email(&self, token: &str) -> AppResult<User> {
        let user = self
            .repository
            .users
            .verify_by_token(&hash_token(token))
            .await?
            .ok_or_else(|| AppError::Validation(INVALID_TOKEN.to_string()))?;

        tracing::info!(user_id = user.user_id, "Email verified");
        Ok(user)
    }

    // =========================================================================
    // SESSIONS AND PASSWORDS
    // =========================================================================

    pub async fn login(&self, request: LoginRequest) -> AppResult<Session> {
        let (Some(email), Some(password)) = (
            request.email.filter(|e| !e.trim().is_empty()),
            request.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::Validation(
                "Please provide email and password!".to_string(),
            ));
        };

        let user = self.repository.users.get_by_email(&email).await?;
        let user = match user {
            Some(user) if verify_password(&user.password, &password)? => user,
            _ => {
                return Err(AppError::Authentication(
                    "Incorrect email or password".to_string(),
                ))
            }
        };

        if !user.is_verified {
            return Err(AppError::NotVerified(
                "Please verify your email address before logging in".to_string(),
            ));
        }

        tracing::debug!(user_id = user.user_id, "User logged in");
        self.create_session(user)
    }

    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("There is no user with that email address".to_string())
            })?;

        let (token, hash) = new_one_time_token();
        self.repository
            .users
            .set_reset_token(user.id, Some((hash.as_str(), self.token_expiry())))
            .await?;

        if let Err(e) = self
            .email
            .send(self.email.password_reset_email(&user.email, &token))
            .await
        {
            tracing::warn!(user_id = user.user_id, "Password reset email failed: {}", e);
            self.repository.users.set_reset_token(user.id, None).await?;
            return Err(AppError::Internal(EMAIL_FAILURE.to_string()));
        }
        Ok(())
    }

    /// Set a new password with a reset token and log the user in
    pub async fn reset_password(
        &self,
        token: &str,
        request: ResetPasswordRequest,
    ) -> AppResult<Session> {
        request.validate()?;
        passwords_match(&request.password, &request.password_confirm)?;

        let password_hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .reset_password_by_token(&hash_token(token), &password_hash)
            .await?
            .ok_or_else(|| AppError::Validation(INVALID_TOKEN.to_string()))?;

        tracing::info!(user_id = user.user_id, "Password reset");
        self.create_session(user)
    }

    /// Change the password of a logged in user and issue a new session
    pub async fn update_password(
        &self,
        user: &User,
        request: UpdatePasswordRequest,
    ) -> AppResult<Session> {
        request.validate()?;
        passwords_match(&request.new_password, &request.new_password_confirm)?;

        if !verify_password(&user.password, &request.password_current)? {
            return Err(AppError::Authentication(
                "Your current password is wrong".to_string(),
            ));
        }

        let password_hash = hash_password(&request.new_password)?;
        let user = self
            .repository
            .users
            .update_password(user.id, &password_hash)
            .await?;

        tracing::info!(user_id = user.user_id, "Password changed");
        self.create_session(user)
    }

    // =========================================================================
    // PROFILES
    // =========================================================================

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Update own profile; passwords go through `update_password`
    pub async fn update_me(&self, user: &User, profile: UpdateProfile) -> AppResult<User> {
        if profile.password.is_some() || profile.password_confirm.is_some() {
            return Err(AppError::Validation(
                "This route is not for password updates. Please use /update-password".to_string(),
            ));
        }
        profile.validate()?;
        if let Some(ref number) = profile.contact_number {
            if !is_valid_contact_number(number) {
                return Err(AppError::Validation(
                    "Please provide a valid contact number".to_string(),
                ));
            }
        }

        self.repository.users.update_profile(user.id, &profile).await
    }

    pub async fn list_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        self.repository.users.search(query).await
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        let user = self.repository.users.update_role(id, role).await?;
        tracing::info!(user_id = user.user_id, role = %role, "Role updated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_time_token() {
        let (token, hash) = new_one_time_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash, hash_token(&token));
        assert_ne!(token, hash);

        let (other, _) = new_one_time_token();
        assert_ne!(token, other);
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "wrong horse").unwrap());
    }

    #[test]
    fn test_passwords_match() {
        assert!(passwords_match("abcdefgh", "abcdefgh").is_ok());
        assert!(matches!(
            passwords_match("abcdefgh", "abcdefgx"),
            Err(AppError::Validation(_))
        ));
    }
}
