//! Credential checks, lockout bookkeeping and token issuance.
//!
//! An account moves between two states. It is unlocked while
//! `locked_until` is absent or in the past. Each wrong secret increments
//! `failed_login_count`; the increment that reaches the configured threshold
//! sets `locked_until = now + lockout`. While locked, every attempt is
//! rejected without touching the counter. A successful login clears both.

mod password;
mod token;

pub use password::{Argon2Hasher, SecretHasher};
pub use token::{Claims, JwtTokens, TokenService};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::db::{NewUser, Role, User, UserRepository, UserResponse};
use crate::error::{Error, Result};
use crate::policy::Actor;

/// Lockout and token lifetime settings.
#[derive(Debug, Clone, Copy)]
pub struct LoginPolicy {
    pub max_failed_attempts: i64,
    pub lockout: Duration,
    pub token_ttl: Duration,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout: Duration::minutes(30),
            token_ttl: Duration::hours(1),
        }
    }
}

impl From<&AuthConfig> for LoginPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            max_failed_attempts: config.max_failed_attempts.max(1),
            lockout: Duration::minutes(config.lockout_minutes),
            token_ttl: Duration::minutes(config.token_ttl_minutes),
        }
    }
}

/// A signed-in user and their access token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
}

/// `{success, user, token, message}` answer to a login or registration.
#[derive(Debug, Clone, Serialize)]
pub struct AuthOutcome {
    pub success: bool,
    pub user: Option<UserResponse>,
    pub token: Option<String>,
    pub message: String,
}

impl From<Result<Session>> for AuthOutcome {
    fn from(result: Result<Session>) -> Self {
        match result {
            Ok(session) => Self {
                success: true,
                user: Some(session.user),
                token: Some(session.token),
                message: "Login successful".to_string(),
            },
            Err(err) => Self {
                success: false,
                user: None,
                token: None,
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub secret: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    hasher: Arc<dyn SecretHasher>,
    tokens: Arc<dyn TokenService>,
    policy: LoginPolicy,
}

impl AuthService {
    pub fn new(
        users: UserRepository,
        hasher: Arc<dyn SecretHasher>,
        tokens: Arc<dyn TokenService>,
        policy: LoginPolicy,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            policy,
        }
    }

    /// Argon2 digests and HS256 tokens, as configured.
    pub fn from_config(users: UserRepository, config: &AuthConfig) -> Self {
        let secret = match &config.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                warn!("No auth.jwt_secret configured; using a random secret, tokens will not survive a restart");
                uuid::Uuid::new_v4().to_string()
            }
        };
        Self::new(
            users,
            Arc::new(Argon2Hasher),
            Arc::new(JwtTokens::new(&secret)),
            LoginPolicy::from(config),
        )
    }

    /// Create a regular account and sign it in.
    pub async fn register(&self, registration: Registration) -> Result<Session> {
        let password_hash = self.hasher.hash(&registration.secret)?;
        let user = self
            .users
            .create(NewUser {
                name: registration.name,
                email: registration.email,
                password_hash,
                role: Role::Regular,
            })
            .await?;
        self.issue(user, Utc::now())
    }

    pub async fn authenticate(&self, email: &str, secret: &str) -> Result<Session> {
        self.authenticate_at(email, secret, Utc::now()).await
    }

    pub async fn authenticate_at(
        &self,
        email: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| Error::not_found("User"))?;

        if user.is_locked_at(now) {
            warn!(user_id = %user.id, "Login rejected: account locked");
            return Err(Error::Locked {
                until: user.locked_until,
            });
        }

        if !self.hasher.verify(secret, &user.password_hash) {
            let user = self
                .users
                .record_failed_login(
                    &user.id,
                    self.policy.max_failed_attempts,
                    self.policy.lockout,
                    now,
                )
                .await?;
            if user.is_locked_at(now) {
                warn!(
                    user_id = %user.id,
                    failed_attempts = user.failed_login_count,
                    "Account locked after repeated failed logins"
                );
            } else {
                warn!(
                    user_id = %user.id,
                    failed_attempts = user.failed_login_count,
                    "Failed login attempt"
                );
            }
            return Err(Error::InvalidCredential);
        }

        self.users.reset_login_state(&user.id, now).await?;
        let user = User {
            failed_login_count: 0,
            locked_until: None,
            last_login_at: Some(crate::db::timestamp(now)),
            ..user
        };
        info!(user_id = %user.id, "User logged in");
        self.issue(user, now)
    }

    /// Replace the secret after checking the current one.
    pub async fn change_password(&self, user_id: &str, current: &str, new: &str) -> Result<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::not_found("User"))?;

        if !self.hasher.verify(current, &user.password_hash) {
            return Err(Error::InvalidCredential);
        }

        let digest = self.hasher.hash(new)?;
        self.users.set_password(&user.id, &digest).await?;
        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        self.tokens.verify(token)
    }

    /// Resolve a bearer token to its caller. The account must still be
    /// active; its current role wins over the one in the token.
    pub async fn actor(&self, token: &str) -> Result<Actor> {
        let claims = self.verify_token(token)?;
        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or(Error::InvalidCredential)?;
        Ok(Actor {
            id: user.id,
            role: user.role,
        })
    }

    /// Create the bootstrap admin unless an active account owns the email.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, email: &str, name: &str, secret: &str) -> Result<bool> {
        if self.users.find_by_email(email).await?.is_some() {
            return Ok(false);
        }
        let password_hash = self.hasher.hash(secret)?;
        let admin = self
            .users
            .create(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role: Role::Admin,
            })
            .await?;
        info!(user_id = %admin.id, "Bootstrap admin account created");
        Ok(true)
    }

    fn issue(&self, user: User, now: DateTime<Utc>) -> Result<Session> {
        let claims = Claims::new(&user.id, user.role, now, self.policy.token_ttl);
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| Error::Internal("Token expiry out of range".to_string()))?;
        let token = self.tokens.issue(&claims)?;
        Ok(Session {
            token,
            expires_at: crate::db::timestamp(expires_at),
            user: UserResponse::from(user),
        })
    }
}
