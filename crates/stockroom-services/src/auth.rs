//! # Authentication
//!
//! Email/password accounts, HS256 session tokens and password resets.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  sign_up(email, password) ──▶ argon2 hash ──▶ users row ──▶ Session     │
//! │  sign_in(email, password) ──▶ verify hash ──────────────▶ Session      │
//! │                                                                         │
//! │  Session.access_token = JWT { sub, email, role, iat, exp, jti }         │
//! │                                                                         │
//! │  verify(token) ──▶ signature + expiry ──▶ not revoked ──▶ UserProfile   │
//! │  sign_out(token) ──▶ jti revoked until the token would have expired     │
//! │                                                                         │
//! │  request_password_reset(email) ──▶ one-time token (caller delivers it)  │
//! │  reset_password(token, new)    ──▶ token consumed, hash replaced        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every successful call returns an [`AuthRedirect`] telling a UI where to
//! go next.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use stockroom_core::validation::{validate_email, validate_password};
use stockroom_core::{UserProfile, UserRole};
use stockroom_db::{DbError, NewUser, UserRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::error_log::ErrorHandler;

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password with argon2id and a random salt.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::Internal(format!("Failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

/// False for a wrong password or an unparseable hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Session Tokens
// =============================================================================

/// JWT claims of a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Token id, used for revocation.
    pub jti: String,
}

#[derive(Debug)]
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, lifetime_secs: i64) -> Self {
        JwtManager {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    /// Signs a token for `user`. Returns the token and its expiry.
    pub fn issue(&self, user: &UserProfile) -> ServiceResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Internal(format!("Failed to generate token: {e}")))?;

        Ok((token, expires_at))
    }

    /// Checks signature and expiry and returns the claims.
    pub fn validate(&self, token: &str) -> ServiceResult<Claims> {
        let data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ServiceError::Unauthorized(format!("Invalid session token: {e}")))?;

        Ok(data.claims)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Where a UI should navigate after an auth call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRedirect {
    Dashboard,
    Login,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthOutcome<T> {
    pub value: T,
    pub redirect: AuthRedirect,
}

impl<T> AuthOutcome<T> {
    fn to_dashboard(value: T) -> Self {
        AuthOutcome {
            value,
            redirect: AuthRedirect::Dashboard,
        }
    }

    fn to_login(value: T) -> Self {
        AuthOutcome {
            value,
            redirect: AuthRedirect::Login,
        }
    }
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

// =============================================================================
// Auth Service
// =============================================================================

#[derive(Debug)]
pub struct AuthService {
    users: UserRepository,
    jwt: JwtManager,
    reset_lifetime: Duration,
    errors: Arc<ErrorHandler>,
    /// Revoked token ids with their expiry timestamps.
    revoked: Mutex<HashMap<String, i64>>,
}

impl AuthService {
    /// `errors` receives every failed sign-up, sign-in and reset, the same
    /// handler the inventory reports to.
    pub fn new(users: UserRepository, settings: &AuthSettings, errors: Arc<ErrorHandler>) -> Self {
        AuthService {
            users,
            jwt: JwtManager::new(&settings.jwt_secret, settings.access_token_lifetime_secs),
            reset_lifetime: Duration::seconds(settings.reset_token_lifetime_secs),
            errors,
            revoked: Mutex::new(HashMap::new()),
        }
    }

    pub fn errors(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    /// Runs an auth flow, filing any error with the error handler.
    async fn report<T, Fut>(&self, context: &str, fut: Fut) -> ServiceResult<T>
    where
        Fut: Future<Output = ServiceResult<T>>,
    {
        let result = fut.await;
        if let Err(e) = &result {
            self.errors.handle(e, Some(context), true);
        }
        result
    }

    /// Creates an account with an explicit role and organization.
    ///
    /// ## Errors
    /// Validation errors for a malformed email or short password, `Auth`
    /// when the email is already taken.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
        role: UserRole,
        organization_id: Option<&str>,
    ) -> ServiceResult<UserProfile> {
        self.report(
            "auth.register",
            self.create_account(email, password, full_name, role, organization_id),
        )
        .await
    }

    /// Registers a staff account and signs it in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> ServiceResult<AuthOutcome<Session>> {
        self.report("auth.sign_up", async {
            let user = self
                .create_account(email, password, full_name, UserRole::Staff, None)
                .await?;
            info!(user_id = %user.id, "User signed up");
            Ok(AuthOutcome::to_dashboard(self.open_session(user)?))
        })
        .await
    }

    /// Unknown email and wrong password fail the same way.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> ServiceResult<AuthOutcome<Session>> {
        self.report("auth.sign_in", async {
            let Some(credentials) = self.users.find_credentials(email).await? else {
                debug!("Sign-in for unknown email");
                return Err(ServiceError::invalid_credentials());
            };

            if !verify_password(password, &credentials.password_hash) {
                warn!(user_id = %credentials.user.id, "Sign-in with wrong password");
                return Err(ServiceError::invalid_credentials());
            }

            info!(user_id = %credentials.user.id, "User signed in");
            Ok(AuthOutcome::to_dashboard(self.open_session(credentials.user)?))
        })
        .await
    }

    /// Revokes the token. Signing out of an already invalid token succeeds.
    pub fn sign_out(&self, access_token: &str) -> AuthOutcome<()> {
        if let Ok(claims) = self.jwt.validate(access_token) {
            let now = Utc::now().timestamp();
            let mut revoked = self.revoked.lock().expect("revocation mutex poisoned");
            revoked.retain(|_, exp| *exp > now);
            revoked.insert(claims.jti, claims.exp);
            info!(user_id = %claims.sub, "User signed out");
        }
        AuthOutcome::to_login(())
    }

    /// Issues a one-time reset token, or `None` for an unknown email.
    ///
    /// Delivering the token (email, SMS) is up to the caller.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> ServiceResult<AuthOutcome<Option<String>>> {
        self.report("auth.request_password_reset", async {
            validate_email(email)?;

            let Some(credentials) = self.users.find_credentials(email).await? else {
                debug!("Password reset for unknown email");
                return Ok(AuthOutcome::to_login(None));
            };

            let token = Uuid::new_v4().simple().to_string();
            let expires_at = Utc::now() + self.reset_lifetime;
            self.users
                .create_reset(&credentials.user.id, &token, expires_at)
                .await?;

            info!(user_id = %credentials.user.id, %expires_at, "Password reset requested");
            Ok(AuthOutcome::to_login(Some(token)))
        })
        .await
    }

    /// Consumes `token` and sets a new password.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> ServiceResult<AuthOutcome<()>> {
        self.report("auth.reset_password", async {
            validate_password(new_password)?;

            let reset = self.users.take_reset(token).await?.ok_or_else(|| {
                ServiceError::Auth("Password reset token is invalid or has expired".to_string())
            })?;

            let password_hash = hash_password(new_password)?;
            self.users
                .set_password_hash(&reset.user_id, &password_hash)
                .await?;

            info!(user_id = %reset.user_id, "Password reset");
            Ok(AuthOutcome::to_login(()))
        })
        .await
    }

    /// Resolves a session token to the current profile.
    ///
    /// ## Errors
    /// `Unauthorized` for bad, expired or revoked tokens and for users
    /// deleted since the token was issued.
    pub async fn verify(&self, access_token: &str) -> ServiceResult<UserProfile> {
        let claims = self.jwt.validate(access_token)?;

        let is_revoked = self
            .revoked
            .lock()
            .expect("revocation mutex poisoned")
            .contains_key(&claims.jti);
        if is_revoked {
            return Err(ServiceError::Unauthorized("Session has been signed out".to_string()));
        }

        match self.users.get(&claims.sub).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_not_found() => {
                Err(ServiceError::Unauthorized("User no longer exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
        role: UserRole,
        organization_id: Option<&str>,
    ) -> ServiceResult<UserProfile> {
        validate_email(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;
        let created = self
            .users
            .create(&NewUser {
                email,
                full_name,
                role,
                organization_id,
                password_hash: &password_hash,
            })
            .await;

        match created {
            Ok(user) => Ok(user),
            Err(DbError::UniqueViolation { .. }) => Err(ServiceError::Auth(
                "An account with this email already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn open_session(&self, user: UserProfile) -> ServiceResult<Session> {
        let (access_token, expires_at) = self.jwt.issue(&user)?;
        Ok(Session {
            access_token,
            expires_at,
            user,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::ErrorCategory;
    use stockroom_db::{Database, DbConfig};

    async fn service() -> (Database, AuthService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = AuthSettings {
            jwt_secret: "test-secret".to_string(),
            ..Default::default()
        };
        let auth = AuthService::new(db.users(), &settings, Arc::new(ErrorHandler::default()));
        (db, auth)
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let manager = JwtManager::new("test-secret", -600);
        let user = UserProfile {
            id: "u-1".to_string(),
            email: "a@b.ma".to_string(),
            full_name: None,
            role: UserRole::Staff,
            organization_id: None,
            created_at: Utc::now(),
        };
        let (token, _) = manager.issue(&user).unwrap();
        assert!(matches!(
            manager.validate(&token),
            Err(ServiceError::Unauthorized(_))
        ));

        let other = JwtManager::new("other-secret", 3600);
        let (token, _) = other.issue(&user).unwrap();
        assert!(JwtManager::new("test-secret", 3600).validate(&token).is_err());
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let (_db, auth) = service().await;

        let outcome = auth
            .sign_up("karim@stockroom.ma", "s3cret-pass", Some("Karim"))
            .await
            .unwrap();
        assert_eq!(outcome.redirect, AuthRedirect::Dashboard);
        assert_eq!(outcome.value.user.role, UserRole::Staff);

        let session = auth
            .sign_in("KARIM@stockroom.ma", "s3cret-pass")
            .await
            .unwrap()
            .value;
        let user = auth.verify(&session.access_token).await.unwrap();
        assert_eq!(user.email, "karim@stockroom.ma");
    }

    #[tokio::test]
    async fn test_bad_credentials_share_one_message() {
        let (_db, auth) = service().await;
        auth.sign_up("karim@stockroom.ma", "s3cret-pass", None)
            .await
            .unwrap();

        let wrong_password = auth
            .sign_in("karim@stockroom.ma", "nope-nope")
            .await
            .unwrap_err();
        let unknown_email = auth
            .sign_in("nobody@stockroom.ma", "s3cret-pass")
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), "Invalid login credentials");
        assert_eq!(unknown_email.to_string(), wrong_password.to_string());
        assert_eq!(wrong_password.category(), ErrorCategory::Authentication);
    }

    #[tokio::test]
    async fn test_failed_auth_flows_reach_error_log() {
        let (_db, auth) = service().await;
        auth.sign_up("karim@stockroom.ma", "s3cret-pass", None)
            .await
            .unwrap();
        auth.sign_in("karim@stockroom.ma", "s3cret-pass")
            .await
            .unwrap();
        assert!(auth.errors().is_empty());

        auth.sign_in("karim@stockroom.ma", "nope-nope")
            .await
            .unwrap_err();
        let entry = &auth.errors().get_recent(1)[0];
        assert_eq!(entry.category, ErrorCategory::Authentication);
        assert_eq!(entry.original_error, "Invalid login credentials");
        assert_eq!(entry.context.as_deref(), Some("auth.sign_in"));

        auth.reset_password("no-such-token", "new-password")
            .await
            .unwrap_err();
        let entry = &auth.errors().get_recent(1)[0];
        assert_eq!(entry.context.as_deref(), Some("auth.reset_password"));

        auth.sign_up("karim@stockroom.ma", "another-pass", None)
            .await
            .unwrap_err();
        let entry = &auth.errors().get_recent(1)[0];
        assert_eq!(entry.context.as_deref(), Some("auth.sign_up"));
        assert_eq!(auth.errors().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_and_validation() {
        let (_db, auth) = service().await;
        auth.sign_up("karim@stockroom.ma", "s3cret-pass", None)
            .await
            .unwrap();

        assert!(matches!(
            auth.sign_up("karim@stockroom.ma", "another-pass", None).await,
            Err(ServiceError::Auth(_))
        ));
        assert!(matches!(
            auth.sign_up("not-an-email", "s3cret-pass", None).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            auth.sign_up("short@stockroom.ma", "abc", None).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let (_db, auth) = service().await;
        let session = auth
            .sign_up("karim@stockroom.ma", "s3cret-pass", None)
            .await
            .unwrap()
            .value;

        let outcome = auth.sign_out(&session.access_token);
        assert_eq!(outcome.redirect, AuthRedirect::Login);
        assert!(matches!(
            auth.verify(&session.access_token).await,
            Err(ServiceError::Unauthorized(_))
        ));

        // Signing out again is harmless.
        auth.sign_out(&session.access_token);
        auth.sign_out("garbage");
    }

    #[tokio::test]
    async fn test_password_reset_is_single_use() {
        let (_db, auth) = service().await;
        auth.sign_up("karim@stockroom.ma", "old-password", None)
            .await
            .unwrap();

        let unknown = auth
            .request_password_reset("ghost@stockroom.ma")
            .await
            .unwrap();
        assert_eq!(unknown.value, None);

        let token = auth
            .request_password_reset("karim@stockroom.ma")
            .await
            .unwrap()
            .value
            .unwrap();

        let outcome = auth.reset_password(&token, "new-password").await.unwrap();
        assert_eq!(outcome.redirect, AuthRedirect::Login);

        assert!(auth.sign_in("karim@stockroom.ma", "old-password").await.is_err());
        assert!(auth.sign_in("karim@stockroom.ma", "new-password").await.is_ok());

        let reused = auth.reset_password(&token, "third-password").await.unwrap_err();
        assert_eq!(reused.category(), ErrorCategory::Authentication);
    }

    #[tokio::test]
    async fn test_deleted_user_token_is_unauthorized() {
        let (db, auth) = service().await;
        let session = auth
            .sign_up("karim@stockroom.ma", "s3cret-pass", None)
            .await
            .unwrap()
            .value;

        db.users().delete(&session.user.id).await.unwrap();
        assert!(matches!(
            auth.verify(&session.access_token).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
