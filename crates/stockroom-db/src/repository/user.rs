//! # User Repository
//!
//! Users and password-reset tokens. Password hashes never leave this
//! module except through [`StoredCredentials`], which is not serializable.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use stockroom_core::{Page, PageRequest, UserProfile, UserRole};
use tracing::{debug, info};

use super::new_id;
use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeFeed, ChangeKind, Table};

const PROFILE_COLUMNS: &str = "id, email, full_name, role, organization_id, created_at";

/// A user together with their password hash, for sign-in checks.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user: UserProfile,
    pub password_hash: String,
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    id: String,
    email: String,
    full_name: Option<String>,
    role: UserRole,
    organization_id: Option<String>,
    created_at: DateTime<Utc>,
    password_hash: String,
}

impl From<CredentialsRow> for StoredCredentials {
    fn from(row: CredentialsRow) -> Self {
        StoredCredentials {
            user: UserProfile {
                id: row.id,
                email: row.email,
                full_name: row.full_name,
                role: row.role,
                organization_id: row.organization_id,
                created_at: row.created_at,
            },
            password_hash: row.password_hash,
        }
    }
}

/// Fields for a new user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub full_name: Option<&'a str>,
    pub role: UserRole,
    pub organization_id: Option<&'a str>,
    pub password_hash: &'a str,
}

/// A pending password reset.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PasswordReset {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl UserRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        UserRepository { pool, feed }
    }

    /// Creates a user. Emails are unique regardless of case.
    pub async fn create(&self, new_user: &NewUser<'_>) -> DbResult<UserProfile> {
        let id = new_id();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, role, organization_id, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(new_user.email.trim())
        .bind(new_user.full_name.map(str::trim))
        .bind(new_user.role)
        .bind(new_user.organization_id)
        .bind(new_user.password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(id = %id, role = ?new_user.role, "User created");
        self.feed.publish(Table::Users, ChangeKind::Insert, Some(&id));
        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> DbResult<UserProfile> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?1");
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Looks a user up by email for sign-in. `None` when no such user.
    pub async fn find_credentials(&self, email: &str) -> DbResult<Option<StoredCredentials>> {
        debug!("Looking up credentials");
        let sql = format!("SELECT {PROFILE_COLUMNS}, password_hash FROM users WHERE email = ?1");
        let row = sqlx::query_as::<_, CredentialsRow>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StoredCredentials::from))
    }

    /// Lists users, optionally within one organization.
    pub async fn list(
        &self,
        organization_id: Option<&str>,
        page: PageRequest,
    ) -> DbResult<Page<UserProfile>> {
        let page = page.normalized();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE (?1 IS NULL OR organization_id = ?1)",
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM users WHERE (?1 IS NULL OR organization_id = ?1) \
             ORDER BY email COLLATE NOCASE LIMIT ?2 OFFSET ?3"
        );
        let users = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(organization_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(users, count, page))
    }

    pub async fn set_role(&self, id: &str, role: UserRole) -> DbResult<UserProfile> {
        let result = sqlx::query("UPDATE users SET role = ?2 WHERE id = ?1")
            .bind(id)
            .bind(role)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(id = %id, role = ?role, "User role changed");
        self.feed.publish(Table::Users, ChangeKind::Update, Some(id));
        self.get(id).await
    }

    pub async fn set_organization(
        &self,
        id: &str,
        organization_id: Option<&str>,
    ) -> DbResult<UserProfile> {
        let result = sqlx::query("UPDATE users SET organization_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        self.feed.publish(Table::Users, ChangeKind::Update, Some(id));
        self.get(id).await
    }

    pub async fn set_password_hash(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        self.feed.publish(Table::Users, ChangeKind::Update, Some(id));
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(id = %id, "User deleted");
        self.feed.publish(Table::Users, ChangeKind::Delete, Some(id));
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Password resets
    // =========================================================================

    /// Stores a reset token for `user_id`, replacing any earlier ones.
    pub async fn create_reset(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_resets WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO password_resets (token, user_id, expires_at) VALUES (?1, ?2, ?3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Consumes a reset token.
    ///
    /// The token is deleted whether or not it has expired; `None` is
    /// returned for unknown or expired tokens.
    pub async fn take_reset(&self, token: &str) -> DbResult<Option<PasswordReset>> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            "DELETE FROM password_resets WHERE token = ?1 RETURNING token, user_id, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reset.filter(|r| r.expires_at > Utc::now()))
    }
}
