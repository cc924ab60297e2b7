//! # Customer Repository

use chrono::Utc;
use sqlx::SqlitePool;
use stockroom_core::{Customer, CustomerFilter, CustomerInput, Page, PageRequest};
use tracing::{debug, info};

use super::{new_id, search_pattern};
use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeFeed, ChangeKind, Table};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        CustomerRepository { pool, feed }
    }

    /// Lists customers, newest first. `search` matches name, email or phone.
    pub async fn list(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> DbResult<Page<Customer>> {
        let page = page.normalized();
        let pattern = search_pattern(filter.search.as_deref());
        debug!(search = ?pattern, page = page.page, "Listing customers");

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM customers
            WHERE (?1 IS NULL
                   OR name LIKE ?1 ESCAPE '\'
                   OR email LIKE ?1 ESCAPE '\'
                   OR phone LIKE ?1 ESCAPE '\')
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, email, phone, address, created_at, updated_at
            FROM customers
            WHERE (?1 IS NULL
                   OR name LIKE ?1 ESCAPE '\'
                   OR email LIKE ?1 ESCAPE '\'
                   OR phone LIKE ?1 ESCAPE '\')
            ORDER BY created_at DESC, id
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(customers, count, page))
    }

    pub async fn get(&self, id: &str) -> DbResult<Customer> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, name, email, phone, address, created_at, updated_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn create(&self, input: &CustomerInput) -> DbResult<Customer> {
        let id = new_id();

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone, address, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(trimmed(&input.email))
        .bind(trimmed(&input.phone))
        .bind(trimmed(&input.address))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(id = %id, "Customer created");
        self.feed.publish(Table::Customers, ChangeKind::Insert, Some(&id));

        self.get(&id).await
    }

    pub async fn update(&self, id: &str, input: &CustomerInput) -> DbResult<Customer> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = ?2, email = ?3, phone = ?4, address = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(trimmed(&input.email))
        .bind(trimmed(&input.phone))
        .bind(trimmed(&input.address))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.feed.publish(Table::Customers, ChangeKind::Update, Some(id));
        self.get(id).await
    }

    /// Deletes a customer. Their orders remain with `customer_id` cleared.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        info!(id = %id, "Customer deleted");
        self.feed.publish(Table::Customers, ChangeKind::Delete, Some(id));
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Blank optional fields are stored as NULL.
fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
