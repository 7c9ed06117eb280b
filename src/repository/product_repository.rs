use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::Product,
    error::{AppError, Result},
    repository::ProductRepository,
};

#[derive(FromRow)]
struct ProductRow {
    id: String,
    user_id: String,
    title: String,
    product_type: String,
    price_cents: i64,
    expires_at: NaiveDateTime,
    is_active: i32,
    created_at: NaiveDateTime,
}

pub struct SqliteProductRepository {
    pool: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_product(row: ProductRow) -> Result<Product> {
        Ok(Product {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            title: row.title,
            product_type: row.product_type,
            price_cents: row.price_cents,
            expires_at: DateTime::from_naive_utc_and_offset(row.expires_at, Utc),
            is_active: row.is_active != 0,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn create(&self, product: Product) -> Result<Product> {
        sqlx::query(
            r#"
            INSERT INTO products (id, user_id, title, product_type, price_cents, expires_at, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product.id.to_string())
        .bind(product.user_id.to_string())
        .bind(&product.title)
        .bind(&product.product_type)
        .bind(product.price_cents)
        .bind(product.expires_at.naive_utc())
        .bind(product.is_active as i32)
        .bind(product.created_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(product.id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to retrieve created product".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, user_id, title, product_type, price_cents, expires_at, is_active, created_at
            FROM products
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_product).transpose()
    }
}
