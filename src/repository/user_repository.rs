use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{NewUser, Role, User},
    error::{is_unique_violation, AppError, Result},
    repository::UserRepository,
};

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    roles: String,
    password_hash: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<(User, String)> {
        let user = User {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            roles: Self::parse_roles(&row.roles)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        };
        Ok((user, row.password_hash))
    }

    // Roles are stored as a comma separated list, e.g. "user,moderator".
    fn parse_roles(s: &str) -> Result<Vec<Role>> {
        s.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| {
                Role::parse(r).ok_or_else(|| AppError::Database(format!("Invalid role: {}", r)))
            })
            .collect()
    }

    fn roles_to_str(roles: &[Role]) -> String {
        roles.iter().map(Role::as_str).collect::<Vec<_>>().join(",")
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<(User, String)>> {
        let query = format!(
            r#"
            SELECT id, email, first_name, last_name, roles, password_hash, created_at, updated_at
            FROM users
            WHERE {} = ?
            "#,
            column
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_user).transpose()
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let roles = if user.roles.is_empty() {
            vec![Role::User]
        } else {
            user.roles
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, roles, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(Self::roles_to_str(&roles))
        .bind(&user.password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("An account for {} already exists", user.email))
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to retrieve created user".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .fetch_one_by("id", &id.to_string())
            .await?
            .map(|(user, _)| user))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.fetch_one_by("email", email).await?.map(|(user, _)| user))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        self.fetch_one_by("email", email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_column_round_trip() {
        let roles = vec![Role::User, Role::Moderator];
        let stored = SqliteUserRepository::roles_to_str(&roles);
        assert_eq!(stored, "user,moderator");
        assert_eq!(SqliteUserRepository::parse_roles(&stored).unwrap(), roles);
        assert!(SqliteUserRepository::parse_roles("user, wizard").is_err());
        assert!(SqliteUserRepository::parse_roles("").unwrap().is_empty());
    }
}
