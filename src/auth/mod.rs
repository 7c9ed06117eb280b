use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{NewUser, RegisterRequest, Role, User},
    error::{AppError, Result},
    repository::UserRepository,
};

pub mod booking_voter;
pub mod review_voter;

pub use booking_voter::{authorize, can_perform, BookingAction};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issued on register and login.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthToken {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub user: User,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_duration_hours: i64,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, secret: &str, token_duration_hours: i64) -> Self {
        Self {
            users,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_duration_hours,
        }
    }

    pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        let argon2 = Argon2::default();

        Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    pub async fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthToken> {
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(format!("An account for {} already exists", email)));
        }

        let password_hash = Self::hash_password(&request.password).await?;
        let user = self
            .users
            .create(NewUser {
                email,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                roles: vec![Role::User],
                password_hash,
            })
            .await?;

        tracing::info!("Registered user {}", user.id);
        self.issue_token(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        let email = email.trim().to_lowercase();
        let (user, hash) = self
            .users
            .find_credentials(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !Self::verify_password(password, &hash).await? {
            tracing::debug!("Failed login attempt for {}", email);
            return Err(AppError::Unauthorized);
        }

        self.issue_token(user)
    }

    pub fn issue_token(&self, user: User) -> Result<AuthToken> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.token_duration_hours);
        let claims = Claims {
            sub: user.id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))?;

        Ok(AuthToken {
            token,
            expires_at,
            user,
        })
    }

    /// Resolves a bearer token to its user. Any decoding failure, expired
    /// token or unknown subject is `Unauthorized`.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|_| AppError::Unauthorized)?;

        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized)?;

        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}
