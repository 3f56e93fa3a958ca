//! User models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::now_rfc3339;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from(self.role.clone())
    }

    /// Insert a new account with the default role.
    ///
    /// A duplicate email surfaces as a UNIQUE constraint error.
    pub async fn create(
        db: &SqlitePool,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(password_hash)
        .bind(Role::User.as_str())
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Create the account or reset its password, keeping the id stable.
    pub async fn upsert(
        db: &SqlitePool,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let now = now_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                password_hash = excluded.password_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(email)
        .bind(password_hash)
        .bind(Role::User.as_str())
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(db)
            .await
    }
}

/// Public view of the authenticated account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            role: user.role(),
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub user: UserResponse,
}

/// Signup and login share one body shape
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[tokio::test]
    async fn test_create_and_find() {
        let db = init_memory().await.unwrap();
        let user = User::create(&db, "a@example.com", "hash").await.unwrap();
        assert_eq!(user.role(), Role::User);

        let by_email = User::find_by_email(&db, "a@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let by_id = User::find_by_id(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let db = init_memory().await.unwrap();
        User::create(&db, "dup@example.com", "hash").await.unwrap();

        let err = User::create(&db, "dup@example.com", "other").await.unwrap_err();
        match err {
            sqlx::Error::Database(db_err) => {
                assert!(db_err.message().contains("UNIQUE constraint failed"))
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_id() {
        let db = init_memory().await.unwrap();
        let first = User::upsert(&db, "demo@example.com", "one").await.unwrap();
        let second = User::upsert(&db, "demo@example.com", "two").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.password_hash, "two");
    }

    #[test]
    fn test_user_response_shape() {
        let user = User {
            id: "id".to_string(),
            email: "a@example.com".to_string(),
            password_hash: "secret".to_string(),
            role: "admin".to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000Z".to_string(),
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["email"], "a@example.com");
        assert_eq!(json["role"], "admin");
        assert_eq!(json["createdAt"], "2024-01-01T00:00:00.000Z");
        assert!(json.get("passwordHash").is_none());
    }
}
