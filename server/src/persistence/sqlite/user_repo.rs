//! SQLite-backed repository for admin users.

use crate::persistence::traits::UserRepository;
use crate::persistence::{PersistenceError, UserRecord};
use crate::storage::SqliteStorage;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    password_hash: String,
    role: String,
    created_at: i64,
}

impl From<UserRow> for UserRecord {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            role: r.role,
            created_at: r.created_at.max(0) as u64,
        }
    }
}

/// SQLite implementation of [`UserRepository`].
#[derive(Clone)]
pub struct SqliteUserRepository {
    storage: SqliteStorage,
}

impl SqliteUserRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

impl UserRepository for SqliteUserRepository {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, PersistenceError> {
        let db = self.storage.acquire().await?;

        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, role, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(db.pool())
        .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn create_user(&self, user: &UserRecord) -> Result<(), PersistenceError> {
        let db = self.storage.acquire().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.created_at as i64)
        .execute(db.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(PersistenceError::DuplicateUser(user.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
