//! Authentication and session gating for the admin surface.
//!
//! [`AuthService`] ties together the user store, password verification and
//! the session registry. A request is `Authenticated` when it carries a
//! correctly signed session cookie whose token maps to a live session;
//! everything else is `Anonymous`.
//!
//! Login failures are deliberately uniform: an unknown username, a wrong
//! password and a malformed stored hash all produce
//! [`AuthError::InvalidCredentials`], and an unknown username still pays
//! for one password derivation.

pub mod cookie;
pub mod password;
pub mod session;

pub use cookie::{CookieSigner, SESSION_COOKIE};
pub use password::{hash_password, verify_password};
pub use session::{Session, SessionRegistry, SESSION_TTL};

use axum::http::HeaderMap;

use crate::now_millis;
use crate::persistence::{generate_record_id, PersistenceError, UserRecord, UserRepository};

/// Role assigned to seeded users.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("invalid session secret: {0}")]
    InvalidSecret(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub username: String,
    /// `Set-Cookie` header value carrying the signed session token.
    pub set_cookie: String,
}

/// An authenticated request's session.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub token: String,
    pub session: Session,
}

pub struct AuthService<U> {
    users: U,
    sessions: SessionRegistry,
    signer: CookieSigner,
}

impl<U: UserRepository> AuthService<U> {
    pub fn new(users: U, sessions: SessionRegistry, signer: CookieSigner) -> Self {
        Self {
            users,
            sessions,
            signer,
        }
    }

    /// Verify credentials and open a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginSuccess, AuthError> {
        let purged = self.sessions.purge_expired().await;
        if purged > 0 {
            tracing::debug!(purged, "Purged expired sessions");
        }

        let user = self.users.find_user_by_username(username).await?;
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let verified = verify_off_thread(password.to_string(), stored_hash).await?;

        match user {
            Some(user) if verified => {
                let token = self.sessions.create(&user.id, &user.username).await;
                tracing::info!(username = %user.username, "Login succeeded");
                Ok(LoginSuccess {
                    set_cookie: self.signer.session_cookie(&token, self.sessions.ttl()),
                    username: user.username,
                })
            }
            _ => {
                tracing::warn!("Login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Resolve the session a request belongs to, if any.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Option<ActiveSession> {
        let token = self.signer.token_from_headers(headers)?;
        let session = self.sessions.lookup(&token).await?;
        Some(ActiveSession { token, session })
    }

    /// Destroy a session and return the `Set-Cookie` value that clears it.
    pub async fn logout(&self, token: &str) -> String {
        if self.sessions.destroy(token).await {
            tracing::info!("Session destroyed");
        }
        self.signer.clear_cookie()
    }
}

async fn verify_off_thread(
    password: String,
    stored_hash: Option<String>,
) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            password::dummy_verify(&password);
            false
        }
    })
    .await
    .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// What [`seed_admin`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedOutcome {
    Created(UserRecord),
    AlreadyExists,
}

/// Create an admin user unless one with that username already exists.
pub async fn seed_admin<U: UserRepository>(
    users: &U,
    username: &str,
    password: &str,
) -> Result<SeedOutcome, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidInput("username must not be empty".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password must not be empty".to_string()));
    }

    if users.find_user_by_username(username).await?.is_some() {
        return Ok(SeedOutcome::AlreadyExists);
    }

    let password = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))??;

    let user = UserRecord {
        id: generate_record_id(),
        username: username.to_string(),
        password_hash,
        role: ADMIN_ROLE.to_string(),
        created_at: now_millis(),
    };

    match users.create_user(&user).await {
        Ok(()) => Ok(SeedOutcome::Created(user)),
        Err(PersistenceError::DuplicateUser(_)) => Ok(SeedOutcome::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteUserRepository;
    use crate::storage::{SqliteConnector, StorageManager, StorageOptions};
    use axum::http::header::COOKIE;
    use axum::http::HeaderValue;

    fn test_users() -> SqliteUserRepository {
        let storage = StorageManager::new(SqliteConnector::new(StorageOptions::in_memory()));
        SqliteUserRepository::new(storage)
    }

    async fn test_service() -> AuthService<SqliteUserRepository> {
        let users = test_users();
        seed_admin(&users, "admin", "s3cret-pass").await.unwrap();
        AuthService::new(
            users,
            SessionRegistry::default(),
            CookieSigner::new(b"unit-test-secret", false).unwrap(),
        )
    }

    fn headers_from_set_cookie(set_cookie: &str) -> HeaderMap {
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let auth = test_service().await;
        let login = auth.login("admin", "s3cret-pass").await.unwrap();
        assert_eq!(login.username, "admin");

        let headers = headers_from_set_cookie(&login.set_cookie);
        let active = auth.authenticate(&headers).await.unwrap();
        assert_eq!(active.session.username, "admin");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
        let auth = test_service().await;
        let wrong_password = auth.login("admin", "nope").await.unwrap_err();
        let unknown_user = auth.login("ghost", "s3cret-pass").await.unwrap_err();
        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_anonymous_without_cookie() {
        let auth = test_service().await;
        assert!(auth.authenticate(&HeaderMap::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_forged_cookie_is_anonymous() {
        let auth = test_service().await;
        let login = auth.login("admin", "s3cret-pass").await.unwrap();
        let forged = login.set_cookie.replacen("feedback_session=", "feedback_session=x", 1);
        assert!(auth
            .authenticate(&headers_from_set_cookie(&forged))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let auth = test_service().await;
        let login = auth.login("admin", "s3cret-pass").await.unwrap();
        let headers = headers_from_set_cookie(&login.set_cookie);
        let active = auth.authenticate(&headers).await.unwrap();

        let cleared = auth.logout(&active.token).await;
        assert!(cleared.contains("Max-Age=0"));
        assert!(auth.authenticate(&headers).await.is_none());
    }

    #[tokio::test]
    async fn test_seed_admin_is_idempotent() {
        let users = test_users();
        let first = seed_admin(&users, "admin", "pw-one").await.unwrap();
        assert!(matches!(first, SeedOutcome::Created(ref u) if u.role == ADMIN_ROLE));
        let second = seed_admin(&users, "admin", "pw-two").await.unwrap();
        assert_eq!(second, SeedOutcome::AlreadyExists);

        // The original password still applies
        let stored = users.find_user_by_username("admin").await.unwrap().unwrap();
        assert!(verify_password("pw-one", &stored.password_hash));
    }

    #[tokio::test]
    async fn test_seed_admin_rejects_empty_input() {
        let users = test_users();
        assert!(matches!(
            seed_admin(&users, "  ", "pw").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            seed_admin(&users, "admin", "").await,
            Err(AuthError::InvalidInput(_))
        ));
    }
}
