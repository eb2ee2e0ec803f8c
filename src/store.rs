use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Persistence seam for user identity records.
///
/// Session mutations go through `commit_session` / `clear_session`, which
/// advance the per-user generation counter atomically at the storage layer so
/// concurrent logins, refreshes, and logouts cannot clobber each other.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn create(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<User>;

    /// Compare-and-swap session update: stores the new refresh token hash and
    /// bumps `token_version` to `expected_version + 1`, but only while the
    /// stored version still equals `expected_version`. Returns `None` when
    /// the user is gone or a concurrent login/refresh/logout won the race.
    async fn commit_session(
        &self,
        id: Uuid,
        expected_version: i32,
        refresh_token_hash: Option<&str>,
    ) -> anyhow::Result<Option<User>>;

    /// Clears the stored refresh token and bumps `token_version`,
    /// invalidating every outstanding token for the user.
    async fn clear_session(&self, id: Uuid) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, refresh_token_hash, token_version, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, refresh_token_hash, token_version, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, username, password_hash, refresh_token_hash, token_version, created_at
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn commit_session(
        &self,
        id: Uuid,
        expected_version: i32,
        refresh_token_hash: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET refresh_token_hash = $3, token_version = token_version + 1
            WHERE id = $1 AND token_version = $2
            RETURNING id, email, username, password_hash, refresh_token_hash, token_version, created_at
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(refresh_token_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn clear_session(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET refresh_token_hash = NULL, token_version = token_version + 1
            WHERE id = $1
            RETURNING id, email, username, password_hash, refresh_token_hash, token_version, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

/// Mutexed map with the same CAS semantics as the Postgres store. Backs
/// `AppState::fake()` and the unit tests.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().expect("user store lock");
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().expect("user store lock");
        Ok(users.get(&id).cloned())
    }

    async fn create(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let mut users = self.users.lock().expect("user store lock");
        if users.values().any(|u| u.email == email) {
            anyhow::bail!("duplicate email: {email}");
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            refresh_token_hash: None,
            token_version: 0,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn commit_session(
        &self,
        id: Uuid,
        expected_version: i32,
        refresh_token_hash: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().expect("user store lock");
        match users.get_mut(&id) {
            Some(user) if user.token_version == expected_version => {
                user.token_version = expected_version + 1;
                user.refresh_token_hash = refresh_token_hash.map(str::to_string);
                Ok(Some(user.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn clear_session(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().expect("user store lock");
        match users.get_mut(&id) {
            Some(user) => {
                user.refresh_token_hash = None;
                user.token_version += 1;
                Ok(Some(user.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> (InMemoryUserStore, User) {
        let store = InMemoryUserStore::default();
        let user = store
            .create("carol@example.com", "carol", "$argon2id$fake")
            .await
            .expect("create");
        (store, user)
    }

    #[tokio::test]
    async fn create_starts_at_generation_zero() {
        let (_, user) = seeded_store().await;
        assert_eq!(user.token_version, 0);
        assert!(user.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn commit_session_is_a_cas() {
        let (store, user) = seeded_store().await;

        let updated = store
            .commit_session(user.id, 0, Some("hash-1"))
            .await
            .expect("commit")
            .expect("cas succeeds on current version");
        assert_eq!(updated.token_version, 1);
        assert_eq!(updated.refresh_token_hash.as_deref(), Some("hash-1"));

        // A second commit against the stale version loses the race.
        let stale = store
            .commit_session(user.id, 0, Some("hash-2"))
            .await
            .expect("commit");
        assert!(stale.is_none());

        let current = store.find_by_id(user.id).await.expect("find").expect("user");
        assert_eq!(current.refresh_token_hash.as_deref(), Some("hash-1"));
    }

    #[tokio::test]
    async fn clear_session_always_advances() {
        let (store, user) = seeded_store().await;
        store
            .commit_session(user.id, 0, Some("hash-1"))
            .await
            .expect("commit");

        let cleared = store
            .clear_session(user.id)
            .await
            .expect("clear")
            .expect("user exists");
        assert_eq!(cleared.token_version, 2);
        assert!(cleared.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (store, _) = seeded_store().await;
        let err = store
            .create("carol@example.com", "carol", "$argon2id$other")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate email"));
    }
}
