//! User storage on top of the persistence collaborator.
//!
//! Email uniqueness is enforced by the database's unique index, not by this
//! code; a violated insert surfaces as [`UserStoreError::DuplicateEmail`]
//! so callers can distinguish "someone just created this concurrently"
//! from an ordinary failure.

use std::fmt;

use surrealdb::RecordId;
use tracing::debug;
use uuid::Uuid;

use crate::db::connection::{Db, USER_EMAIL_INDEX};
use crate::db::schema::{UserCreate, UserRecord};

/// Errors surfaced by the user store.
#[derive(Debug)]
pub enum UserStoreError {
    /// The unique email index rejected an insert.
    DuplicateEmail,
    /// Any other persistence failure.
    Database(String),
}

impl fmt::Display for UserStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateEmail => write!(f, "Email already registered"),
            Self::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for UserStoreError {}

impl From<surrealdb::Error> for UserStoreError {
    fn from(err: surrealdb::Error) -> Self {
        let msg = err.to_string();
        if msg.contains(USER_EMAIL_INDEX) {
            Self::DuplicateEmail
        } else {
            Self::Database(msg)
        }
    }
}

/// User store for database operations.
pub struct UserStore {
    db: Db,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Look up a user by normalized email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, UserStoreError> {
        let email = email.to_string();

        let query = "SELECT * FROM user WHERE email = $email LIMIT 1";

        let mut res = self.db.query(query).bind(("email", email)).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Look up a user by record key (the token subject).
    pub async fn find_by_id(&self, key: &str) -> Result<Option<UserRecord>, UserStoreError> {
        let id = RecordId::from_table_key("user", key);

        let query = "SELECT * FROM user WHERE id = $id LIMIT 1";

        let mut res = self.db.query(query).bind(("id", id)).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Insert a new user.
    ///
    /// A unique-index violation on email maps to
    /// [`UserStoreError::DuplicateEmail`].
    pub async fn create(&self, create: UserCreate) -> Result<UserRecord, UserStoreError> {
        let key = Uuid::new_v4().simple().to_string();

        let query = r#"
            CREATE type::thing('user', $key) CONTENT {
                email: $email,
                password_hash: $password_hash,
                first_name: $first_name,
                last_name: $last_name,
                role: $role,
                provider: $provider,
                provider_id: $provider_id,
                avatar_url: $avatar_url
            }
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("key", key))
            .bind(("email", create.email))
            .bind(("password_hash", create.password_hash))
            .bind(("first_name", create.first_name))
            .bind(("last_name", create.last_name))
            .bind(("role", create.role))
            .bind(("provider", create.provider))
            .bind(("provider_id", create.provider_id))
            .bind(("avatar_url", create.avatar_url))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| UserStoreError::Database("failed to create user record".to_string()))
    }

    /// Update the mutable profile fields of an existing user.
    ///
    /// Role, email, provider and id are deliberately not touched here.
    pub async fn update_profile(
        &self,
        key: &str,
        first_name: String,
        last_name: String,
        avatar_url: Option<String>,
    ) -> Result<UserRecord, UserStoreError> {
        let id = RecordId::from_table_key("user", key);

        let query = r#"
            UPDATE user SET
                first_name = $first_name,
                last_name = $last_name,
                avatar_url = $avatar_url,
                updated_at = time::now()
            WHERE id = $id
            RETURN AFTER
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("id", id))
            .bind(("first_name", first_name))
            .bind(("last_name", last_name))
            .bind(("avatar_url", avatar_url))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| UserStoreError::Database(format!("no user with key {}", key)))
    }

    /// Replace a user's password hash.
    pub async fn update_password_hash(
        &self,
        key: &str,
        password_hash: String,
    ) -> Result<(), UserStoreError> {
        let id = RecordId::from_table_key("user", key);

        let query = r#"
            UPDATE user SET
                password_hash = $password_hash,
                updated_at = time::now()
            WHERE id = $id
        "#;

        self.db
            .query(query)
            .bind(("id", id))
            .bind(("password_hash", password_hash))
            .await?;

        debug!(user = %key, "password hash updated");
        Ok(())
    }

    /// List all users, newest first.
    pub async fn list(&self) -> Result<Vec<UserRecord>, UserStoreError> {
        let query = "SELECT * FROM user ORDER BY created_at DESC";

        let mut res = self.db.query(query).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::UserRole;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use crate::types::{ExternalSubjectId, ProviderName};

    async fn setup_test_db() -> Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    fn local_create(email: &str) -> UserCreate {
        UserCreate {
            email: email.to_string(),
            password_hash: Some("$argon2id$fake".to_string()),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role: UserRole::User,
            provider: ProviderName::local(),
            provider_id: None,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_email() {
        let store = UserStore::new(setup_test_db().await);

        let created = store.create(local_create("a@example.com")).await.unwrap();
        assert_eq!(created.email, "a@example.com");
        assert_eq!(created.role, UserRole::User);
        assert!(created.provider.is_local());
        assert!(created.created_at.is_some());

        let found = store.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        assert!(store.find_by_email("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_id_round_trips_key() {
        let store = UserStore::new(setup_test_db().await);

        let created = store.create(local_create("a@example.com")).await.unwrap();
        let found = store.find_by_id(&created.key()).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_distinguishable() {
        let store = UserStore::new(setup_test_db().await);

        store.create(local_create("a@example.com")).await.unwrap();
        let err = store.create(local_create("a@example.com")).await.unwrap_err();

        assert!(matches!(err, UserStoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_update_profile_leaves_role_and_provider() {
        let store = UserStore::new(setup_test_db().await);

        let created = store
            .create(UserCreate {
                provider: ProviderName::new("google"),
                provider_id: Some(ExternalSubjectId::new("g-1")),
                ..local_create("a@example.com")
            })
            .await
            .unwrap();

        let updated = store
            .update_profile(
                &created.key(),
                "New".to_string(),
                "Name".to_string(),
                Some("https://cdn.example.com/a.png".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "New");
        assert_eq!(updated.last_name, "Name");
        assert_eq!(
            updated.avatar_url.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.role, created.role);
        assert_eq!(updated.provider, created.provider);
    }

    #[tokio::test]
    async fn test_update_password_hash() {
        let store = UserStore::new(setup_test_db().await);

        let created = store.create(local_create("a@example.com")).await.unwrap();
        store
            .update_password_hash(&created.key(), "$argon2id$new".to_string())
            .await
            .unwrap();

        let found = store.find_by_id(&created.key()).await.unwrap().unwrap();
        assert_eq!(found.password_hash.as_deref(), Some("$argon2id$new"));
    }

    #[tokio::test]
    async fn test_list_users() {
        let store = UserStore::new(setup_test_db().await);

        store.create(local_create("a@example.com")).await.unwrap();
        store.create(local_create("b@example.com")).await.unwrap();

        let users = store.list().await.unwrap();
        assert_eq!(users.len(), 2);
    }
}
