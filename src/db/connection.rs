use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "fitness".to_string()),
            database: env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "gateway".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    // Use the specified namespace and database
    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

/// Name of the unique email index; create-user error classification keys
/// off this string.
pub const USER_EMAIL_INDEX: &str = "user_email_idx";

pub async fn ensure_schema(db: &Db) -> Result<()> {
    // The unique index on email is the sole defense against duplicate
    // account creation; everything else in the table is ordinary fields.
    let schema_queries = vec![
        "DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS email ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS password_hash ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS first_name ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS last_name ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS role ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS provider ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS provider_id ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS avatar_url ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE user TYPE datetime DEFAULT time::now();
         DEFINE FIELD IF NOT EXISTS updated_at ON TABLE user TYPE datetime DEFAULT time::now();",
        "DEFINE INDEX IF NOT EXISTS user_email_idx ON TABLE user COLUMNS email UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?;
    }

    Ok(())
}
