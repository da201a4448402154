use serde::{Deserialize, Serialize};
use surrealdb::{RecordId, sql::Datetime};

use crate::types::{ExternalSubjectId, ProviderName};

/// Role granted to a user account. Serialized in the database and in token
/// claims as the upper-case role name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

/// Persisted representation of a user account in SurrealDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable database identifier for this user (table: `user`).
    pub id: RecordId,
    /// Normalized (trimmed, lower-cased) email. Unique across the table.
    pub email: String,
    /// Adaptive password hash in PHC string format. Absent for accounts
    /// provisioned through a federated provider.
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    /// Identity source this account was created under. Fixed at creation.
    pub provider: ProviderName,
    /// The provider's own subject id for this user, if federated.
    pub provider_id: Option<ExternalSubjectId>,
    pub avatar_url: Option<String>,
    /// When this record was first created.
    pub created_at: Option<Datetime>,
    /// When this record was last updated.
    pub updated_at: Option<Datetime>,
}

impl UserRecord {
    /// The record key, used as the token subject. Resolves back to exactly
    /// this record via [`crate::db::UserStore::find_by_id`].
    pub fn key(&self) -> String {
        self.id.key().to_string()
    }
}

/// Payload used when inserting a new user into the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub provider: ProviderName,
    pub provider_id: Option<ExternalSubjectId>,
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        let admin = serde_json::to_string(&UserRole::Admin).unwrap();
        assert_eq!(admin, "\"ADMIN\"");

        let parsed: UserRole = serde_json::from_str("\"USER\"").unwrap();
        assert_eq!(parsed, UserRole::User);
    }

    #[test]
    fn test_record_key_is_bare() {
        let record_id = RecordId::from_table_key("user", "abc123");
        assert_eq!(record_id.key().to_string(), "abc123");
    }
}
