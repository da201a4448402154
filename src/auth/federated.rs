//! Federated identity linking.
//!
//! Reconciles a third-party identity assertion with local user records:
//! first-time assertions provision a new account, repeat assertions from
//! the same provider refresh the mutable profile fields, and an assertion
//! for an email owned by a *different* provider is a conflict; one
//! provider can never take over another's account.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::db::schema::{UserCreate, UserRecord, UserRole};
use crate::db::users::{UserStore, UserStoreError};
use crate::types::{ExternalSubjectId, ProviderName};

/// Delay before the single re-lookup after losing a provisioning race.
/// Long enough to ride out read-after-write lag in the persistence
/// collaborator.
const RACE_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Profile fields asserted by a federated provider.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub provider: ProviderName,
    pub provider_id: ExternalSubjectId,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Why an assertion could not be linked to a user record.
#[derive(Debug)]
pub enum LinkError {
    /// The provider asserted no email; nothing to key the account on.
    MissingEmail,
    /// The email belongs to an account created under another provider.
    ProviderConflict { provider: ProviderName },
    /// Lost the concurrent-provisioning race and the winning record never
    /// became visible, even after the bounded retry.
    ProvisioningRace,
    /// Any other persistence failure.
    Store(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEmail => write!(f, "No email in federated profile"),
            Self::ProviderConflict { provider } => {
                write!(f, "Account already registered with {}", provider)
            }
            Self::ProvisioningRace => write!(f, "Concurrent account provisioning not resolved"),
            Self::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<UserStoreError> for LinkError {
    fn from(err: UserStoreError) -> Self {
        match err {
            // Only reachable outside the guarded create path.
            UserStoreError::DuplicateEmail => Self::ProvisioningRace,
            UserStoreError::Database(msg) => Self::Store(msg),
        }
    }
}

impl LinkError {
    /// Message carried back to the client in the redirect's `error` query
    /// value. Generic except for the provider conflict, whose provider
    /// name is not itself a secret.
    pub fn redirect_message(&self) -> String {
        match self {
            Self::MissingEmail => "Email not found from OAuth2 provider".to_string(),
            Self::ProviderConflict { provider } => format!(
                "You're already registered with {}. Please use that account to sign in.",
                provider
            ),
            Self::ProvisioningRace | Self::Store(_) => {
                "Authentication failed. Please try again.".to_string()
            }
        }
    }
}

/// Trim and lower-case an email for lookup and storage. Emails are unique
/// case-insensitively, so every path normalizes before touching the store.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Derive first/last name from the asserted display name, falling back to
/// the local part of the email.
fn split_display_name(display_name: Option<&str>, email: &str) -> (String, String) {
    match display_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => match name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (name.to_string(), String::new()),
        },
        None => {
            let local = email.split('@').next().unwrap_or_default();
            (local.to_string(), String::new())
        }
    }
}

/// Reconciles federated identity assertions with local user records.
pub struct IdentityLinker {
    users: Arc<UserStore>,
}

impl IdentityLinker {
    pub fn new(users: Arc<UserStore>) -> Self {
        Self { users }
    }

    /// Link an assertion to exactly one user record, provisioning it on
    /// first contact.
    pub async fn link(&self, profile: &FederatedProfile) -> Result<UserRecord, LinkError> {
        let email = normalize_email(&profile.email);
        if email.is_empty() {
            return Err(LinkError::MissingEmail);
        }

        match self.users.find_by_email(&email).await? {
            Some(user) => self.refresh_existing(user, profile).await,
            None => self.provision(&email, profile).await,
        }
    }

    /// The email is already registered: same provider refreshes the
    /// mutable profile fields, any other provider is a conflict.
    async fn refresh_existing(
        &self,
        user: UserRecord,
        profile: &FederatedProfile,
    ) -> Result<UserRecord, LinkError> {
        if user.provider != profile.provider {
            return Err(LinkError::ProviderConflict {
                provider: user.provider,
            });
        }

        let (first_name, last_name) = match profile.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => {
                split_display_name(Some(name), &user.email)
            }
            _ => (user.first_name.clone(), user.last_name.clone()),
        };

        let updated = self
            .users
            .update_profile(&user.key(), first_name, last_name, profile.avatar_url.clone())
            .await?;

        Ok(updated)
    }

    /// First contact for this email: create the account under the
    /// asserted provider. A duplicate-email rejection means a concurrent
    /// callback provisioned it first; re-look it up once after a short
    /// delay and continue as if it had been found initially.
    async fn provision(
        &self,
        email: &str,
        profile: &FederatedProfile,
    ) -> Result<UserRecord, LinkError> {
        let (first_name, last_name) = split_display_name(profile.display_name.as_deref(), email);

        let create = UserCreate {
            email: email.to_string(),
            password_hash: None,
            first_name,
            last_name,
            role: UserRole::User,
            provider: profile.provider.clone(),
            provider_id: Some(profile.provider_id.clone()),
            avatar_url: profile.avatar_url.clone(),
        };

        match self.users.create(create).await {
            Ok(user) => {
                info!(
                    user = %user.key(),
                    provider = %profile.provider,
                    "provisioned federated account"
                );
                Ok(user)
            }
            Err(UserStoreError::DuplicateEmail) => {
                warn!(provider = %profile.provider, "lost provisioning race, re-checking");
                tokio::time::sleep(RACE_RETRY_DELAY).await;

                match self.users.find_by_email(email).await? {
                    Some(user) => self.refresh_existing(user, profile).await,
                    None => Err(LinkError::ProvisioningRace),
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}
