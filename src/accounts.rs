//! Account resolution.
//!
//! Given a post's owning scope, finds the active platform credential
//! authorized to publish on its behalf. Posts may pin an explicit account;
//! otherwise the most-recently-used active account for the scope wins.

use sea_orm::{DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::crypto::{self, CryptoError, CryptoKey};
use crate::models::scheduled_post::Model as ScheduledPost;
use crate::repositories::AccountRepository;

/// Errors from account resolution; each consumes one publish attempt.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account not found or not usable for this post")]
    AccountNotFound,
    #[error("no platform account connected for this scope")]
    NoAccountConnected,
    #[error("failed to open stored credential: {0}")]
    Crypto(#[from] CryptoError),
    #[error("account lookup failed: {0}")]
    Db(#[from] DbErr),
}

/// A decrypted, ready-to-use publish credential.
#[derive(Debug, Clone)]
pub struct Credential {
    pub account_id: Uuid,
    /// User id on the external platform, used in API paths.
    pub platform_user_id: String,
    pub username: String,
    pub access_token: String,
}

/// Resolves the publish credential for a post's ownership scope.
#[derive(Clone)]
pub struct AccountResolver {
    repo: AccountRepository,
    key: CryptoKey,
}

impl AccountResolver {
    pub fn new(db: DatabaseConnection, key: CryptoKey) -> Self {
        Self {
            repo: AccountRepository::new(db),
            key,
        }
    }

    /// Resolve the credential for a post.
    ///
    /// Updates the account's `last_used_at` in a detached task whose
    /// failure is logged and discarded, never surfaced to the caller.
    pub async fn resolve(&self, post: &ScheduledPost) -> Result<Credential, AccountError> {
        let account = match post.target_account_id {
            Some(account_id) => {
                let account = self
                    .repo
                    .find_by_id(account_id)
                    .await?
                    .ok_or(AccountError::AccountNotFound)?;
                if !account.active || !owned_by_post_scope(&account, post) {
                    return Err(AccountError::AccountNotFound);
                }
                account
            }
            None => self
                .repo
                .find_mru_active_for_scope(post.user_id, post.organization_id)
                .await?
                .ok_or(AccountError::NoAccountConnected)?,
        };

        let access_token = crypto::open_token(&self.key, account.id, &account.access_token_ciphertext)?;

        let repo = self.repo.clone();
        let account_id = account.id;
        tokio::spawn(async move {
            if let Err(err) = repo.touch_last_used(account_id).await {
                debug!(account_id = %account_id, error = ?err, "last_used_at update skipped");
            }
        });

        Ok(Credential {
            account_id: account.id,
            platform_user_id: account.external_user_id,
            username: account.external_username,
            access_token,
        })
    }
}

fn owned_by_post_scope(account: &crate::models::account::Model, post: &ScheduledPost) -> bool {
    if account.user_id == Some(post.user_id) {
        return true;
    }
    matches!(
        (account.organization_id, post.organization_id),
        (Some(account_org), Some(post_org)) if account_org == post_org
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(user: Option<Uuid>, org: Option<Uuid>) -> crate::models::account::Model {
        let now = Utc::now().fixed_offset();
        crate::models::account::Model {
            id: Uuid::new_v4(),
            user_id: user,
            organization_id: org,
            external_user_id: "17841400000000000".to_string(),
            external_username: "brand".to_string(),
            access_token_ciphertext: Vec::new(),
            active: true,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn post(user_id: Uuid, organization_id: Option<Uuid>) -> ScheduledPost {
        let now = Utc::now().fixed_offset();
        ScheduledPost {
            id: Uuid::new_v4(),
            user_id,
            organization_id,
            asset_ref: "https://cdn.example.com/a.jpg".to_string(),
            caption: "caption".to_string(),
            hashtags: None,
            subtype: crate::models::scheduled_post::PostSubtype::Photo,
            scheduled_at_ms: 0,
            display_datetime: None,
            display_timezone: None,
            status: crate::models::scheduled_post::PostStatus::Scheduled,
            publish_attempts: 0,
            last_publish_attempt: None,
            error_message: None,
            platform_media_id: None,
            published_at: None,
            target_account_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn personal_account_matches_owning_user() {
        let user = Uuid::new_v4();
        assert!(owned_by_post_scope(&account(Some(user), None), &post(user, None)));
        assert!(!owned_by_post_scope(
            &account(Some(Uuid::new_v4()), None),
            &post(user, None)
        ));
    }

    #[test]
    fn org_account_matches_org_posts_only() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let shared = account(None, Some(org));

        assert!(owned_by_post_scope(&shared, &post(user, Some(org))));
        assert!(!owned_by_post_scope(&shared, &post(user, None)));
        assert!(!owned_by_post_scope(&shared, &post(user, Some(Uuid::new_v4()))));
    }
}
