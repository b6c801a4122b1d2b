//! # Account Repository
//!
//! Repository operations for the accounts table: the credential-store
//! surface consumed by the account resolver and the connect/disconnect
//! flows.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::models::account::{ActiveModel, Column, Entity, Model};

/// Repository for account database operations
#[derive(Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Create a new AccountRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Store a newly validated credential. The token ciphertext must
    /// already be sealed by the caller.
    pub async fn create(
        &self,
        user_id: Option<Uuid>,
        organization_id: Option<Uuid>,
        external_user_id: &str,
        external_username: &str,
        access_token_ciphertext: Vec<u8>,
    ) -> Result<Model, DbErr> {
        debug_assert!(user_id.is_some() != organization_id.is_some());
        let now = Utc::now().fixed_offset();

        let account = ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            organization_id: Set(organization_id),
            external_user_id: Set(external_user_id.to_string()),
            external_username: Set(external_username.to_string()),
            access_token_ciphertext: Set(access_token_ciphertext),
            active: Set(true),
            last_used_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        account.insert(&self.db).await
    }

    /// Find an account by id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(&self.db).await
    }

    /// Most-recently-used active account for an ownership scope.
    ///
    /// Organization posts resolve against the organization's shared
    /// accounts; personal posts against the user's own. Accounts never
    /// used sort by creation time.
    pub async fn find_mru_active_for_scope(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Option<Model>, DbErr> {
        let query = match organization_id {
            Some(org_id) => Entity::find().filter(Column::OrganizationId.eq(org_id)),
            None => Entity::find().filter(Column::UserId.eq(user_id)),
        };

        let mut candidates = query.filter(Column::Active.eq(true)).all(&self.db).await?;

        candidates.sort_by_key(|account| {
            account
                .last_used_at
                .unwrap_or(account.created_at)
                .with_timezone(&Utc)
        });

        Ok(candidates.pop())
    }

    /// Record a successful resolution. Best-effort: callers fire this in
    /// a detached task and discard failures.
    pub async fn touch_last_used(&self, id: Uuid) -> Result<(), DbErr> {
        let now = Utc::now().fixed_offset();
        let account = ActiveModel {
            id: Set(id),
            last_used_at: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        };
        account.update(&self.db).await?;
        Ok(())
    }

    /// Soft-deactivate an account on disconnect. The row stays for the
    /// audit trail.
    pub async fn deactivate(&self, id: Uuid) -> Result<(), DbErr> {
        let now = Utc::now().fixed_offset();
        let account = ActiveModel {
            id: Set(id),
            active: Set(false),
            updated_at: Set(now),
            ..Default::default()
        };
        account.update(&self.db).await?;
        Ok(())
    }
}
