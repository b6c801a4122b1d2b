//! Account entity model
//!
//! This module contains the SeaORM entity model for the accounts table,
//! which stores connected platform credentials scoped to a user or an
//! organization.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Account entity representing a connected platform credential
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user for personal accounts; exactly one of user_id and
    /// organization_id is set
    pub user_id: Option<Uuid>,

    /// Owning organization for shared accounts
    pub organization_id: Option<Uuid>,

    /// User id on the external platform
    pub external_user_id: String,

    /// Username on the external platform
    pub external_username: String,

    /// Encrypted access token ciphertext (AES-256-GCM, AAD-bound to id)
    pub access_token_ciphertext: Vec<u8>,

    /// Soft active flag; disconnect deactivates, never deletes
    pub active: bool,

    /// Timestamp of the most recent successful resolution
    pub last_used_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the account was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the account was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
