//! SyncSubscription and SyncCursor entities
//!
//! A subscription links one Drive folder to local mirrored state. It is
//! created when the user links a folder and is immutable thereafter. Each
//! subscription owns exactly one change-feed cursor, which records the
//! position in the provider's change log that has already been applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ExternalId, PageToken, SubscriptionId, UserId};

/// One linked Drive folder and its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSubscription {
    id: SubscriptionId,
    user_id: UserId,
    root_external_id: ExternalId,
    root_name: String,
    created_at: DateTime<Utc>,
}

impl SyncSubscription {
    /// Creates a new subscription with a fresh random ID
    pub fn new(
        user_id: UserId,
        root_external_id: ExternalId,
        root_name: impl Into<String>,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            user_id,
            root_external_id,
            root_name: root_name.into(),
            created_at: Utc::now(),
        }
    }

    /// Reconstructs a subscription with a known ID and creation time
    /// (used when loading from storage)
    pub fn with_id(
        id: SubscriptionId,
        user_id: UserId,
        root_external_id: ExternalId,
        root_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            root_external_id,
            root_name: root_name.into(),
            created_at,
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn root_external_id(&self) -> &ExternalId {
        &self.root_external_id
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if the given user owns this subscription
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }
}

/// Persisted change-feed position for one subscription
///
/// Exactly one cursor exists per subscription once crawling or polling has
/// run. It is never initialized from position zero: the first token always
/// comes from the provider's "current position" marker so historical
/// changes are not replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    subscription_id: SubscriptionId,
    page_token: PageToken,
    updated_at: DateTime<Utc>,
}

impl SyncCursor {
    /// Creates a cursor positioned at the given token
    pub fn new(subscription_id: SubscriptionId, page_token: PageToken) -> Self {
        Self {
            subscription_id,
            page_token,
            updated_at: Utc::now(),
        }
    }

    /// Reconstructs a cursor from storage
    pub fn with_updated_at(
        subscription_id: SubscriptionId,
        page_token: PageToken,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subscription_id,
            page_token,
            updated_at,
        }
    }

    pub fn subscription_id(&self) -> &SubscriptionId {
        &self.subscription_id
    }

    pub fn page_token(&self) -> &PageToken {
        &self.page_token
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
