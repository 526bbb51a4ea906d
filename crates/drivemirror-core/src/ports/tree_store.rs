//! Tree row store port (driven/secondary port)
//!
//! Interface for persisting the mirrored tree: subscriptions, flattened
//! tree rows, and the per-subscription change cursor.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, in-memory fakes) and don't need domain-level classification.
//! - All writes are keyed upserts or keyed deletes, so replaying an
//!   operation is safe (at-least-once semantics tolerated).
//! - Cursor operations live here rather than in a separate trait: the
//!   cursor is owned by the same subscription rows and every engine pass
//!   touches both.

use std::collections::HashSet;

use crate::domain::{
    newtypes::{ExternalId, SubscriptionId},
    subscription::{SyncCursor, SyncSubscription},
    tree_node::TreeNode,
    PageToken,
};

/// Per-subscription node counts for the dashboard summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounts {
    /// All rows for the subscription
    pub total: u64,
    /// Rows flagged as folders
    pub folders: u64,
    /// Rows with a `video/*` MIME type
    pub videos: u64,
}

impl NodeCounts {
    /// Non-folder rows
    pub fn files(&self) -> u64 {
        self.total.saturating_sub(self.folders)
    }
}

/// Port trait for persistent tree state
///
/// ## Implementation Notes
///
/// - `upsert_nodes` must treat (subscription_id, external_id) as the
///   conflict key and overwrite the full row on conflict.
/// - `delete_node` on an absent key is a no-op, not an error.
/// - `save_cursor` overwrites any existing cursor for the subscription and
///   refreshes its last-updated timestamp.
#[async_trait::async_trait]
pub trait ITreeStore: Send + Sync {
    // --- Subscription operations ---

    /// Saves a subscription (insert or update)
    async fn save_subscription(&self, subscription: &SyncSubscription) -> anyhow::Result<()>;

    /// Retrieves a subscription by its ID
    async fn get_subscription(
        &self,
        id: &SubscriptionId,
    ) -> anyhow::Result<Option<SyncSubscription>>;

    /// Lists all subscriptions, oldest first
    async fn list_subscriptions(&self) -> anyhow::Result<Vec<SyncSubscription>>;

    // --- TreeNode operations ---

    /// Upserts a batch of rows keyed by (subscription_id, external_id)
    async fn upsert_nodes(&self, nodes: &[TreeNode]) -> anyhow::Result<()>;

    /// Deletes one row; absent keys are ignored
    async fn delete_node(
        &self,
        subscription_id: &SubscriptionId,
        external_id: &ExternalId,
    ) -> anyhow::Result<()>;

    /// Loads all rows for a subscription
    async fn nodes_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> anyhow::Result<Vec<TreeNode>>;

    /// Returns which of the candidate IDs already exist as rows of this
    /// subscription (used for parent resolution; the caller applies its
    /// own ordering over the candidates)
    async fn known_node_ids(
        &self,
        subscription_id: &SubscriptionId,
        candidates: &[String],
    ) -> anyhow::Result<HashSet<String>>;

    /// Counts rows for the dashboard summary
    async fn count_nodes(&self, subscription_id: &SubscriptionId) -> anyhow::Result<NodeCounts>;

    // --- Cursor operations ---

    /// Retrieves the subscription's cursor, if one exists
    async fn get_cursor(
        &self,
        subscription_id: &SubscriptionId,
    ) -> anyhow::Result<Option<SyncCursor>>;

    /// Overwrites the subscription's cursor with the given token
    async fn save_cursor(
        &self,
        subscription_id: &SubscriptionId,
        token: &PageToken,
    ) -> anyhow::Result<()>;
}
