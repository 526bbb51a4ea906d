//! SQLite implementation of ITreeStore
//!
//! Concrete SQLite-based implementation of the tree store port defined in
//! drivemirror-core. Handles domain type serialization/deserialization and
//! SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type            | SQL Type | Strategy                          |
//! |------------------------|----------|-----------------------------------|
//! | SubscriptionId, UserId | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | ExternalId             | TEXT     | String via `.as_str()` / `ExternalId::new()` |
//! | PageToken              | TEXT     | String via `.as_str()` / `PageToken::new()` |
//! | DateTime<Utc>          | TEXT     | ISO 8601 via `to_rfc3339()` / `DateTime::parse_from_rfc3339()` |
//! | bool (is_folder)       | INTEGER  | 0/1                               |
//! | u64 / u32 counters     | INTEGER  | i64 cast                          |

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use drivemirror_core::domain::{
    newtypes::{ExternalId, PageToken, SubscriptionId, UserId},
    subscription::{SyncCursor, SyncSubscription},
    tree_node::TreeNode,
};
use drivemirror_core::ports::{ITreeStore, NodeCounts};

use crate::StoreError;

/// SQLite-based implementation of the tree store port
///
/// Provides persistent storage for subscriptions, tree rows, and cursors.
/// All operations are performed through a connection pool for concurrency.
pub struct SqliteTreeStore {
    pool: SqlitePool,
}

impl SqliteTreeStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

/// Parse an ExternalId column value
fn parse_external_id(s: &str) -> Result<ExternalId, StoreError> {
    ExternalId::new(s.to_string()).map_err(|e| {
        StoreError::SerializationError(format!("Invalid ExternalId '{}': {}", s, e))
    })
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct a SyncSubscription from a database row
fn subscription_from_row(row: &SqliteRow) -> Result<SyncSubscription, StoreError> {
    let id_str: String = row.get("id");
    let user_id_str: String = row.get("user_id");
    let root_external_id_str: String = row.get("root_external_id");
    let root_name: String = row.get("root_name");
    let created_at_str: String = row.get("created_at");

    let id = SubscriptionId::from_str(&id_str).map_err(|e| {
        StoreError::SerializationError(format!("Invalid SubscriptionId '{}': {}", id_str, e))
    })?;

    let user_id = UserId::from_str(&user_id_str).map_err(|e| {
        StoreError::SerializationError(format!("Invalid UserId '{}': {}", user_id_str, e))
    })?;

    let root_external_id = parse_external_id(&root_external_id_str)?;
    let created_at = parse_datetime(&created_at_str)?;

    Ok(SyncSubscription::with_id(
        id,
        user_id,
        root_external_id,
        root_name,
        created_at,
    ))
}

/// Reconstruct a TreeNode from a database row
fn tree_node_from_row(row: &SqliteRow) -> Result<TreeNode, StoreError> {
    let subscription_id_str: String = row.get("subscription_id");
    let external_id_str: String = row.get("external_id");
    let name: String = row.get("name");
    let mime_type: String = row.get("mime_type");
    let is_folder: i64 = row.get("is_folder");
    let parent_str: Option<String> = row.get("parent_external_id");
    let owner_name: Option<String> = row.get("owner_name");
    let owner_email: Option<String> = row.get("owner_email");
    let size_bytes: Option<i64> = row.get("size_bytes");
    let created_time_str: Option<String> = row.get("created_time");
    let modified_time_str: Option<String> = row.get("modified_time");
    let video_duration_ms: Option<i64> = row.get("video_duration_ms");
    let video_width: Option<i64> = row.get("video_width");
    let video_height: Option<i64> = row.get("video_height");

    let subscription_id = SubscriptionId::from_str(&subscription_id_str).map_err(|e| {
        StoreError::SerializationError(format!(
            "Invalid SubscriptionId '{}': {}",
            subscription_id_str, e
        ))
    })?;

    let external_id = parse_external_id(&external_id_str)?;

    let parent_external_id = match parent_str {
        Some(ref s) if !s.is_empty() => Some(parse_external_id(s)?),
        _ => None,
    };

    Ok(TreeNode {
        subscription_id,
        external_id,
        name,
        mime_type,
        is_folder: is_folder != 0,
        parent_external_id,
        owner_name,
        owner_email,
        size_bytes: size_bytes.map(|v| v as u64),
        created_time: parse_optional_datetime(created_time_str)?,
        modified_time: parse_optional_datetime(modified_time_str)?,
        video_duration_ms: video_duration_ms.map(|v| v as u64),
        video_width: video_width.map(|v| v as u32),
        video_height: video_height.map(|v| v as u32),
    })
}

/// Reconstruct a SyncCursor from a database row
fn cursor_from_row(row: &SqliteRow) -> Result<SyncCursor, StoreError> {
    let subscription_id_str: String = row.get("subscription_id");
    let page_token_str: String = row.get("page_token");
    let updated_at_str: String = row.get("updated_at");

    let subscription_id = SubscriptionId::from_str(&subscription_id_str).map_err(|e| {
        StoreError::SerializationError(format!(
            "Invalid SubscriptionId '{}': {}",
            subscription_id_str, e
        ))
    })?;

    let page_token = PageToken::new(page_token_str.clone()).map_err(|e| {
        StoreError::SerializationError(format!("Invalid PageToken '{}': {}", page_token_str, e))
    })?;

    let updated_at = parse_datetime(&updated_at_str)?;

    Ok(SyncCursor::with_updated_at(
        subscription_id,
        page_token,
        updated_at,
    ))
}

// ============================================================================
// ITreeStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ITreeStore for SqliteTreeStore {
    // --- Subscription operations ---

    async fn save_subscription(&self, subscription: &SyncSubscription) -> anyhow::Result<()> {
        let id = subscription.id().to_string();
        let user_id = subscription.user_id().to_string();
        let root_external_id = subscription.root_external_id().as_str();
        let root_name = subscription.root_name();
        let created_at = subscription.created_at().to_rfc3339();

        sqlx::query(
            "INSERT OR REPLACE INTO subscriptions \
             (id, user_id, root_external_id, root_name, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&user_id)
        .bind(root_external_id)
        .bind(root_name)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        tracing::trace!(subscription_id = %id, "Saved subscription");
        Ok(())
    }

    async fn get_subscription(
        &self,
        id: &SubscriptionId,
    ) -> anyhow::Result<Option<SyncSubscription>> {
        let id_str = id.to_string();

        let row = sqlx::query("SELECT * FROM subscriptions WHERE id = ?")
            .bind(&id_str)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(subscription_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_subscriptions(&self) -> anyhow::Result<Vec<SyncSubscription>> {
        let rows = sqlx::query("SELECT * FROM subscriptions ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in &rows {
            subscriptions.push(subscription_from_row(row)?);
        }

        Ok(subscriptions)
    }

    // --- TreeNode operations ---

    async fn upsert_nodes(&self, nodes: &[TreeNode]) -> anyhow::Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for node in nodes {
            sqlx::query(
                "INSERT OR REPLACE INTO tree_nodes \
                 (subscription_id, external_id, name, mime_type, is_folder, \
                  parent_external_id, owner_name, owner_email, size_bytes, \
                  created_time, modified_time, video_duration_ms, video_width, video_height) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(node.subscription_id.to_string())
            .bind(node.external_id.as_str())
            .bind(&node.name)
            .bind(&node.mime_type)
            .bind(node.is_folder as i64)
            .bind(node.parent_external_id.as_ref().map(|p| p.as_str()))
            .bind(&node.owner_name)
            .bind(&node.owner_email)
            .bind(node.size_bytes.map(|v| v as i64))
            .bind(node.created_time.map(|dt| dt.to_rfc3339()))
            .bind(node.modified_time.map(|dt| dt.to_rfc3339()))
            .bind(node.video_duration_ms.map(|v| v as i64))
            .bind(node.video_width.map(|v| v as i64))
            .bind(node.video_height.map(|v| v as i64))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::trace!(rows = nodes.len(), "Upserted tree nodes");
        Ok(())
    }

    async fn delete_node(
        &self,
        subscription_id: &SubscriptionId,
        external_id: &ExternalId,
    ) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM tree_nodes WHERE subscription_id = ? AND external_id = ?")
            .bind(subscription_id.to_string())
            .bind(external_id.as_str())
            .execute(&self.pool)
            .await?;

        tracing::trace!(
            subscription_id = %subscription_id,
            external_id = %external_id,
            "Deleted tree node"
        );
        Ok(())
    }

    async fn nodes_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> anyhow::Result<Vec<TreeNode>> {
        let rows = sqlx::query("SELECT * FROM tree_nodes WHERE subscription_id = ?")
            .bind(subscription_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in &rows {
            nodes.push(tree_node_from_row(row)?);
        }

        Ok(nodes)
    }

    async fn known_node_ids(
        &self,
        subscription_id: &SubscriptionId,
        candidates: &[String],
    ) -> anyhow::Result<HashSet<String>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }

        // Build the IN (...) clause dynamically; sqlx sqlite has no array binds
        let placeholders = vec!["?"; candidates.len()].join(", ");
        let sql = format!(
            "SELECT external_id FROM tree_nodes \
             WHERE subscription_id = ? AND external_id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql).bind(subscription_id.to_string());
        for candidate in candidates {
            query = query.bind(candidate);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut known = HashSet::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("external_id");
            known.insert(id);
        }

        Ok(known)
    }

    async fn count_nodes(&self, subscription_id: &SubscriptionId) -> anyhow::Result<NodeCounts> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
                    COALESCE(SUM(is_folder), 0) AS folders, \
                    COALESCE(SUM(CASE WHEN mime_type LIKE 'video/%' THEN 1 ELSE 0 END), 0) AS videos \
             FROM tree_nodes WHERE subscription_id = ?",
        )
        .bind(subscription_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        let folders: i64 = row.get("folders");
        let videos: i64 = row.get("videos");

        Ok(NodeCounts {
            total: total as u64,
            folders: folders as u64,
            videos: videos as u64,
        })
    }

    // --- Cursor operations ---

    async fn get_cursor(
        &self,
        subscription_id: &SubscriptionId,
    ) -> anyhow::Result<Option<SyncCursor>> {
        let row = sqlx::query("SELECT * FROM sync_cursors WHERE subscription_id = ?")
            .bind(subscription_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(cursor_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn save_cursor(
        &self,
        subscription_id: &SubscriptionId,
        token: &PageToken,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_cursors (subscription_id, page_token, updated_at) \
             VALUES (?, ?, ?)",
        )
        .bind(subscription_id.to_string())
        .bind(token.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(subscription_id = %subscription_id, "Saved cursor");
        Ok(())
    }
}
