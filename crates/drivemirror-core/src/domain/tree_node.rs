//! TreeNode entity and the assembled (nested) tree view
//!
//! The mirrored folder tree is persisted as flat adjacency-list rows: one
//! [`TreeNode`] per file or folder, keyed by (subscription, external id),
//! linked through `parent_external_id`. The nested [`AssembledNode`] view
//! returned to callers is derived from those rows on every read and never
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ExternalId, SubscriptionId};

/// MIME type Google Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

// ============================================================================
// Persisted row
// ============================================================================

/// One mirrored file or folder, as stored
///
/// Unique on (subscription_id, external_id); re-writing the same key is an
/// overwrite, which is what makes crawl and poll replays safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub subscription_id: SubscriptionId,
    pub external_id: ExternalId,
    pub name: String,
    pub mime_type: String,
    pub is_folder: bool,
    /// None only for the subscription's root node
    pub parent_external_id: Option<ExternalId>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub size_bytes: Option<u64>,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
    pub video_duration_ms: Option<u64>,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
}

impl TreeNode {
    /// Returns true if this row carries a video MIME type
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

// ============================================================================
// Derived nested view
// ============================================================================

/// Whether an assembled node is a folder or a leaf file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// Per-node freshness marker shown in the tree view
///
/// The engine does not track partial per-node freshness: everything read
/// from the store is reported as `Synced`. The other variants exist for the
/// presentation layer's link-preview flow, where nothing is stored yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Synced,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Not Synced")]
    NotSynced,
}

/// A node in the nested tree view served to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_height: Option<u32>,
    pub status: NodeStatus,
    #[serde(rename = "subRows")]
    pub children: Vec<AssembledNode>,
}

impl AssembledNode {
    /// Builds a view node from a stored row (children left empty)
    pub fn from_row(row: &TreeNode) -> Self {
        Self {
            id: row.external_id.as_str().to_string(),
            name: row.name.clone(),
            kind: if row.is_folder {
                NodeKind::Folder
            } else {
                NodeKind::File
            },
            mime_type: Some(row.mime_type.clone()),
            owner_name: row.owner_name.clone(),
            owner_email: row.owner_email.clone(),
            size: row.size_bytes,
            modified_at: row.modified_time,
            created_at: row.created_time,
            video_duration_ms: row.video_duration_ms,
            video_width: row.video_width,
            video_height: row.video_height,
            status: NodeStatus::Synced,
            children: Vec::new(),
        }
    }

    /// Synthesizes a folder root when no stored row matches the
    /// subscription's root id (e.g., root metadata was never stored)
    pub fn placeholder_root(id: &ExternalId, name: &str) -> Self {
        Self {
            id: id.as_str().to_string(),
            name: name.to_string(),
            kind: NodeKind::Folder,
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            owner_name: None,
            owner_email: None,
            size: None,
            modified_at: None,
            created_at: None,
            video_duration_ms: None,
            video_width: None,
            video_height: None,
            status: NodeStatus::Synced,
            children: Vec::new(),
        }
    }

    /// Total number of nodes in this subtree, including self
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(AssembledNode::node_count).sum::<usize>()
    }
}
