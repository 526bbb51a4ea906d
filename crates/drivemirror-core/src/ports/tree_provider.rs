//! File-tree provider port (driven/secondary port)
//!
//! Interface for the remote file-tree API. The primary implementation
//! targets Google Drive v3, but the trait is provider-agnostic: anything
//! exposing listing, metadata, and a resumable change feed fits.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - `ProviderNode` and the page structs are port-level DTOs, not domain
//!   entities; the sync engine maps them to `TreeNode` rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{ExternalId, PageToken};

// ============================================================================
// Port-level DTOs
// ============================================================================

/// Owner information attached to a provider node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOwner {
    /// Owner's display name
    pub display_name: String,
    /// Owner's email address
    pub email: String,
}

/// Video stream metadata for video files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Frame width in pixels
    pub width: Option<u32>,
    /// Frame height in pixels
    pub height: Option<u32>,
    /// Playback duration in milliseconds
    pub duration_ms: Option<u64>,
}

/// A single file or folder as reported by the provider
///
/// Raw provider data; the engine decides whether and where it lands in the
/// mirrored tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderNode {
    /// Provider-specific node identifier
    pub id: String,
    /// File or folder name
    pub name: String,
    /// MIME type as reported by the provider
    pub mime_type: String,
    /// Whether the node is a folder
    pub is_folder: bool,
    /// Byte size (absent for folders and some native document types)
    pub size: Option<u64>,
    /// Creation timestamp
    pub created: Option<DateTime<Utc>>,
    /// Last modification timestamp
    pub modified: Option<DateTime<Utc>>,
    /// First listed owner, if any
    pub owner: Option<NodeOwner>,
    /// IDs of all parents, in provider order
    pub parents: Vec<String>,
    /// Whether the node is in the provider's trash
    pub trashed: bool,
    /// Video metadata (present only for video files)
    pub video: Option<VideoInfo>,
}

/// One page of a folder's direct children
#[derive(Debug, Clone)]
pub struct ChildrenPage {
    /// Children on this page
    pub files: Vec<ProviderNode>,
    /// Token for the next page (None when the listing is exhausted)
    pub next_page_token: Option<PageToken>,
}

/// A single entry from the change feed
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    /// ID of the changed node (may be absent on malformed entries)
    pub file_id: Option<String>,
    /// True when the node was removed from the provider entirely
    pub removed: bool,
    /// Current node state (absent for removals)
    pub file: Option<ProviderNode>,
}

impl ChangeEntry {
    /// Resolves the target node id from the entry's own id or its
    /// embedded file payload
    pub fn target_id(&self) -> Option<&str> {
        self.file_id
            .as_deref()
            .or_else(|| self.file.as_ref().map(|f| f.id.as_str()))
    }
}

/// One page of the change feed
///
/// Absence of `next_page_token` signals feed exhaustion for this pass, at
/// which point `new_start_page_token` (if present) is the resume position
/// for the next pass.
#[derive(Debug, Clone)]
pub struct ChangePage {
    /// Changes on this page, in feed order
    pub changes: Vec<ChangeEntry>,
    /// Token for the next page within this pass
    pub next_page_token: Option<PageToken>,
    /// New resume position, present only on the final page
    pub new_start_page_token: Option<PageToken>,
}

// ============================================================================
// ITreeProvider trait
// ============================================================================

/// Port trait for the remote file-tree provider
///
/// ## Implementation Notes
///
/// - `current_change_position` must be called *before* any initial listing
///   to avoid losing changes that happen during a slow crawl.
/// - `list_children` and `list_changes` return single pages; the engine
///   drives the pagination loop so it can enforce its own budgets.
#[async_trait::async_trait]
pub trait ITreeProvider: Send + Sync {
    /// Returns the provider's current change-feed position marker
    ///
    /// The returned token represents "now": a feed read from it yields only
    /// changes that happen after this call.
    async fn current_change_position(&self) -> anyhow::Result<PageToken>;

    /// Fetches metadata for a single node by its external ID
    async fn node_metadata(&self, id: &ExternalId) -> anyhow::Result<ProviderNode>;

    /// Lists one page of a folder's direct (non-trashed) children
    ///
    /// # Arguments
    /// * `id` - The folder to list
    /// * `page_token` - Continuation token from a previous page, or None
    ///   for the first page
    async fn list_children(
        &self,
        id: &ExternalId,
        page_token: Option<&PageToken>,
    ) -> anyhow::Result<ChildrenPage>;

    /// Fetches one page of the change feed starting at the given token
    ///
    /// # Arguments
    /// * `page_token` - Feed position to read from
    /// * `page_size` - Server-side upper bound on entries per page
    async fn list_changes(
        &self,
        page_token: &PageToken,
        page_size: u32,
    ) -> anyhow::Result<ChangePage>;
}
