//! Initial tree crawler
//!
//! Performs the one-time recursive population of a subscription's mirror:
//! capture a change-feed token, fetch the root's metadata, walk the tree
//! breadth-first through the provider's paginated listing, upsert every
//! discovered node as one batch, and persist the pre-captured token as the
//! subscription's cursor.
//!
//! ## Ordering guarantee
//!
//! The change token is captured *before* any listing and persisted *after*
//! all rows are written. Any edit that races the crawl is therefore covered:
//! either the listing already saw it, or the first poll will replay it. The
//! poller tolerates replaying an upsert that matches current state, so the
//! conservative token is safe.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use drivemirror_core::domain::{
    AssembledNode, ExternalId, NodeStatus, PageToken, SubscriptionId, TreeNode,
};
use drivemirror_core::ports::tree_provider::{ITreeProvider, ProviderNode};
use drivemirror_core::ports::tree_store::ITreeStore;

use crate::assembler::attach_children;

/// Node ceiling for the store-free preview traversal
const PREVIEW_NODE_CAP: usize = 5000;

/// Maps a provider node to a stored row
///
/// The same mapping is used by the crawler and the poller so both paths
/// produce identical rows for identical provider state.
pub(crate) fn node_row(
    subscription_id: &SubscriptionId,
    node: &ProviderNode,
    parent: Option<ExternalId>,
) -> Result<TreeNode> {
    let external_id = ExternalId::new(node.id.clone())
        .with_context(|| format!("Provider returned an invalid node id: {}", node.id))?;

    Ok(TreeNode {
        subscription_id: *subscription_id,
        external_id,
        name: node.name.clone(),
        mime_type: node.mime_type.clone(),
        is_folder: node.is_folder,
        parent_external_id: parent,
        owner_name: node.owner.as_ref().map(|o| o.display_name.clone()),
        owner_email: node.owner.as_ref().map(|o| o.email.clone()),
        size_bytes: node.size,
        created_time: node.created,
        modified_time: node.modified,
        video_duration_ms: node.video.and_then(|v| v.duration_ms),
        video_width: node.video.and_then(|v| v.width),
        video_height: node.video.and_then(|v| v.height),
    })
}

/// One-shot breadth-first crawler populating a subscription's mirror
pub struct InitialCrawler {
    provider: Arc<dyn ITreeProvider>,
    store: Arc<dyn ITreeStore>,
}

impl InitialCrawler {
    /// Creates a crawler over the given provider and store
    pub fn new(provider: Arc<dyn ITreeProvider>, store: Arc<dyn ITreeStore>) -> Self {
        Self { provider, store }
    }

    /// Crawls the subscription's tree and returns the number of rows written
    ///
    /// Steps:
    /// 1. Capture the provider's current change position (before any listing)
    /// 2. Fetch root metadata; the root becomes the one row with a null parent
    /// 3. Breadth-first traversal of folders, paginating each listing until
    ///    exhausted; a visited-set makes a revisited folder id a no-op
    /// 4. Upsert all rows in one batch keyed by (subscription, external id)
    /// 5. Persist the pre-crawl token as the subscription's cursor
    ///
    /// Any provider error aborts the whole crawl; no cursor is written in
    /// that case, so a retry starts clean.
    #[tracing::instrument(skip(self))]
    pub async fn crawl(
        &self,
        subscription_id: &SubscriptionId,
        root_id: &ExternalId,
    ) -> Result<u64> {
        // Step 1: the token must predate the listing or concurrent edits
        // could fall between the crawl and the first poll
        let pre_crawl_token = self
            .provider
            .current_change_position()
            .await
            .context("Failed to capture pre-crawl change position")?;

        // Step 2: root metadata
        let root_meta = self
            .provider
            .node_metadata(root_id)
            .await
            .context("Failed to fetch root folder metadata")?;

        let mut rows = vec![node_row(subscription_id, &root_meta, None)?];

        // Step 3: breadth-first traversal
        let mut queue: VecDeque<ExternalId> = VecDeque::new();
        if root_meta.is_folder {
            queue.push_back(root_id.clone());
        }
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(folder) = queue.pop_front() {
            if !visited.insert(folder.as_str().to_string()) {
                continue;
            }

            let mut page_token: Option<PageToken> = None;
            loop {
                let page = self
                    .provider
                    .list_children(&folder, page_token.as_ref())
                    .await
                    .with_context(|| format!("Failed to list children of {folder}"))?;

                debug!(
                    folder = %folder,
                    children = page.files.len(),
                    has_next = page.next_page_token.is_some(),
                    "Listed folder page"
                );

                for child in &page.files {
                    rows.push(node_row(subscription_id, child, Some(folder.clone()))?);
                    if child.is_folder {
                        if let Ok(child_id) = ExternalId::new(child.id.clone()) {
                            queue.push_back(child_id);
                        }
                    }
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        // Step 4: one idempotent batch write
        self.store
            .upsert_nodes(&rows)
            .await
            .context("Failed to upsert crawled rows")?;

        // Step 5: cursor persistence comes last so a failed crawl leaves
        // no half-initialized position behind
        self.store
            .save_cursor(subscription_id, &pre_crawl_token)
            .await
            .context("Failed to persist pre-crawl cursor")?;

        info!(
            subscription_id = %subscription_id,
            rows = rows.len(),
            "Initial crawl completed"
        );

        Ok(rows.len() as u64)
    }

    /// Store-free preview of a provider folder as a nested view
    ///
    /// Used by the link-a-folder flow before any subscription exists.
    /// Traversal stops enqueueing once [`PREVIEW_NODE_CAP`] nodes have been
    /// seen; nothing is written anywhere.
    #[tracing::instrument(skip(self))]
    pub async fn preview(&self, root_id: &ExternalId) -> Result<AssembledNode> {
        let root_meta = self
            .provider
            .node_metadata(root_id)
            .await
            .context("Failed to fetch preview root metadata")?;

        let mut root = preview_node(&root_meta);
        let mut count = 1usize;

        let mut children_map: std::collections::HashMap<String, Vec<AssembledNode>> =
            std::collections::HashMap::new();
        let mut queue: VecDeque<ExternalId> = VecDeque::new();
        if root_meta.is_folder {
            queue.push_back(root_id.clone());
        }
        let mut visited: HashSet<String> = HashSet::new();

        'walk: while let Some(folder) = queue.pop_front() {
            if !visited.insert(folder.as_str().to_string()) {
                continue;
            }

            let mut page_token: Option<PageToken> = None;
            loop {
                let page = self
                    .provider
                    .list_children(&folder, page_token.as_ref())
                    .await
                    .with_context(|| format!("Failed to list preview children of {folder}"))?;

                for child in &page.files {
                    count += 1;
                    if child.is_folder {
                        if let Ok(child_id) = ExternalId::new(child.id.clone()) {
                            queue.push_back(child_id);
                        }
                    }
                    children_map
                        .entry(folder.as_str().to_string())
                        .or_default()
                        .push(preview_node(child));

                    if count >= PREVIEW_NODE_CAP {
                        debug!(cap = PREVIEW_NODE_CAP, "Preview node cap reached");
                        break 'walk;
                    }
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        attach_children(&mut root, &mut children_map);
        Ok(root)
    }
}

/// Maps a provider node straight to a view node (preview path)
fn preview_node(node: &ProviderNode) -> AssembledNode {
    AssembledNode {
        id: node.id.clone(),
        name: node.name.clone(),
        kind: if node.is_folder {
            drivemirror_core::domain::NodeKind::Folder
        } else {
            drivemirror_core::domain::NodeKind::File
        },
        mime_type: Some(node.mime_type.clone()),
        owner_name: node.owner.as_ref().map(|o| o.display_name.clone()),
        owner_email: node.owner.as_ref().map(|o| o.email.clone()),
        size: node.size,
        modified_at: node.modified,
        created_at: node.created,
        video_duration_ms: node.video.and_then(|v| v.duration_ms),
        video_width: node.video.and_then(|v| v.width),
        video_height: node.video.and_then(|v| v.height),
        status: NodeStatus::Synced,
        children: Vec::new(),
    }
}
