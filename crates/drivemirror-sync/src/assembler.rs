//! Tree assembler
//!
//! Rebuilds the nested tree view from the flat adjacency-list rows. The
//! nested structure is a derived, disposable view: it is reconstructed on
//! every read and never persisted.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use drivemirror_core::domain::{AssembledNode, SyncSubscription};
use drivemirror_core::ports::tree_store::ITreeStore;

/// Moves each node's children out of the parent-id map, recursively
///
/// Lists are *removed* from the map as they are attached, so a corrupt
/// parent cycle in the rows cannot recurse endlessly - the second visit
/// finds nothing left to attach.
pub(crate) fn attach_children(
    node: &mut AssembledNode,
    children_by_parent: &mut HashMap<String, Vec<AssembledNode>>,
) {
    if let Some(mut children) = children_by_parent.remove(&node.id) {
        for child in &mut children {
            attach_children(child, children_by_parent);
        }
        node.children = children;
    }
}

/// Read-side reconstruction of the nested tree
pub struct TreeAssembler {
    store: Arc<dyn ITreeStore>,
}

impl TreeAssembler {
    /// Creates an assembler over the given store
    pub fn new(store: Arc<dyn ITreeStore>) -> Self {
        Self { store }
    }

    /// Assembles the subscription's nested tree from its stored rows
    ///
    /// Builds a parent-id -> children map over all rows, then links the
    /// tree downward from the row matching the subscription's root id. If
    /// no such row exists (root metadata was never stored), a placeholder
    /// root is synthesized from the subscription's known id and name, and
    /// whatever rows claim the root as parent become its children.
    #[tracing::instrument(skip(self, subscription), fields(subscription_id = %subscription.id()))]
    pub async fn assemble(&self, subscription: &SyncSubscription) -> Result<AssembledNode> {
        let rows = self
            .store
            .nodes_for_subscription(subscription.id())
            .await
            .context("Failed to load tree rows")?;

        let root_id = subscription.root_external_id();

        let mut children_by_parent: HashMap<String, Vec<AssembledNode>> = HashMap::new();
        let mut root: Option<AssembledNode> = None;

        for row in &rows {
            if row.external_id == *root_id {
                root = Some(AssembledNode::from_row(row));
                continue;
            }

            match &row.parent_external_id {
                Some(parent) => {
                    children_by_parent
                        .entry(parent.as_str().to_string())
                        .or_default()
                        .push(AssembledNode::from_row(row));
                }
                // A null parent on a non-root row is orphaned data; it has
                // no place in the nested view
                None => {
                    debug!(external_id = %row.external_id, "Orphan row without parent, ignoring");
                }
            }
        }

        let mut root = root
            .unwrap_or_else(|| AssembledNode::placeholder_root(root_id, subscription.root_name()));

        attach_children(&mut root, &mut children_by_parent);

        debug!(nodes = root.node_count(), "Assembled tree");
        Ok(root)
    }
}
