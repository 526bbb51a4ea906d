//! Change poller
//!
//! Applies a bounded number of change-feed pages against the stored tree.
//! Each pass reads the subscription's cursor (lazily initializing it from
//! the provider's current position if absent), pages through the feed in
//! order, classifies every entry as a delete or an upsert, resolves the
//! effective parent against the stored rows, and finally persists the most
//! recently followed page token so the next pass resumes exactly where this
//! one stopped.
//!
//! ## Failure semantics
//!
//! A provider failure while fetching a page is a partial, non-fatal result:
//! the loop stops, counts accumulated so far are returned, and the cursor
//! stays at its last successfully-advanced value so the failed page is
//! re-fetched next time. Store write failures fail the whole invocation;
//! the keyed upserts make a plain retry the correct recovery.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use drivemirror_core::domain::{ExternalId, PageBudget, SubscriptionId, SyncSubscription};
use drivemirror_core::ports::tree_provider::{ChangeEntry, ITreeProvider};
use drivemirror_core::ports::tree_store::ITreeStore;

use crate::crawler::node_row;

/// Counts accumulated by one poll pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Change entries applied (upserts and deletes; skipped entries excluded)
    pub processed_changes: u64,
    /// Feed pages fetched, including a final empty one
    pub pages_fetched: u32,
}

/// What applying one change entry did
enum ChangeAction {
    Upserted,
    Deleted,
    Skipped,
}

/// Bounded incremental applier of the provider's change feed
pub struct ChangePoller {
    provider: Arc<dyn ITreeProvider>,
    store: Arc<dyn ITreeStore>,
    /// Server-side page size requested per feed page
    page_size: u32,
}

impl ChangePoller {
    /// Creates a poller over the given provider and store
    pub fn new(provider: Arc<dyn ITreeProvider>, store: Arc<dyn ITreeStore>, page_size: u32) -> Self {
        Self {
            provider,
            store,
            page_size,
        }
    }

    /// Applies up to `budget` pages of pending changes for one subscription
    ///
    /// The caller must hold the subscription's serialization lock: two
    /// concurrent passes would read the same cursor and double-apply.
    #[tracing::instrument(skip(self, subscription), fields(subscription_id = %subscription.id()))]
    pub async fn poll(
        &self,
        subscription: &SyncSubscription,
        budget: PageBudget,
    ) -> Result<PollOutcome> {
        let subscription_id = subscription.id();
        let root_id = subscription.root_external_id();

        // Lazy cursor init: never default to a historical position, or every
        // change since the beginning of the account would replay
        let start_token = match self
            .store
            .get_cursor(subscription_id)
            .await
            .context("Failed to load cursor")?
        {
            Some(cursor) => cursor.page_token().clone(),
            None => {
                let token = self
                    .provider
                    .current_change_position()
                    .await
                    .context("Failed to initialize cursor from current position")?;
                self.store
                    .save_cursor(subscription_id, &token)
                    .await
                    .context("Failed to persist initial cursor")?;
                token
            }
        };

        let mut outcome = PollOutcome::default();
        let mut cursor = start_token;
        // Set once the cursor moves past the token a page was requested with
        let mut advanced = false;

        while outcome.pages_fetched < budget.get() {
            let page = match self.provider.list_changes(&cursor, self.page_size).await {
                Ok(page) => page,
                Err(err) => {
                    // Partial, non-fatal: the same page is retried next pass
                    warn!(
                        error = %format!("{err:#}"),
                        pages = outcome.pages_fetched,
                        "Change page fetch failed, stopping pass early"
                    );
                    break;
                }
            };

            debug!(
                entries = page.changes.len(),
                has_next = page.next_page_token.is_some(),
                "Fetched change page"
            );

            // Entries apply strictly in feed order
            for change in &page.changes {
                match self.apply_change(subscription_id, root_id, change).await? {
                    ChangeAction::Upserted | ChangeAction::Deleted => {
                        outcome.processed_changes += 1;
                    }
                    ChangeAction::Skipped => {}
                }
            }

            outcome.pages_fetched += 1;

            match page.next_page_token {
                Some(next) => {
                    cursor = next;
                    advanced = true;
                }
                None => {
                    // Feed exhausted: the new start token (when present) is
                    // the resume position; otherwise stay on the last page
                    // token we followed
                    if let Some(new_start) = page.new_start_page_token {
                        cursor = new_start;
                    }
                    advanced = true;
                    break;
                }
            }
        }

        // Persist the latest followed token whether the loop ended by feed
        // exhaustion or by budget exhaustion, so no page is reprocessed
        // under normal operation
        if advanced {
            self.store
                .save_cursor(subscription_id, &cursor)
                .await
                .context("Failed to persist advanced cursor")?;
        }

        info!(
            processed = outcome.processed_changes,
            pages = outcome.pages_fetched,
            "Poll pass finished"
        );

        Ok(outcome)
    }

    /// Applies one change entry
    ///
    /// Malformed entries (no resolvable id, no payload) and changes outside
    /// the subscription's subtree are skipped, never treated as errors: one
    /// bad entry must not block the rest of the page.
    async fn apply_change(
        &self,
        subscription_id: &SubscriptionId,
        root_id: &ExternalId,
        change: &ChangeEntry,
    ) -> Result<ChangeAction> {
        let Some(target) = change.target_id() else {
            debug!("Change entry without a resolvable id, skipping");
            return Ok(ChangeAction::Skipped);
        };

        let Ok(external_id) = ExternalId::new(target.to_string()) else {
            debug!(target, "Change entry with malformed id, skipping");
            return Ok(ChangeAction::Skipped);
        };

        let trashed = change.file.as_ref().is_some_and(|f| f.trashed);
        if change.removed || trashed {
            // Keyed delete; an unknown id is a no-op, not an error
            self.store
                .delete_node(subscription_id, &external_id)
                .await
                .context("Failed to delete removed node")?;
            debug!(external_id = %external_id, "Applied removal");
            return Ok(ChangeAction::Deleted);
        }

        let Some(file) = change.file.as_ref() else {
            return Ok(ChangeAction::Skipped);
        };

        let parent = match self
            .resolve_parent(subscription_id, root_id, &file.parents)
            .await?
        {
            Some(parent) => Some(parent),
            // The root row itself keeps its null parent
            None if external_id == *root_id => None,
            None => {
                debug!(
                    external_id = %external_id,
                    "Change outside subscription subtree, discarding"
                );
                return Ok(ChangeAction::Skipped);
            }
        };

        let mut row = node_row(subscription_id, file, parent)?;
        // The feed's own id is authoritative for the row key
        row.external_id = external_id.clone();
        self.store
            .upsert_nodes(std::slice::from_ref(&row))
            .await
            .context("Failed to upsert changed node")?;

        debug!(external_id = %external_id, "Applied upsert");
        Ok(ChangeAction::Upserted)
    }

    /// Determines the effective parent of a changed node
    ///
    /// The subscription root wins outright when present in the parent list;
    /// otherwise the first listed parent that matches a stored row of this
    /// subscription is used. No match means the node lies outside the
    /// mirrored subtree.
    async fn resolve_parent(
        &self,
        subscription_id: &SubscriptionId,
        root_id: &ExternalId,
        parents: &[String],
    ) -> Result<Option<ExternalId>> {
        if parents.iter().any(|p| p == root_id.as_str()) {
            return Ok(Some(root_id.clone()));
        }

        if parents.is_empty() {
            return Ok(None);
        }

        let known = self
            .store
            .known_node_ids(subscription_id, parents)
            .await
            .context("Failed to resolve change parents against stored rows")?;

        for candidate in parents {
            if known.contains(candidate) {
                return Ok(ExternalId::new(candidate.clone()).ok());
            }
        }

        Ok(None)
    }
}
