//! Sync service facade
//!
//! The surface exposed to the presentation layer: start a sync, poll one or
//! all subscriptions, read the assembled tree, preview an unlinked folder,
//! and summarize subscriptions for the dashboard.
//!
//! The facade owns the per-subscription serialization invariant: at most
//! one crawl or poll runs concurrently for a given subscription, because
//! both mutate the same rows and cursor by read-modify-write. Operations on
//! different subscriptions proceed in parallel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use drivemirror_core::domain::{
    AssembledNode, ExternalId, PageBudget, SubscriptionId, SyncSubscription, UserId,
};
use drivemirror_core::ports::tree_provider::ITreeProvider;
use drivemirror_core::ports::tree_store::ITreeStore;

use crate::assembler::TreeAssembler;
use crate::crawler::InitialCrawler;
use crate::poller::ChangePoller;

// ============================================================================
// Errors
// ============================================================================

/// HTTP-style status class of a failed service operation
///
/// Exact status codes are a presentation concern; the service reports only
/// the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError,
}

/// Failures surfaced to the presentation layer
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing provider credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Subscription exists but belongs to a different user
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown subscription
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider or store failure aborting the whole operation
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Maps the error onto its HTTP-style status class
    pub fn status_class(&self) -> StatusClass {
        match self {
            ServiceError::Unauthorized(_) => StatusClass::Unauthorized,
            ServiceError::Forbidden(_) => StatusClass::Forbidden,
            ServiceError::NotFound(_) => StatusClass::NotFound,
            ServiceError::Internal(_) => StatusClass::ServerError,
        }
    }
}

// ============================================================================
// Result payloads
// ============================================================================

/// Result of a completed initial crawl
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSyncOutcome {
    /// Rows written (root plus all descendants)
    pub inserted_rows: u64,
}

/// Result of one poll pass over one subscription
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollReport {
    pub subscription_id: SubscriptionId,
    pub processed_changes: u64,
    pub pages_fetched: u32,
}

/// Node counts inside a subscription summary
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SummaryCounts {
    pub total: u64,
    pub folders: u64,
    pub files: u64,
    pub videos: u64,
}

/// Dashboard summary of one subscription
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub id: SubscriptionId,
    pub name: String,
    pub root_external_id: ExternalId,
    pub created_at: DateTime<Utc>,
    pub counts: SummaryCounts,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub has_cursor: bool,
}

// ============================================================================
// SyncService
// ============================================================================

/// Facade over the crawler, poller, and assembler
pub struct SyncService {
    store: Arc<dyn ITreeStore>,
    crawler: InitialCrawler,
    poller: ChangePoller,
    assembler: TreeAssembler,
    /// One async mutex per subscription; crawl and poll passes take it for
    /// their whole duration
    locks: DashMap<SubscriptionId, Arc<Mutex<()>>>,
}

impl SyncService {
    /// Creates the service over the given adapters
    ///
    /// # Arguments
    /// * `provider` - File-tree provider (Drive adapter or a fake)
    /// * `store` - Row store (SQLite adapter or a fake)
    /// * `page_size` - Server-side page size for change-feed requests
    pub fn new(
        provider: Arc<dyn ITreeProvider>,
        store: Arc<dyn ITreeStore>,
        page_size: u32,
    ) -> Self {
        Self {
            crawler: InitialCrawler::new(Arc::clone(&provider), Arc::clone(&store)),
            poller: ChangePoller::new(provider, Arc::clone(&store), page_size),
            assembler: TreeAssembler::new(Arc::clone(&store)),
            store,
            locks: DashMap::new(),
        }
    }

    /// Returns the serialization lock for one subscription
    fn subscription_lock(&self, id: &SubscriptionId) -> Arc<Mutex<()>> {
        self.locks
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Loads a subscription or fails with NotFound
    async fn require_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<SyncSubscription, ServiceError> {
        self.store
            .get_subscription(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown subscription {id}")))
    }

    // --- Subscription registry ---

    /// Registers a new subscription for a linked folder
    pub async fn create_subscription(
        &self,
        user_id: UserId,
        root_external_id: ExternalId,
        root_name: impl Into<String>,
    ) -> Result<SyncSubscription, ServiceError> {
        let subscription = SyncSubscription::new(user_id, root_external_id, root_name);
        self.store.save_subscription(&subscription).await?;
        info!(subscription_id = %subscription.id(), "Created subscription");
        Ok(subscription)
    }

    /// Lists all registered subscriptions, oldest first
    pub async fn list_subscriptions(&self) -> Result<Vec<SyncSubscription>, ServiceError> {
        Ok(self.store.list_subscriptions().await?)
    }

    // --- Sync operations ---

    /// Runs the initial crawl for a subscription
    ///
    /// Fails with `Forbidden` when the caller does not own the subscription.
    pub async fn start_sync(
        &self,
        id: &SubscriptionId,
        caller: &UserId,
    ) -> Result<StartSyncOutcome, ServiceError> {
        let subscription = self.require_subscription(id).await?;

        if !subscription.is_owned_by(caller) {
            return Err(ServiceError::Forbidden(format!(
                "Subscription {id} is not owned by the caller"
            )));
        }

        let lock = self.subscription_lock(id);
        let _guard = lock.lock().await;

        let inserted_rows = self
            .crawler
            .crawl(id, subscription.root_external_id())
            .await?;

        Ok(StartSyncOutcome { inserted_rows })
    }

    /// Polls pending changes for one subscription
    pub async fn poll(
        &self,
        id: &SubscriptionId,
        budget: PageBudget,
    ) -> Result<PollReport, ServiceError> {
        let subscription = self.require_subscription(id).await?;

        let lock = self.subscription_lock(id);
        let _guard = lock.lock().await;

        let outcome = self.poller.poll(&subscription, budget).await?;

        Ok(PollReport {
            subscription_id: *id,
            processed_changes: outcome.processed_changes,
            pages_fetched: outcome.pages_fetched,
        })
    }

    /// Polls every registered subscription in creation order
    ///
    /// A subscription whose pass fails outright (cursor initialization or a
    /// store write) is logged and skipped so it cannot starve the others;
    /// mid-feed provider failures already surface as partial successes.
    pub async fn poll_all(&self, budget: PageBudget) -> Result<Vec<PollReport>, ServiceError> {
        let subscriptions = self.store.list_subscriptions().await?;
        let mut reports = Vec::with_capacity(subscriptions.len());

        for subscription in subscriptions {
            let lock = self.subscription_lock(subscription.id());
            let _guard = lock.lock().await;

            match self.poller.poll(&subscription, budget).await {
                Ok(outcome) => reports.push(PollReport {
                    subscription_id: *subscription.id(),
                    processed_changes: outcome.processed_changes,
                    pages_fetched: outcome.pages_fetched,
                }),
                Err(err) => {
                    warn!(
                        subscription_id = %subscription.id(),
                        error = %format!("{err:#}"),
                        "Poll pass failed, skipping subscription"
                    );
                }
            }
        }

        Ok(reports)
    }

    // --- Read operations ---

    /// Returns the assembled nested tree for a subscription
    pub async fn tree(&self, id: &SubscriptionId) -> Result<AssembledNode, ServiceError> {
        let subscription = self.require_subscription(id).await?;
        Ok(self.assembler.assemble(&subscription).await?)
    }

    /// Store-free nested preview of an unlinked provider folder
    pub async fn preview(&self, root_id: &ExternalId) -> Result<AssembledNode, ServiceError> {
        Ok(self.crawler.preview(root_id).await?)
    }

    /// Dashboard summaries for all subscriptions
    pub async fn summaries(&self) -> Result<Vec<SubscriptionSummary>, ServiceError> {
        let subscriptions = self.store.list_subscriptions().await?;
        let mut items = Vec::with_capacity(subscriptions.len());

        for subscription in subscriptions {
            let counts = self.store.count_nodes(subscription.id()).await?;
            let cursor = self.store.get_cursor(subscription.id()).await?;

            items.push(SubscriptionSummary {
                id: *subscription.id(),
                name: subscription.root_name().to_string(),
                root_external_id: subscription.root_external_id().clone(),
                created_at: subscription.created_at(),
                counts: SummaryCounts {
                    total: counts.total,
                    folders: counts.folders,
                    files: counts.files(),
                    videos: counts.videos,
                },
                last_updated_at: cursor.as_ref().map(|c| c.updated_at()),
                has_cursor: cursor.is_some(),
            });
        }

        Ok(items)
    }
}
