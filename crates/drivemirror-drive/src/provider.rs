//! DriveTreeProvider - ITreeProvider implementation for the Drive API
//!
//! Wraps [`DriveClient`] to fulfil the [`ITreeProvider`] port contract.
//! All mapping from the Drive wire format happens inside the client; this
//! adapter only delegates, so the engine stays provider-agnostic.

use anyhow::Result;

use drivemirror_core::domain::{ExternalId, PageToken};
use drivemirror_core::ports::tree_provider::{ChangePage, ChildrenPage, ITreeProvider, ProviderNode};

use crate::client::DriveClient;

/// Google Drive implementation of the file-tree provider port
pub struct DriveTreeProvider {
    client: DriveClient,
}

impl DriveTreeProvider {
    /// Creates a provider wrapping the given client
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying client
    pub fn client(&self) -> &DriveClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl ITreeProvider for DriveTreeProvider {
    async fn current_change_position(&self) -> Result<PageToken> {
        self.client.start_page_token().await
    }

    async fn node_metadata(&self, id: &ExternalId) -> Result<ProviderNode> {
        self.client.file_metadata(id).await
    }

    async fn list_children(
        &self,
        id: &ExternalId,
        page_token: Option<&PageToken>,
    ) -> Result<ChildrenPage> {
        self.client.list_children(id, page_token).await
    }

    async fn list_changes(&self, page_token: &PageToken, page_size: u32) -> Result<ChangePage> {
        self.client.list_changes(page_token, page_size).await
    }
}
