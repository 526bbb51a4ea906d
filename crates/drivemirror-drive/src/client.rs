//! Google Drive v3 API client
//!
//! Provides a typed HTTP client for the Drive endpoints the sync engine
//! needs: the changes start-token, single-file metadata, folder listing,
//! and one page of the changes feed. Handles bearer authentication, JSON
//! deserialization, and mapping of the raw Drive wire format into the
//! port-level DTOs from `drivemirror-core`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivemirror_drive::client::DriveClient;
//! use drivemirror_core::domain::ExternalId;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here");
//! let folder = ExternalId::new("1AbCdEf".to_string())?;
//! let meta = client.file_metadata(&folder).await?;
//! println!("Linked folder: {}", meta.name);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use drivemirror_core::domain::{ExternalId, PageToken, FOLDER_MIME_TYPE};
use drivemirror_core::ports::tree_provider::{
    ChangeEntry, ChangePage, ChildrenPage, NodeOwner, ProviderNode, VideoInfo,
};

/// Base URL for the Google Drive API v3
const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Field projection requested for every file resource
///
/// Kept identical across metadata, listing, and change queries so all three
/// paths produce the same row shape.
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,modifiedTime,parents,trashed,\
                           owners(displayName,emailAddress),\
                           videoMediaMetadata(width,height,durationMillis)";

// ============================================================================
// Drive API response types (JSON deserialization)
// ============================================================================

/// Response from `GET /changes/startPageToken`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPageTokenResponse {
    start_page_token: String,
}

/// A file resource from the Drive API
///
/// Drive encodes 64-bit numerics (`size`, `durationMillis`) as JSON
/// strings; they are parsed leniently into numbers during mapping.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,

    #[serde(default)]
    name: String,

    #[serde(default)]
    mime_type: String,

    /// Byte size as a decimal string (absent for folders)
    size: Option<String>,

    created_time: Option<DateTime<Utc>>,

    modified_time: Option<DateTime<Utc>>,

    #[serde(default)]
    parents: Vec<String>,

    #[serde(default)]
    trashed: bool,

    /// Owners in provider order; only the first is kept
    owners: Option<Vec<DriveOwner>>,

    /// Present only for video files
    video_media_metadata: Option<DriveVideoMetadata>,
}

/// One entry of the `owners` array
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveOwner {
    display_name: Option<String>,
    email_address: Option<String>,
}

/// The `videoMediaMetadata` facet of a video file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveVideoMetadata {
    width: Option<u32>,
    height: Option<u32>,
    /// Playback duration as a decimal string of milliseconds
    duration_millis: Option<String>,
}

/// Response from `GET /files` (folder listing)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// One entry of the changes feed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveChangeEntry {
    file_id: Option<String>,
    #[serde(default)]
    removed: bool,
    file: Option<DriveFile>,
}

/// Response from `GET /changes`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeListResponse {
    #[serde(default)]
    changes: Vec<DriveChangeEntry>,
    next_page_token: Option<String>,
    new_start_page_token: Option<String>,
}

// ============================================================================
// FileParser - converts Drive wire format to port-level types
// ============================================================================

/// Parser for converting Drive API responses into port-level types
struct FileParser;

impl FileParser {
    /// Parse a single Drive file resource into a port-level [`ProviderNode`]
    ///
    /// - Folder detection is by MIME type (`application/vnd.google-apps.folder`)
    /// - `size` and `durationMillis` arrive as decimal strings; unparseable
    ///   values degrade to `None` rather than failing the whole page
    fn parse_file(file: DriveFile) -> ProviderNode {
        let is_folder = file.mime_type == FOLDER_MIME_TYPE;

        let size = file.size.as_deref().and_then(|s| s.parse::<u64>().ok());

        let owner = file.owners.as_ref().and_then(|owners| {
            owners.first().map(|o| NodeOwner {
                display_name: o.display_name.clone().unwrap_or_default(),
                email: o.email_address.clone().unwrap_or_default(),
            })
        });

        let video = file.video_media_metadata.as_ref().map(|v| VideoInfo {
            width: v.width,
            height: v.height,
            duration_ms: v
                .duration_millis
                .as_deref()
                .and_then(|d| d.parse::<u64>().ok()),
        });

        ProviderNode {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            is_folder,
            size,
            created: file.created_time,
            modified: file.modified_time,
            owner,
            parents: file.parents,
            trashed: file.trashed,
            video,
        }
    }

    /// Parse one change entry, preserving absent ids and payloads
    fn parse_change(entry: DriveChangeEntry) -> ChangeEntry {
        ChangeEntry {
            file_id: entry.file_id,
            removed: entry.removed,
            file: entry.file.map(Self::parse_file),
        }
    }

    /// Parse an optional token string, discarding empty tokens
    fn parse_token(token: Option<String>) -> Option<PageToken> {
        token.and_then(|t| PageToken::new(t).ok())
    }
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive API calls
///
/// Wraps `reqwest::Client` with bearer authentication and base URL
/// construction for the Drive API v3.
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Current OAuth2 access token
    access_token: String,
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token with Drive read scope
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DRIVE_BASE_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token
    /// * `base_url` - Custom base URL for API requests
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated DriveClient access token");
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Fetches the provider's current change-feed position
    ///
    /// `GET /changes/startPageToken`. The returned token represents "now";
    /// reading the feed from it yields only subsequent changes.
    pub async fn start_page_token(&self) -> Result<PageToken> {
        debug!("Fetching changes startPageToken");

        let response: StartPageTokenResponse = self
            .request(Method::GET, "/changes/startPageToken")
            .send()
            .await
            .context("Failed to fetch startPageToken")?
            .error_for_status()
            .context("startPageToken request returned error status")?
            .json()
            .await
            .context("Failed to parse startPageToken response")?;

        PageToken::new(response.start_page_token)
            .context("Drive returned an empty startPageToken")
    }

    /// Fetches metadata for a single file or folder
    ///
    /// `GET /files/{id}` with the shared field projection.
    pub async fn file_metadata(&self, id: &ExternalId) -> Result<ProviderNode> {
        debug!(file_id = %id, "Fetching file metadata");

        let path = format!("/files/{}", id.as_str());
        let file: DriveFile = self
            .request(Method::GET, &path)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .context("Failed to fetch file metadata")?
            .error_for_status()
            .context("File metadata request returned error status")?
            .json()
            .await
            .context("Failed to parse file metadata response")?;

        Ok(FileParser::parse_file(file))
    }

    /// Lists one page of a folder's direct, non-trashed children
    ///
    /// `GET /files?q='{id}' in parents and trashed = false`. The caller
    /// drives the pagination loop with the returned `next_page_token`.
    pub async fn list_children(
        &self,
        id: &ExternalId,
        page_token: Option<&PageToken>,
    ) -> Result<ChildrenPage> {
        debug!(folder_id = %id, has_page_token = page_token.is_some(), "Listing children");

        let query = format!("'{}' in parents and trashed = false", id.as_str());
        let fields = format!("files({FILE_FIELDS}),nextPageToken");

        let mut request = self
            .request(Method::GET, "/files")
            .query(&[("q", query.as_str()), ("fields", fields.as_str())]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let response: FileListResponse = request
            .send()
            .await
            .context("Failed to list folder children")?
            .error_for_status()
            .context("Children listing returned error status")?
            .json()
            .await
            .context("Failed to parse children listing response")?;

        Ok(ChildrenPage {
            files: response.files.into_iter().map(FileParser::parse_file).collect(),
            next_page_token: FileParser::parse_token(response.next_page_token),
        })
    }

    /// Fetches one page of the changes feed
    ///
    /// `GET /changes?pageToken=...&pageSize=...`. Absence of
    /// `next_page_token` in the result signals feed exhaustion for this
    /// pass; `new_start_page_token` is then the next resume position.
    pub async fn list_changes(
        &self,
        page_token: &PageToken,
        page_size: u32,
    ) -> Result<ChangePage> {
        debug!(page_token = %page_token, page_size, "Fetching changes page");

        let fields = format!("nextPageToken,newStartPageToken,changes(fileId,removed,file({FILE_FIELDS}))");
        let page_size_str = page_size.to_string();

        let response: ChangeListResponse = self
            .request(Method::GET, "/changes")
            .query(&[
                ("pageToken", page_token.as_str()),
                ("pageSize", page_size_str.as_str()),
                ("fields", fields.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch changes page")?
            .error_for_status()
            .context("Changes request returned error status")?
            .json()
            .await
            .context("Failed to parse changes response")?;

        Ok(ChangePage {
            changes: response
                .changes
                .into_iter()
                .map(FileParser::parse_change)
                .collect(),
            next_page_token: FileParser::parse_token(response.next_page_token),
            new_start_page_token: FileParser::parse_token(response.new_start_page_token),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
