//! Integration tests for metadata and folder-listing queries
//!
//! Verifies end-to-end behavior against a wiremock-based Drive mock:
//! - startPageToken retrieval
//! - single-file metadata with video facets
//! - folder detection by MIME type
//! - children listing, including pagination

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use drivemirror_core::domain::{ExternalId, PageToken};

use crate::common;

fn ext(id: &str) -> ExternalId {
    ExternalId::new(id.to_string()).unwrap()
}

#[tokio::test]
async fn test_start_page_token() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_start_page_token(&server, "18244").await;

    let token = client.start_page_token().await.expect("startPageToken failed");
    assert_eq!(token.as_str(), "18244");
}

#[tokio::test]
async fn test_file_metadata_video() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_file_metadata(
        &server,
        "vid-001",
        serde_json::json!({
            "id": "vid-001",
            "name": "keynote.mp4",
            "mimeType": "video/mp4",
            "size": "524288000",
            "createdTime": "2026-02-10T08:00:00Z",
            "modifiedTime": "2026-02-11T09:30:00Z",
            "parents": ["root-001"],
            "owners": [
                { "displayName": "Grace Hopper", "emailAddress": "grace@example.com" }
            ],
            "videoMediaMetadata": {
                "width": 3840,
                "height": 2160,
                "durationMillis": "1800000"
            }
        }),
    )
    .await;

    let node = client.file_metadata(&ext("vid-001")).await.expect("metadata failed");

    assert_eq!(node.id, "vid-001");
    assert_eq!(node.name, "keynote.mp4");
    assert!(!node.is_folder);
    assert_eq!(node.size, Some(524_288_000));
    assert_eq!(node.owner.as_ref().unwrap().email, "grace@example.com");
    let video = node.video.unwrap();
    assert_eq!(video.duration_ms, Some(1_800_000));
    assert_eq!(video.width, Some(3840));
}

#[tokio::test]
async fn test_file_metadata_folder() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_file_metadata(
        &server,
        "folder-001",
        serde_json::json!({
            "id": "folder-001",
            "name": "Recordings",
            "mimeType": "application/vnd.google-apps.folder"
        }),
    )
    .await;

    let node = client.file_metadata(&ext("folder-001")).await.unwrap();
    assert!(node.is_folder);
    assert!(node.size.is_none());
    assert!(node.video.is_none());
}

#[tokio::test]
async fn test_file_metadata_not_found() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files/missing-001"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client.file_metadata(&ext("missing-001")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_list_children_single_page() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_children_single_page(
        &server,
        "root-001",
        serde_json::json!([
            {
                "id": "sub-001",
                "name": "Clips",
                "mimeType": "application/vnd.google-apps.folder"
            },
            {
                "id": "f-001",
                "name": "readme.txt",
                "mimeType": "text/plain",
                "size": "128"
            }
        ]),
    )
    .await;

    let page = client.list_children(&ext("root-001"), None).await.unwrap();

    assert_eq!(page.files.len(), 2);
    assert!(page.next_page_token.is_none());
    assert!(page.files[0].is_folder);
    assert!(!page.files[1].is_folder);
    assert_eq!(page.files[1].size, Some(128));
}

#[tokio::test]
async fn test_list_children_pagination() {
    let (server, client) = common::setup_drive_mock().await;
    let folder_query = "'root-001' in parents and trashed = false";

    // Page 2 is served only when the continuation token is echoed back
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", folder_query))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": "f-002", "name": "b.txt", "mimeType": "text/plain" }
            ]
        })))
        .mount(&server)
        .await;

    // Page 1 answers requests without a pageToken
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", folder_query))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": "f-001", "name": "a.txt", "mimeType": "text/plain" }
            ],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let first = client.list_children(&ext("root-001"), None).await.unwrap();
    assert_eq!(first.files.len(), 1);
    assert_eq!(first.files[0].id, "f-001");
    let continuation = first.next_page_token.expect("missing continuation token");
    assert_eq!(continuation.as_str(), "page-2");

    let second = client
        .list_children(&ext("root-001"), Some(&continuation))
        .await
        .unwrap();
    assert_eq!(second.files.len(), 1);
    assert_eq!(second.files[0].id, "f-002");
    assert!(second.next_page_token.is_none());
}

#[tokio::test]
async fn test_list_children_empty_folder() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_children_single_page(&server, "empty-001", serde_json::json!([])).await;

    let page = client.list_children(&ext("empty-001"), None).await.unwrap();
    assert!(page.files.is_empty());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn test_list_children_error_status() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = client.list_children(&ext("root-001"), None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_pagination_token_roundtrip_type() {
    // PageToken survives a to-string/from-string boundary as used in tests
    let token = PageToken::new("page-2".to_string()).unwrap();
    assert_eq!(token.as_str(), "page-2");
}
