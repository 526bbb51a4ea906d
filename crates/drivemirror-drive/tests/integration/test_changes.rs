//! Integration tests for change-feed queries
//!
//! Verifies end-to-end behavior against a wiremock-based Drive mock:
//! - mixed upsert/removal/trash entries
//! - mid-feed continuation tokens
//! - feed exhaustion with newStartPageToken
//! - error statuses surfacing as Err

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use drivemirror_core::domain::PageToken;

use crate::common;

fn token(t: &str) -> PageToken {
    PageToken::new(t.to_string()).unwrap()
}

#[tokio::test]
async fn test_changes_mixed_entries() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_changes_page(
        &server,
        "18244",
        serde_json::json!({
            "changes": [
                {
                    "fileId": "f-001",
                    "file": {
                        "id": "f-001",
                        "name": "renamed.txt",
                        "mimeType": "text/plain",
                        "size": "64",
                        "parents": ["root-001"]
                    }
                },
                { "fileId": "gone-001", "removed": true },
                {
                    "fileId": "trash-001",
                    "file": {
                        "id": "trash-001",
                        "name": "old.mp4",
                        "mimeType": "video/mp4",
                        "trashed": true,
                        "parents": ["root-001"]
                    }
                }
            ],
            "newStartPageToken": "18250"
        }),
    )
    .await;

    let page = client.list_changes(&token("18244"), 1000).await.unwrap();

    assert_eq!(page.changes.len(), 3);
    assert!(page.next_page_token.is_none());
    assert_eq!(page.new_start_page_token.unwrap().as_str(), "18250");

    let upsert = &page.changes[0];
    assert!(!upsert.removed);
    assert_eq!(upsert.file.as_ref().unwrap().name, "renamed.txt");

    let removal = &page.changes[1];
    assert!(removal.removed);
    assert!(removal.file.is_none());
    assert_eq!(removal.target_id(), Some("gone-001"));

    let trashed = &page.changes[2];
    assert!(!trashed.removed);
    assert!(trashed.file.as_ref().unwrap().trashed);
}

#[tokio::test]
async fn test_changes_mid_feed_page() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_changes_page(
        &server,
        "18244",
        serde_json::json!({
            "changes": [
                { "fileId": "f-001", "file": { "id": "f-001", "name": "a", "mimeType": "text/plain" } }
            ],
            "nextPageToken": "18245"
        }),
    )
    .await;

    let page = client.list_changes(&token("18244"), 1000).await.unwrap();

    assert_eq!(page.changes.len(), 1);
    assert_eq!(page.next_page_token.unwrap().as_str(), "18245");
    assert!(page.new_start_page_token.is_none());
}

#[tokio::test]
async fn test_changes_empty_feed() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_changes_page(
        &server,
        "18244",
        serde_json::json!({
            "changes": [],
            "newStartPageToken": "18244"
        }),
    )
    .await;

    let page = client.list_changes(&token("18244"), 1000).await.unwrap();
    assert!(page.changes.is_empty());
    assert_eq!(page.new_start_page_token.unwrap().as_str(), "18244");
}

#[tokio::test]
async fn test_changes_sends_page_size() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes"))
        .and(query_param("pageToken", "18244"))
        .and(query_param("pageSize", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "changes": [],
            "newStartPageToken": "18245"
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.list_changes(&token("18244"), 500).await.unwrap();
}

#[tokio::test]
async fn test_changes_rate_limited_is_error() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/changes"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = client.list_changes(&token("18244"), 1000).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_changes_entry_without_id_preserved() {
    // A malformed entry (no fileId, no payload) must not fail the page;
    // the engine decides to skip it.
    let (server, client) = common::setup_drive_mock().await;
    common::mount_changes_page(
        &server,
        "18244",
        serde_json::json!({
            "changes": [ { "removed": false } ],
            "newStartPageToken": "18245"
        }),
    )
    .await;

    let page = client.list_changes(&token("18244"), 1000).await.unwrap();
    assert_eq!(page.changes.len(), 1);
    assert_eq!(page.changes[0].target_id(), None);
}
