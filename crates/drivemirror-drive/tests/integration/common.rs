//! Shared test helpers for Drive API integration tests
//!
//! Provides wiremock-based mock server setup for the Drive endpoints.
//! Each helper mounts a mock endpoint; tests combine them and point a
//! DriveClient at the mock server.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_drive::client::DriveClient;

/// Starts a mock server and returns it with a client pointing at it.
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url("test-access-token", server.uri());
    (server, client)
}

/// Mounts the changes startPageToken endpoint.
pub async fn mount_start_page_token(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/changes/startPageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "startPageToken": token
        })))
        .mount(server)
        .await;
}

/// Mounts a file metadata endpoint for a specific file ID.
pub async fn mount_file_metadata(server: &MockServer, id: &str, body: serde_json::Value) {
    let path_str = format!("/files/{id}");
    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a single-page children listing for a folder.
pub async fn mount_children_single_page(
    server: &MockServer,
    folder_id: &str,
    files: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param(
            "q",
            format!("'{folder_id}' in parents and trashed = false"),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": files
        })))
        .mount(server)
        .await;
}

/// Mounts one page of the changes feed for a specific page token.
pub async fn mount_changes_page(server: &MockServer, page_token: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/changes"))
        .and(query_param("pageToken", page_token))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
