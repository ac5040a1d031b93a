//! Shared test helpers for Drive API integration tests
//!
//! Each helper mounts the necessary mock endpoints on a wiremock server.
//! Metadata calls are served under `/drive/v3`, uploads under `/upload/drive/v3`.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gdsync_core::domain::RemoteId;
use gdsync_drive::client::DriveClient;
use gdsync_drive::provider::DriveRemoteStore;

/// Starts a mock server and returns it with a client pointed at it.
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_urls(
        "test-access-token",
        format!("{}/drive/v3", server.uri()),
        format!("{}/upload/drive/v3", server.uri()),
    );
    (server, client)
}

/// Same as [`setup_drive_mock`] but wraps the client in a remote store.
pub async fn setup_store_mock() -> (MockServer, DriveRemoteStore) {
    let (server, client) = setup_drive_mock().await;
    (server, DriveRemoteStore::new(client))
}

pub fn id(s: &str) -> RemoteId {
    RemoteId::new(s.to_string()).unwrap()
}

/// JSON body of a Drive file resource.
pub fn file_json(id: &str, name: &str, size: u64, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "mimeType": "application/octet-stream",
        "size": size.to_string(),
        "parents": [parent]
    })
}

/// JSON body of a Drive folder resource.
pub fn folder_json(id: &str, name: &str, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "mimeType": "application/vnd.google-apps.folder",
        "parents": [parent]
    })
}

/// Google-style error envelope.
pub fn error_json(code: u16, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{"message": message, "domain": "global", "reason": "notFound"}]
        }
    })
}

/// Mounts `GET /files/{id}` returning `body` with `status`.
pub async fn mount_get_file(
    server: &MockServer,
    file_id: &str,
    status: u16,
    body: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v3/files/{file_id}")))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}
