//! Integration tests for children listings
//!
//! Verifies the query sent to `files.list` and the handling of pagination
//! tokens.

use gdsync_core::ports::{IRemoteStore, ListQuery};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_list_children_query_and_fields() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'ROOT' in parents and trashed = false"))
        .and(query_param(
            "fields",
            "nextPageToken, files(id, name, mimeType, size, parents)",
        ))
        .and(query_param("spaces", "drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                common::file_json("F1", "a.txt", 3, "ROOT"),
                common::folder_json("D1", "docs", "ROOT")
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = store
        .list_page(&common::id("ROOT"), &ListQuery::children())
        .await
        .unwrap();

    let page = response.payload.unwrap();
    assert_eq!(page.objects.len(), 2);
    assert_eq!(page.objects[0].name, "a.txt");
    assert!(page.objects[1].is_folder());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn test_list_children_passes_page_token() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [common::file_json("F9", "z.txt", 1, "ROOT")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = ListQuery::children().with_page_token(Some("page-2".to_string()));
    let page = store
        .list_page(&common::id("ROOT"), &query)
        .await
        .unwrap()
        .payload
        .unwrap();
    assert_eq!(page.objects[0].id.as_str(), "F9");
}

#[tokio::test]
async fn test_list_children_returns_next_page_token() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "page-2",
            "files": []
        })))
        .mount(&server)
        .await;

    let page = store
        .list_page(&common::id("ROOT"), &ListQuery::children())
        .await
        .unwrap()
        .payload
        .unwrap();
    assert!(page.objects.is_empty());
    assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
}

#[tokio::test]
async fn test_list_named_escapes_quotes() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "'ROOT' in parents and trashed = false and name = 'Bob\\'s file.txt'",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})))
        .expect(1)
        .mount(&server)
        .await;

    let response = store
        .list_page(&common::id("ROOT"), &ListQuery::named("Bob's file.txt"))
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn test_list_children_rate_limited() {
    let (server, store) = common::setup_store_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(429).set_body_json(common::error_json(429, "Rate Limit Exceeded")))
        .mount(&server)
        .await;

    let response = store
        .list_page(&common::id("ROOT"), &ListQuery::children())
        .await
        .unwrap();
    assert_eq!(response.status, 429);
    assert_eq!(response.status_text, "Rate Limit Exceeded");
}
