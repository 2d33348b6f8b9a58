//! HTTP-level tests against the in-process application.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use helpers::{HELLO_WORLD_SHA256, TestApp};

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/api/files", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "UNAUTHORIZED");

    let forged = app
        .request("GET", "/api/files", None, Some("not-a-jwt"))
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let response = app.request("GET", "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_upload_then_download() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    let uploaded = app
        .upload(&token, "notes/hello.txt", "laptop", b"hello world", None)
        .await;
    assert_eq!(uploaded.status, StatusCode::CREATED);
    let data = &uploaded.body["data"];
    assert_eq!(data["version_number"], 1);
    assert_eq!(data["size_bytes"], 11);
    assert_eq!(data["content_hash"], HELLO_WORLD_SHA256);
    let file_id = data["file_id"].as_str().unwrap().to_string();

    let download = app
        .request("GET", &format!("/api/files/{file_id}/download"), None, Some(&token))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(&download.raw[..], b"hello world");
    assert_eq!(download.headers["x-content-sha256"], HELLO_WORLD_SHA256);
    assert_eq!(download.headers["content-type"], "text/plain; charset=utf-8");

    let meta = app
        .request("GET", &format!("/api/files/{file_id}"), None, Some(&token))
        .await;
    assert_eq!(meta.status, StatusCode::OK);
    assert_eq!(meta.body["data"]["name"], "hello.txt");
    assert_eq!(meta.body["data"]["path"], "notes/hello.txt");
    assert_eq!(meta.body["data"]["latest_version_number"], 1);
}

#[tokio::test]
async fn test_files_are_scoped_to_owner() {
    let app = TestApp::new().await;
    let owner = app.token_for(Uuid::new_v4());
    let stranger = app.token_for(Uuid::new_v4());

    let uploaded = app
        .upload(&owner, "secret.txt", "laptop", b"hello world", None)
        .await;
    let file_id = uploaded.body["data"]["file_id"].as_str().unwrap().to_string();

    for path in [
        format!("/api/files/{file_id}"),
        format!("/api/files/{file_id}/download"),
        format!("/api/files/{file_id}/versions"),
    ] {
        let response = app.request("GET", &path, None, Some(&stranger)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(response.body["error"], "NOT_FOUND");
    }

    let listing = app.request("GET", "/api/files", None, Some(&stranger)).await;
    assert_eq!(listing.body["data"]["total_items"], 0);

    // Adding a version to someone else's file looks like a missing file.
    let hijack = app
        .upload(
            &stranger,
            "secret.txt",
            "phone",
            b"mine now",
            Some(file_id.parse().unwrap()),
        )
        .await;
    assert_eq!(hijack.status, StatusCode::NOT_FOUND);

    let check = app
        .request(
            "POST",
            "/api/sync/check",
            Some(json!({ "file_id": file_id, "file_hash": HELLO_WORLD_SHA256, "device_id": "phone" })),
            Some(&stranger),
        )
        .await;
    assert_eq!(check.status, StatusCode::OK);
    assert_eq!(check.body["data"]["status"], "FILE_NOT_FOUND");
}

#[tokio::test]
async fn test_list_files_with_folder_and_paging() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    for name in ["docs/a.txt", "docs/b.txt", "docs/c.txt", "music/d.mp3"] {
        let response = app.upload(&token, name, "laptop", b"data", None).await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let page = app
        .request("GET", "/api/files?folder=docs/&page=2&page_size=2", None, Some(&token))
        .await;
    assert_eq!(page.status, StatusCode::OK);
    let data = &page.body["data"];
    assert_eq!(data["total_items"], 3);
    assert_eq!(data["total_pages"], 2);
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["items"][0]["path"], "docs/c.txt");
    assert_eq!(data["has_previous"], true);

    let beyond = app
        .request("GET", "/api/files?page=18446744073709551615", None, Some(&token))
        .await;
    assert_eq!(beyond.status, StatusCode::OK);
    assert_eq!(beyond.body["data"]["items"].as_array().unwrap().len(), 0);
    assert_eq!(beyond.body["data"]["total_items"], 4);
}

#[tokio::test]
async fn test_sync_check_and_conflict_resolution() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    let first = app
        .upload(&token, "plan.txt", "A", b"hello world", None)
        .await;
    let file_id = first.body["data"]["file_id"].as_str().unwrap().to_string();
    let v1 = first.body["data"]["version_id"].as_str().unwrap().to_string();

    let check = |device: &str, hash: &str| {
        json!({ "file_id": file_id, "file_hash": hash, "device_id": device })
    };

    let synced = app
        .request("POST", "/api/sync/check", Some(check("B", HELLO_WORLD_SHA256)), Some(&token))
        .await;
    assert_eq!(synced.body["data"]["status"], "SYNCED");
    assert_eq!(synced.body["data"]["latest_version_id"], v1.as_str());

    let second = app
        .upload(&token, "plan.txt", "B", b"other words", Some(file_id.parse().unwrap()))
        .await;
    assert_eq!(second.body["data"]["version_number"], 2);
    let v2_hash = second.body["data"]["content_hash"].as_str().unwrap().to_string();

    let stale = app
        .request("POST", "/api/sync/check", Some(check("A", HELLO_WORLD_SHA256)), Some(&token))
        .await;
    assert_eq!(stale.body["data"]["status"], "CONFLICT");

    let resolved = app
        .request(
            "POST",
            "/api/sync/resolve",
            Some(json!({ "file_id": file_id, "losing_version_ids": [v1] })),
            Some(&token),
        )
        .await;
    assert_eq!(resolved.status, StatusCode::OK);
    assert_eq!(resolved.body["data"]["success"], true);
    let new_version = resolved.body["data"]["new_version_id"].as_str().unwrap().to_string();

    let versions = app
        .request("GET", &format!("/api/files/{file_id}/versions"), None, Some(&token))
        .await;
    let list = versions.body["data"].as_array().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0]["resolved_by"], new_version.as_str());
    assert!(list[1]["resolved_by"].is_null());
    assert_eq!(list[2]["device_id"], "system");
    assert_eq!(list[2]["hash"], v2_hash.as_str());

    let download = app
        .request("GET", &format!("/api/files/{file_id}/download"), None, Some(&token))
        .await;
    assert_eq!(&download.raw[..], b"other words");
}

#[tokio::test]
async fn test_invalid_requests_are_bad_requests() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    let bad_id = app
        .request("GET", "/api/files/not-a-uuid", None, Some(&token))
        .await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);

    let no_device = app.upload(&token, "a.txt", "", b"x", None).await;
    assert_eq!(no_device.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_device.body["error"], "VALIDATION_ERROR");

    let no_losers = app
        .request(
            "POST",
            "/api/sync/resolve",
            Some(json!({ "file_id": Uuid::new_v4(), "losing_version_ids": [] })),
            Some(&token),
        )
        .await;
    assert_eq!(no_losers.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    static BIG: [u8; 1048577] = [b'x'; 1048577];
    let response = app.upload(&token, "big.bin", "laptop", &BIG, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let listing = app.request("GET", "/api/files", None, Some(&token)).await;
    assert_eq!(listing.body["data"]["total_items"], 0);
}

#[tokio::test]
async fn test_access_token_query_parameter() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4());

    let response = app
        .request("GET", &format!("/api/files?access_token={token}"), None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
}
