//! End-to-end dispatch and session behaviour against the demo routes.

mod common;

use reqwest::header::COOKIE;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{absorb_cookies, cookie_header, set_cookie_for, start_server};
use waypost::config::AppConfig;
use waypost::demo::FLASH_SESSION;

#[tokio::test]
async fn test_unmatched_path_returns_404() {
    let server = start_server(AppConfig::default()).await;

    let res = reqwest::get(server.url("/missing/page")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "404 page not found\n");

    // The id capture only accepts digits.
    let res = reqwest::get(server.url("/users/abc/ana")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn test_route_params_and_query() {
    let server = start_server(AppConfig::default()).await;

    let res = reqwest::get(server.url("/users/42/ana?tab=posts"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert!(set_cookie_for(res.headers(), "waypost_profile").is_some());

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], "42");
    assert_eq!(body["name"], "ana");
    assert_eq!(
        body["query"],
        json!([["id", "42"], ["name", "ana"], ["tab", "posts"]])
    );
    assert_eq!(body["flashed_name"], json!([{"t": "str", "v": "ana"}]));

    server.stop().await;
}

#[tokio::test]
async fn test_flashes_are_read_once() {
    let server = start_server(AppConfig::default()).await;
    let client = reqwest::Client::new();
    let mut jar = Vec::new();

    let res = client
        .post(server.url("/flash?msg=saved"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    absorb_cookies(&mut jar, res.headers());
    assert_eq!(jar.len(), 1);

    let res = client
        .get(server.url("/flash"))
        .header(COOKIE, cookie_header(&jar))
        .send()
        .await
        .unwrap();
    absorb_cookies(&mut jar, res.headers());
    let first: Value = res.json().await.unwrap();
    assert_eq!(first, json!([{"t": "str", "v": "saved"}]));

    let res = client
        .get(server.url("/flash"))
        .header(COOKIE, cookie_header(&jar))
        .send()
        .await
        .unwrap();
    let second: Value = res.json().await.unwrap();
    assert_eq!(second, json!([]));

    server.stop().await;
}

#[tokio::test]
async fn test_tampered_cookie_starts_fresh_session() {
    let server = start_server(AppConfig::default()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/flash"))
        .header(COOKIE, format!("{}=tampered-value", FLASH_SESSION))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!([]));

    server.stop().await;
}

#[tokio::test]
async fn test_filesystem_session_delete_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.sessions.filesystem.enabled = true;
    config.sessions.filesystem.directory = dir.path().display().to_string();
    let server = start_server(config).await;
    let client = reqwest::Client::new();
    let mut jar = Vec::new();

    let res = client
        .post(server.url("/flash?msg=kept"))
        .send()
        .await
        .unwrap();
    absorb_cookies(&mut jar, res.headers());

    let files: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("session_"));

    let res = client
        .delete(server.url("/flash"))
        .header(COOKIE, cookie_header(&jar))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let expired = set_cookie_for(res.headers(), FLASH_SESSION).unwrap();
    assert!(expired.contains("Max-Age=0"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_in_memory_counter() {
    let server = start_server(AppConfig::default()).await;
    let client = reqwest::Client::new();
    let mut jar = Vec::new();

    let res = client.get(server.url("/counter")).send().await.unwrap();
    absorb_cookies(&mut jar, res.headers());
    assert_eq!(res.text().await.unwrap(), "visits: 1\n");
    assert_eq!(jar[0].0, "WaypostSessionId");

    let res = client
        .get(server.url("/counter"))
        .header(COOKIE, cookie_header(&jar))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "visits: 2\n");

    let res = client
        .delete(server.url("/counter"))
        .header(COOKIE, cookie_header(&jar))
        .send()
        .await
        .unwrap();
    absorb_cookies(&mut jar, res.headers());
    assert!(jar.is_empty());

    server.stop().await;
}
