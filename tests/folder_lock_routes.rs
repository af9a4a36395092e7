use axum::{
    Json, Router,
    body::{Body, Bytes, to_bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, Request, Response, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;
use tower::ServiceExt;

use securedrive::config::Config;
use securedrive::db::FolderLockStorage;
use securedrive::google_oauth::DriveToken;
use securedrive::router::{DriveState, drive_router};

const FOLDER: &str = "locked-folder-1";
const FILE_BODY: &str = "hello, drive";

fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "securedrive-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    temp_path
}

/// Requests the fake Drive received, one line each.
#[derive(Clone, Default)]
struct DriveLog(Arc<Mutex<Vec<String>>>);

impl DriveLog {
    fn push(&self, line: String) {
        self.0.lock().expect("drive log poisoned").push(line);
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().expect("drive log poisoned").clone()
    }
}

async fn fake_list() -> Json<Value> {
    Json(json!({
        "files": [
            {"id": "sub-1", "name": "Tax Returns", "mimeType": "application/vnd.google-apps.folder"},
            {"id": "file-1", "name": "secret-plans.txt", "mimeType": "text/plain", "size": "12"}
        ]
    }))
}

async fn fake_get(
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> axum::response::Response {
    if query.get("alt").map(String::as_str) == Some("media") {
        return ([(header::CONTENT_TYPE, "text/plain")], FILE_BODY).into_response();
    }
    Json(json!({
        "id": id,
        "name": "secret-plans.txt",
        "mimeType": "text/plain",
        "parents": ["old-parent"]
    }))
    .into_response()
}

async fn fake_patch(
    State(log): State<DriveLog>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Json<Value> {
    let patch: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let add = query.get("addParents").cloned().unwrap_or_default();
    let remove = query.get("removeParents").cloned().unwrap_or_default();
    log.push(format!(
        "PATCH {id} addParents={add} removeParents={remove} body={patch}"
    ));

    let name = patch
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("secret-plans.txt");
    let parents = if add.is_empty() {
        json!(["old-parent"])
    } else {
        json!([add])
    };
    Json(json!({"id": id, "name": name, "mimeType": "text/plain", "parents": parents}))
}

async fn fake_delete(State(log): State<DriveLog>, Path(id): Path<String>) -> StatusCode {
    log.push(format!("DELETE {id}"));
    StatusCode::NO_CONTENT
}

async fn fake_upload(
    State(log): State<DriveLog>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    log.push(format!(
        "UPLOAD uploadType={} content-type={content_type} body={}",
        query.get("uploadType").cloned().unwrap_or_default(),
        String::from_utf8_lossy(&body)
    ));
    Json(json!({"id": "new-1", "name": "hello.txt", "mimeType": "text/plain"}))
}

/// Minimal stand-in for the Drive v3 `files` and upload endpoints.
async fn spawn_fake_drive(log: DriveLog) -> String {
    let app = Router::new()
        .route("/drive/v3/files", get(fake_list))
        .route(
            "/drive/v3/files/{id}",
            get(fake_get).patch(fake_patch).delete(fake_delete),
        )
        .route("/upload/drive/v3/files", axum::routing::post(fake_upload))
        .with_state(log);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind fake drive");
    let addr = listener.local_addr().expect("fake drive has no address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

struct TestApp {
    app: Router,
    state: DriveState,
    drive_log: DriveLog,
    db_path: PathBuf,
}

impl TestApp {
    async fn new(tag: &str, max_upload_bytes: usize) -> Self {
        let db_path = temp_db_path(tag);
        let database_url = format!("sqlite:{}", db_path.display());
        let storage = FolderLockStorage::connect(&database_url)
            .await
            .expect("failed to open sqlite");

        let drive_log = DriveLog::default();
        let drive_base = spawn_fake_drive(drive_log.clone()).await;
        let mut cfg = Config::default();
        cfg.basic.insecure_cookie = true;
        cfg.basic.max_upload_bytes = max_upload_bytes;
        cfg.google.client_id = "test-client".to_string();
        cfg.google.client_secret = "test-secret".to_string();
        cfg.google.drive_api_base = format!("{drive_base}/drive/v3")
            .parse()
            .expect("bad fake drive url");
        cfg.google.drive_upload_base = format!("{drive_base}/upload/drive/v3")
            .parse()
            .expect("bad fake upload url");

        let state = DriveState::new(&cfg, storage)
            .await
            .expect("failed to build state");
        let app = drive_router(state.clone());
        Self {
            app,
            state,
            drive_log,
            db_path,
        }
    }

    async fn sign_in(&self) {
        self.state
            .session
            .install(DriveToken {
                access_token: "ya29.test".to_string(),
                refresh_token: None,
                expiry: Utc::now() + Duration::hours(1),
                email: Some("ops@example.com".to_string()),
            })
            .await;
    }

    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("request failed")
    }

    async fn get(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
    }

    async fn post_form(&self, uri: &str, form: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .expect("failed to build request"),
        )
        .await
    }
}

fn multipart_body(boundary: &str, folder_id: &str, file_name: &str, payload: &str) -> String {
    format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"folderID\"\r\n\r\n{folder_id}\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/plain\r\n\r\n{payload}\r\n--{boundary}--\r\n"
    )
}

fn upload_request(boundary: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("failed to build request")
}

fn location(resp: &Response<Body>) -> Option<&str> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.db_path);
    }
}

async fn body_string(resp: Response<Body>) -> String {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(body.to_vec()).expect("response body was not utf-8")
}

#[tokio::test]
async fn pages_without_session_redirect_to_google_consent() {
    let t = TestApp::new("no-session", 1024 * 1024).await;

    let resp = t.get("/").await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = location(&resp).expect("missing location header");
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
    assert!(location.contains("access_type=offline"));
    assert!(location.contains("code_challenge="));
    assert!(resp.headers().get(header::SET_COOKIE).is_some());

    let resp = t.get("/files?parent=root").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn folder_password_lifecycle() {
    let t = TestApp::new("lifecycle", 1024 * 1024).await;
    t.sign_in().await;

    // Unlocked folders list directly.
    let resp = t.get(&format!("/folder?id={FOLDER}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("secret-plans.txt"));

    let resp = t
        .post_form(&format!("/setPassword?id={FOLDER}"), "password=")
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!t.state.locks.is_locked(FOLDER).await.expect("db error"));

    let resp = t
        .post_form(&format!("/setPassword?id={FOLDER}"), "password=hunter2")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("Password set successfully"));

    let resp = t.get(&format!("/setPassword?id={FOLDER}")).await;
    assert!(body_string(resp).await.contains(r#"data-locked="true""#));

    let resp = t.get(&format!("/folder?id={FOLDER}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_string(resp).await;
    assert!(html.contains("Enter password to unlock folder"));
    assert!(!html.contains("secret-plans.txt"));

    let resp = t.get(&format!("/files?parent={FOLDER}")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = t
        .post_form(&format!("/folder?id={FOLDER}"), "password=wrong")
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_string(resp).await.contains("Incorrect password"));

    let resp = t
        .post_form(&format!("/folder?id={FOLDER}"), "password=hunter2")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("secret-plans.txt"));

    let resp = t
        .post_form("/removePassword", &format!("folderID={FOLDER}"))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));

    let resp = t.get(&format!("/folder?id={FOLDER}")).await;
    assert!(body_string(resp).await.contains("secret-plans.txt"));
}

#[tokio::test]
async fn remove_password_requires_folder_id() {
    let t = TestApp::new("remove-missing", 1024 * 1024).await;
    t.sign_in().await;

    let resp = t.get("/removePassword").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(resp).await.contains("Folder ID not provided"));

    let resp = t.get("/setPassword").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_proxies_to_drive() {
    let t = TestApp::new("delete", 1024 * 1024).await;
    t.sign_in().await;

    let resp = t
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/delete?id=file-1")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(t.drive_log.lines(), vec!["DELETE file-1".to_string()]);
}

#[tokio::test]
async fn upload_returns_413_for_oversized_body() {
    let t = TestApp::new("upload-limit", 1024).await;
    t.sign_in().await;

    let boundary = "securedrive-test-boundary";
    let payload = "a".repeat(64 * 1024);
    let resp = t
        .send(upload_request(
            boundary,
            multipart_body(boundary, "", "big.txt", &payload),
        ))
        .await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn root_folder_cannot_be_locked() {
    let t = TestApp::new("root-lock", 1024 * 1024).await;
    t.sign_in().await;

    for id in ["root", "._."] {
        let resp = t
            .post_form(&format!("/setPassword?id={id}"), "password=hunter2")
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(resp).await.contains("root folder"));
        assert!(!t.state.locks.is_locked(id).await.expect("db error"));
    }

    let resp = t.get("/setPassword?id=root").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = t.post_form("/removePassword", "folderID=root").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = t.get("/folder?id=root").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("secret-plans.txt"));
}

#[tokio::test]
async fn upload_sends_multipart_related_and_returns_to_folder() {
    let t = TestApp::new("upload", 1024 * 1024).await;
    t.sign_in().await;

    let boundary = "securedrive-upload-boundary";
    let resp = t
        .send(upload_request(
            boundary,
            multipart_body(boundary, "folder-9", "hello.txt", "hello upload"),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/folder?id=folder-9"));

    let lines = t.drive_log.lines();
    assert_eq!(lines.len(), 1);
    let sent = &lines[0];
    assert!(sent.starts_with("UPLOAD uploadType=multipart content-type=multipart/related; boundary="));
    assert!(sent.contains(r#""name":"hello.txt""#));
    assert!(sent.contains(r#""mimeType":"text/plain""#));
    assert!(sent.contains(r#""parents":["folder-9"]"#));
    assert!(sent.contains("hello upload"));
}

#[tokio::test]
async fn upload_to_root_spelling_goes_back_to_root() {
    let t = TestApp::new("upload-root", 1024 * 1024).await;
    t.sign_in().await;

    let boundary = "securedrive-upload-boundary";
    let resp = t
        .send(upload_request(
            boundary,
            multipart_body(boundary, "._.", "hello.txt", "hello root"),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));

    let lines = t.drive_log.lines();
    assert_eq!(lines.len(), 1);
    assert!(!lines[0].contains("parents"));
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let t = TestApp::new("upload-empty", 1024 * 1024).await;
    t.sign_in().await;

    let boundary = "securedrive-upload-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"folderID\"\r\n\r\nfolder-9\r\n--{boundary}--\r\n"
    );
    let resp = t.send(upload_request(boundary, body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(t.drive_log.lines().is_empty());
}

#[tokio::test]
async fn download_streams_file_with_headers() {
    let t = TestApp::new("download", 1024 * 1024).await;
    t.sign_in().await;

    let resp = t.get("/download?id=file-1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).and_then(|v| v.to_str().ok()),
        Some(r#"attachment; filename="secret-plans.txt""#)
    );
    assert_eq!(
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("text/plain")
    );
    let expected_len = FILE_BODY.len().to_string();
    assert_eq!(
        headers.get(header::CONTENT_LENGTH).and_then(|v| v.to_str().ok()),
        Some(expected_len.as_str())
    );
    assert_eq!(body_string(resp).await, FILE_BODY);

    let resp = t.get("/download").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rename_patches_the_name() {
    let t = TestApp::new("rename", 1024 * 1024).await;
    t.sign_in().await;

    let resp = t.get("/rename?id=file-1&name=plans-v2.txt").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let item: Value = serde_json::from_str(&body_string(resp).await).expect("not json");
    assert_eq!(item["name"], "plans-v2.txt");

    assert_eq!(
        t.drive_log.lines(),
        vec![r#"PATCH file-1 addParents= removeParents= body={"name":"plans-v2.txt"}"#.to_string()]
    );

    let resp = t.get("/rename?id=file-1").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn move_replaces_current_parents() {
    let t = TestApp::new("move", 1024 * 1024).await;
    t.sign_in().await;

    let resp = t.get("/move?id=file-1&parentID=dest-folder").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let item: Value = serde_json::from_str(&body_string(resp).await).expect("not json");
    assert_eq!(item["parents"], json!(["dest-folder"]));

    assert_eq!(
        t.drive_log.lines(),
        vec!["PATCH file-1 addParents=dest-folder removeParents=old-parent body={}".to_string()]
    );

    let resp = t.get("/move?id=file-1").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sign_out_clears_the_session() {
    let t = TestApp::new("sign-out", 1024 * 1024).await;
    t.sign_in().await;

    let resp = t.post_form("/signout", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("Signed out"));

    let resp = t.get("/").await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(t.state.session.access_token().await.expect("actor down"), None);
}
