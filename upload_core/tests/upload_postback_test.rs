use axum::http::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use uuid::Uuid;

use upload_core::{
    connect, AttachmentRelation, DiskFileStore, FileRepository, FileStore, FileUploadWidget,
    RuleRegistry, RuleResolver, RuleSet, UploadDefaults, UploadRequest, UploadTarget,
    UploadWidget, UploadedFile, WidgetConfig, WidgetMode, FILE_PAYLOAD_KEY, UPLOAD_WIDGET_HEADER,
};

const WIDGET_ID: &str = "fileupload-users-avatar";

struct TestHarness {
    widget: FileUploadWidget,
    repository: FileRepository,
    store: Arc<DiskFileStore>,
    _temp_dir: TempDir,
    _temp_db: NamedTempFile,
}

async fn setup(rules: Option<&[&str]>, public: bool) -> TestHarness {
    let temp_db = NamedTempFile::new().unwrap();
    let database_url = format!("sqlite:{}", temp_db.path().display());
    let pool = connect(&database_url, 5).await.unwrap();

    let repository = FileRepository::new(pool);
    repository.create_tables().await.unwrap();

    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(DiskFileStore::new(
        temp_dir.path().to_path_buf(),
        repository.clone(),
    ));

    let config = WidgetConfig {
        mode: WidgetMode::ImageMulti,
        rules: rules.map(|expressions| RuleSet::parse(expressions.iter().copied()).unwrap()),
        ..Default::default()
    };

    let relation = Arc::new(AttachmentRelation::new(
        repository.clone(),
        "users",
        "avatar",
        public,
    ));

    let widget = FileUploadWidget::new(
        UploadTarget {
            widget_id: WIDGET_ID.to_string(),
            field_name: "avatar".to_string(),
            owner: "users".to_string(),
            session_key: "default".to_string(),
        },
        config,
        Arc::new(RuleRegistry::with_builtin_rules()),
        RuleResolver::new(UploadDefaults::default()),
        relation,
        None,
        store.clone() as Arc<dyn FileStore>,
        "/files",
    );

    TestHarness {
        widget,
        repository,
        store,
        _temp_dir: temp_dir,
        _temp_db: temp_db,
    }
}

fn postback_headers(widget_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        UPLOAD_WIDGET_HEADER,
        HeaderValue::from_str(widget_id).unwrap(),
    );
    headers
}

fn jpeg_of_size(bytes: usize) -> UploadedFile {
    let mut data = vec![0u8; bytes];
    data[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
    UploadedFile::new("photo.jpg", "image/jpeg", data)
}

fn single_file_request(file: UploadedFile) -> UploadRequest {
    let mut request = UploadRequest::new();
    request.push(FILE_PAYLOAD_KEY, file);
    request
}

fn batch_request(files: Vec<UploadedFile>) -> UploadRequest {
    let mut request = UploadRequest::new();
    for file in files {
        request.push(FILE_PAYLOAD_KEY, file);
    }
    request
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_end_to_end_upload_stores_and_associates() {
    let harness = setup(Some(&["max:5120", "extensions:jpg,png"]), true).await;

    let response = harness
        .widget
        .check_upload_postback(
            &postback_headers(WIDGET_ID),
            &single_file_request(jpeg_of_size(2 * 1024 * 1024)),
        )
        .await
        .expect("widget should claim its own postback");

    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    let id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
    assert_eq!(body["path"].as_str().unwrap(), format!("/files/{}", id));
    assert_eq!(body["thumb"].as_str().unwrap(), format!("/files/{}", id));

    let (stored, data) = harness.store.get(id).await.unwrap().unwrap();
    assert!(stored.is_public);
    assert_eq!(data.len(), 2 * 1024 * 1024);

    let attached = harness.repository.count_attached("users", "avatar").await.unwrap();
    assert_eq!(attached, 1);
}

#[tokio::test]
async fn test_oversize_upload_is_rejected_before_persistence() {
    let harness = setup(Some(&["max:5120", "extensions:jpg,png"]), true).await;

    let response = harness
        .widget
        .check_upload_postback(
            &postback_headers(WIDGET_ID),
            &single_file_request(jpeg_of_size(6 * 1024 * 1024)),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 400);

    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("maximum size"));
    assert!(!body["violations"].as_array().unwrap().is_empty());

    let attached = harness.repository.count_attached("users", "avatar").await.unwrap();
    assert_eq!(attached, 0);
}

#[tokio::test]
async fn test_missing_file_field_is_reported() {
    let harness = setup(None, true).await;

    let response = harness
        .widget
        .check_upload_postback(&postback_headers(WIDGET_ID), &UploadRequest::new())
        .await
        .unwrap();

    assert_eq!(response.status(), 400);

    let body = response_json(response).await;
    assert_eq!(body["error"].as_str().unwrap(), "File missing from request");
}

#[tokio::test]
async fn test_identity_mismatch_leaves_no_trace() {
    let harness = setup(None, true).await;

    let response = harness
        .widget
        .check_upload_postback(
            &postback_headers("fileupload-posts-attachments"),
            &single_file_request(jpeg_of_size(1024)),
        )
        .await;
    assert!(response.is_none());

    let response = harness
        .widget
        .check_upload_postback(&HeaderMap::new(), &single_file_request(jpeg_of_size(1024)))
        .await;
    assert!(response.is_none());

    let attached = harness.repository.count_attached("users", "avatar").await.unwrap();
    assert_eq!(attached, 0);
}

#[tokio::test]
async fn test_max_files_counts_already_attached_files() {
    let harness = setup(Some(&["max_files:1"]), true).await;
    let headers = postback_headers(WIDGET_ID);

    let first = harness
        .widget
        .check_upload_postback(&headers, &single_file_request(jpeg_of_size(1024)))
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = harness
        .widget
        .check_upload_postback(&headers, &single_file_request(jpeg_of_size(1024)))
        .await
        .unwrap();
    assert_eq!(second.status(), 400);

    let body = response_json(second).await;
    assert!(body["error"].as_str().unwrap().contains("no more than"));

    let attached = harness.repository.count_attached("users", "avatar").await.unwrap();
    assert_eq!(attached, 1);
}

#[tokio::test]
async fn test_batch_upload_respects_the_total_limit() {
    let harness = setup(Some(&["max_files:5"]), false).await;
    let headers = postback_headers(WIDGET_ID);

    let first_batch = batch_request(vec![
        jpeg_of_size(512),
        jpeg_of_size(512),
        jpeg_of_size(512),
    ]);
    let response = harness
        .widget
        .check_upload_postback(&headers, &first_batch)
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    // 3 already attached + 3 incoming exceeds the limit of 5
    let second_batch = batch_request(vec![
        jpeg_of_size(512),
        jpeg_of_size(512),
        jpeg_of_size(512),
    ]);
    let response = harness
        .widget
        .check_upload_postback(&headers, &second_batch)
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let attached = harness.repository.count_attached("users", "avatar").await.unwrap();
    assert_eq!(attached, 3);
}

#[tokio::test]
async fn test_visibility_comes_from_the_relation() {
    let harness = setup(None, false).await;

    let response = harness
        .widget
        .check_upload_postback(
            &postback_headers(WIDGET_ID),
            &single_file_request(jpeg_of_size(1024)),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    let id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();

    let (stored, _data) = harness.store.get(id).await.unwrap().unwrap();
    assert!(!stored.is_public);
}
