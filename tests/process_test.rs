use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use http_body_util::BodyExt;
use rust_report_backend::config::ProcessingConfig;
use rust_report_backend::services::storage::StorageArea;
use rust_report_backend::{AppState, create_app};
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

fn test_app(dir: &tempfile::TempDir) -> axum::Router {
    let storage = Arc::new(StorageArea::new(dir.path()).unwrap());
    let state = AppState {
        storage,
        config: ProcessingConfig::development(dir.path()),
    };
    create_app(state)
}

fn stored_file_count(dir: &tempfile::TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

/// Generate a one-sheet fixture with a header row and the given data rows.
fn xlsx_fixture(headers: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (c, h) in headers.iter().enumerate() {
        sheet.write_string(0, c as u16, *h).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet.write_string((r + 1) as u32, c as u16, *value).unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    fn new() -> Self {
        Self { body: Vec::new() }
    }

    fn file(mut self, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

async fn post_process(app: axum::Router, body: Vec<u8>) -> axum::http::Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/process")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn error_message(response: axum::http::Response<Body>) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    json["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_two_type_a_files_merge_into_one_annotated_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let first = xlsx_fixture(&["Name", "Amount"], &[&["alpha", "10"], &["beta", "20"]]);
    let second = xlsx_fixture(&["Name", "Amount"], &[&["gamma", "30"]]);

    let body = MultipartBuilder::new()
        .file("first.xlsx", &first)
        .file("second.xlsx", &second)
        .text("tags", "TypeA")
        .text("tags", "TypeA")
        .text("year", "2024")
        .text("quarter", "Q2")
        .build();

    let response = post_process(app, body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("report_2024_Q2_"));
    assert!(disposition.ends_with(".xlsx\""));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    let range = workbook.worksheet_range_at(0).unwrap().unwrap();
    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();

    // Header + 3 data rows, file order preserved
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[0],
        vec![
            Data::String("Name".into()),
            Data::String("Amount".into()),
            Data::String("Processed_A".into()),
            Data::String("Year".into()),
            Data::String("Quarter".into()),
        ]
    );
    assert_eq!(rows[1][0], Data::String("alpha".into()));
    assert_eq!(rows[3][0], Data::String("gamma".into()));
    for row in &rows[1..] {
        assert_eq!(row[2], Data::String("Processed by Type A".into()));
        assert_eq!(row[3], Data::Float(2024.0));
        assert_eq!(row[4], Data::String("Q2".into()));
    }

    // Inputs and the generated report were all released
    assert_eq!(stored_file_count(&dir), 0);
}

#[tokio::test]
async fn test_pdf_with_spreadsheet_tag_is_rejected_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let body = MultipartBuilder::new()
        .file("scan.pdf", b"%PDF-1.5 not really")
        .text("tags", "TypeA")
        .text("year", "2024")
        .text("quarter", "Q1")
        .build();

    let response = post_process(app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let message = error_message(response).await;
    assert!(message.contains("TypeA"));
    assert!(message.contains("scan.pdf"));
    assert_eq!(stored_file_count(&dir), 0);
}

#[tokio::test]
async fn test_year_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let fixture = xlsx_fixture(&["A"], &[&["1"]]);
    let body = MultipartBuilder::new()
        .file("a.xlsx", &fixture)
        .text("tags", "TypeA")
        .text("year", "1999")
        .text("quarter", "Q1")
        .build();

    let response = post_process(app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("1999"));
    assert_eq!(stored_file_count(&dir), 0);
}

#[tokio::test]
async fn test_invalid_quarter_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let fixture = xlsx_fixture(&["A"], &[&["1"]]);
    let body = MultipartBuilder::new()
        .file("a.xlsx", &fixture)
        .text("tags", "TypeA")
        .text("year", "2024")
        .text("quarter", "Q5")
        .build();

    let response = post_process(app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stored_file_count(&dir), 0);
}

#[tokio::test]
async fn test_count_mismatch_persists_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let fixture = xlsx_fixture(&["A"], &[&["1"]]);
    let body = MultipartBuilder::new()
        .file("a.xlsx", &fixture)
        .file("b.xlsx", &fixture)
        .text("tags", "TypeA")
        .text("year", "2024")
        .text("quarter", "Q3")
        .build();

    let response = post_process(app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("must match"));
    assert_eq!(stored_file_count(&dir), 0);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let body = MultipartBuilder::new()
        .text("year", "2024")
        .text("quarter", "Q1")
        .build();

    let response = post_process(app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_placeholder_only_batch_yields_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let fixture = xlsx_fixture(&["A"], &[&["1"]]);
    let body = MultipartBuilder::new()
        .file("a.xlsx", &fixture)
        .file("b.pdf", b"%PDF-1.5 placeholder input")
        .text("tags", "TypeB")
        .text("tags", "TypeD")
        .text("year", "2024")
        .text("quarter", "Q4")
        .build();

    let response = post_process(app, body).await;
    // No transformer produced rows: distinct from a crash and from a silent
    // empty spreadsheet
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(stored_file_count(&dir), 0);
}

#[tokio::test]
async fn test_unparsable_spreadsheet_fails_batch_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let good = xlsx_fixture(&["A"], &[&["1"]]);
    let body = MultipartBuilder::new()
        .file("good.xlsx", &good)
        .file("bad.xlsx", b"not a zip archive")
        .text("tags", "TypeA")
        .text("tags", "TypeA")
        .text("year", "2024")
        .text("quarter", "Q2")
        .build();

    let response = post_process(app, body).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(response).await.contains("bad.xlsx"));
    assert_eq!(stored_file_count(&dir), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "ready");
}
