//! End-to-end tests of the HTTP surface, driven in-process.

use std::io::Cursor;
use std::path::Path;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::{json, Value};
use tower::ServiceExt;

use sidemerge::image::Loader;
use sidemerge::server::{self, AppState, OutputStore};
use sidemerge::ServerConfig;

const BOUNDARY: &str = "sidemerge-test-boundary";

fn app(dir: &Path) -> Router {
    let config = ServerConfig {
        output_dir: dir.to_path_buf(),
        ..ServerConfig::default()
    };
    let loader = Loader::new(config.fetch_timeout, config.max_fetch_bytes).unwrap();
    let store = OutputStore::open(dir).unwrap();
    server::router(AppState::new(config, loader, store))
}

fn png(img: DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

fn model_png() -> Vec<u8> {
    png(DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 100, Rgb([30, 60, 90]))))
}

fn product_png() -> Vec<u8> {
    png(DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 120, Rgba([200, 0, 0, 0]))))
}

fn data_url(bytes: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{name}\"; filename=\"{filename}\""),
            None => format!("form-data; name=\"{name}\""),
        };
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
        if filename.is_some() {
            body.extend_from_slice(b"Content-Type: image/png\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/merge")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn output_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_merge_json_and_fetch_output() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let payload = json!({
        "model_image": data_url(&model_png()),
        "product_image": data_url(&product_png()),
        "target_height": 200,
        "output_format": "png",
    });
    let (status, body) = send_json(&app, post_json("/merge-json", &payload)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    // 200 * 80 / 100 = 160, 200 * 40 / 120 = 66.67
    assert_eq!(body["output"]["dimensions"]["width"], 227);
    assert_eq!(body["output"]["dimensions"]["height"], 200);
    assert_eq!(body["output"]["format"], "PNG");
    assert_eq!(body["output"]["layout"], "uniform_height");

    let url = body["output"]["url"].as_str().unwrap();
    assert!(url.starts_with("/outputs/merged_"));

    let request = Request::get(url).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let merged = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_eq!(merged.dimensions(), (227, 200));
    // Fully transparent product flattened to white.
    assert_eq!(merged.get_pixel(200, 100), &Rgb([255, 255, 255]));
}

#[tokio::test]
async fn test_merge_json_preserve_product_size() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let payload = json!({
        "model_image": data_url(&model_png()),
        "product_image": base64::engine::general_purpose::STANDARD.encode(product_png()),
        "target_height": 100,
        "layout": "preserve_product_size",
    });
    let (status, body) = send_json(&app, post_json("/merge-json", &payload)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["output"]["dimensions"]["width"], 80 + 40);
    assert_eq!(body["output"]["dimensions"]["height"], 120);
    assert_eq!(body["output"]["format"], "JPG");
}

#[tokio::test]
async fn test_out_of_range_height_rejected_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let payload = json!({
        "model_image": data_url(&model_png()),
        // Would fail to decode; parameters are checked first.
        "product_image": "not an image",
        "target_height": 50,
    });
    let (status, body) = send_json(&app, post_json("/merge-json", &payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "parameter_out_of_range");
    assert_eq!(output_count(dir.path()), 0);
}

#[tokio::test]
async fn test_canvas_over_pixel_budget_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    // 1000x100 at height 5000 plans a 51667x5000 canvas: within the side
    // limits, far above the default 40 MP budget.
    let wide = png(DynamicImage::ImageRgb8(RgbImage::new(1000, 100)));
    let payload = json!({
        "model_image": data_url(&wide),
        "product_image": data_url(&product_png()),
        "target_height": 5000,
    });
    let (status, body) = send_json(&app, post_json("/merge-json", &payload)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "geometry_overflow");
    assert_eq!(output_count(dir.path()), 0);
}

#[tokio::test]
async fn test_unknown_format_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let payload = json!({
        "model_image": data_url(&model_png()),
        "product_image": data_url(&product_png()),
        "output_format": "gif",
    });
    let (status, body) = send_json(&app, post_json("/merge-json", &payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "parameter_out_of_range");
}

#[tokio::test]
async fn test_corrupt_product_is_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let payload = json!({
        "model_image": data_url(&model_png()),
        "product_image": data_url(b"these bytes are not a png"),
    });
    let (status, body) = send_json(&app, post_json("/merge-json", &payload)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_input");
    assert!(body["detail"].as_str().unwrap().contains("product image"));
    assert_eq!(output_count(dir.path()), 0);
}

#[tokio::test]
async fn test_malformed_json_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let request = Request::builder()
        .method("POST")
        .uri("/merge-json")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"model_image\": 1"))
        .unwrap();
    let (status, body) = send_json(&app, request).await;

    assert!(status.is_client_error());
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_multipart_upload() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let model = model_png();
    let product = product_png();
    let request = multipart(&[
        ("model_image", Some("model.png"), model.as_slice()),
        ("product_image", Some("product.png"), product.as_slice()),
        ("target_height", None, &b"120"[..]),
        ("output_format", None, &b"jpeg"[..]),
    ]);
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    // 120 * 80 / 100 = 96, 120 * 40 / 120 = 40
    assert_eq!(body["output"]["dimensions"]["width"], 136);
    assert_eq!(body["output"]["dimensions"]["height"], 120);
    let filename = body["output"]["filename"].as_str().unwrap();
    assert!(filename.ends_with(".jpg"));
    assert_eq!(output_count(dir.path()), 1);
}

#[tokio::test]
async fn test_multipart_missing_product() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let model = model_png();
    let request = multipart(&[("model_image", Some("model.png"), model.as_slice())]);
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "missing product image");
}

#[tokio::test]
async fn test_multipart_non_numeric_height() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let model = model_png();
    let product = product_png();
    let request = multipart(&[
        ("model_image", Some("model.png"), model.as_slice()),
        ("product_image", Some("product.png"), product.as_slice()),
        ("target_height", None, &b"tall"[..]),
    ]);
    let (status, _) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_output_and_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    for uri in ["/outputs/merged_missing.jpg", "/outputs/..%2FCargo.toml"] {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_cleanup_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let payload = json!({
        "model_image": data_url(&model_png()),
        "product_image": data_url(&product_png()),
        "target_height": 100,
    });
    let (status, _) = send_json(&app, post_json("/merge-json", &payload)).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::delete("/cleanup").body(Body::empty()).unwrap();
    let (_, body) = send_json(&app, request).await;
    assert_eq!(body["cleaned_outputs"], 0);

    let request = Request::delete("/cleanup?max_age_hours=0")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["cleaned_outputs"], 1);
    assert_eq!(output_count(dir.path()), 0);
}
