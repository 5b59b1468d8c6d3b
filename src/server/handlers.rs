//! Route handlers.

use std::io::ErrorKind as IoErrorKind;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::compositor::{self, MergeRequest, Size};
use crate::error::{Error, Input};
use crate::image::{self, ImageSource, OutputFormat};

use super::params::{self, RawParams};
use super::response::{timestamp, ApiError, CleanupResponse, Dimensions, MergeResponse, OutputInfo};
use super::AppState;

pub async fn root() -> Json<Value> {
    let formats: Vec<&str> = OutputFormat::ALL.iter().map(|f| f.extension()).collect();
    Json(json!({
        "message": "Image Merger API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /merge": "Merge two uploaded images (multipart)",
            "POST /merge-json": "Merge two images given as URLs or base64 (JSON)",
            "GET /outputs/:filename": "Fetch a merged image",
            "DELETE /cleanup": "Remove old outputs",
            "GET /health": "Health check",
        },
        "output_formats": formats,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": timestamp() }))
}

/// `POST /merge`: multipart upload of both images.
pub async fn merge_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MergeResponse>, ApiError> {
    let mut model = None;
    let mut product = None;
    let mut target_height = None;
    let mut output_format = None;
    let mut layout = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "model_image" => model = Some(field.bytes().await?),
            "product_image" => product = Some(field.bytes().await?),
            "target_height" => target_height = Some(field.text().await?),
            "output_format" => output_format = Some(field.text().await?),
            "layout" => layout = Some(field.text().await?),
            other => tracing::debug!("Ignoring multipart field {other:?}"),
        }
    }

    let raw = RawParams {
        target_height: target_height
            .as_deref()
            .map(params::parse_target_height)
            .transpose()?
            .flatten(),
        output_format: output_format.as_deref(),
        layout: layout.as_deref(),
    };
    let request = raw.validate(&state.config)?;

    let model = model
        .filter(|bytes| !bytes.is_empty())
        .ok_or(Error::MissingInput(Input::Model))?;
    let product = product
        .filter(|bytes| !bytes.is_empty())
        .ok_or(Error::MissingInput(Input::Product))?;

    let response = run_merge(&state, model.to_vec(), product.to_vec(), request).await?;
    Ok(Json(response))
}

/// Body of `POST /merge-json`.
#[derive(Debug, Deserialize)]
pub struct MergeJsonBody {
    /// URL, data URL, or raw base64.
    pub model_image: String,
    /// URL, data URL, or raw base64.
    pub product_image: String,
    pub target_height: Option<i64>,
    pub output_format: Option<String>,
    pub layout: Option<String>,
}

/// `POST /merge-json`: both images as URLs or base64 strings.
pub async fn merge_json(
    State(state): State<AppState>,
    payload: Result<Json<MergeJsonBody>, JsonRejection>,
) -> Result<Json<MergeResponse>, ApiError> {
    let Json(body) = payload?;

    let raw = RawParams {
        target_height: body.target_height,
        output_format: body.output_format.as_deref(),
        layout: body.layout.as_deref(),
    };
    let request = raw.validate(&state.config)?;

    let model = ImageSource::parse(&body.model_image, Input::Model)?;
    let product = ImageSource::parse(&body.product_image, Input::Product)?;
    drop(body);

    let (model, product) = tokio::try_join!(
        state.loader.resolve(model, Input::Model),
        state.loader.resolve(product, Input::Product),
    )?;

    let response = run_merge(&state, model, product, request).await?;
    Ok(Json(response))
}

/// Decode, merge, encode on the blocking pool, then store the result.
///
/// The canvas size is planned from the image headers and checked against
/// the configured pixel budget before any pixel data is decoded.
async fn run_merge(
    state: &AppState,
    model: Vec<u8>,
    product: Vec<u8>,
    request: MergeRequest,
) -> Result<MergeResponse, ApiError> {
    let max_pixels = state.config.max_canvas_pixels;

    let (encoded, width, height) = tokio::task::spawn_blocking(move || {
        let (model_width, model_height) = image::peek_dimensions(&model, Input::Model)?;
        let (product_width, product_height) = image::peek_dimensions(&product, Input::Product)?;
        let layout = compositor::plan(
            Size::new(model_width, model_height),
            Size::new(product_width, product_height),
            request.target_height,
            request.layout,
        )?;
        compositor::check_pixel_budget(layout.canvas, max_pixels)?;

        let model_image = image::decode(&model, Input::Model)?;
        drop(model);
        let product_image = image::decode(&product, Input::Product)?;
        drop(product);

        let composite = compositor::merge(model_image, product_image, &request)?;
        let encoded = composite.encode()?;
        Ok::<_, Error>((encoded, composite.width(), composite.height()))
    })
    .await
    .map_err(|err| ApiError::internal(format!("merge task failed: {err}")))??;

    let stored = state.store.store(&encoded, request.format).await?;

    tracing::info!(
        "Merged {width}x{height} {} with {} -> {}",
        request.format,
        request.layout,
        stored.filename
    );

    Ok(MergeResponse {
        success: true,
        message: "Images merged successfully",
        output: OutputInfo {
            url: state.output_url(&stored.filename),
            filename: stored.filename,
            dimensions: Dimensions { width, height },
            format: request.format.to_string(),
            layout: request.layout.as_str(),
        },
        timestamp: timestamp(),
    })
}

/// `GET /outputs/:filename`.
pub async fn get_output(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .store
        .resolve(&filename)
        .ok_or_else(|| ApiError::not_found("Image not found"))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == IoErrorKind::NotFound => {
            return Err(ApiError::not_found("Image not found"));
        }
        Err(err) => return Err(Error::from(err).into()),
    };

    let format = OutputFormat::from_path(&path);
    let mime = format.map_or("application/octet-stream", OutputFormat::mime_type);
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub max_age_hours: Option<u64>,
}

/// `DELETE /cleanup`.
pub async fn cleanup(
    State(state): State<AppState>,
    query: Result<Query<CleanupQuery>, QueryRejection>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let Query(query) = query?;
    let max_age = match query.max_age_hours {
        Some(hours) => Duration::from_secs(hours.saturating_mul(3600)),
        None => state.config.retention,
    };

    let cleaned_outputs = state.store.cleanup(max_age).await?;
    tracing::info!("Manual cleanup removed {cleaned_outputs} outputs");

    Ok(Json(CleanupResponse {
        success: true,
        cleaned_outputs,
    }))
}
