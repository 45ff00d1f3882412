use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CreateProduct, Product},
    AppState,
};

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_products(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<Vec<Product>>)> {
    let start = Instant::now();
    let products = state.store.list().await?;
    let elapsed = start.elapsed();

    info!(
        count = products.len(),
        elapsed_ms = elapsed.as_millis(),
        "Listed products"
    );

    Ok((StatusCode::OK, Json(products)))
}

// ── Create ────────────────────────────────────────────────────────────────────

/// Every failure on this path, store errors included, is reported as 400.
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProduct>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected product payload");
        AppError::BadRequest(rejection.body_text())
    })?;

    let new_product = payload.validate().map_err(|message| {
        warn!(error = %message, "Product failed validation");
        AppError::BadRequest(message)
    })?;

    let start = Instant::now();
    let product = state
        .store
        .insert(&new_product)
        .await
        .map_err(AppError::into_bad_request)?;
    let elapsed = start.elapsed();

    info!(
        id = %product.id,
        name = %product.name,
        elapsed_ms = elapsed.as_millis(),
        "Created product"
    );

    Ok((StatusCode::CREATED, Json(product)))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

/// A malformed id is a server error, not a 400: the lookup itself failed.
pub async fn get_product(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let id = Uuid::parse_str(&raw_id)
        .map_err(|e| AppError::Internal(format!("invalid product id \"{}\": {}", raw_id, e)))?;

    let start = Instant::now();
    let product = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    let elapsed = start.elapsed();

    info!(id = %id, elapsed_ms = elapsed.as_millis(), "Fetched product");

    Ok((StatusCode::OK, Json(product)))
}
