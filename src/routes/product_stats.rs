use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::stats::{ProductStats, StockQuantityRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    services::stock_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{product_id}", get(product_stats))
        .route("/{product_id}/sell", post(sell))
        .route("/{product_id}/restock", post(restock))
        .route("/{product_id}/stock", put(set_stock))
}

#[utoipa::path(
    get,
    path = "/api/product-stats/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Stock and sales counters", body = ApiResponse<ProductStats>),
        (status = 404, description = "Not Found"),
    ),
    tag = "Product stats"
)]
pub async fn product_stats(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductStats>>> {
    let resp = stock_service::product_stats(&state, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/product-stats/{product_id}/sell",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = StockQuantityRequest,
    responses(
        (status = 200, description = "Record a manual sale (admin)", body = ApiResponse<ProductStats>),
        (status = 400, description = "Invalid quantity"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Insufficient stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Product stats"
)]
pub async fn sell(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<StockQuantityRequest>,
) -> AppResult<Json<ApiResponse<ProductStats>>> {
    let resp = stock_service::sell(&state, &user, product_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/product-stats/{product_id}/restock",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = StockQuantityRequest,
    responses(
        (status = 200, description = "Add units to stock (admin)", body = ApiResponse<Product>),
        (status = 400, description = "Invalid quantity"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Product stats"
)]
pub async fn restock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<StockQuantityRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = stock_service::restock_product(&state, &user, product_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/product-stats/{product_id}/stock",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = StockQuantityRequest,
    responses(
        (status = 200, description = "Overwrite stock count (admin)", body = ApiResponse<Product>),
        (status = 400, description = "Invalid quantity"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Product stats"
)]
pub async fn set_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<StockQuantityRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = stock_service::set_product_stock(&state, &user, product_id, payload).await?;
    Ok(Json(resp))
}
