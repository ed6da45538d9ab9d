//! Stock ledger: `quantity_in_stock` and `units_sold` per product.
//!
//! Every mutation is a single conditional `UPDATE`, so concurrent callers are
//! serialized by the row lock the database takes for it. Functions accept any
//! connection, letting checkout run them inside its transaction.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, sea_query::Expr};
use uuid::Uuid;

use crate::{
    audit,
    dto::stats::{ProductStats, StockQuantityRequest},
    entity::products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, require_admin},
    models::Product,
    response::ApiResponse,
    state::AppState,
};

/// Takes `qty` units out of stock and counts them as sold.
pub async fn reserve<C: ConnectionTrait>(conn: &C, product_id: Uuid, qty: i32) -> AppResult<()> {
    if qty <= 0 {
        return Err(AppError::InvalidQuantity(qty));
    }

    let result = Products::update_many()
        .col_expr(
            ProdCol::QuantityInStock,
            Expr::col(ProdCol::QuantityInStock).sub(qty),
        )
        .col_expr(ProdCol::UnitsSold, Expr::col(ProdCol::UnitsSold).add(qty))
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::QuantityInStock.gte(qty))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let product = find_product(conn, product_id).await?;
        return Err(AppError::InsufficientStock {
            product_id,
            requested: qty,
            available: product.quantity_in_stock,
        });
    }

    tracing::debug!(%product_id, qty, "stock reserved");
    Ok(())
}

pub async fn restock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    qty: i32,
) -> AppResult<ProductModel> {
    if qty <= 0 {
        return Err(AppError::InvalidQuantity(qty));
    }
    add_to_stock(conn, product_id, qty).await?;
    find_product(conn, product_id).await
}

/// Returns units of a cancelled order. `units_sold` is monotonic and stays as is.
pub async fn release<C: ConnectionTrait>(conn: &C, product_id: Uuid, qty: i32) -> AppResult<()> {
    if qty <= 0 {
        return Err(AppError::InvalidQuantity(qty));
    }
    add_to_stock(conn, product_id, qty).await
}

/// Administrative overwrite of the stock count.
pub async fn set_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    qty: i32,
) -> AppResult<ProductModel> {
    if qty < 0 {
        return Err(AppError::InvalidQuantity(qty));
    }

    let result = Products::update_many()
        .col_expr(ProdCol::QuantityInStock, Expr::value(qty))
        .filter(ProdCol::Id.eq(product_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    find_product(conn, product_id).await
}

async fn add_to_stock<C: ConnectionTrait>(conn: &C, product_id: Uuid, qty: i32) -> AppResult<()> {
    let result = Products::update_many()
        .col_expr(
            ProdCol::QuantityInStock,
            Expr::col(ProdCol::QuantityInStock).add(qty),
        )
        .filter(ProdCol::Id.eq(product_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    tracing::debug!(%product_id, qty, "stock added");
    Ok(())
}

async fn find_product<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn product_stats(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<ProductStats>> {
    let product = find_product(&state.orm, product_id).await?;
    Ok(ApiResponse::ok("Product stats", ProductStats::from(product)))
}

/// Manual sale recorded by an admin. Uses the same ledger path as checkout.
pub async fn sell(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: StockQuantityRequest,
) -> AppResult<ApiResponse<ProductStats>> {
    require_admin(user)?;
    reserve(&state.orm, product_id, payload.quantity).await?;
    let product = find_product(&state.orm, product_id).await?;

    tracing::info!(%product_id, quantity = payload.quantity, "manual sale recorded");
    audit::record(
        &state.orm,
        user.user_id,
        "product_sell",
        "products",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::ok("Sale recorded", ProductStats::from(product)))
}

pub async fn restock_product(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: StockQuantityRequest,
) -> AppResult<ApiResponse<Product>> {
    require_admin(user)?;
    let product = restock(&state.orm, product_id, payload.quantity).await?;

    tracing::info!(%product_id, quantity = payload.quantity, "product restocked");
    audit::record(
        &state.orm,
        user.user_id,
        "product_restock",
        "products",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::ok("Restocked", Product::from(product)))
}

pub async fn set_product_stock(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: StockQuantityRequest,
) -> AppResult<ApiResponse<Product>> {
    require_admin(user)?;
    let product = set_stock(&state.orm, product_id, payload.quantity).await?;

    tracing::info!(%product_id, quantity = payload.quantity, "stock overwritten");
    audit::record(
        &state.orm,
        user.user_id,
        "product_set_stock",
        "products",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::ok("Stock updated", Product::from(product)))
}
