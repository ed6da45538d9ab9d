use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartLineChange, UpdateCartItemRequest},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartLine, line_subtotal},
    response::ApiResponse,
    state::AppState,
};

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn line_for(product: &ProductModel, quantity: i32) -> AppResult<CartLine> {
    Ok(CartLine {
        product_id: product.id,
        product_name: product.name.clone(),
        unit_price: product.price,
        quantity,
        subtotal: line_subtotal(product.price, quantity)?,
    })
}

fn owned_line(user_id: Uuid, product_id: Uuid) -> Condition {
    Condition::all()
        .add(CartCol::UserId.eq(user_id))
        .add(CartCol::ProductId.eq(product_id))
}

async fn find_product<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Loads the cart, pricing each line with the product's current price.
pub async fn load_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Cart> {
    let rows = CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(conn)
        .await?;

    let lines = rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|p| line_for(&p, item.quantity)))
        .collect::<AppResult<Vec<_>>>()?;

    Cart::from_lines(user_id, lines)
}

/// Adds `qty` to the line, creating it on first add. Stock is not checked here.
pub async fn add_item<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
    qty: i32,
) -> AppResult<CartLine> {
    if qty <= 0 {
        return Err(AppError::InvalidQuantity(qty));
    }
    let product = find_product(conn, product_id).await?;

    let current = CartItems::find()
        .filter(owned_line(user_id, product_id))
        .one(conn)
        .await?
        .map_or(0, |item| item.quantity);
    let quantity = current
        .checked_add(qty)
        .ok_or(AppError::InvalidQuantity(qty))?;
    line_for(&product, quantity)?;

    let updated = CartItems::update_many()
        .col_expr(CartCol::Quantity, Expr::col(CartCol::Quantity).add(qty))
        .col_expr(CartCol::UpdatedAt, Expr::value(now()))
        .filter(owned_line(user_id, product_id))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        let stamp = now();
        CartActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(qty),
            created_at: Set(stamp),
            updated_at: Set(stamp),
        }
        .insert(conn)
        .await?;
    }

    let quantity = line_quantity(conn, user_id, product_id).await?;
    line_for(&product, quantity)
}

/// Overwrites the quantity of an existing line.
pub async fn update_item<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
    qty: i32,
) -> AppResult<CartLine> {
    if qty <= 0 {
        return Err(AppError::InvalidQuantity(qty));
    }
    let product = find_product(conn, product_id).await?;
    let line = line_for(&product, qty)?;

    let result = CartItems::update_many()
        .col_expr(CartCol::Quantity, Expr::value(qty))
        .col_expr(CartCol::UpdatedAt, Expr::value(now()))
        .filter(owned_line(user_id, product_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(line)
}

/// Lowers the line by one unit, dropping it when it would reach zero.
pub async fn decrement<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<CartLineChange> {
    let item = CartItems::find()
        .filter(owned_line(user_id, product_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    if item.quantity <= 1 {
        CartItems::delete_by_id(item.id).exec(conn).await?;
        return Ok(CartLineChange {
            product_id,
            removed: true,
            line: None,
        });
    }

    let quantity = item.quantity - 1;
    let mut active: CartActive = item.into();
    active.quantity = Set(quantity);
    active.updated_at = Set(now());
    active.update(conn).await?;

    let product = find_product(conn, product_id).await?;
    Ok(CartLineChange {
        product_id,
        removed: false,
        line: Some(line_for(&product, quantity)?),
    })
}

/// Removes the line whatever its quantity.
pub async fn clear_item<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<()> {
    let result = CartItems::delete_many()
        .filter(owned_line(user_id, product_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Empties the cart and returns how many lines were removed.
pub async fn clear_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<u64> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

async fn line_quantity<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<i32> {
    CartItems::find()
        .filter(owned_line(user_id, product_id))
        .one(conn)
        .await?
        .map(|item| item.quantity)
        .ok_or(AppError::NotFound)
}

pub async fn get_cart(state: &AppState, user: Option<&AuthUser>) -> AppResult<ApiResponse<Cart>> {
    let cart = match user {
        Some(user) => load_cart(&state.orm, user.user_id).await?,
        None => Cart::empty(None),
    };
    Ok(ApiResponse::ok("OK", cart))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartLine>> {
    let line = add_item(&state.orm, user.user_id, payload.product_id, payload.quantity).await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::ok("Added to cart", line))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartLine>> {
    let line = update_item(&state.orm, user.user_id, product_id, payload.quantity).await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::ok("Cart updated", line))
}

pub async fn decrement_cart_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartLineChange>> {
    let change = decrement(&state.orm, user.user_id, product_id).await?;
    Ok(ApiResponse::ok("Cart updated", change))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    clear_item(&state.orm, user.user_id, product_id).await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::ok("Removed from cart", serde_json::json!({})))
}

pub async fn empty_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let removed = clear_cart(&state.orm, user.user_id).await?;
    Ok(ApiResponse::ok(
        "Cart cleared",
        serde_json::json!({ "removed": removed }),
    ))
}
