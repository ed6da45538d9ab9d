use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, PaymentStatus, line_subtotal, sum_amounts},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, stock_service},
    state::AppState,
};

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

/// Turns the user's cart into an order. Must run inside a transaction: on
/// error the caller rolls back, undoing every reservation already made.
pub async fn place_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    shipping_address: &str,
) -> AppResult<OrderWithItems> {
    let rows = CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .find_also_related(Products)
        .all(conn)
        .await?;

    let mut lines: Vec<_> = rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|p| (item, p)))
        .collect();
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }
    // Stable lock order across concurrent checkouts.
    lines.sort_by_key(|(_, product)| product.id);

    // Priced before any stock moves.
    let subtotals = lines
        .iter()
        .map(|(item, product)| line_subtotal(product.price, item.quantity))
        .collect::<AppResult<Vec<_>>>()?;
    let total_amount = sum_amounts(subtotals.iter().copied())?;

    for (item, product) in &lines {
        stock_service::reserve(conn, product.id, item.quantity).await?;
    }

    let order_id = Uuid::new_v4();
    let created_at = now();

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user_id),
        order_number: Set(build_order_number(order_id)),
        status: Set(OrderStatus::Pending.as_str().to_owned()),
        payment_status: Set(PaymentStatus::Pending.as_str().to_owned()),
        shipping_address: Set(shipping_address.to_owned()),
        total_amount: Set(total_amount),
        paid_at: Set(None),
        created_at: Set(created_at),
        updated_at: Set(created_at),
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for ((item, product), subtotal) in lines.iter().zip(subtotals) {
        let snapshot = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(product.id),
            product_name: Set(product.name.clone()),
            unit_price: Set(product.price),
            quantity: Set(item.quantity),
            subtotal: Set(subtotal),
            created_at: Set(created_at),
        }
        .insert(conn)
        .await?;
        items.push(OrderItem::from(snapshot));
    }

    cart_service::clear_cart(conn, user_id).await?;

    Ok(OrderWithItems {
        order: Order::try_from(order)?,
        items,
    })
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let address = payload.shipping_address.trim();
    if address.is_empty() {
        return Err(AppError::BadRequest("shipping_address is required".into()));
    }

    let txn = state.orm.begin().await?;
    let placed = match place_order(&txn, user.user_id, address).await {
        Ok(placed) => placed,
        Err(err) => {
            txn.rollback().await?;
            tracing::info!(user_id = %user.user_id, error = %err, "checkout rejected");
            return Err(err);
        }
    };
    txn.commit().await?;

    tracing::info!(
        user_id = %user.user_id,
        order_id = %placed.order.id,
        total = placed.order.total_amount,
        "checkout completed"
    );
    audit::record(
        &state.orm,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({ "order_id": placed.order.id }),
    )
    .await;

    Ok(ApiResponse::ok("Checkout success", placed))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let finder = Orders::find().filter(OrderCol::UserId.eq(user.user_id));
    paged_orders(state, finder, query).await
}

/// Shared listing for own and all orders.
pub(crate) async fn paged_orders(
    state: &AppState,
    finder: Select<Orders>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let pagination = query.pagination();
    let (_, limit, offset) = pagination.normalize();

    let mut finder = finder;
    if let Some(status) = query.status {
        finder = finder.filter(OrderCol::Status.eq(status.as_str()));
    }
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::paged(&pagination, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let data = with_items(&state.orm, order).await?;
    Ok(ApiResponse::ok("OK", data))
}

/// Cancels an order owned by the caller; staff may cancel any order.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let order = match find_visible(&txn, user, id).await {
        Ok(order) => order,
        Err(err) => {
            txn.rollback().await?;
            return Err(err);
        }
    };
    let order = commit_transition(txn, order, OrderStatus::Cancelled).await?;

    audit::record(
        &state.orm,
        user.user_id,
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::ok("Order cancelled", order))
}

async fn find_visible<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    if order.user_id != user.user_id && !user.is_staff() {
        return Err(AppError::NotFound);
    }
    Ok(order)
}

/// Runs [`transition_status`] in `txn`, committing on success and rolling
/// back on failure.
pub(crate) async fn commit_transition(
    txn: DatabaseTransaction,
    order: OrderModel,
    next: OrderStatus,
) -> AppResult<Order> {
    match transition_status(&txn, order, next).await {
        Ok(order) => {
            txn.commit().await?;
            Ok(order)
        }
        Err(err) => {
            txn.rollback().await?;
            Err(err)
        }
    }
}

/// Moves `order` to `next` if the state machine allows it. The write only
/// applies while the stored status still matches the one validated, so a
/// concurrent transition makes this one fail. Cancelling hands the ordered
/// quantities back to the stock ledger.
pub async fn transition_status<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
    next: OrderStatus,
) -> AppResult<Order> {
    let current: OrderStatus = order.status.parse()?;
    current.transition_to(next)?;

    let result = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(next.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now()))
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(current.as_str()))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::InvalidTransition {
            from: current.as_str(),
            to: next.as_str(),
        });
    }

    if next == OrderStatus::Cancelled {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order.id))
            .all(conn)
            .await?;
        for item in items {
            stock_service::release(conn, item.product_id, item.quantity).await?;
        }
    }

    tracing::info!(
        order_id = %order.id,
        from = current.as_str(),
        to = next.as_str(),
        "order status changed"
    );
    reload(conn, order.id).await
}

/// Applies a payment transition with the same compare-and-set guard.
pub async fn transition_payment<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
    next: PaymentStatus,
) -> AppResult<Order> {
    let current: PaymentStatus = order.payment_status.parse()?;
    current.transition_to(next)?;

    let mut update = Orders::update_many()
        .col_expr(OrderCol::PaymentStatus, Expr::value(next.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now()));
    if next == PaymentStatus::Paid {
        update = update.col_expr(OrderCol::PaidAt, Expr::value(now()));
    }
    let result = update
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::PaymentStatus.eq(current.as_str()))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::InvalidTransition {
            from: current.as_str(),
            to: next.as_str(),
        });
    }

    tracing::info!(
        order_id = %order.id,
        from = current.as_str(),
        to = next.as_str(),
        "payment status changed"
    );
    reload(conn, order.id).await
}

async fn reload<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Order> {
    let order = Orders::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    Order::try_from(order)
}

pub(crate) async fn with_items<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::ProductId)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(OrderWithItems {
        order: Order::try_from(order)?,
        items,
    })
}

fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string().to_uppercase();
    format!("ORD-{}-{}", date, &suffix[..8])
}
