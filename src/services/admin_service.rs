use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest, UpdatePaymentStatusRequest},
        products::ProductList,
        stats::{DashboardStats, ProductStats, StatusCount},
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, require_staff},
    models::{Order, OrderStatus, Product},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, OrderListQuery},
    services::order_service,
    state::AppState,
};

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;
const TOP_SELLERS: u64 = 5;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    require_staff(user)?;
    order_service::paged_orders(state, Orders::find(), query).await
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    require_staff(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let data = order_service::with_items(&state.orm, order).await?;
    Ok(ApiResponse::ok("Order found", data))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    require_staff(user)?;

    let txn = state.orm.begin().await?;
    let existing = match Orders::find_by_id(id).one(&txn).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            txn.rollback().await?;
            return Err(AppError::NotFound);
        }
        Err(err) => {
            txn.rollback().await?;
            return Err(err.into());
        }
    };
    let order = order_service::commit_transition(txn, existing, payload.status).await?;

    audit::record(
        &state.orm,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    Ok(ApiResponse::ok("Order updated", order))
}

pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    require_staff(user)?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let order =
        order_service::transition_payment(&state.orm, existing, payload.payment_status).await?;

    audit::record(
        &state.orm,
        user.user_id,
        "order_payment_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "payment_status": order.payment_status }),
    )
    .await;

    Ok(ApiResponse::ok("Payment updated", order))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    require_staff(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let pagination = query.pagination();
    let (_, limit, offset) = pagination.normalize();

    let finder = Products::find()
        .filter(ProdCol::QuantityInStock.lte(threshold))
        .order_by_asc(ProdCol::QuantityInStock)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(Meta::paged(&pagination, total)),
    ))
}

pub async fn dashboard(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<DashboardStats>> {
    require_staff(user)?;

    let total_users = Users::find().count(&state.orm).await? as i64;
    let total_products = Products::find().count(&state.orm).await? as i64;
    let total_orders = Orders::find().count(&state.orm).await? as i64;

    let mut orders_by_status = Vec::with_capacity(OrderStatus::ALL.len());
    for status in OrderStatus::ALL {
        let count = Orders::find()
            .filter(OrderCol::Status.eq(status.as_str()))
            .count(&state.orm)
            .await? as i64;
        orders_by_status.push(StatusCount { status, count });
    }

    let revenue = Orders::find()
        .select_only()
        .column(OrderCol::TotalAmount)
        .filter(OrderCol::Status.ne(OrderStatus::Cancelled.as_str()))
        .into_tuple::<i64>()
        .all(&state.orm)
        .await?
        .into_iter()
        .fold(0i64, i64::saturating_add);

    let top_sellers = Products::find()
        .filter(ProdCol::UnitsSold.gt(0))
        .order_by_desc(ProdCol::UnitsSold)
        .limit(TOP_SELLERS)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductStats::from)
        .collect();

    let low_stock = Products::find()
        .filter(ProdCol::QuantityInStock.lte(DEFAULT_LOW_STOCK_THRESHOLD))
        .order_by_asc(ProdCol::QuantityInStock)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::ok(
        "Dashboard",
        DashboardStats {
            total_users,
            total_products,
            total_orders,
            orders_by_status,
            revenue,
            top_sellers,
            low_stock,
        },
    ))
}
