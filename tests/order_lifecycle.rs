mod common;

use common::{create_product, create_user, data, setup_state, stock_of};
use storefront_api::{
    dto::orders::{CheckoutRequest, OrderWithItems, UpdateOrderStatusRequest, UpdatePaymentStatusRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, PaymentStatus, Role},
    routes::params::OrderListQuery,
    services::{admin_service, cart_service, order_service},
    state::AppState,
};
use uuid::Uuid;

async fn place(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    qty: i32,
) -> anyhow::Result<OrderWithItems> {
    cart_service::add_item(&state.orm, user.user_id, product_id, qty).await?;
    let resp = order_service::checkout(
        state,
        user,
        CheckoutRequest {
            shipping_address: "22 Harbour Road".into(),
        },
    )
    .await?;
    Ok(data(resp))
}

fn status(next: OrderStatus) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest { status: next }
}

#[tokio::test]
async fn cancelling_a_pending_order_returns_stock() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Kettle", 3000, 5).await?;

    let placed = place(&state, &user, product.id, 2).await?;
    assert_eq!(stock_of(&state, product.id).await?, (3, 2));

    let cancelled = data(order_service::cancel_order(&state, &user, placed.order.id).await?);
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    // Units go back on the shelf; the sold counter never decreases.
    assert_eq!(stock_of(&state, product.id).await?, (5, 2));

    let again = order_service::cancel_order(&state, &user, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(again, AppError::InvalidTransition { .. }));
    assert_eq!(stock_of(&state, product.id).await?, (5, 2));
    Ok(())
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let product = create_product(&state, "Kettle", 3000, 5).await?;

    let placed = place(&state, &user, product.id, 1).await?;
    let id = placed.order.id;

    for next in [
        OrderStatus::Preparation,
        OrderStatus::PaymentConfirmed,
        OrderStatus::Shipped,
    ] {
        let order = data(admin_service::update_order_status(&state, &admin, id, status(next)).await?);
        assert_eq!(order.status, next);
    }

    let err = order_service::cancel_order(&state, &user, id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: "shipped",
            to: "cancelled"
        }
    ));

    let fetched = data(order_service::get_order(&state, &user, id).await?);
    assert_eq!(fetched.order.status, OrderStatus::Shipped);
    assert_eq!(stock_of(&state, product.id).await?, (4, 1));
    Ok(())
}

#[tokio::test]
async fn status_cannot_move_backwards() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let moderator = create_user(&state, Role::Moderator).await?;
    let product = create_product(&state, "Kettle", 3000, 5).await?;

    let placed = place(&state, &user, product.id, 1).await?;
    let id = placed.order.id;

    admin_service::update_order_status(&state, &moderator, id, status(OrderStatus::Shipped)).await?;
    let err = admin_service::update_order_status(&state, &moderator, id, status(OrderStatus::Pending))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let delivered = data(
        admin_service::update_order_status(&state, &moderator, id, status(OrderStatus::Delivered))
            .await?,
    );
    assert_eq!(delivered.status, OrderStatus::Delivered);
    Ok(())
}

#[tokio::test]
async fn payment_updates_set_paid_at() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let product = create_product(&state, "Kettle", 3000, 5).await?;

    let placed = place(&state, &user, product.id, 1).await?;
    let id = placed.order.id;

    let paid = data(
        admin_service::update_payment_status(
            &state,
            &admin,
            id,
            UpdatePaymentStatusRequest {
                payment_status: PaymentStatus::Paid,
            },
        )
        .await?,
    );
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(paid.status, OrderStatus::Pending);

    let err = admin_service::update_payment_status(
        &state,
        &admin,
        id,
        UpdatePaymentStatusRequest {
            payment_status: PaymentStatus::Failed,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let refunded = data(
        admin_service::update_payment_status(
            &state,
            &admin,
            id,
            UpdatePaymentStatusRequest {
                payment_status: PaymentStatus::Refunded,
            },
        )
        .await?,
    );
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    Ok(())
}

#[tokio::test]
async fn plain_users_cannot_manage_orders() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Kettle", 3000, 5).await?;

    let placed = place(&state, &user, product.id, 1).await?;
    let id = placed.order.id;

    assert!(matches!(
        admin_service::update_order_status(&state, &user, id, status(OrderStatus::Shipped)).await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        admin_service::update_payment_status(
            &state,
            &user,
            id,
            UpdatePaymentStatusRequest {
                payment_status: PaymentStatus::Paid,
            },
        )
        .await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        admin_service::dashboard(&state, &user).await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        admin_service::list_all_orders(&state, &user, OrderListQuery::default()).await,
        Err(AppError::Forbidden)
    ));
    Ok(())
}

#[tokio::test]
async fn orders_are_private_to_their_owner() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let owner = create_user(&state, Role::User).await?;
    let stranger = create_user(&state, Role::User).await?;
    let moderator = create_user(&state, Role::Moderator).await?;
    let product = create_product(&state, "Kettle", 3000, 5).await?;

    let placed = place(&state, &owner, product.id, 1).await?;
    let id = placed.order.id;

    assert!(matches!(
        order_service::get_order(&state, &stranger, id).await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        order_service::cancel_order(&state, &stranger, id).await,
        Err(AppError::NotFound)
    ));

    let mine = data(order_service::list_orders(&state, &owner, OrderListQuery::default()).await?);
    assert_eq!(mine.items.len(), 1);
    let theirs =
        data(order_service::list_orders(&state, &stranger, OrderListQuery::default()).await?);
    assert!(theirs.items.is_empty());

    let seen = data(admin_service::get_order_admin(&state, &moderator, id).await?);
    assert_eq!(seen.order.user_id, owner.user_id);

    // Staff may cancel on the customer's behalf.
    let cancelled = data(order_service::cancel_order(&state, &moderator, id).await?);
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn listing_filters_by_status() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let product = create_product(&state, "Kettle", 3000, 10).await?;

    let first = place(&state, &user, product.id, 1).await?;
    place(&state, &user, product.id, 1).await?;
    order_service::cancel_order(&state, &user, first.order.id).await?;

    let cancelled = admin_service::list_all_orders(
        &state,
        &admin,
        OrderListQuery {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(cancelled.meta.as_ref().and_then(|m| m.total), Some(1));
    assert_eq!(data(cancelled).items[0].id, first.order.id);

    let all = admin_service::list_all_orders(&state, &admin, OrderListQuery::default()).await?;
    assert_eq!(all.meta.as_ref().and_then(|m| m.total), Some(2));
    Ok(())
}

#[tokio::test]
async fn dashboard_reflects_sales() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let kettle = create_product(&state, "Kettle", 3000, 10).await?;
    let toaster = create_product(&state, "Toaster", 4500, 3).await?;

    place(&state, &user, kettle.id, 2).await?;
    let cancelled = place(&state, &user, toaster.id, 1).await?;
    order_service::cancel_order(&state, &user, cancelled.order.id).await?;

    let stats = data(admin_service::dashboard(&state, &admin).await?);
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.total_products, 2);
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.revenue, 6000);

    let count_for = |wanted: OrderStatus| {
        stats
            .orders_by_status
            .iter()
            .find(|entry| entry.status == wanted)
            .map(|entry| entry.count)
    };
    assert_eq!(count_for(OrderStatus::Pending), Some(1));
    assert_eq!(count_for(OrderStatus::Cancelled), Some(1));
    assert_eq!(count_for(OrderStatus::Shipped), Some(0));

    assert_eq!(stats.top_sellers[0].product_id, kettle.id);
    assert_eq!(stats.top_sellers[0].units_sold, 2);
    assert!(stats.low_stock.iter().any(|p| p.id == toaster.id));
    assert!(stats.low_stock.iter().all(|p| p.id != kettle.id));
    Ok(())
}
