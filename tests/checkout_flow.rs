mod common;

use common::{create_product, create_user, data, setup_pooled_state, setup_state, stock_of};
use sea_orm::{EntityTrait, PaginatorTrait};
use storefront_api::{
    dto::{orders::CheckoutRequest, products::UpdateProductRequest},
    entity::{OrderItems, Orders},
    error::AppError,
    models::{OrderStatus, PaymentStatus, Role},
    services::{cart_service, order_service, product_service},
};

fn address() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: "1 Market Street".into(),
    }
}

#[tokio::test]
async fn checkout_reserves_stock_and_empties_the_cart() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Lamp", 1000, 5).await?;

    cart_service::add_item(&state.orm, user.user_id, product.id, 3).await?;
    let placed = data(order_service::checkout(&state, &user, address()).await?);

    assert_eq!(placed.order.total_amount, 3000);
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.payment_status, PaymentStatus::Pending);
    assert!(placed.order.paid_at.is_none());
    assert!(placed.order.order_number.starts_with("ORD-"));
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].unit_price, 1000);
    assert_eq!(placed.items[0].quantity, 3);
    assert_eq!(placed.items[0].subtotal, 3000);

    assert_eq!(stock_of(&state, product.id).await?, (2, 3));
    assert!(cart_service::load_cart(&state.orm, user.user_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_places_nothing() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Lamp", 1000, 1).await?;

    cart_service::add_item(&state.orm, user.user_id, product.id, 2).await?;
    let err = order_service::checkout(&state, &user, address())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));
    assert_eq!(stock_of(&state, product.id).await?, (1, 0));
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    // The cart survives a failed checkout.
    assert_eq!(
        cart_service::load_cart(&state.orm, user.user_id).await?.item_count,
        2
    );
    Ok(())
}

#[tokio::test]
async fn failure_on_a_later_line_rolls_back_earlier_reservations() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let plenty = create_product(&state, "Chair", 500, 10).await?;
    let scarce = create_product(&state, "Table", 9000, 1).await?;

    cart_service::add_item(&state.orm, user.user_id, plenty.id, 4).await?;
    cart_service::add_item(&state.orm, user.user_id, scarce.id, 2).await?;

    let err = order_service::checkout(&state, &user, address())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    assert_eq!(stock_of(&state, plenty.id).await?, (10, 0));
    assert_eq!(stock_of(&state, scarce.id).await?, (1, 0));
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    assert_eq!(OrderItems::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn empty_cart_and_blank_address_are_rejected() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;

    assert!(matches!(
        order_service::checkout(&state, &user, address()).await,
        Err(AppError::EmptyCart)
    ));

    let product = create_product(&state, "Lamp", 1000, 5).await?;
    cart_service::add_item(&state.orm, user.user_id, product.id, 1).await?;
    let blank = CheckoutRequest {
        shipping_address: "   ".into(),
    };
    assert!(matches!(
        order_service::checkout(&state, &user, blank).await,
        Err(AppError::BadRequest(_))
    ));
    assert_eq!(stock_of(&state, product.id).await?, (5, 0));
    Ok(())
}

#[tokio::test]
async fn order_lines_keep_their_price_snapshot() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let staff = create_user(&state, Role::Admin).await?;
    let product = create_product(&state, "Lamp", 1000, 5).await?;

    cart_service::add_item(&state.orm, user.user_id, product.id, 2).await?;
    let placed = data(order_service::checkout(&state, &user, address()).await?);

    product_service::update_product(
        &state,
        &staff,
        product.id,
        UpdateProductRequest {
            name: Some("Desk Lamp".into()),
            description: None,
            price: Some(2500),
        },
    )
    .await?;

    let fetched = data(order_service::get_order(&state, &user, placed.order.id).await?);
    assert_eq!(fetched.order.total_amount, 2000);
    assert_eq!(fetched.items[0].unit_price, 1000);
    assert_eq!(fetched.items[0].product_name, "Lamp");
    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_for_the_last_unit() -> anyhow::Result<()> {
    let pooled = setup_pooled_state(2).await?;
    let state = &pooled.state;
    let alice = create_user(state, Role::User).await?;
    let bob = create_user(state, Role::User).await?;
    let product = create_product(state, "Last One", 4200, 1).await?;

    cart_service::add_item(&state.orm, alice.user_id, product.id, 1).await?;
    cart_service::add_item(&state.orm, bob.user_id, product.id, 1).await?;

    let (first, second) = tokio::join!(
        order_service::checkout(state, &alice, address()),
        order_service::checkout(state, &bob, address()),
    );

    let outcomes = [first.is_ok(), second.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    // SQLite may report the overlapping writer as a lock error instead of
    // letting it see the emptied stock.
    let failure = first.err().or(second.err());
    assert!(matches!(
        failure,
        Some(AppError::InsufficientStock { .. } | AppError::OrmError(_))
    ));

    assert_eq!(stock_of(state, product.id).await?, (0, 1));
    assert_eq!(Orders::find().count(&state.orm).await?, 1);
    assert_eq!(OrderItems::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
async fn oversized_totals_are_rejected_before_stock_moves() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let big = i64::MAX / 2 + 1;
    let first = create_product(&state, "Gold Bar", big, 5).await?;
    let second = create_product(&state, "Platinum Bar", big, 5).await?;

    cart_service::add_item(&state.orm, user.user_id, first.id, 1).await?;
    cart_service::add_item(&state.orm, user.user_id, second.id, 1).await?;

    let err = order_service::checkout(&state, &user, address())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert_eq!(stock_of(&state, first.id).await?, (5, 0));
    assert_eq!(stock_of(&state, second.id).await?, (5, 0));
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    Ok(())
}
