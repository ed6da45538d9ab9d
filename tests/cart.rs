mod common;

use common::{create_product, create_user, data, setup_state, stock_of};
use storefront_api::{
    dto::products::UpdateProductRequest,
    error::AppError,
    models::Role,
    services::{cart_service, product_service},
};
use uuid::Uuid;

#[tokio::test]
async fn adding_the_same_product_twice_increments_the_line() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Mug", 1500, 10).await?;

    cart_service::add_item(&state.orm, user.user_id, product.id, 2).await?;
    let line = cart_service::add_item(&state.orm, user.user_id, product.id, 3).await?;
    assert_eq!(line.quantity, 5);
    assert_eq!(line.subtotal, 7500);

    let cart = cart_service::load_cart(&state.orm, user.user_id).await?;
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.item_count, 5);
    assert_eq!(cart.total, 7500);
    Ok(())
}

#[tokio::test]
async fn adding_to_cart_does_not_touch_stock() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Mug", 1500, 2).await?;

    // More than is in stock: availability is only enforced at checkout.
    cart_service::add_item(&state.orm, user.user_id, product.id, 5).await?;

    assert_eq!(stock_of(&state, product.id).await?, (2, 0));
    Ok(())
}

#[tokio::test]
async fn cart_total_follows_current_prices() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let staff = create_user(&state, Role::Moderator).await?;
    let mug = create_product(&state, "Mug", 1500, 10).await?;
    let pen = create_product(&state, "Pen", 200, 10).await?;

    cart_service::add_item(&state.orm, user.user_id, mug.id, 2).await?;
    cart_service::add_item(&state.orm, user.user_id, pen.id, 3).await?;
    assert_eq!(
        cart_service::load_cart(&state.orm, user.user_id).await?.total,
        2 * 1500 + 3 * 200
    );

    product_service::update_product(
        &state,
        &staff,
        mug.id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(1000),
        },
    )
    .await?;

    let cart = cart_service::load_cart(&state.orm, user.user_id).await?;
    assert_eq!(cart.total, 2 * 1000 + 3 * 200);
    assert_eq!(cart.total, cart.items.iter().map(|line| line.subtotal).sum::<i64>());
    Ok(())
}

#[tokio::test]
async fn decrement_removes_the_line_at_zero() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Mug", 1500, 10).await?;

    cart_service::add_item(&state.orm, user.user_id, product.id, 2).await?;

    let change = cart_service::decrement(&state.orm, user.user_id, product.id).await?;
    assert!(!change.removed);
    assert_eq!(change.line.map(|line| line.quantity), Some(1));

    let change = cart_service::decrement(&state.orm, user.user_id, product.id).await?;
    assert!(change.removed);
    assert!(change.line.is_none());

    assert!(cart_service::load_cart(&state.orm, user.user_id).await?.is_empty());
    assert!(matches!(
        cart_service::decrement(&state.orm, user.user_id, product.id).await,
        Err(AppError::NotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn update_item_overwrites_quantity() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Mug", 1500, 10).await?;

    assert!(matches!(
        cart_service::update_item(&state.orm, user.user_id, product.id, 4).await,
        Err(AppError::NotFound)
    ));

    cart_service::add_item(&state.orm, user.user_id, product.id, 1).await?;
    let line = cart_service::update_item(&state.orm, user.user_id, product.id, 4).await?;
    assert_eq!(line.quantity, 4);
    assert_eq!(line.subtotal, 6000);
    Ok(())
}

#[tokio::test]
async fn clear_item_and_clear_cart() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let other = create_user(&state, Role::User).await?;
    let mug = create_product(&state, "Mug", 1500, 10).await?;
    let pen = create_product(&state, "Pen", 200, 10).await?;

    cart_service::add_item(&state.orm, user.user_id, mug.id, 1).await?;
    cart_service::add_item(&state.orm, user.user_id, pen.id, 1).await?;
    cart_service::add_item(&state.orm, other.user_id, pen.id, 1).await?;

    cart_service::clear_item(&state.orm, user.user_id, mug.id).await?;
    assert!(matches!(
        cart_service::clear_item(&state.orm, user.user_id, mug.id).await,
        Err(AppError::NotFound)
    ));

    assert_eq!(cart_service::clear_cart(&state.orm, user.user_id).await?, 1);
    assert!(cart_service::load_cart(&state.orm, user.user_id).await?.is_empty());

    // Other carts are untouched.
    let other_cart = cart_service::load_cart(&state.orm, other.user_id).await?;
    assert_eq!(other_cart.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn rejects_bad_quantity_and_unknown_product() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Mug", 1500, 10).await?;

    assert!(matches!(
        cart_service::add_item(&state.orm, user.user_id, product.id, 0).await,
        Err(AppError::InvalidQuantity(0))
    ));
    assert!(matches!(
        cart_service::add_item(&state.orm, user.user_id, product.id, -1).await,
        Err(AppError::InvalidQuantity(-1))
    ));
    assert!(matches!(
        cart_service::add_item(&state.orm, user.user_id, Uuid::new_v4(), 1).await,
        Err(AppError::NotFound)
    ));
    assert!(cart_service::load_cart(&state.orm, user.user_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn anonymous_cart_is_empty() -> anyhow::Result<()> {
    let state = setup_state().await?;

    let cart = data(cart_service::get_cart(&state, None).await?);
    assert!(cart.user_id.is_none());
    assert!(cart.is_empty());
    assert_eq!(cart.total, 0);
    Ok(())
}

#[tokio::test]
async fn line_amounts_beyond_range_are_rejected() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::User).await?;
    let product = create_product(&state, "Gold Bar", i64::MAX / 2, 10).await?;

    cart_service::add_item(&state.orm, user.user_id, product.id, 2).await?;
    assert!(matches!(
        cart_service::add_item(&state.orm, user.user_id, product.id, 1).await,
        Err(AppError::BadRequest(_))
    ));

    // The rejected add leaves the existing line as it was.
    let cart = cart_service::load_cart(&state.orm, user.user_id).await?;
    assert_eq!(cart.item_count, 2);
    assert_eq!(cart.total, (i64::MAX / 2) * 2);
    Ok(())
}
