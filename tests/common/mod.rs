#![allow(dead_code)]

use std::path::PathBuf;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, EntityTrait, Set};
use storefront_api::{
    db::run_migrations,
    entity::{
        products::{ActiveModel as ProductActive, Entity as Products, Model as ProductModel},
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    models::Role,
    response::ApiResponse,
    state::AppState,
};
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret";

/// Fresh in-memory SQLite database with the production schema applied.
pub async fn setup_state() -> anyhow::Result<AppState> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // A single connection keeps every query on the same in-memory database.
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(options).await?;
    run_migrations(&orm).await?;
    Ok(AppState::new(orm, TEST_SECRET))
}

/// File-backed SQLite database served by a pool of `max_connections`, so
/// concurrent callers run on separate connections. The file is removed on drop.
pub struct PooledState {
    pub state: AppState,
    path: PathBuf,
}

impl Drop for PooledState {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub async fn setup_pooled_state(max_connections: u32) -> anyhow::Result<PooledState> {
    let path = std::env::temp_dir().join(format!("storefront-test-{}.db", Uuid::new_v4()));
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options
        .max_connections(max_connections)
        .min_connections(max_connections)
        .sqlx_logging(false);
    let orm = Database::connect(options).await?;
    run_migrations(&orm).await?;
    Ok(PooledState {
        state: AppState::new(orm, TEST_SECRET),
        path,
    })
}

pub async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        password_hash: Set("dummy".into()),
        role: Set(role.as_str().into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser { user_id: id, role })
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<ProductModel> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        description: Set(Some(format!("{name} for testing"))),
        price: Set(price),
        quantity_in_stock: Set(stock),
        units_sold: Set(0),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

/// `(quantity_in_stock, units_sold)` as currently stored.
pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<(i32, i32)> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} missing"))?;
    Ok((product.quantity_in_stock, product.units_sold))
}

pub fn data<T>(resp: ApiResponse<T>) -> T {
    resp.data.expect("response data")
}
