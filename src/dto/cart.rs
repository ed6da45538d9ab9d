use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// Outcome of a decrement: the remaining line, or `None` once it is gone.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineChange {
    pub product_id: Uuid,
    pub removed: bool,
    pub line: Option<crate::models::CartLine>,
}
