use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{OrderStatus, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductStats {
    pub product_id: Uuid,
    pub name: String,
    pub quantity_in_stock: i32,
    pub units_sold: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub orders_by_status: Vec<StatusCount>,
    /// Sum of `total_amount` over orders that were not cancelled.
    pub revenue: i64,
    pub top_sellers: Vec<ProductStats>,
    pub low_stock: Vec<Product>,
}

impl From<crate::entity::products::Model> for ProductStats {
    fn from(model: crate::entity::products::Model) -> Self {
        ProductStats {
            product_id: model.id,
            name: model.name,
            quantity_in_stock: model.quantity_in_stock,
            units_sold: model.units_sold,
        }
    }
}
