use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::BadRequest(format!("unknown role {other}"))),
        }
    }
}

/// Fulfilment status of an order.
///
/// ```text
/// pending -> preparation -> payment_confirmed -> shipped -> delivered
///    |            |                 |
///    +------------+-----------------+--> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparation,
    PaymentConfirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Preparation,
        OrderStatus::PaymentConfirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparation => "preparation",
            OrderStatus::PaymentConfirmed => "payment_confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Position on the forward fulfilment chain; `None` for `Cancelled`.
    fn stage(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Preparation => Some(1),
            OrderStatus::PaymentConfirmed => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Cancellation is only allowed before the order ships.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Preparation | OrderStatus::PaymentConfirmed
        )
    }

    /// Validates a move to `next` and returns it.
    pub fn transition_to(self, next: OrderStatus) -> Result<OrderStatus, AppError> {
        let allowed = match (self.stage(), next.stage()) {
            (_, None) => self.can_cancel(),
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(AppError::InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::BadRequest(format!("invalid order status {s}")))
    }
}

/// Payment sub-state, tracked separately from fulfilment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn transition_to(self, next: PaymentStatus) -> Result<PaymentStatus, AppError> {
        use PaymentStatus::*;
        match (self, next) {
            (Pending, Paid) | (Pending, Failed) | (Paid, Refunded) | (Failed, Refunded) => {
                Ok(next)
            }
            _ => Err(AppError::InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            }),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::BadRequest(format!("invalid payment status {s}")))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Minor currency units.
    pub price: i64,
    pub quantity_in_stock: i32,
    pub units_sold: i32,
    pub created_at: DateTime<Utc>,
}

/// `unit_price × quantity` in minor units; amounts beyond `i64` are rejected.
pub fn line_subtotal(unit_price: i64, quantity: i32) -> Result<i64, AppError> {
    unit_price
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| AppError::BadRequest("amount out of range".into()))
}

pub fn sum_amounts(amounts: impl IntoIterator<Item = i64>) -> Result<i64, AppError> {
    amounts
        .into_iter()
        .try_fold(0i64, i64::checked_add)
        .ok_or_else(|| AppError::BadRequest("amount out of range".into()))
}

/// Cart line priced at read time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub user_id: Option<Uuid>,
    pub items: Vec<CartLine>,
    pub total: i64,
    pub item_count: i64,
}

impl Cart {
    pub fn empty(user_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            total: 0,
            item_count: 0,
        }
    }

    pub fn from_lines(user_id: Uuid, items: Vec<CartLine>) -> Result<Self, AppError> {
        let total = sum_amounts(items.iter().map(|line| line.subtotal))?;
        let item_count = items.iter().map(|line| i64::from(line.quantity)).sum();
        Ok(Self {
            user_id: Some(user_id),
            items,
            total,
            item_count,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: String,
    pub total_amount: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

fn utc(at: sea_orm::prelude::DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

impl From<crate::entity::products::Model> for Product {
    fn from(model: crate::entity::products::Model) -> Self {
        Product {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            quantity_in_stock: model.quantity_in_stock,
            units_sold: model.units_sold,
            created_at: utc(model.created_at),
        }
    }
}

impl TryFrom<crate::entity::users::Model> for User {
    type Error = AppError;

    fn try_from(model: crate::entity::users::Model) -> Result<Self, Self::Error> {
        Ok(User {
            id: model.id,
            email: model.email,
            role: model.role.parse()?,
            created_at: utc(model.created_at),
        })
    }
}

impl TryFrom<crate::entity::orders::Model> for Order {
    type Error = AppError;

    fn try_from(model: crate::entity::orders::Model) -> Result<Self, Self::Error> {
        Ok(Order {
            id: model.id,
            user_id: model.user_id,
            order_number: model.order_number,
            status: model.status.parse()?,
            payment_status: model.payment_status.parse()?,
            shipping_address: model.shipping_address,
            total_amount: model.total_amount,
            paid_at: model.paid_at.map(utc),
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
        })
    }
}

impl From<crate::entity::order_items::Model> for OrderItem {
    fn from(model: crate::entity::order_items::Model) -> Self {
        OrderItem {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name: model.product_name,
            unit_price: model.unit_price,
            quantity: model.quantity,
            subtotal: model.subtotal,
        }
    }
}
