use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time: Option<NaiveTime>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time: Option<NaiveTime>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDto {
    pub id: Uuid,
    pub cart: Uuid,
    pub user: Uuid,
    pub ordered_at: DateTime<Utc>,
    pub delivery_date: NaiveDate,
    pub delivery_time: NaiveTime,
    /// Computed from the linked cart on every read, never persisted.
    pub total_order_price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderDto>,
}
