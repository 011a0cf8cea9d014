use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{CartStatus, Product};

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    /// Defaults to 1 when omitted.
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveFromCartRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub cart: Uuid,
    pub product: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineDto {
    pub product_id: Uuid,
    /// None when the referenced product no longer exists; the line then
    /// contributes zero to the cart total.
    pub product: Option<Product>,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart_id: Option<Uuid>,
    pub status: Option<CartStatus>,
    pub items: Vec<CartLineDto>,
    pub total_price: Decimal,
}
