use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a shopping cart. A cart starts out `Active` and becomes
/// `Completed` exactly once, when an order is placed from it. Completed
/// carts are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Active,
    Completed,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "active",
            CartStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for CartStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CartStatus::Active),
            "completed" => Ok(CartStatus::Completed),
            other => Err(format!("unknown cart status: {other}")),
        }
    }
}

/// One cart line as needed for pricing: the quantity and the unit price of
/// the referenced product, if that product still resolves.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of line totals across a cart. A line whose product no longer
/// resolves contributes zero instead of failing the whole computation;
/// callers log the broken reference.
pub fn cart_total(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .filter_map(|line| line.unit_price.map(|price| line_total(line.quantity, price)))
        .sum()
}
