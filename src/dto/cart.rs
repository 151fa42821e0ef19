use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Cart;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MergeCartRequest {
    /// Guest identity the caller shopped under before signing in.
    pub guest_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart: Option<Cart>,
    pub items: Vec<CartLine>,
    /// Informational; checkout re-prices every line.
    pub subtotal: Decimal,
}

impl CartView {
    pub fn empty() -> Self {
        Self {
            cart: None,
            items: Vec::new(),
            subtotal: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// False when the product is no longer active; checkout would reject it.
    pub purchasable: bool,
}
