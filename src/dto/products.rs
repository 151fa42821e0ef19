use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::reviews::RatingSummary,
    models::{Product, ProductVariant},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    pub product: Product,
    pub variants: Vec<ProductVariant>,
    pub rating: RatingSummary,
}
