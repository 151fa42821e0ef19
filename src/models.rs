use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    cart_items, carts, order_items, orders, product_variants, products, reviews,
    sea_orm_active_enums::{CartStatus, OrderStatus, ProductStatus, ReviewStatus},
    wishlist_items, wishlists,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub status: ProductStatus,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            price: model.price,
            compare_at_price: model.compare_at_price,
            status: model.status,
            category_id: model.category_id,
            brand_id: model.brand_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub stock_quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl From<product_variants::Model> for ProductVariant {
    fn from(model: product_variants::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            sku: model.sku,
            price: model.price,
            stock_quantity: model.stock_quantity,
            size: model.size,
            color: model.color,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_id: Option<Uuid>,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<carts::Model> for Cart {
    fn from(model: carts::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            guest_id: model.guest_id,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<cart_items::Model> for CartItem {
    fn from(model: cart_items::Model) -> Self {
        Self {
            id: model.id,
            cart_id: model.cart_id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            quantity: model.quantity,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub cart_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub currency: String,
    pub address_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub shipping_address: serde_json::Value,
    pub payment_intent_id: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            cart_id: model.cart_id,
            status: model.status,
            total_amount: model.total_amount,
            currency: model.currency,
            address_id: model.address_id,
            shipping_address: model.shipping_address,
            payment_intent_id: model.payment_intent_id,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub sku: Option<String>,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.price_at_purchase * Decimal::from(self.quantity)
    }
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            product_name: model.product_name,
            sku: model.sku,
            quantity: model.quantity,
            price_at_purchase: model.price_at_purchase,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Wishlist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<wishlists::Model> for Wishlist {
    fn from(model: wishlists::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            is_public: model.is_public,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WishlistItem {
    pub id: Uuid,
    pub wishlist_id: Uuid,
    pub product_id: Uuid,
    pub added_at: DateTime<Utc>,
}

impl From<wishlist_items::Model> for WishlistItem {
    fn from(model: wishlist_items::Model) -> Self {
        Self {
            id: model.id,
            wishlist_id: model.wishlist_id,
            product_id: model.product_id,
            added_at: model.added_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_verified_purchase: bool,
    pub status: ReviewStatus,
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<reviews::Model> for Review {
    fn from(model: reviews::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            product_id: model.product_id,
            rating: model.rating,
            title: model.title,
            content: model.content,
            is_verified_purchase: model.is_verified_purchase,
            status: model.status,
            helpful_count: model.helpful_count,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
