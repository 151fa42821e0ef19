#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use storefront_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    dto::orders::{CheckoutRequest, ShippingAddress},
    entity::{
        product_variants::{self, ActiveModel as VariantActive, Entity as ProductVariants},
        products::{self, ActiveModel as ProductActive},
        sea_orm_active_enums::ProductStatus,
    },
    middleware::auth::AuthUser,
    payment::SimulatedPaymentGateway,
    state::AppState,
};
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-secret";

pub fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: TEST_SECRET.into(),
        max_connections: 10,
        payment_timeout: Duration::from_millis(300),
        currency: "USD".into(),
    }
}

/// Connects, migrates and empties every table. `None` when no database is configured.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 10).await?;
    run_migrations(&pool).await?;

    sqlx::query(
        "TRUNCATE TABLE review_helpful_votes, reviews, wishlist_items, wishlists, order_items, orders, \
         cart_items, carts, product_variants, products, audit_logs RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    let config = test_config(database_url);
    Ok(Some(AppState::new(
        pool,
        Arc::new(SimulatedPaymentGateway::new()),
        config,
    )))
}

pub fn dec(raw: &str) -> Decimal {
    raw.parse().unwrap()
}

pub fn user() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    }
}

pub async fn create_product(
    state: &AppState,
    price: &str,
    status: ProductStatus,
) -> anyhow::Result<products::Model> {
    let id = Uuid::new_v4();
    let product = ProductActive {
        id: Set(id),
        name: Set(format!("Product {}", &id.simple().to_string()[..8])),
        slug: Set(format!("product-{}", id.simple())),
        description: Set(None),
        price: Set(dec(price)),
        compare_at_price: Set(None),
        status: Set(status),
        category_id: Set(None),
        brand_id: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn create_variant(
    state: &AppState,
    product_id: Uuid,
    stock: i32,
    price: Option<&str>,
) -> anyhow::Result<product_variants::Model> {
    let id = Uuid::new_v4();
    let variant = VariantActive {
        id: Set(id),
        product_id: Set(product_id),
        sku: Set(Some(format!("SKU-{}", id.simple()))),
        price: Set(price.map(dec)),
        stock_quantity: Set(stock),
        size: Set(Some("M".into())),
        color: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(variant)
}

pub async fn stock_of(state: &AppState, variant_id: Uuid) -> anyhow::Result<i32> {
    let variant = ProductVariants::find_by_id(variant_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("variant {variant_id} missing"))?;
    Ok(variant.stock_quantity)
}

pub fn shipping_address(email: Option<&str>) -> ShippingAddress {
    ShippingAddress {
        full_name: "Ada Lovelace".into(),
        line1: "12 Analytical Row".into(),
        line2: None,
        city: "London".into(),
        region: None,
        postal_code: "N1 9GU".into(),
        country: "GB".into(),
        phone: None,
        email: email.map(str::to_string),
    }
}

pub fn checkout_request(key: &str, payment_token: &str) -> CheckoutRequest {
    CheckoutRequest {
        idempotency_key: key.into(),
        shipping_address: shipping_address(Some("ada@example.com")),
        address_id: None,
        payment_token: payment_token.into(),
    }
}
