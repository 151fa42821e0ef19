mod common;

use common::{
    admin, checkout_request, create_product, create_variant, dec, setup_state, shipping_address,
    stock_of, user,
};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serial_test::serial;
use storefront_api::{
    dto::{
        cart::AddCartItemRequest,
        orders::{CheckoutRequest, UpdateOrderStatusRequest},
    },
    entity::{
        carts::Entity as Carts,
        orders::Entity as Orders,
        products::ActiveModel as ProductActive,
        sea_orm_active_enums::{CartStatus, OrderStatus, ProductStatus},
    },
    error::AppError,
    middleware::auth::Principal,
    routes::params::OrderListQuery,
    services::{admin_service, cart_service, checkout_service, order_service},
    state::AppState,
};
use uuid::Uuid;

async fn add(
    state: &AppState,
    principal: &Principal,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_item(
        state,
        principal,
        AddCartItemRequest {
            product_id,
            variant_id,
            quantity,
        },
    )
    .await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn checkout_snapshots_prices_and_converts_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let shirt = create_product(&state, "25.00", ProductStatus::Active).await?;
    let large = create_variant(&state, shirt.id, 5, Some("27.50")).await?;
    let socks = create_product(&state, "4.99", ProductStatus::Active).await?;
    let shopper = user();
    let principal = shopper.principal();

    add(&state, &principal, shirt.id, Some(large.id), 2).await?;
    add(&state, &principal, socks.id, None, 3).await?;

    let outcome = checkout_service::checkout(&state, &principal, checkout_request("order-1", "tok_visa")).await?;
    assert!(!outcome.replayed);
    let order = &outcome.order.order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.user_id, Some(shopper.user_id));
    assert_eq!(order.total_amount, dec("69.97"));
    assert!(order.payment_intent_id.is_some());
    let summed: rust_decimal::Decimal = outcome.order.items.iter().map(|i| i.line_total()).sum();
    assert_eq!(summed, order.total_amount);
    assert_eq!(stock_of(&state, large.id).await?, 3);

    let cart = Carts::find_by_id(order.cart_id).one(&state.orm).await?.unwrap();
    assert_eq!(cart.status, CartStatus::Converted);

    let (audited,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM audit_logs WHERE action = 'checkout' AND user_id = $1")
            .bind(shopper.user_id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(audited, 1);

    // Later catalog price changes do not touch the order.
    let mut repriced: ProductActive = shirt.into();
    repriced.price = Set(dec("99.00"));
    repriced.update(&state.orm).await?;
    let mut repriced: ProductActive = socks.into();
    repriced.price = Set(dec("0.01"));
    repriced.update(&state.orm).await?;

    let stored = order_service::get_order(&state, &shopper, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(stored.order.total_amount, dec("69.97"));
    let mut prices: Vec<_> = stored.items.iter().map(|i| i.price_at_purchase).collect();
    prices.sort();
    assert_eq!(prices, vec![dec("4.99"), dec("27.50")]);

    // The next add starts a fresh cart instead of touching the converted one.
    add(&state, &principal, stored.items[0].product_id, None, 1).await?;
    assert_eq!(Carts::find().count(&state.orm).await?, 2);
    Ok(())
}

#[tokio::test]
#[serial]
async fn insufficient_stock_creates_nothing() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "10.00", ProductStatus::Active).await?;
    let v1 = create_variant(&state, product.id, 1, None).await?;
    let principal = user().principal();
    add(&state, &principal, product.id, Some(v1.id), 2).await?;

    let err = checkout_service::checkout(&state, &principal, checkout_request("k-stock", "tok_visa"))
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock {
            variant_id,
            requested,
            available,
            ..
        } => {
            assert_eq!(variant_id, v1.id);
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    assert_eq!(stock_of(&state, v1.id).await?, 1);
    Ok(())
}

#[tokio::test]
#[serial]
async fn archived_product_blocks_checkout() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let keep = create_product(&state, "10.00", ProductStatus::Active).await?;
    let keep_variant = create_variant(&state, keep.id, 4, None).await?;
    let retired = create_product(&state, "15.00", ProductStatus::Active).await?;
    let principal = user().principal();
    add(&state, &principal, keep.id, Some(keep_variant.id), 1).await?;
    add(&state, &principal, retired.id, None, 1).await?;

    let mut archived: ProductActive = retired.clone().into();
    archived.status = Set(ProductStatus::Archived);
    archived.update(&state.orm).await?;

    let err = checkout_service::checkout(&state, &principal, checkout_request("k-archived", "tok_visa"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::ProductUnavailable { product_id, .. } if product_id == retired.id
    ));
    assert_eq!(stock_of(&state, keep_variant.id).await?, 4);
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
#[serial]
async fn empty_cart_is_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let err = checkout_service::checkout(&state, &user().principal(), checkout_request("k-empty", "tok_visa"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn concurrent_checkouts_cannot_oversell() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "40.00", ProductStatus::Active).await?;
    let v1 = create_variant(&state, product.id, 1, None).await?;
    let alice = user().principal();
    let bob = user().principal();
    add(&state, &alice, product.id, Some(v1.id), 1).await?;
    add(&state, &bob, product.id, Some(v1.id), 1).await?;

    let (a, b) = tokio::join!(
        checkout_service::checkout(&state, &alice, checkout_request("alice-1", "tok_visa")),
        checkout_service::checkout(&state, &bob, checkout_request("bob-1", "tok_visa")),
    );

    let results = [a, b];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let oversold = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InsufficientStock { .. })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(oversold, 1);
    assert_eq!(stock_of(&state, v1.id).await?, 0);
    assert_eq!(Orders::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
#[serial]
async fn payment_failures_roll_back_stock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "12.00", ProductStatus::Active).await?;
    let variant = create_variant(&state, product.id, 3, None).await?;
    let principal = user().principal();
    add(&state, &principal, product.id, Some(variant.id), 2).await?;

    let err = checkout_service::checkout(&state, &principal, checkout_request("pay-1", "tok_decline_card"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentDeclined(_)));
    assert!(!err.is_retryable());

    let err = checkout_service::checkout(&state, &principal, checkout_request("pay-1", "tok_unavailable"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentUnavailable(_)));
    assert!(err.is_retryable());

    let err = checkout_service::checkout(&state, &principal, checkout_request("pay-1", "tok_timeout"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentTimeout));
    assert!(err.is_retryable());

    assert_eq!(stock_of(&state, variant.id).await?, 3);
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    let err = checkout_service::find_by_idempotency_key(&state, &principal, "pay-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // The cart survived, so the same key can still succeed.
    let outcome = checkout_service::checkout(&state, &principal, checkout_request("pay-1", "tok_visa")).await?;
    assert!(!outcome.replayed);
    assert_eq!(stock_of(&state, variant.id).await?, 1);
    Ok(())
}

#[tokio::test]
#[serial]
async fn idempotency_key_replays_the_original_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "9.00", ProductStatus::Active).await?;
    let variant = create_variant(&state, product.id, 10, None).await?;
    let guest = Principal::Guest(Uuid::new_v4());
    add(&state, &guest, product.id, Some(variant.id), 2).await?;

    let first = checkout_service::checkout(&state, &guest, checkout_request("retry-me", "tok_visa")).await?;
    let second = checkout_service::checkout(&state, &guest, checkout_request("retry-me", "tok_visa")).await?;
    assert!(second.replayed);
    assert_eq!(first.order.order.id, second.order.order.id);
    assert_eq!(second.order.items.len(), 1);
    assert_eq!(first.order.order.user_id, None);
    assert_eq!(stock_of(&state, variant.id).await?, 8);

    let found = checkout_service::find_by_idempotency_key(&state, &guest, "retry-me").await?;
    assert_eq!(found.order.id, first.order.order.id);

    let mut changed = checkout_request("retry-me", "tok_visa");
    changed.shipping_address.city = "Paris".into();
    let err = checkout_service::checkout(&state, &guest, changed).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let stranger = Principal::Guest(Uuid::new_v4());
    let err = checkout_service::checkout(&state, &stranger, checkout_request("retry-me", "tok_visa"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let err = checkout_service::find_by_idempotency_key(&state, &stranger, "retry-me")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(Orders::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
#[serial]
async fn reused_key_with_a_new_cart_is_a_conflict() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let mug = create_product(&state, "10.00", ProductStatus::Active).await?;
    let lamp = create_product(&state, "500.00", ProductStatus::Active).await?;
    let lamp_stock = create_variant(&state, lamp.id, 5, None).await?;
    let shopper = user();
    let principal = shopper.principal();

    add(&state, &principal, mug.id, None, 1).await?;
    let first = checkout_service::checkout(&state, &principal, checkout_request("k1", "tok_visa")).await?;
    assert_eq!(first.order.order.total_amount, dec("10.00"));

    add(&state, &principal, lamp.id, Some(lamp_stock.id), 3).await?;
    let err = checkout_service::checkout(&state, &principal, checkout_request("k1", "tok_visa"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(Orders::find().count(&state.orm).await?, 1);
    assert_eq!(stock_of(&state, lamp_stock.id).await?, 5);
    let cart = cart_service::get_cart(&state, &principal).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);

    let second = checkout_service::checkout(&state, &principal, checkout_request("k2", "tok_visa")).await?;
    assert!(!second.replayed);
    assert_eq!(second.order.order.total_amount, dec("1500.00"));
    Ok(())
}

#[tokio::test]
#[serial]
async fn guest_checkout_requires_contact_email() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "9.00", ProductStatus::Active).await?;
    let guest = Principal::Guest(Uuid::new_v4());
    add(&state, &guest, product.id, None, 1).await?;

    let request = CheckoutRequest {
        idempotency_key: "guest-1".into(),
        shipping_address: shipping_address(None),
        address_id: None,
        payment_token: "tok_visa".into(),
    };
    let err = checkout_service::checkout(&state, &guest, request).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    Ok(())
}

#[tokio::test]
#[serial]
async fn admin_drives_order_status_forward_only() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "30.00", ProductStatus::Active).await?;
    let shopper = user();
    add(&state, &shopper.principal(), product.id, None, 1).await?;
    let order_id = checkout_service::checkout(&state, &shopper.principal(), checkout_request("ship-1", "tok_visa"))
        .await?
        .order
        .order
        .id;

    let staff = admin();
    let status = |status| UpdateOrderStatusRequest { status };

    let err = admin_service::update_order_status(&state, &shopper, order_id, status(OrderStatus::Processing))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = admin_service::update_order_status(&state, &staff, order_id, status(OrderStatus::Shipped))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    for next in [OrderStatus::Processing, OrderStatus::Shipped] {
        let updated = admin_service::update_order_status(&state, &staff, order_id, status(next))
            .await?
            .data
            .unwrap();
        assert_eq!(updated.status, next);
    }

    let err = admin_service::update_order_status(&state, &staff, order_id, status(OrderStatus::Cancelled))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let listed = order_service::list_orders(
        &state,
        &shopper,
        OrderListQuery {
            status: Some(OrderStatus::Shipped),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(listed.meta.unwrap().total, Some(1));
    assert_eq!(listed.data.unwrap().items[0].id, order_id);

    admin_service::update_order_status(&state, &staff, order_id, status(OrderStatus::Delivered)).await?;
    let err = admin_service::update_order_status(&state, &staff, order_id, status(OrderStatus::Processing))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = order_service::get_order(&state, &user(), order_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}
