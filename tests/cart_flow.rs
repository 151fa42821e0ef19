mod common;

use common::{create_product, create_variant, setup_state, user};
use serial_test::serial;
use storefront_api::{
    dto::cart::{AddCartItemRequest, UpdateCartItemRequest},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::Entity as Carts,
        sea_orm_active_enums::{CartStatus, ProductStatus},
    },
    error::AppError,
    middleware::auth::Principal,
    services::cart_service,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

fn add(product_id: Uuid, variant_id: Option<Uuid>, quantity: i32) -> AddCartItemRequest {
    AddCartItemRequest {
        product_id,
        variant_id,
        quantity,
    }
}

#[tokio::test]
#[serial]
async fn repeated_adds_accumulate_on_one_line() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "19.99", ProductStatus::Active).await?;
    let variant = create_variant(&state, product.id, 10, None).await?;
    let guest = Principal::Guest(Uuid::new_v4());

    for quantity in [1, 2, 3] {
        cart_service::add_item(&state, &guest, add(product.id, Some(variant.id), quantity)).await?;
    }
    // Same product without a variant is a different line.
    cart_service::add_item(&state, &guest, add(product.id, None, 1)).await?;

    let view = cart_service::get_cart(&state, &guest).await?.data.unwrap();
    assert_eq!(view.items.len(), 2);
    let variant_line = view
        .items
        .iter()
        .find(|line| line.variant_id == Some(variant.id))
        .unwrap();
    assert_eq!(variant_line.quantity, 6);
    assert_eq!(view.subtotal, common::dec("139.93"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_adds_never_duplicate_lines_or_carts() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "5.00", ProductStatus::Active).await?;
    let guest_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        let product_id = product.id;
        handles.push(tokio::spawn(async move {
            cart_service::add_item(&state, &Principal::Guest(guest_id), add(product_id, None, 1))
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let view = cart_service::get_cart(&state, &Principal::Guest(guest_id))
        .await?
        .data
        .unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 8);
    assert_eq!(Carts::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
#[serial]
async fn add_item_preconditions() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let active = create_product(&state, "10.00", ProductStatus::Active).await?;
    let draft = create_product(&state, "10.00", ProductStatus::Draft).await?;
    let other = create_product(&state, "10.00", ProductStatus::Active).await?;
    let foreign_variant = create_variant(&state, other.id, 5, None).await?;
    let shopper = user().principal();

    let err = cart_service::add_item(&state, &shopper, add(active.id, None, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let err = cart_service::add_item(&state, &shopper, add(draft.id, None, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = cart_service::add_item(&state, &shopper, add(Uuid::new_v4(), None, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Product")));

    let err = cart_service::add_item(&state, &shopper, add(active.id, Some(foreign_variant.id), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Variant")));

    assert_eq!(CartItems::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
#[serial]
async fn update_and_remove_are_scoped_to_the_owner() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "3.50", ProductStatus::Active).await?;
    let owner = user().principal();
    let stranger = user().principal();

    let line = cart_service::add_item(&state, &owner, add(product.id, None, 2))
        .await?
        .data
        .unwrap();

    let err = cart_service::update_quantity(
        &state,
        &stranger,
        line.id,
        UpdateCartItemRequest { quantity: 5 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err =
        cart_service::update_quantity(&state, &owner, line.id, UpdateCartItemRequest { quantity: 0 })
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let updated =
        cart_service::update_quantity(&state, &owner, line.id, UpdateCartItemRequest { quantity: 5 })
            .await?
            .data
            .unwrap();
    assert_eq!(updated.quantity, 5);

    // A stranger's delete is a silent no-op.
    cart_service::remove_item(&state, &stranger, line.id).await?;
    assert_eq!(CartItems::find().count(&state.orm).await?, 1);

    cart_service::remove_item(&state, &owner, line.id).await?;
    cart_service::remove_item(&state, &owner, line.id).await?;
    assert_eq!(CartItems::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
#[serial]
async fn merge_sums_quantities_and_abandons_guest_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let p1 = create_product(&state, "8.00", ProductStatus::Active).await?;
    let p2 = create_product(&state, "2.00", ProductStatus::Active).await?;
    let guest_id = Uuid::new_v4();
    let guest = Principal::Guest(guest_id);
    let shopper = user();

    cart_service::add_item(&state, &guest, add(p1.id, None, 1)).await?;
    cart_service::add_item(&state, &guest, add(p2.id, None, 4)).await?;
    cart_service::add_item(&state, &shopper.principal(), add(p1.id, None, 2)).await?;

    let merged = cart_service::merge_guest_cart(&state, &shopper, guest_id)
        .await?
        .data
        .unwrap();
    let quantity_of = |product_id: Uuid| {
        merged
            .items
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
    };
    assert_eq!(merged.items.len(), 2);
    assert_eq!(quantity_of(p1.id), Some(3));
    assert_eq!(quantity_of(p2.id), Some(4));

    let guest_carts = Carts::find()
        .filter(storefront_api::entity::carts::Column::GuestId.eq(guest_id))
        .all(&state.orm)
        .await?;
    assert_eq!(guest_carts.len(), 1);
    assert_eq!(guest_carts[0].status, CartStatus::Abandoned);

    // Retrying the merge leaves the user's cart as it was.
    let again = cart_service::merge_guest_cart(&state, &shopper, guest_id)
        .await?
        .data
        .unwrap();
    assert_eq!(again.items.len(), 2);
    assert_eq!(again.subtotal, merged.subtotal);
    let p1_lines = CartItems::find()
        .filter(CartItemCol::ProductId.eq(p1.id))
        .all(&state.orm)
        .await?;
    let mut quantities: Vec<i32> = p1_lines.iter().map(|line| line.quantity).collect();
    quantities.sort_unstable();
    // The abandoned guest line keeps its quantity; the user line is not incremented twice.
    assert_eq!(quantities, vec![1, 3]);

    // The guest identity starts over with a fresh cart.
    let view = cart_service::get_cart(&state, &guest).await?.data.unwrap();
    assert!(view.cart.is_none());
    Ok(())
}

#[tokio::test]
#[serial]
async fn quantity_overflow_is_rejected_and_keeps_the_line() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, "1.00", ProductStatus::Active).await?;
    let guest = Principal::Guest(Uuid::new_v4());

    cart_service::add_item(&state, &guest, add(product.id, None, i32::MAX)).await?;
    let result = cart_service::add_item(&state, &guest, add(product.id, None, 1)).await;
    let Err(err) = result else {
        panic!("adding past the quantity limit should fail");
    };
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

    let view = cart_service::get_cart(&state, &guest).await?.data.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, i32::MAX);
    Ok(())
}
