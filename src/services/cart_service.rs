use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
    sea_query::LockType,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddCartItemRequest, CartLine, CartView, UpdateCartItemRequest},
    entity::{
        cart_items::{self, ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems},
        carts::{self, ActiveModel as CartActive, Column as CartCol, Entity as Carts},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::{Column as ProdCol, Entity as Products},
        sea_orm_active_enums::CartStatus,
    },
    error::{AppError, AppResult, ensure_positive_quantity},
    middleware::auth::{AuthUser, Principal},
    models::CartItem,
    response::{ApiResponse, Meta},
    services::catalog_service,
    state::AppState,
};

const CART_RESOLVE_ATTEMPTS: usize = 3;

fn owner_condition(principal: &Principal) -> Condition {
    match principal {
        Principal::User(id) => Condition::all().add(CartCol::UserId.eq(*id)),
        Principal::Guest(id) => Condition::all().add(CartCol::GuestId.eq(*id)),
    }
}

pub(crate) fn owns(principal: &Principal, cart: &carts::Model) -> bool {
    match principal {
        Principal::User(id) => cart.user_id == Some(*id),
        Principal::Guest(id) => cart.guest_id == Some(*id),
    }
}

/// The owner's active cart, if any. With `lock` the row is held `FOR UPDATE`
/// until the surrounding transaction ends.
pub(crate) async fn find_active_cart<C: ConnectionTrait>(
    conn: &C,
    principal: &Principal,
    lock: bool,
) -> AppResult<Option<carts::Model>> {
    let mut finder = Carts::find()
        .filter(owner_condition(principal))
        .filter(CartCol::Status.eq(CartStatus::Active));
    if lock {
        finder = finder.lock(LockType::Update);
    }
    Ok(finder.one(conn).await?)
}

/// Returns the owner's active cart locked for this transaction, creating it
/// when none exists. The partial unique index on active carts makes a
/// concurrent creator lose the insert and pick up the winner's row instead.
pub(crate) async fn lock_or_create_active_cart(
    txn: &DatabaseTransaction,
    principal: &Principal,
) -> AppResult<carts::Model> {
    for _ in 0..CART_RESOLVE_ATTEMPTS {
        if let Some(cart) = find_active_cart(txn, principal, true).await? {
            return Ok(cart);
        }
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO carts (id, user_id, guest_id, status)
            VALUES ($1, $2, $3, 'active')
            ON CONFLICT DO NOTHING
            "#,
            [
                Uuid::new_v4().into(),
                principal.user_id().into(),
                principal.guest_id().into(),
            ],
        ))
        .await?;
    }
    Err(AppError::Conflict("could not resolve an active cart".into()))
}

/// Adds `quantity` to the line for `(product, variant)`, creating it if needed.
/// A sum that would overflow the quantity column leaves the line untouched.
async fn upsert_line(
    txn: &DatabaseTransaction,
    cart_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> AppResult<cart_items::Model> {
    let line = CartItems::find()
        .from_raw_sql(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, variant_id, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (cart_id, product_id, COALESCE(variant_id, '00000000-0000-0000-0000-000000000000'::uuid))
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity,
                          updated_at = now()
            WHERE cart_items.quantity <= 2147483647 - EXCLUDED.quantity
            RETURNING *
            "#,
            [
                Uuid::new_v4().into(),
                cart_id.into(),
                product_id.into(),
                variant_id.into(),
                quantity.into(),
            ],
        ))
        .one(txn)
        .await?;
    line.ok_or_else(|| {
        AppError::InvalidArgument(format!(
            "quantity for product {product_id} would exceed the maximum of {}",
            i32::MAX
        ))
    })
}

async fn touch_cart(txn: &DatabaseTransaction, cart: carts::Model) -> AppResult<carts::Model> {
    let mut active: CartActive = cart.into();
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(txn).await?)
}

/// Locates an item through a cart the principal owns, locking that cart.
async fn find_owned_item(
    txn: &DatabaseTransaction,
    principal: &Principal,
    item_id: Uuid,
) -> AppResult<Option<(cart_items::Model, carts::Model)>> {
    let Some(item) = CartItems::find_by_id(item_id).one(txn).await? else {
        return Ok(None);
    };
    let Some(cart) = Carts::find_by_id(item.cart_id)
        .filter(owner_condition(principal))
        .lock(LockType::Update)
        .one(txn)
        .await?
    else {
        return Ok(None);
    };
    // The line may have gone away while we waited on the cart lock.
    let item = CartItems::find_by_id(item_id).one(txn).await?;
    Ok(item.map(|item| (item, cart)))
}

fn ensure_mutable(cart: &carts::Model) -> AppResult<()> {
    if cart.status.is_mutable() {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "cart {} is {:?} and can no longer change",
            cart.id, cart.status
        )))
    }
}

pub async fn add_item(
    state: &AppState,
    principal: &Principal,
    payload: AddCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_positive_quantity(payload.quantity)?;
    let listed =
        catalog_service::resolve_line(&state.orm, payload.product_id, payload.variant_id).await?;

    let txn = state.orm.begin().await?;
    let cart = lock_or_create_active_cart(&txn, principal).await?;
    let line = upsert_line(
        &txn,
        cart.id,
        payload.product_id,
        payload.variant_id,
        payload.quantity,
    )
    .await?;
    let cart = touch_cart(&txn, cart).await?;
    txn.commit().await?;

    tracing::debug!(
        cart_id = %cart.id,
        product_id = %line.product_id,
        quantity = line.quantity,
        unit_price = %listed.unit_price(),
        "cart line added"
    );
    audit::record(
        &state.pool,
        principal.user_id(),
        "cart_add",
        "cart",
        json!({
            "cart_id": cart.id,
            "product_id": payload.product_id,
            "variant_id": payload.variant_id,
            "quantity": payload.quantity,
            "unit_price": listed.unit_price(),
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to cart",
        line.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_quantity(
    state: &AppState,
    principal: &Principal,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_positive_quantity(payload.quantity)?;

    let txn = state.orm.begin().await?;
    let (item, cart) = find_owned_item(&txn, principal, item_id)
        .await?
        .ok_or(AppError::NotFound("Cart item"))?;
    ensure_mutable(&cart)?;

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.updated_at = Set(Utc::now().into());
    let item = active.update(&txn).await?;
    touch_cart(&txn, cart).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Cart updated",
        item.into(),
        Some(Meta::empty()),
    ))
}

/// Removing a line that does not exist is a no-op. Answers with the cart as it now stands.
pub async fn remove_item(
    state: &AppState,
    principal: &Principal,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let txn = state.orm.begin().await?;
    if let Some((item, cart)) = find_owned_item(&txn, principal, item_id).await? {
        ensure_mutable(&cart)?;
        CartItems::delete_by_id(item.id).exec(&txn).await?;
        touch_cart(&txn, cart).await?;
    }
    txn.commit().await?;

    let view = load_cart_view(&state.orm, principal).await?;
    Ok(ApiResponse::success(
        "Removed from cart",
        view,
        Some(Meta::empty()),
    ))
}

pub async fn get_cart(state: &AppState, principal: &Principal) -> AppResult<ApiResponse<CartView>> {
    let view = load_cart_view(&state.orm, principal).await?;
    Ok(ApiResponse::success("Cart", view, Some(Meta::empty())))
}

async fn load_cart_view<C: ConnectionTrait>(conn: &C, principal: &Principal) -> AppResult<CartView> {
    let Some(cart) = find_active_cart(conn, principal, false).await? else {
        return Ok(CartView::empty());
    };

    let items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(conn)
        .await?;

    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<_, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let variant_ids: Vec<Uuid> = items.iter().filter_map(|i| i.variant_id).collect();
    let variants: HashMap<_, _> = if variant_ids.is_empty() {
        HashMap::new()
    } else {
        ProductVariants::find()
            .filter(VariantCol::Id.is_in(variant_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect()
    };

    let mut subtotal = Decimal::ZERO;
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let Some(product) = products.get(&item.product_id) else {
            continue;
        };
        let variant = item.variant_id.and_then(|id| variants.get(&id));
        let unit_price = catalog_service::unit_price(product, variant);
        let line_total = unit_price * Decimal::from(item.quantity);
        let purchasable = product.status.is_purchasable();
        if purchasable {
            subtotal += line_total;
        }
        lines.push(CartLine {
            id: item.id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            product_name: product.name.clone(),
            quantity: item.quantity,
            unit_price,
            line_total,
            purchasable,
        });
    }

    Ok(CartView {
        cart: Some(cart.into()),
        items: lines,
        subtotal,
    })
}

/// Folds the guest's active cart into the user's, summing quantities of
/// matching lines. The guest cart ends up abandoned.
pub async fn merge_guest_cart(
    state: &AppState,
    user: &AuthUser,
    guest_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let guest = Principal::Guest(guest_id);
    let owner = user.principal();

    let txn = state.orm.begin().await?;
    let Some(guest_cart) = find_active_cart(&txn, &guest, true).await? else {
        txn.commit().await?;
        return get_cart(state, &owner).await;
    };

    let user_cart = lock_or_create_active_cart(&txn, &owner).await?;
    let items = CartItems::find()
        .filter(CartItemCol::CartId.eq(guest_cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?;
    let merged = items.len();
    for item in items {
        upsert_line(
            &txn,
            user_cart.id,
            item.product_id,
            item.variant_id,
            item.quantity,
        )
        .await?;
    }

    let guest_cart_id = guest_cart.id;
    let mut abandoned: CartActive = guest_cart.into();
    abandoned.status = Set(CartStatus::Abandoned);
    abandoned.updated_at = Set(Utc::now().into());
    abandoned.update(&txn).await?;
    touch_cart(&txn, user_cart).await?;

    let view = load_cart_view(&txn, &owner).await?;
    txn.commit().await?;

    tracing::info!(user_id = %user.user_id, %guest_cart_id, merged, "guest cart merged");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_merge",
        "cart",
        json!({ "guest_cart_id": guest_cart_id, "lines": merged }),
    )
    .await;

    Ok(ApiResponse::success("Cart merged", view, Some(Meta::empty())))
}
