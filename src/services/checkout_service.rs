use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::LockType,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutRequest, OrderWithItems},
    entity::{
        cart_items::{self, Column as CartItemCol, Entity as CartItems},
        carts::{self, ActiveModel as CartActive, Entity as Carts},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        product_variants::{self, Column as VariantCol, Entity as ProductVariants},
        products::{self, Column as ProdCol, Entity as Products},
        sea_orm_active_enums::{CartStatus, OrderStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::OrderItem,
    payment::{self, AuthorizationRequest},
    services::{cart_service, catalog_service},
    state::AppState,
};

/// Result of a checkout attempt that produced (or found) an order.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub order: OrderWithItems,
    /// True when the idempotency key matched an order created earlier.
    pub replayed: bool,
}

/// A cart line re-resolved against the catalog at checkout time.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

pub fn order_total(lines: &[PricedLine]) -> Decimal {
    lines
        .iter()
        .map(PricedLine::line_total)
        .sum::<Decimal>()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Validates one cart line against current catalog state and fixes its price.
pub fn price_line(
    item: &cart_items::Model,
    product: Option<&products::Model>,
    variant: Option<&product_variants::Model>,
) -> AppResult<PricedLine> {
    let unavailable = || AppError::ProductUnavailable {
        product_id: item.product_id,
        variant_id: item.variant_id,
    };

    let product = product
        .filter(|p| p.status.is_purchasable())
        .ok_or_else(unavailable)?;

    let variant = match item.variant_id {
        Some(variant_id) => {
            let variant = variant
                .filter(|v| v.id == variant_id && v.product_id == product.id)
                .ok_or_else(unavailable)?;
            if variant.stock_quantity < item.quantity {
                return Err(AppError::InsufficientStock {
                    product_id: product.id,
                    variant_id,
                    requested: item.quantity,
                    available: variant.stock_quantity,
                });
            }
            Some(variant)
        }
        None => None,
    };

    Ok(PricedLine {
        product_id: product.id,
        variant_id: item.variant_id,
        product_name: product.name.clone(),
        sku: variant.and_then(|v| v.sku.clone()),
        quantity: item.quantity,
        unit_price: catalog_service::unit_price(product, variant)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    })
}

async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect())
}

/// An order created under `key` by this principal, or `None` if the key is unused.
async fn find_by_key<C: ConnectionTrait>(
    conn: &C,
    principal: &Principal,
    key: &str,
) -> AppResult<Option<(orders::Model, bool)>> {
    let found = Orders::find()
        .filter(OrderCol::IdempotencyKey.eq(key))
        .find_also_related(Carts)
        .one(conn)
        .await?;
    Ok(found.map(|(order, cart)| {
        let owned = cart.is_some_and(|cart| cart_service::owns(principal, &cart));
        (order, owned)
    }))
}

/// The order to replay for `key`. The key only replays a request for the same
/// cart and shipping address: a caller who has since filled another cart gets
/// `Conflict` instead of the old order.
async fn find_replay<C: ConnectionTrait>(
    conn: &C,
    principal: &Principal,
    key: &str,
    shipping_address: &Value,
    active_cart: Option<&carts::Model>,
) -> AppResult<Option<OrderWithItems>> {
    let Some((order, owned)) = find_by_key(conn, principal, key).await? else {
        return Ok(None);
    };
    if !owned {
        return Err(AppError::Conflict(
            "idempotency key already used by another checkout".into(),
        ));
    }
    if order.shipping_address != *shipping_address {
        return Err(AppError::Conflict(
            "idempotency key reused with a different request".into(),
        ));
    }
    if let Some(cart) = active_cart.filter(|cart| cart.id != order.cart_id) {
        let pending = CartItems::find()
            .filter(CartItemCol::CartId.eq(cart.id))
            .count(conn)
            .await?;
        if pending > 0 {
            return Err(AppError::Conflict(
                "idempotency key reused for a different cart".into(),
            ));
        }
    }
    let items = load_items(conn, order.id).await?;
    Ok(Some(OrderWithItems {
        order: order.into(),
        items,
    }))
}

/// Converts the caller's active cart into a pending order. Stock decrements,
/// order rows and the cart conversion commit together only after payment is
/// authorized; any failure rolls all of them back.
pub async fn checkout(
    state: &AppState,
    principal: &Principal,
    payload: CheckoutRequest,
) -> AppResult<CheckoutOutcome> {
    payload.validate(principal)?;
    let key = payload.idempotency_key.trim().to_string();
    let shipping_address =
        serde_json::to_value(&payload.shipping_address).map_err(anyhow::Error::from)?;

    let active_cart = cart_service::find_active_cart(&state.orm, principal, false).await?;
    if let Some(order) =
        find_replay(&state.orm, principal, &key, &shipping_address, active_cart.as_ref()).await?
    {
        tracing::info!(order_id = %order.order.id, "checkout replayed");
        return Ok(CheckoutOutcome {
            order,
            replayed: true,
        });
    }

    let txn = state.orm.begin().await?;
    match place_order(&txn, state, principal, &payload, &key, shipping_address).await {
        Ok(outcome) => {
            txn.commit().await?;
            if !outcome.replayed {
                let order = &outcome.order.order;
                tracing::info!(
                    order_id = %order.id,
                    cart_id = %order.cart_id,
                    total = %order.total_amount,
                    lines = outcome.order.items.len(),
                    "order placed"
                );
                audit::record(
                    &state.pool,
                    principal.user_id(),
                    "checkout",
                    "orders",
                    json!({
                        "order_id": order.id,
                        "cart_id": order.cart_id,
                        "total_amount": order.total_amount,
                        "guest_id": principal.guest_id(),
                    }),
                )
                .await;
            }
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(error = %rollback_err, "checkout rollback failed");
            }
            tracing::warn!(error = %err, kind = err.kind(), "checkout rolled back");
            Err(err)
        }
    }
}

async fn place_order(
    txn: &DatabaseTransaction,
    state: &AppState,
    principal: &Principal,
    payload: &CheckoutRequest,
    key: &str,
    shipping_address: Value,
) -> AppResult<CheckoutOutcome> {
    let cart = cart_service::find_active_cart(txn, principal, true).await?;

    // A concurrent attempt under the same key may have finished while we waited on the cart.
    if let Some(order) = find_replay(txn, principal, key, &shipping_address, cart.as_ref()).await? {
        return Ok(CheckoutOutcome {
            order,
            replayed: true,
        });
    }

    let cart = cart.ok_or(AppError::EmptyCart)?;
    let items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(txn)
        .await?;
    if items.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let lines = resolve_lines(txn, &items).await?;

    for line in &lines {
        let Some(variant_id) = line.variant_id else {
            continue;
        };
        if !catalog_service::decrement_stock(txn, variant_id, line.quantity).await? {
            let available = ProductVariants::find_by_id(variant_id)
                .one(txn)
                .await?
                .map_or(0, |v| v.stock_quantity);
            return Err(AppError::InsufficientStock {
                product_id: line.product_id,
                variant_id,
                requested: line.quantity,
                available,
            });
        }
    }

    let total_amount = order_total(&lines);
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(principal.user_id()),
        cart_id: Set(cart.id),
        status: Set(OrderStatus::Pending),
        total_amount: Set(total_amount),
        currency: Set(state.config.currency.clone()),
        address_id: Set(payload.address_id),
        shipping_address: Set(shipping_address),
        payment_intent_id: Set(None),
        idempotency_key: Set(key.to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(txn)
    .await?;

    let mut order_items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            variant_id: Set(line.variant_id),
            product_name: Set(line.product_name.clone()),
            sku: Set(line.sku.clone()),
            quantity: Set(line.quantity),
            price_at_purchase: Set(line.unit_price),
            created_at: NotSet,
        }
        .insert(txn)
        .await?;
        order_items.push(OrderItem::from(item));
    }

    let request = AuthorizationRequest {
        order_id: order.id,
        amount: total_amount,
        currency: order.currency.clone(),
        payment_token: payload.payment_token.clone(),
        idempotency_key: key.to_string(),
    };
    let authorization =
        payment::authorize_with_timeout(state.payments.as_ref(), &request, state.config.payment_timeout)
            .await?;

    let mut active: OrderActive = order.into();
    active.payment_intent_id = Set(Some(authorization.payment_intent_id));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(txn).await?;

    convert_cart(txn, cart).await?;

    Ok(CheckoutOutcome {
        order: OrderWithItems {
            order: order.into(),
            items: order_items,
        },
        replayed: false,
    })
}

/// Re-reads every product and variant behind the cart. Variants are locked
/// in id order so concurrent checkouts sharing variants queue instead of
/// deadlocking.
async fn resolve_lines(
    txn: &DatabaseTransaction,
    items: &[cart_items::Model],
) -> AppResult<Vec<PricedLine>> {
    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<_, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut variant_ids: Vec<Uuid> = items.iter().filter_map(|i| i.variant_id).collect();
    variant_ids.sort_unstable();
    variant_ids.dedup();
    let variants: HashMap<_, _> = if variant_ids.is_empty() {
        HashMap::new()
    } else {
        ProductVariants::find()
            .filter(VariantCol::Id.is_in(variant_ids))
            .order_by_asc(VariantCol::Id)
            .lock(LockType::Update)
            .all(txn)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect()
    };

    items
        .iter()
        .map(|item| {
            price_line(
                item,
                products.get(&item.product_id),
                item.variant_id.and_then(|id| variants.get(&id)),
            )
        })
        .collect()
}

async fn convert_cart(txn: &DatabaseTransaction, cart: carts::Model) -> AppResult<()> {
    if !cart.status.can_transition_to(CartStatus::Converted) {
        return Err(AppError::InvalidState(format!(
            "cart {} cannot be converted",
            cart.id
        )));
    }
    let mut active: CartActive = cart.into();
    active.status = Set(CartStatus::Converted);
    active.updated_at = Set(Utc::now().into());
    active.update(txn).await?;
    Ok(())
}

/// Looks up the order created under an idempotency key for this caller.
pub async fn find_by_idempotency_key(
    state: &AppState,
    principal: &Principal,
    key: &str,
) -> AppResult<OrderWithItems> {
    match find_by_key(&state.orm, principal, key.trim()).await? {
        Some((order, true)) => {
            let items = load_items(&state.orm, order.id).await?;
            Ok(OrderWithItems {
                order: order.into(),
                items,
            })
        }
        _ => Err(AppError::NotFound("Order")),
    }
}
