use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, QueryOrder, Statement,
};
use uuid::Uuid;

use crate::{
    dto::wishlist::{ToggleOutcome, ToggleWishlistRequest, ToggleWishlistResponse, WishlistView},
    entity::{
        wishlist_items::{Column as WishlistItemCol, Entity as WishlistItems},
        wishlists::{self, Column as WishlistCol, Entity as Wishlists},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::WishlistItem,
    response::{ApiResponse, Meta},
    services::catalog_service,
    state::AppState,
};

pub const DEFAULT_WISHLIST: &str = "Default";
const TOGGLE_ATTEMPTS: usize = 8;

/// The user's default wishlist, created on first use.
async fn default_wishlist<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<wishlists::Model> {
    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO wishlists (id, user_id, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, name) DO NOTHING
        "#,
        [Uuid::new_v4().into(), user_id.into(), DEFAULT_WISHLIST.into()],
    ))
    .await?;

    Wishlists::find()
        .filter(WishlistCol::UserId.eq(user_id))
        .filter(WishlistCol::Name.eq(DEFAULT_WISHLIST))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("default wishlist vanished")))
}

async fn owned_wishlist<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    wishlist_id: Uuid,
) -> AppResult<wishlists::Model> {
    let wishlist = Wishlists::find_by_id(wishlist_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Wishlist"))?;
    if wishlist.user_id != user_id {
        return Err(AppError::InvalidState(format!(
            "wishlist {wishlist_id} belongs to another user"
        )));
    }
    Ok(wishlist)
}

/// One toggle step against the item row. When the insert conflicts but the
/// delete finds nothing, another toggle removed the row in between and the
/// insert is tried again.
async fn toggle_item(state: &AppState, wishlist_id: Uuid, product_id: Uuid) -> AppResult<ToggleOutcome> {
    for _ in 0..TOGGLE_ATTEMPTS {
        let inserted = state
            .orm
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO wishlist_items (id, wishlist_id, product_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (wishlist_id, product_id) DO NOTHING
                "#,
                [Uuid::new_v4().into(), wishlist_id.into(), product_id.into()],
            ))
            .await?
            .rows_affected();
        if inserted == 1 {
            return Ok(ToggleOutcome::Added);
        }

        let removed = WishlistItems::delete_many()
            .filter(WishlistItemCol::WishlistId.eq(wishlist_id))
            .filter(WishlistItemCol::ProductId.eq(product_id))
            .exec(&state.orm)
            .await?
            .rows_affected;
        if removed > 0 {
            return Ok(ToggleOutcome::Removed);
        }
    }
    Err(AppError::Conflict(format!(
        "wishlist item for product {product_id} kept changing, retry the toggle"
    )))
}

/// Flips membership of a product. The insert is attempted first and only a
/// uniqueness conflict turns the call into a removal, so concurrent toggles
/// never leave two rows behind.
pub async fn toggle(
    state: &AppState,
    user: &AuthUser,
    payload: ToggleWishlistRequest,
) -> AppResult<ApiResponse<ToggleWishlistResponse>> {
    catalog_service::find_product(&state.orm, payload.product_id).await?;

    let wishlist = match payload.wishlist_id {
        Some(id) => owned_wishlist(&state.orm, user.user_id, id).await?,
        None => default_wishlist(&state.orm, user.user_id).await?,
    };

    let outcome = toggle_item(state, wishlist.id, payload.product_id).await?;

    tracing::debug!(
        wishlist_id = %wishlist.id,
        product_id = %payload.product_id,
        ?outcome,
        "wishlist toggled"
    );

    let message = match outcome {
        ToggleOutcome::Added => "Added to wishlist",
        ToggleOutcome::Removed => "Removed from wishlist",
    };
    Ok(ApiResponse::success(
        message,
        ToggleWishlistResponse {
            wishlist_id: wishlist.id,
            product_id: payload.product_id,
            outcome,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_default(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<WishlistView>> {
    let wishlist = default_wishlist(&state.orm, user.user_id).await?;
    let items = WishlistItems::find()
        .filter(WishlistItemCol::WishlistId.eq(wishlist.id))
        .order_by_desc(WishlistItemCol::AddedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(WishlistItem::from)
        .collect();

    Ok(ApiResponse::success(
        "Wishlist",
        WishlistView {
            wishlist: wishlist.into(),
            items,
        },
        Some(Meta::empty()),
    ))
}
