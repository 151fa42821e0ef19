use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddCartItemRequest, CartView, MergeCartRequest, UpdateCartItemRequest},
    error::AppResult,
    middleware::auth::{AuthUser, Principal},
    models::CartItem,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/{id}", patch(update_item).delete(remove_item))
        .route("/merge", post(merge_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses((status = 200, body = ApiResponse<CartView>)),
    params(("x-guest-id" = Option<Uuid>, Header, description = "Guest identity when not signed in")),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::get_cart(&state, &principal).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddCartItemRequest,
    params(("x-guest-id" = Option<Uuid>, Header, description = "Guest identity when not signed in")),
    responses(
        (status = 200, body = ApiResponse<CartItem>),
        (status = 400, description = "Quantity below 1"),
        (status = 404, description = "Unknown product or variant"),
        (status = 409, description = "Product is not active")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<AddCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::add_item(&state, &principal, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/items/{id}",
    request_body = UpdateCartItemRequest,
    params(
        ("id" = Uuid, Path, description = "Cart item id"),
        ("x-guest-id" = Option<Uuid>, Header, description = "Guest identity when not signed in")
    ),
    responses(
        (status = 200, body = ApiResponse<CartItem>),
        (status = 404, description = "Item is not in the caller's cart"),
        (status = 409, description = "Cart already converted")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::update_quantity(&state, &principal, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{id}",
    params(
        ("id" = Uuid, Path, description = "Cart item id"),
        ("x-guest-id" = Option<Uuid>, Header, description = "Guest identity when not signed in")
    ),
    responses((status = 200, description = "Cart after removal; unknown items are ignored", body = ApiResponse<CartView>)),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::remove_item(&state, &principal, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/merge",
    request_body = MergeCartRequest,
    responses((status = 200, body = ApiResponse<CartView>)),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn merge_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<MergeCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::merge_guest_cart(&state, &user, payload.guest_id).await?;
    Ok(Json(resp))
}
