use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::wishlist::{ToggleWishlistRequest, ToggleWishlistResponse, WishlistView},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::wishlist_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wishlist))
        .route("/toggle", post(toggle))
}

#[utoipa::path(
    get,
    path = "/api/wishlist",
    responses((status = 200, body = ApiResponse<WishlistView>)),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn get_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<WishlistView>>> {
    let resp = wishlist_service::get_default(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/wishlist/toggle",
    request_body = ToggleWishlistRequest,
    responses(
        (status = 200, body = ApiResponse<ToggleWishlistResponse>),
        (status = 404, description = "Unknown product or wishlist"),
        (status = 409, description = "Wishlist belongs to another user")
    ),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn toggle(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ToggleWishlistRequest>,
) -> AppResult<Json<ApiResponse<ToggleWishlistResponse>>> {
    let resp = wishlist_service::toggle(&state, &user, payload).await?;
    Ok(Json(resp))
}
