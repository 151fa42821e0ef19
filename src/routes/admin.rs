use axum::{
    Json, Router,
    extract::{Path, State},
    routing::patch,
};
use uuid::Uuid;

use crate::{
    dto::{orders::UpdateOrderStatusRequest, reviews::ModerateReviewRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Order, Review},
    response::ApiResponse,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/reviews/{id}", patch(moderate_review))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, body = ApiResponse<Order>),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Illegal status transition")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = admin_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = ModerateReviewRequest,
    responses(
        (status = 200, body = ApiResponse<Review>),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Review already moderated")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn moderate_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ModerateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = admin_service::moderate_review(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
