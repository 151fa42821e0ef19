use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    error::AppResult, middleware::auth::AuthUser, models::Review, response::ApiResponse,
    services::review_service, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/helpful", post(mark_helpful))
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/helpful",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, body = ApiResponse<Review>),
        (status = 404, description = "Unknown or unapproved review")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn mark_helpful(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::mark_helpful(&state, &user, id).await?;
    Ok(Json(resp))
}
