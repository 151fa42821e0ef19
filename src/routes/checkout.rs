use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::orders::{CheckoutRequest, OrderWithItems},
    error::AppResult,
    middleware::auth::Principal,
    response::{ApiResponse, Created, Meta},
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout))
        .route("/{key}", get(get_by_key))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    params(("x-guest-id" = Option<uuid::Uuid>, Header, description = "Guest identity when not signed in")),
    responses(
        (status = 201, description = "Order created, or replayed for a known idempotency key", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Invalid request or empty cart"),
        (status = 402, description = "Payment declined"),
        (status = 409, description = "Unavailable product, insufficient stock or idempotency conflict"),
        (status = 503, description = "Payment provider unavailable"),
        (status = 504, description = "Payment authorization timed out")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Created<OrderWithItems>> {
    let outcome = checkout_service::checkout(&state, &principal, payload).await?;
    let message = if outcome.replayed {
        "Order replayed"
    } else {
        "Order created"
    };
    Ok(Created(ApiResponse::success(
        message,
        outcome.order,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/checkout/{key}",
    params(
        ("key" = String, Path, description = "Idempotency key used at checkout"),
        ("x-guest-id" = Option<uuid::Uuid>, Header, description = "Guest identity when not signed in")
    ),
    responses(
        (status = 200, body = ApiResponse<OrderWithItems>),
        (status = 404, description = "No order under this key for the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn get_by_key(
    State(state): State<AppState>,
    principal: Principal,
    Path(key): Path<String>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let order = checkout_service::find_by_idempotency_key(&state, &principal, &key).await?;
    Ok(Json(ApiResponse::success("Ok", order, Some(Meta::empty()))))
}
