use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::{
        products::{ProductDetail, ProductList},
        reviews::{ReviewList, SubmitReviewRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Created},
    routes::params::{Pagination, ProductQuery},
    services::{catalog_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
        .route("/{id}/reviews", get(list_reviews).post(submit_review))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductQuery),
    responses((status = 200, body = ApiResponse<ProductList>)),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, body = ApiResponse<ProductDetail>),
        (status = 404, description = "Unknown or unpublished product")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let resp = catalog_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product id"), Pagination),
    responses((status = 200, body = ApiResponse<ReviewList>)),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_for_product(&state, id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = SubmitReviewRequest,
    responses(
        (status = 201, body = ApiResponse<Review>),
        (status = 400, description = "Rating outside 1..=5"),
        (status = 404, description = "Unknown product")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn submit_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitReviewRequest>,
) -> AppResult<Created<Review>> {
    review_service::submit(&state, &user, id, payload).await
}
