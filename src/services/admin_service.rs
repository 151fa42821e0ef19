use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, EntityTrait, QuerySelect, Set, TransactionTrait, sea_query::LockType,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::{orders::UpdateOrderStatusRequest, reviews::ModerateReviewRequest},
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders},
        reviews::{ActiveModel as ReviewActive, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, Review},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Moves an order along its fulfilment state machine.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    let from = order.status;
    if from.is_terminal() {
        return Err(AppError::InvalidState(format!(
            "order {order_id} is already {from:?}"
        )));
    }
    if !from.can_transition_to(payload.status) {
        return Err(AppError::InvalidState(format!(
            "order cannot move from {from:?} to {:?}",
            payload.status
        )));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(%order_id, ?from, to = ?order.status, "order status changed");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        json!({ "order_id": order_id, "from": from, "to": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order.into(),
        Some(Meta::empty()),
    ))
}

/// Approves or rejects a pending review. Decided reviews stay decided.
pub async fn moderate_review(
    state: &AppState,
    user: &AuthUser,
    review_id: Uuid,
    payload: ModerateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let review = Reviews::find_by_id(review_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Review"))?;

    let from = review.status;
    if !from.can_transition_to(payload.status) {
        return Err(AppError::InvalidState(format!(
            "review cannot move from {from:?} to {:?}",
            payload.status
        )));
    }

    let mut active: ReviewActive = review.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let review = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "review_moderated",
        "reviews",
        json!({ "review_id": review_id, "status": review.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review moderated",
        review.into(),
        Some(Meta::empty()),
    ))
}
