use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, Statement,
    TransactionTrait, sea_query::Expr,
};
use serde_json::json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::reviews::{RatingSummary, ReviewList, SubmitReviewRequest},
    entity::{
        order_items::{self, Column as OrderItemCol, Entity as OrderItems},
        orders::Column as OrderCol,
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
        sea_orm_active_enums::{OrderStatus, ReviewStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Created, Meta},
    routes::params::Pagination,
    services::catalog_service,
    state::AppState,
};

#[derive(FromRow)]
struct RatingRow {
    average: Option<Decimal>,
    count: i64,
}

/// Average (2 dp) and count over approved reviews only.
pub async fn rating_summary(pool: &DbPool, product_id: Uuid) -> AppResult<RatingSummary> {
    let row = sqlx::query_as::<_, RatingRow>(
        r#"
        SELECT ROUND(AVG(rating)::numeric, 2) AS average, COUNT(*) AS count
        FROM reviews
        WHERE product_id = $1 AND status = 'approved'
        "#,
    )
    .bind(product_id)
    .fetch_one(pool)
    .await?;

    Ok(RatingSummary {
        product_id,
        average: row.average,
        count: row.count,
    })
}

/// Whether the user has a delivered order containing the product.
pub async fn has_delivered_purchase<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<bool> {
    let count = OrderItems::find()
        .join(JoinType::InnerJoin, order_items::Relation::Orders.def())
        .filter(OrderCol::UserId.eq(user_id))
        .filter(OrderCol::Status.eq(OrderStatus::Delivered))
        .filter(OrderItemCol::ProductId.eq(product_id))
        .count(conn)
        .await?;
    Ok(count > 0)
}

pub async fn submit(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: SubmitReviewRequest,
) -> AppResult<Created<Review>> {
    payload.validate()?;
    catalog_service::find_product(&state.orm, product_id).await?;
    let verified = has_delivered_purchase(&state.orm, user.user_id, product_id).await?;

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(product_id),
        rating: Set(payload.rating),
        title: Set(payload.title),
        content: Set(payload.content),
        is_verified_purchase: Set(verified),
        status: Set(ReviewStatus::Pending),
        helpful_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::debug!(review_id = %review.id, %product_id, verified, "review submitted");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "review_submit",
        "reviews",
        json!({ "review_id": review.id, "product_id": product_id }),
    )
    .await;

    Ok(Created(ApiResponse::success(
        "Review submitted",
        review.into(),
        Some(Meta::empty()),
    )))
}

pub async fn list_for_product(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    catalog_service::find_product(&state.orm, product_id).await?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .filter(ReviewCol::Status.eq(ReviewStatus::Approved))
        .order_by_desc(ReviewCol::HelpfulCount)
        .order_by_desc(ReviewCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    let summary = rating_summary(&state.pool, product_id).await?;
    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { summary, items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Records one helpful vote per user; repeat votes leave the count alone.
pub async fn mark_helpful(
    state: &AppState,
    user: &AuthUser,
    review_id: Uuid,
) -> AppResult<ApiResponse<Review>> {
    let txn = state.orm.begin().await?;
    Reviews::find_by_id(review_id)
        .filter(ReviewCol::Status.eq(ReviewStatus::Approved))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Review"))?;

    let voted = txn
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO review_helpful_votes (review_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
            [review_id.into(), user.user_id.into()],
        ))
        .await?
        .rows_affected();

    if voted == 1 {
        Reviews::update_many()
            .col_expr(ReviewCol::HelpfulCount, Expr::col(ReviewCol::HelpfulCount).add(1))
            .filter(ReviewCol::Id.eq(review_id))
            .exec(&txn)
            .await?;
    }

    let review = Reviews::find_by_id(review_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Review"))?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Thanks for your feedback",
        review.into(),
        Some(Meta::empty()),
    ))
}
