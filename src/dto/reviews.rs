use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::sea_orm_active_enums::ReviewStatus,
    error::{AppError, AppResult},
    models::Review,
};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitReviewRequest {
    pub rating: i32,
    pub title: Option<String>,
    pub content: Option<String>,
}

impl SubmitReviewRequest {
    pub fn validate(&self) -> AppResult<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(AppError::InvalidArgument(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {}",
                self.rating
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ModerateReviewRequest {
    pub status: ReviewStatus,
}

/// Aggregate over approved reviews only.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RatingSummary {
    pub product_id: Uuid,
    pub average: Option<Decimal>,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub summary: RatingSummary,
    pub items: Vec<Review>,
}
