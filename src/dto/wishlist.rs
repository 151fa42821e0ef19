use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Wishlist, WishlistItem};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleWishlistRequest {
    pub product_id: Uuid,
    /// Defaults to the caller's `Default` wishlist.
    pub wishlist_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleWishlistResponse {
    pub wishlist_id: Uuid,
    pub product_id: Uuid,
    pub outcome: ToggleOutcome,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistView {
    pub wishlist: Wishlist,
    pub items: Vec<WishlistItem>,
}
