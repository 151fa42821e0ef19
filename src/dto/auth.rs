use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims carried by bearer tokens issued by the identity service.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
