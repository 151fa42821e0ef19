use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::sea_orm_active_enums::OrderStatus,
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::{Order, OrderItem},
};

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ShippingAddress {
    fn validate(&self) -> AppResult<()> {
        let required = [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::InvalidArgument(format!(
                    "shipping_address.{field} is required"
                )));
            }
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(AppError::InvalidArgument(
                    "shipping_address.email is not an email address".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Client-generated token; retrying with the same key returns the same order.
    pub idempotency_key: String,
    pub shipping_address: ShippingAddress,
    pub address_id: Option<Uuid>,
    pub payment_token: String,
}

impl CheckoutRequest {
    pub fn validate(&self, principal: &Principal) -> AppResult<()> {
        let key = self.idempotency_key.trim();
        if key.is_empty() || key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(AppError::InvalidArgument(format!(
                "idempotency_key must be 1..={MAX_IDEMPOTENCY_KEY_LEN} characters"
            )));
        }
        if self.payment_token.trim().is_empty() {
            return Err(AppError::InvalidArgument("payment_token is required".into()));
        }
        self.shipping_address.validate()?;
        // Guest orders carry no user id, so the address is the only way to reach the buyer.
        if principal.is_guest() && self.shipping_address.email.is_none() {
            return Err(AppError::InvalidArgument(
                "shipping_address.email is required for guest checkout".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Lovelace".into(),
            line1: "12 St James's Square".into(),
            line2: None,
            city: "London".into(),
            region: None,
            postal_code: "SW1Y 4JH".into(),
            country: "GB".into(),
            phone: None,
            email: Some("ada@example.com".into()),
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            idempotency_key: "cart-1:attempt-1".into(),
            shipping_address: address(),
            address_id: None,
            payment_token: "tok_visa".into(),
        }
    }

    #[test]
    fn complete_request_is_valid() {
        assert!(request().validate(&Principal::User(Uuid::new_v4())).is_ok());
        assert!(request().validate(&Principal::Guest(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn idempotency_key_is_bounded() {
        let user = Principal::User(Uuid::new_v4());
        let mut req = request();
        req.idempotency_key = "  ".into();
        assert!(req.validate(&user).is_err());
        req.idempotency_key = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(req.validate(&user).is_err());
        req.idempotency_key = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN);
        assert!(req.validate(&user).is_ok());
    }

    #[test]
    fn idempotency_key_limit_counts_characters() {
        let user = Principal::User(Uuid::new_v4());
        let mut req = request();
        req.idempotency_key = "é".repeat(MAX_IDEMPOTENCY_KEY_LEN);
        assert!(req.validate(&user).is_ok());
        req.idempotency_key = "é".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(req.validate(&user).is_err());
    }

    #[test]
    fn guest_checkout_needs_contact_email() {
        let mut req = request();
        req.shipping_address.email = None;
        assert!(req.validate(&Principal::User(Uuid::new_v4())).is_ok());
        assert!(matches!(
            req.validate(&Principal::Guest(Uuid::new_v4())),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn blank_address_fields_are_rejected() {
        let mut req = request();
        req.shipping_address.city = " ".into();
        let err = req.validate(&Principal::User(Uuid::new_v4())).unwrap_err();
        assert!(err.to_string().contains("city"));
    }

    #[test]
    fn missing_payment_token_is_rejected() {
        let mut req = request();
        req.payment_token = String::new();
        assert!(req.validate(&Principal::User(Uuid::new_v4())).is_err());
    }
}
