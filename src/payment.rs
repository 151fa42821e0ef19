//! Payment authorization collaborator.
//!
//! The checkout engine only needs a yes/no answer for an amount; card
//! handling lives with the provider. Declines are final for the given token,
//! while `Unavailable` and timeouts are worth retrying.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_token: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub payment_intent_id: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Declined(String),
    #[error("{0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, request: &AuthorizationRequest)
    -> Result<Authorization, PaymentError>;
}

/// Calls the gateway with an upper bound; running out of time is a failure, never a success.
pub async fn authorize_with_timeout(
    gateway: &dyn PaymentGateway,
    request: &AuthorizationRequest,
    limit: Duration,
) -> AppResult<Authorization> {
    match tokio::time::timeout(limit, gateway.authorize(request)).await {
        Ok(Ok(authorization)) => Ok(authorization),
        Ok(Err(PaymentError::Declined(reason))) => Err(AppError::PaymentDeclined(reason)),
        Ok(Err(PaymentError::Unavailable(reason))) => Err(AppError::PaymentUnavailable(reason)),
        Err(_) => {
            tracing::warn!(
                order_id = %request.order_id,
                timeout_ms = %limit.as_millis(),
                "payment authorization timed out"
            );
            Err(AppError::PaymentTimeout)
        }
    }
}

/// In-process gateway used for local runs and tests.
///
/// Every token is approved except the reserved prefixes `tok_decline`,
/// `tok_unavailable` and `tok_timeout` (the last one never answers).
#[derive(Debug, Default)]
pub struct SimulatedPaymentGateway {
    approved: AtomicU64,
}

impl SimulatedPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approved_count(&self) -> u64 {
        self.approved.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<Authorization, PaymentError> {
        let token = request.payment_token.as_str();
        if token.starts_with("tok_decline") {
            return Err(PaymentError::Declined("card declined".into()));
        }
        if token.starts_with("tok_unavailable") {
            return Err(PaymentError::Unavailable("provider unreachable".into()));
        }
        if token.starts_with("tok_timeout") {
            return std::future::pending().await;
        }

        let seq = self.approved.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Authorization {
            payment_intent_id: format!("pi_{}_{seq:06}", request.order_id.simple()),
        })
    }
}
