use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, create_orm_conn},
    payment::PaymentGateway,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub payments: Arc<dyn PaymentGateway>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: DbPool, payments: Arc<dyn PaymentGateway>, config: AppConfig) -> Self {
        Self {
            orm: create_orm_conn(&pool),
            pool,
            payments,
            config: Arc::new(config),
        }
    }
}
