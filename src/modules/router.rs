use super::{transaction, user, wallet};
use crate::types::Context;
use axum::Router;
use std::sync::Arc;

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .nest("/users", user::routes::get_router())
        .nest("/wallets", wallet::routes::get_router())
        .nest("/transactions", transaction::routes::get_router())
}
