use std::sync::Arc;

use super::repository::{self, TransactionKind};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    modules::{auth::middleware::Auth, wallet},
    types::Context,
    utils::pagination::Pagination,
};

#[derive(Deserialize)]
struct ListTransactionsFilters {
    kind: Option<String>,
}

// One filtered listing covers top-up, payment, transfer and withdrawal
// history for the caller's wallet.
async fn get_transactions(
    auth: Auth,
    State(ctx): State<Arc<Context>>,
    pagination: Pagination,
    Query(filters): Query<ListTransactionsFilters>,
) -> impl IntoResponse {
    let kind = match filters.kind {
        None => None,
        Some(raw) => match raw.parse::<TransactionKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid transaction kind" })),
                )
            }
        },
    };

    let wallet = match wallet::repository::find_by_owner_id(&ctx.db_conn.pool, auth.user.id).await {
        Ok(Some(wallet)) => wallet,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Wallet not found" })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch wallet" })),
            )
        }
    };

    match repository::find_many_by_wallet_id(&ctx.db_conn.pool, wallet.id, kind, pagination).await {
        Ok(paginated_transactions) => (StatusCode::OK, Json(json!(paginated_transactions))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch transactions" })),
        ),
    }
}

async fn get_transaction_by_id(
    auth: Auth,
    Path(id): Path<String>,
    State(ctx): State<Arc<Context>>,
) -> impl IntoResponse {
    let wallet = match wallet::repository::find_by_owner_id(&ctx.db_conn.pool, auth.user.id).await {
        Ok(Some(wallet)) => wallet,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Wallet not found" })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch wallet" })),
            )
        }
    };

    match repository::find_by_id(&ctx.db_conn.pool, id).await {
        Ok(Some(transaction)) if transaction.involves(wallet.id.as_str()) => {
            (StatusCode::OK, Json(json!(transaction)))
        }
        Ok(Some(_)) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Access denied" })),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Transaction not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch transaction" })),
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_transactions))
        .route("/:id", get(get_transaction_by_id))
}
