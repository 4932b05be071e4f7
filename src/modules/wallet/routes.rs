use std::sync::Arc;

use super::{repository, service};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{modules::auth::middleware::Auth, types::Context};

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

// Optional caller-supplied idempotency key. Replaying a request with the same
// key returns the original outcome instead of applying the mutation again.
pub struct IdempotencyKey(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKey {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(IDEMPOTENCY_KEY_HEADER) {
            None => Ok(Self(None)),
            Some(value) => value
                .to_str()
                .map(|key| Self(Some(key.to_string())))
                .map_err(|_| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "Invalid idempotency key" })),
                    )
                        .into_response()
                }),
        }
    }
}

async fn get_wallet_by_profile(auth: Auth, State(ctx): State<Arc<Context>>) -> impl IntoResponse {
    match repository::find_by_owner_id(&ctx.db_conn.pool, auth.user.id).await {
        Ok(Some(wallet)) => (StatusCode::OK, Json(json!(wallet))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Wallet not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch wallet" })),
        ),
    }
}

async fn get_wallet_by_id(
    auth: Auth,
    Path(id): Path<String>,
    State(ctx): State<Arc<Context>>,
) -> impl IntoResponse {
    match repository::find_by_id(&ctx.db_conn.pool, id).await {
        Ok(Some(wallet)) if wallet.owner_id == auth.user.id => {
            (StatusCode::OK, Json(json!(wallet)))
        }
        Ok(Some(_)) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Access denied" })),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Wallet not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch wallet" })),
        ),
    }
}

async fn delete_wallet_by_id(
    auth: Auth,
    Path(id): Path<String>,
    State(ctx): State<Arc<Context>>,
) -> impl IntoResponse {
    match repository::find_by_id(&ctx.db_conn.pool, id.clone()).await {
        Ok(Some(wallet)) if wallet.owner_id == auth.user.id => {
            match repository::soft_delete_by_id(&ctx.db_conn.pool, id).await {
                Ok(()) => (
                    StatusCode::OK,
                    Json(json!({ "message": "Wallet deleted successfully" })),
                ),
                Err(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to delete wallet" })),
                ),
            }
        }
        Ok(Some(_)) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Access denied" })),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Wallet not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch wallet" })),
        ),
    }
}

fn ledger_error_response(err: service::Error) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        service::Error::InvalidAmount => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Amount must be greater than zero" })),
        ),
        service::Error::SameWallet => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Source and destination wallets must differ" })),
        ),
        service::Error::WalletNotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Wallet not found" })),
        ),
        service::Error::InsufficientFunds => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "Insufficient funds" })),
        ),
        service::Error::ConcurrentUpdateConflict => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Wallet was updated concurrently, retry the request" })),
        ),
        service::Error::OperationTimedOut => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "Operation timed out, retry the request" })),
        ),
        service::Error::UnexpectedError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to apply operation" })),
        ),
    }
}

async fn find_caller_wallet(
    ctx: &Context,
    owner_id: String,
) -> Result<repository::Wallet, (StatusCode, Json<serde_json::Value>)> {
    repository::find_by_owner_id(&ctx.db_conn.pool, owner_id)
        .await
        .map_err(|_| ledger_error_response(service::Error::UnexpectedError))?
        .ok_or_else(|| ledger_error_response(service::Error::WalletNotFound))
}

#[derive(Deserialize)]
struct TopUpPayload {
    amount: i64,
}

async fn top_up(
    auth: Auth,
    State(ctx): State<Arc<Context>>,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<TopUpPayload>,
) -> Response {
    let wallet = match find_caller_wallet(&ctx, auth.user.id).await {
        Ok(wallet) => wallet,
        Err(res) => return res.into_response(),
    };

    match service::top_up(
        ctx.clone(),
        service::TopUpPayload {
            wallet_id: wallet.id,
            amount: payload.amount,
            idempotency_key,
        },
    )
    .await
    {
        Ok(receipt) => (StatusCode::OK, Json(json!(receipt))).into_response(),
        Err(err) => ledger_error_response(err).into_response(),
    }
}

#[derive(Deserialize)]
struct WithdrawPayload {
    amount: i64,
}

async fn withdraw(
    auth: Auth,
    State(ctx): State<Arc<Context>>,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<WithdrawPayload>,
) -> Response {
    let wallet = match find_caller_wallet(&ctx, auth.user.id).await {
        Ok(wallet) => wallet,
        Err(res) => return res.into_response(),
    };

    match service::withdraw(
        ctx.clone(),
        service::WithdrawPayload {
            wallet_id: wallet.id,
            amount: payload.amount,
            idempotency_key,
        },
    )
    .await
    {
        Ok(receipt) => (StatusCode::OK, Json(json!(receipt))).into_response(),
        Err(err) => ledger_error_response(err).into_response(),
    }
}

#[derive(Deserialize)]
struct PayPayload {
    amount: i64,
    reference: String,
}

async fn pay(
    auth: Auth,
    State(ctx): State<Arc<Context>>,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<PayPayload>,
) -> Response {
    let wallet = match find_caller_wallet(&ctx, auth.user.id).await {
        Ok(wallet) => wallet,
        Err(res) => return res.into_response(),
    };

    match service::pay(
        ctx.clone(),
        service::PayPayload {
            wallet_id: wallet.id,
            amount: payload.amount,
            reference: payload.reference,
            idempotency_key,
        },
    )
    .await
    {
        Ok(receipt) => (StatusCode::OK, Json(json!(receipt))).into_response(),
        Err(err) => ledger_error_response(err).into_response(),
    }
}

#[derive(Deserialize)]
struct TransferPayload {
    dest_wallet_id: String,
    amount: i64,
}

async fn transfer(
    auth: Auth,
    State(ctx): State<Arc<Context>>,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(payload): Json<TransferPayload>,
) -> Response {
    let wallet = match find_caller_wallet(&ctx, auth.user.id).await {
        Ok(wallet) => wallet,
        Err(res) => return res.into_response(),
    };

    match service::transfer(
        ctx.clone(),
        service::TransferPayload {
            source_wallet_id: wallet.id,
            dest_wallet_id: payload.dest_wallet_id,
            amount: payload.amount,
            idempotency_key,
        },
    )
    .await
    {
        Ok(receipt) => (StatusCode::OK, Json(json!(receipt))).into_response(),
        Err(err) => ledger_error_response(err).into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/profile", get(get_wallet_by_profile))
        .route("/top-up", post(top_up))
        .route("/withdraw", post(withdraw))
        .route("/pay", post(pay))
        .route("/transfer", post(transfer))
        .route("/:id", get(get_wallet_by_id).delete(delete_wallet_by_id))
}
