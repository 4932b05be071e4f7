use super::{repository, service};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    modules::auth::{self, middleware::Auth},
    types::Context,
    utils::pagination::Pagination,
};

#[derive(Deserialize, Validate)]
struct RegisterPayload {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    name: String,
    #[validate(length(min = 8))]
    password: String,
    profile_picture: Option<String>,
}

async fn register(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<RegisterPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": errors.to_string() })),
        );
    }

    match service::register(
        ctx.clone(),
        service::RegisterPayload {
            email: payload.email,
            name: payload.name,
            password: payload.password,
            profile_picture: payload.profile_picture,
        },
    )
    .await
    {
        Ok(user) => (StatusCode::CREATED, Json(json!(user))),
        Err(service::Error::EmailTaken) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Email is already in use" })),
        ),
        Err(service::Error::UnexpectedError) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to create user" })),
        ),
    }
}

#[derive(Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

async fn login(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<LoginPayload>,
) -> impl IntoResponse {
    match auth::service::sign_in(ctx.clone(), payload.email, payload.password).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!({
                "access_token": session.access_token,
                "refresh_token": session.refresh_token,
            })),
        ),
        Err(auth::service::Error::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid email or password" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to sign in" })),
        ),
    }
}

#[derive(Deserialize)]
struct RefreshPayload {
    refresh_token: String,
}

async fn refresh(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<RefreshPayload>,
) -> impl IntoResponse {
    match auth::service::regenerate_tokens_for_session(ctx.clone(), payload.refresh_token).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!({
                "access_token": session.access_token,
                "refresh_token": session.refresh_token,
            })),
        ),
        Err(auth::service::Error::InvalidSession) | Err(auth::service::Error::ExpiredToken) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid refresh token" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to refresh tokens" })),
        ),
    }
}

async fn get_user_by_profile(auth: Auth) -> impl IntoResponse {
    (StatusCode::OK, Json(json!(auth.user)))
}

async fn get_user_by_id(
    _auth: Auth,
    State(ctx): State<Arc<Context>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match repository::find_by_id(&ctx.db_conn.pool, id).await {
        Ok(Some(user)) if !user.is_deleted => (StatusCode::OK, Json(json!(user))),
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch user" })),
        ),
    }
}

async fn get_users(
    _auth: Auth,
    State(ctx): State<Arc<Context>>,
    pagination: Pagination,
) -> impl IntoResponse {
    match repository::find_many(&ctx.db_conn.pool, pagination).await {
        Ok(paginated_users) => (StatusCode::OK, Json(json!(paginated_users))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch users" })),
        ),
    }
}

#[derive(Deserialize)]
struct UpdateUserPayload {
    email: Option<String>,
    name: Option<String>,
    profile_picture: Option<String>,
}

async fn update_user_by_id(
    auth: Auth,
    State(ctx): State<Arc<Context>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserPayload>,
) -> Response {
    if auth.user.id != id {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Access denied" })),
        )
            .into_response();
    }

    match repository::update_by_id(
        &ctx.db_conn.pool,
        id,
        repository::UpdateUserPayload {
            email: payload.email,
            name: payload.name,
            profile_picture: payload.profile_picture,
        },
    )
    .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "User updated successfully" })),
        )
            .into_response(),
        Err(repository::Error::UnexpectedError) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to update user" })),
        )
            .into_response(),
    }
}

async fn delete_user_by_id(
    auth: Auth,
    State(ctx): State<Arc<Context>>,
    Path(id): Path<String>,
) -> Response {
    if auth.user.id != id {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Access denied" })),
        )
            .into_response();
    }

    match repository::soft_delete_by_id(&ctx.db_conn.pool, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "User deleted successfully" })),
        )
            .into_response(),
        Err(repository::Error::UnexpectedError) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to delete user" })),
        )
            .into_response(),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", post(register).get(get_users))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/profile", get(get_user_by_profile))
        .route(
            "/:id",
            get(get_user_by_id)
                .put(update_user_by_id)
                .delete(delete_user_by_id),
        )
}
