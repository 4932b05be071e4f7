use chrono::Utc;
use sha2::{Digest, Sha256};
use ulid::Ulid;

use super::repository::{self, Session};
use crate::{modules::user, types::Context};
use std::sync::Arc;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
    InvalidCredentials,
    InvalidSession,
    ExpiredToken,
}

type Result<T> = std::result::Result<T, Error>;

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub async fn sign_in(ctx: Arc<Context>, email: String, password: String) -> Result<Session> {
    let user = user::repository::find_by_email(&ctx.db_conn.pool, email)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .ok_or(Error::InvalidCredentials)?;

    if user.password_hash != hash_password(password.as_str()) {
        return Err(Error::InvalidCredentials);
    }

    create_session(ctx, user.id).await
}

pub async fn create_session(ctx: Arc<Context>, user_id: String) -> Result<Session> {
    let access_token = Ulid::new().to_string();
    let refresh_token = Ulid::new().to_string();

    repository::create(
        &ctx.db_conn.pool,
        repository::SessionCreationPayload {
            user_id,
            access_token,
            refresh_token,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)
}

pub async fn regenerate_tokens_for_session(
    ctx: Arc<Context>,
    refresh_token: String,
) -> Result<Session> {
    let session = verify_refresh_token(ctx.clone(), refresh_token).await?;

    let access_token = Ulid::new().to_string();
    let refresh_token = Ulid::new().to_string();

    repository::update_by_id(
        &ctx.db_conn.pool,
        session.id,
        repository::UpdateSessionPayload {
            access_token,
            refresh_token,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)
}

pub async fn verify_access_token(ctx: Arc<Context>, access_token: String) -> Result<Session> {
    let session = repository::find_by_access_token(&ctx.db_conn.pool, access_token)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .ok_or(Error::InvalidSession)?;

    if session.access_token_expires_at < Utc::now().naive_utc() {
        return Err(Error::ExpiredToken);
    }

    Ok(session)
}

pub async fn verify_refresh_token(ctx: Arc<Context>, refresh_token: String) -> Result<Session> {
    let session = repository::find_by_refresh_token(&ctx.db_conn.pool, refresh_token)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .ok_or(Error::InvalidSession)?;

    if session.refresh_token_expires_at < Utc::now().naive_utc() {
        return Err(Error::ExpiredToken);
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_stable_and_hex_encoded() {
        let first = hash_password("hunter22");
        let second = hash_password("hunter22");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_passwords_hash_differently() {
        assert_ne!(hash_password("hunter22"), hash_password("hunter23"));
    }
}
