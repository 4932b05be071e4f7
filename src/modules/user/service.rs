use super::repository::{self, User};
use crate::{
    modules::{auth, wallet},
    types::Context,
};
use std::sync::Arc;

pub enum Error {
    EmailTaken,
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

pub struct RegisterPayload {
    pub email: String,
    pub name: String,
    pub password: String,
    pub profile_picture: Option<String>,
}

// Registration creates the user and their wallet in one unit of work so a
// user can never exist without a wallet.
pub async fn register(ctx: Arc<Context>, payload: RegisterPayload) -> Result<User> {
    let existing = repository::find_by_email(&ctx.db_conn.pool, payload.email.clone())
        .await
        .map_err(|_| Error::UnexpectedError)?;

    if existing.is_some() {
        return Err(Error::EmailTaken);
    }

    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to begin registration transaction: {}", err);
        Error::UnexpectedError
    })?;

    let user = repository::create(
        &mut *tx,
        repository::CreateUserPayload {
            email: payload.email,
            name: payload.name,
            password_hash: auth::service::hash_password(payload.password.as_str()),
            profile_picture: payload.profile_picture,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)?;

    wallet::repository::create(&mut *tx, user.id.clone())
        .await
        .map_err(|_| Error::UnexpectedError)?;

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit registration transaction: {}", err);
        Error::UnexpectedError
    })?;

    Ok(user)
}
