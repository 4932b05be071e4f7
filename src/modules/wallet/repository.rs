use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use ulid::Ulid;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

// Balances are integer minor currency units. The version column is the
// optimistic concurrency token: every balance write must name the version it
// read, and bumps it by one.
#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct Wallet {
    pub id: String,
    pub owner_id: String,
    pub balance: i64,
    pub version: i64,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

pub async fn create<'e, E: PgExecutor<'e>>(e: E, owner_id: String) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        "
        INSERT INTO wallets (id, owner_id)
        VALUES ($1, $2)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(owner_id)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while trying to create a wallet: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE id = $1")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to fetch a wallet by id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
}

pub async fn find_active_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE id = $1 AND is_deleted = FALSE")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to fetch an active wallet by id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
}

pub async fn find_by_owner_id<'e, E: PgExecutor<'e>>(
    e: E,
    owner_id: String,
) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE owner_id = $1")
        .bind(owner_id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to fetch a wallet by owner_id {}: {}",
                owner_id,
                err
            );
            Error::UnexpectedError
        })
}

// Conditioned write. Returns false when the version no longer matches, which
// means a concurrent writer got there first and the caller must re-read.
pub async fn update_balance_versioned<'e, E: PgExecutor<'e>>(
    e: E,
    id: String,
    new_balance: i64,
    expected_version: i64,
) -> Result<bool> {
    sqlx::query(
        "
        UPDATE wallets SET
            balance = $2,
            version = version + 1,
            updated_at = NOW()
        WHERE
            id = $1
            AND version = $3
            AND is_deleted = FALSE
        ",
    )
    .bind(id.clone())
    .bind(new_balance)
    .bind(expected_version)
    .execute(e)
    .await
    .map(|done| done.rows_affected() == 1)
    .map_err(|err| {
        tracing::error!(
            "Error occurred while trying to update balance of wallet {}: {}",
            id,
            err
        );
        Error::UnexpectedError
    })
}

pub async fn soft_delete_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<()> {
    sqlx::query("UPDATE wallets SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id.clone())
        .execute(e)
        .await
        .map(|_| ())
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to delete wallet {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
}

// Stored outcome of an applied ledger operation, replayed verbatim when the
// same idempotency key arrives again.
#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub key: String,
    pub transaction_id: String,
    pub balance: i64,
    pub dest_balance: Option<i64>,
    pub created_at: NaiveDateTime,
}

pub enum CreateIdempotencyRecordError {
    DuplicateKey,
    UnexpectedError,
}

pub struct CreateIdempotencyRecordPayload {
    pub key: String,
    pub transaction_id: String,
    pub balance: i64,
    pub dest_balance: Option<i64>,
}

pub async fn find_idempotency_record<'e, E: PgExecutor<'e>>(
    e: E,
    key: String,
) -> Result<Option<IdempotencyRecord>> {
    sqlx::query_as::<_, IdempotencyRecord>("SELECT * FROM idempotency_keys WHERE key = $1")
        .bind(key.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to fetch idempotency record {}: {}",
                key,
                err
            );
            Error::UnexpectedError
        })
}

pub async fn create_idempotency_record<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateIdempotencyRecordPayload,
) -> std::result::Result<(), CreateIdempotencyRecordError> {
    sqlx::query(
        "
        INSERT INTO idempotency_keys (key, transaction_id, balance, dest_balance)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(payload.key.clone())
    .bind(payload.transaction_id)
    .bind(payload.balance)
    .bind(payload.dest_balance)
    .execute(e)
    .await
    .map(|_| ())
    .map_err(|err| {
        if err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation())
        {
            return CreateIdempotencyRecordError::DuplicateKey;
        }

        tracing::error!(
            "Error occurred while trying to record idempotency key {}: {}",
            payload.key,
            err
        );
        CreateIdempotencyRecordError::UnexpectedError
    })
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReconciliationMismatch {
    pub wallet_id: String,
    pub balance: i64,
    pub ledger_sum: i64,
}

// Wallets whose stored balance disagrees with the signed sum of their ledger
// entries. An empty result means the ledger reconciles.
pub async fn find_reconciliation_mismatches<'e, E: PgExecutor<'e>>(
    e: E,
) -> Result<Vec<ReconciliationMismatch>> {
    sqlx::query_as::<_, ReconciliationMismatch>(
        "
        SELECT
            w.id AS wallet_id,
            w.balance AS balance,
            COALESCE(SUM(
                CASE
                    WHEN t.dest_wallet_id = w.id THEN t.amount
                    WHEN t.source_wallet_id = w.id THEN -t.amount
                    ELSE 0
                END
            ), 0)::BIGINT AS ledger_sum
        FROM wallets w
        LEFT JOIN transactions t
            ON t.source_wallet_id = w.id OR t.dest_wallet_id = w.id
        GROUP BY w.id, w.balance
        HAVING
            w.balance <> COALESCE(SUM(
                CASE
                    WHEN t.dest_wallet_id = w.id THEN t.amount
                    WHEN t.source_wallet_id = w.id THEN -t.amount
                    ELSE 0
                END
            ), 0)
        ",
    )
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while reconciling wallet balances: {}", err);
        Error::UnexpectedError
    })
}
