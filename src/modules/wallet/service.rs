use super::repository;
use crate::{
    modules::transaction::repository::{self as transaction_repository, TransactionKind},
    types::Context,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

// How many times a read-validate-write cycle is restarted after losing a
// version race before the conflict is surfaced to the caller.
const MAX_CONFLICT_RETRIES: usize = 5;

// Upper bound on a single unit of work. On expiry the open transaction is
// dropped, which rolls it back, so a timed-out operation leaves no partial
// effect and is safe to retry.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum Error {
    InvalidAmount,
    WalletNotFound,
    InsufficientFunds,
    SameWallet,
    ConcurrentUpdateConflict,
    OperationTimedOut,
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize, Clone, Debug)]
pub struct LedgerReceipt {
    pub transaction_id: String,
    pub balance: i64,
    pub dest_balance: Option<i64>,
    pub replayed: bool,
}

pub struct TopUpPayload {
    pub wallet_id: String,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

pub async fn top_up(ctx: Arc<Context>, payload: TopUpPayload) -> Result<LedgerReceipt> {
    execute(
        ctx,
        payload.idempotency_key,
        Mutation {
            kind: TransactionKind::Topup,
            source_wallet_id: None,
            dest_wallet_id: Some(payload.wallet_id),
            reference: None,
            amount: payload.amount,
        },
    )
    .await
}

pub struct WithdrawPayload {
    pub wallet_id: String,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

pub async fn withdraw(ctx: Arc<Context>, payload: WithdrawPayload) -> Result<LedgerReceipt> {
    execute(
        ctx,
        payload.idempotency_key,
        Mutation {
            kind: TransactionKind::Withdrawal,
            source_wallet_id: Some(payload.wallet_id),
            dest_wallet_id: None,
            reference: None,
            amount: payload.amount,
        },
    )
    .await
}

pub struct PayPayload {
    pub wallet_id: String,
    pub amount: i64,
    pub reference: String,
    pub idempotency_key: Option<String>,
}

// A payment debits the payer's wallet like a withdrawal; the payee is an
// external reference, not a wallet, so nothing is credited.
pub async fn pay(ctx: Arc<Context>, payload: PayPayload) -> Result<LedgerReceipt> {
    execute(
        ctx,
        payload.idempotency_key,
        Mutation {
            kind: TransactionKind::Payment,
            source_wallet_id: Some(payload.wallet_id),
            dest_wallet_id: None,
            reference: Some(payload.reference),
            amount: payload.amount,
        },
    )
    .await
}

pub struct TransferPayload {
    pub source_wallet_id: String,
    pub dest_wallet_id: String,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

pub async fn transfer(ctx: Arc<Context>, payload: TransferPayload) -> Result<LedgerReceipt> {
    ensure_distinct_wallets(
        payload.source_wallet_id.as_str(),
        payload.dest_wallet_id.as_str(),
    )?;

    execute(
        ctx,
        payload.idempotency_key,
        Mutation {
            kind: TransactionKind::Transfer,
            source_wallet_id: Some(payload.source_wallet_id),
            dest_wallet_id: Some(payload.dest_wallet_id),
            reference: None,
            amount: payload.amount,
        },
    )
    .await
}

struct Mutation {
    kind: TransactionKind,
    source_wallet_id: Option<String>,
    dest_wallet_id: Option<String>,
    reference: Option<String>,
    amount: i64,
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }

    Ok(())
}

fn ensure_distinct_wallets(source_wallet_id: &str, dest_wallet_id: &str) -> Result<()> {
    if source_wallet_id == dest_wallet_id {
        return Err(Error::SameWallet);
    }

    Ok(())
}

// Wallets are always read and written in ascending id order so two transfers
// moving funds in opposite directions between the same pair cannot deadlock.
fn ordered_wallet_ids<'a>(source: Option<&'a str>, dest: Option<&'a str>) -> Vec<&'a str> {
    let mut ids: Vec<&str> = [source, dest].into_iter().flatten().collect();
    ids.sort_unstable();
    ids
}

fn receipt_from_record(record: repository::IdempotencyRecord) -> LedgerReceipt {
    LedgerReceipt {
        transaction_id: record.transaction_id,
        balance: record.balance,
        dest_balance: record.dest_balance,
        replayed: true,
    }
}

async fn execute(ctx: Arc<Context>, key: Option<String>, mutation: Mutation) -> Result<LedgerReceipt> {
    ensure_positive(mutation.amount)?;

    // A replayed key returns the stored outcome without touching balances.
    if let Some(key) = key.as_deref() {
        let existing = repository::find_idempotency_record(&ctx.db_conn.pool, key.to_string())
            .await
            .map_err(|_| Error::UnexpectedError)?;

        if let Some(record) = existing {
            return Ok(receipt_from_record(record));
        }
    }

    match tokio::time::timeout(
        OPERATION_TIMEOUT,
        apply_with_retries(&ctx, key.as_deref(), &mutation),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                "Ledger operation {} timed out after {:?}",
                mutation.kind.to_string(),
                OPERATION_TIMEOUT
            );
            Err(Error::OperationTimedOut)
        }
    }
}

async fn apply_with_retries(
    ctx: &Context,
    key: Option<&str>,
    mutation: &Mutation,
) -> Result<LedgerReceipt> {
    for attempt in 0..MAX_CONFLICT_RETRIES {
        match apply_once(ctx, key, mutation).await? {
            Attempt::Applied(receipt) => return Ok(receipt),
            Attempt::Conflict => {
                tracing::debug!(
                    "Version conflict applying {} (attempt {} of {})",
                    mutation.kind.to_string(),
                    attempt + 1,
                    MAX_CONFLICT_RETRIES
                );
            }
            Attempt::Replayed => {
                // A concurrent request carrying the same key committed first;
                // hand back its stored outcome.
                return match key {
                    Some(key) => {
                        let record =
                            repository::find_idempotency_record(&ctx.db_conn.pool, key.to_string())
                                .await
                                .map_err(|_| Error::UnexpectedError)?
                                .ok_or(Error::UnexpectedError)?;
                        Ok(receipt_from_record(record))
                    }
                    None => Err(Error::UnexpectedError),
                };
            }
        }
    }

    Err(Error::ConcurrentUpdateConflict)
}

enum Attempt {
    Applied(LedgerReceipt),
    Conflict,
    Replayed,
}

// One read-validate-write cycle inside a single database transaction. Any
// early return drops the transaction, which rolls back everything written in
// this attempt.
async fn apply_once(ctx: &Context, key: Option<&str>, mutation: &Mutation) -> Result<Attempt> {
    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to begin ledger transaction: {}", err);
        Error::UnexpectedError
    })?;

    let mut source: Option<repository::Wallet> = None;
    let mut dest: Option<repository::Wallet> = None;

    for id in ordered_wallet_ids(
        mutation.source_wallet_id.as_deref(),
        mutation.dest_wallet_id.as_deref(),
    ) {
        let wallet = repository::find_active_by_id(&mut *tx, id.to_string())
            .await
            .map_err(|_| Error::UnexpectedError)?
            .ok_or(Error::WalletNotFound)?;

        if Some(id) == mutation.source_wallet_id.as_deref() {
            source = Some(wallet);
        } else {
            dest = Some(wallet);
        }
    }

    if let Some(wallet) = source.as_ref() {
        if wallet.balance < mutation.amount {
            return Err(Error::InsufficientFunds);
        }
    }

    let source_balance = source.as_ref().map(|w| w.balance - mutation.amount);
    let dest_balance = dest.as_ref().map(|w| w.balance + mutation.amount);

    let mut writes: Vec<(&repository::Wallet, i64)> = Vec::new();
    if let (Some(wallet), Some(balance)) = (source.as_ref(), source_balance) {
        writes.push((wallet, balance));
    }
    if let (Some(wallet), Some(balance)) = (dest.as_ref(), dest_balance) {
        writes.push((wallet, balance));
    }
    writes.sort_by(|a, b| a.0.id.cmp(&b.0.id));

    for (wallet, new_balance) in writes {
        let written = repository::update_balance_versioned(
            &mut *tx,
            wallet.id.clone(),
            new_balance,
            wallet.version,
        )
        .await
        .map_err(|_| Error::UnexpectedError)?;

        if !written {
            return Ok(Attempt::Conflict);
        }
    }

    let record = transaction_repository::create(
        &mut *tx,
        transaction_repository::CreateTransactionPayload {
            kind: mutation.kind,
            source_wallet_id: mutation.source_wallet_id.clone(),
            dest_wallet_id: mutation.dest_wallet_id.clone(),
            reference: mutation.reference.clone(),
            amount: mutation.amount,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)?;

    let balance = source_balance
        .or(dest_balance)
        .ok_or(Error::UnexpectedError)?;
    let transfer_dest_balance = source_balance.and(dest_balance);

    if let Some(key) = key {
        match repository::create_idempotency_record(
            &mut *tx,
            repository::CreateIdempotencyRecordPayload {
                key: key.to_string(),
                transaction_id: record.id.clone(),
                balance,
                dest_balance: transfer_dest_balance,
            },
        )
        .await
        {
            Ok(()) => {}
            Err(repository::CreateIdempotencyRecordError::DuplicateKey) => {
                return Ok(Attempt::Replayed);
            }
            Err(repository::CreateIdempotencyRecordError::UnexpectedError) => {
                return Err(Error::UnexpectedError);
            }
        }
    }

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit ledger transaction: {}", err);
        Error::UnexpectedError
    })?;

    Ok(Attempt::Applied(LedgerReceipt {
        transaction_id: record.id,
        balance,
        dest_balance: transfer_dest_balance,
        replayed: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_amounts_are_invalid() {
        assert!(matches!(ensure_positive(0), Err(Error::InvalidAmount)));
        assert!(matches!(ensure_positive(-50), Err(Error::InvalidAmount)));
        assert!(ensure_positive(1).is_ok());
    }

    #[test]
    fn transfer_to_self_is_rejected() {
        assert!(matches!(
            ensure_distinct_wallets("w1", "w1"),
            Err(Error::SameWallet)
        ));
        assert!(ensure_distinct_wallets("w1", "w2").is_ok());
    }

    #[test]
    fn wallet_ids_are_visited_in_ascending_order() {
        assert_eq!(ordered_wallet_ids(Some("wB"), Some("wA")), vec!["wA", "wB"]);
        assert_eq!(ordered_wallet_ids(Some("wA"), Some("wB")), vec!["wA", "wB"]);
        assert_eq!(ordered_wallet_ids(None, Some("wA")), vec!["wA"]);
        assert_eq!(ordered_wallet_ids(Some("wA"), None), vec!["wA"]);
    }

    #[test]
    fn replayed_receipts_are_marked() {
        let receipt = receipt_from_record(repository::IdempotencyRecord {
            key: "retry-1".to_string(),
            transaction_id: "01J2ZK8V9TQH".to_string(),
            balance: 1300,
            dest_balance: None,
            created_at: chrono::Utc::now().naive_utc(),
        });

        assert!(receipt.replayed);
        assert_eq!(receipt.balance, 1300);
        assert_eq!(receipt.transaction_id, "01J2ZK8V9TQH");
    }
}
