use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::str::FromStr;
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all(serialize = "UPPERCASE", deserialize = "UPPERCASE"))]
pub enum TransactionKind {
    Topup,
    Payment,
    Transfer,
    Withdrawal,
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "TOPUP" => Ok(TransactionKind::Topup),
            "PAYMENT" => Ok(TransactionKind::Payment),
            "TRANSFER" => Ok(TransactionKind::Transfer),
            "WITHDRAWAL" => Ok(TransactionKind::Withdrawal),
            _ => Err(format!("'{}' is not a valid TransactionKind", s)),
        }
    }
}

impl TryFrom<String> for TransactionKind {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl ToString for TransactionKind {
    fn to_string(&self) -> String {
        match self {
            TransactionKind::Topup => "TOPUP".to_string(),
            TransactionKind::Payment => "PAYMENT".to_string(),
            TransactionKind::Transfer => "TRANSFER".to_string(),
            TransactionKind::Withdrawal => "WITHDRAWAL".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all(serialize = "UPPERCASE", deserialize = "UPPERCASE"))]
pub enum TransactionStatus {
    Completed,
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(TransactionStatus::Completed),
            _ => Err(format!("'{}' is not a valid TransactionStatus", s)),
        }
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl ToString for TransactionStatus {
    fn to_string(&self) -> String {
        match self {
            TransactionStatus::Completed => "COMPLETED".to_string(),
        }
    }
}

// Append-only ledger record. Top-ups have no source wallet; withdrawals and
// payments have no destination wallet.
#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct Transaction {
    pub id: String,
    #[sqlx(try_from = "String")]
    pub kind: TransactionKind,
    pub source_wallet_id: Option<String>,
    pub dest_wallet_id: Option<String>,
    pub reference: Option<String>,
    pub amount: i64,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub created_at: NaiveDateTime,
}

impl Transaction {
    // The amount this record contributes to the given wallet's balance.
    pub fn signed_amount_for(&self, wallet_id: &str) -> i64 {
        if self.dest_wallet_id.as_deref() == Some(wallet_id) {
            self.amount
        } else if self.source_wallet_id.as_deref() == Some(wallet_id) {
            -self.amount
        } else {
            0
        }
    }

    pub fn involves(&self, wallet_id: &str) -> bool {
        self.source_wallet_id.as_deref() == Some(wallet_id)
            || self.dest_wallet_id.as_deref() == Some(wallet_id)
    }
}

#[derive(Debug)]
pub struct CreateTransactionPayload {
    pub kind: TransactionKind,
    pub source_wallet_id: Option<String>,
    pub dest_wallet_id: Option<String>,
    pub reference: Option<String>,
    pub amount: i64,
}

pub async fn create<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateTransactionPayload,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        "
        INSERT INTO transactions (id, kind, source_wallet_id, dest_wallet_id, reference, amount, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.kind.to_string())
    .bind(payload.source_wallet_id.clone())
    .bind(payload.dest_wallet_id.clone())
    .bind(payload.reference.clone())
    .bind(payload.amount)
    .bind(TransactionStatus::Completed.to_string())
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while trying to create transaction {:?}: {}",
            payload,
            err
        );
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to fetch transaction by id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
}

pub async fn find_many_by_wallet_id<'e, E: PgExecutor<'e> + Copy>(
    e: E,
    wallet_id: String,
    kind: Option<TransactionKind>,
    pagination: Pagination,
) -> Result<Paginated<Transaction>> {
    let kind = kind.map(|k| k.to_string());

    let transactions = sqlx::query_as::<_, Transaction>(
        "
        SELECT * FROM transactions
        WHERE
            (source_wallet_id = $1 OR dest_wallet_id = $1)
            AND ($2::TEXT IS NULL OR kind = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        ",
    )
    .bind(wallet_id.clone())
    .bind(kind.clone())
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while trying to fetch transactions for wallet {}: {}",
            wallet_id,
            err
        );
        Error::UnexpectedError
    })?;

    let total = sqlx::query_scalar::<_, i64>(
        "
        SELECT COUNT(*) FROM transactions
        WHERE
            (source_wallet_id = $1 OR dest_wallet_id = $1)
            AND ($2::TEXT IS NULL OR kind = $2)
        ",
    )
    .bind(wallet_id.clone())
    .bind(kind)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while trying to count transactions for wallet {}: {}",
            wallet_id,
            err
        );
        Error::UnexpectedError
    })?;

    Ok(Paginated::new(
        transactions,
        total as u32,
        pagination.page,
        pagination.per_page,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(
        kind: TransactionKind,
        source: Option<&str>,
        dest: Option<&str>,
        amount: i64,
    ) -> Transaction {
        Transaction {
            id: Ulid::new().to_string(),
            kind,
            source_wallet_id: source.map(|s| s.to_string()),
            dest_wallet_id: dest.map(|s| s.to_string()),
            reference: None,
            amount,
            status: TransactionStatus::Completed,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            TransactionKind::Topup,
            TransactionKind::Payment,
            TransactionKind::Transfer,
            TransactionKind::Withdrawal,
        ] {
            assert_eq!(kind.to_string().parse::<TransactionKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("REFUND".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn topup_credits_the_destination_wallet() {
        let t = record(TransactionKind::Topup, None, Some("w1"), 500);
        assert_eq!(t.signed_amount_for("w1"), 500);
        assert_eq!(t.signed_amount_for("w2"), 0);
    }

    #[test]
    fn withdrawal_debits_the_source_wallet() {
        let t = record(TransactionKind::Withdrawal, Some("w1"), None, 200);
        assert_eq!(t.signed_amount_for("w1"), -200);
    }

    #[test]
    fn transfer_debits_source_and_credits_destination() {
        let t = record(TransactionKind::Transfer, Some("w1"), Some("w2"), 300);
        assert_eq!(t.signed_amount_for("w1"), -300);
        assert_eq!(t.signed_amount_for("w2"), 300);
        assert!(t.involves("w1"));
        assert!(t.involves("w2"));
        assert!(!t.involves("w3"));
    }
}
