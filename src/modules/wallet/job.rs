use super::repository;
use crate::types::{Context, SchedulableJob};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

// Read-only ledger check: every wallet's balance must equal the signed sum of
// its transactions. A mismatch means a balance write escaped the ledger
// protocol and needs operator attention.
async fn reconciliation_job(ctx: Arc<Context>) -> Result<(), apalis::prelude::Error> {
    tracing::debug!("Reconciling wallet balances against the transaction ledger...");

    match repository::find_reconciliation_mismatches(&ctx.db_conn.pool).await {
        Ok(mismatches) if mismatches.is_empty() => {
            tracing::debug!("All wallet balances reconcile");
        }
        Ok(mismatches) => {
            for mismatch in mismatches {
                tracing::error!(
                    "Wallet {} balance {} disagrees with ledger sum {}",
                    mismatch.wallet_id,
                    mismatch.balance,
                    mismatch.ledger_sum
                );
            }
        }
        Err(_) => {
            tracing::error!("Failed to run wallet balance reconciliation");
        }
    }

    Ok(())
}

fn setup_reconciliation_job(
    ctx: Arc<Context>,
) -> Arc<
    dyn Fn()
            -> Pin<Box<dyn std::future::Future<Output = Result<(), apalis::prelude::Error>> + Send>>
        + Send
        + Sync,
> {
    Arc::new(move || {
        let ctx = ctx.clone();
        Box::pin(async move { reconciliation_job(ctx).await })
    })
}

pub fn list(ctx: Arc<Context>) -> Vec<SchedulableJob> {
    vec![SchedulableJob {
        schedule: apalis::cron::Schedule::from_str("@daily").expect("Couldn't create schedule"),
        job: setup_reconciliation_job(ctx),
    }]
}
