mod common;

use common::TestClient;
use serde_json::json;

// Exercises the documented trace: a wallet funded with 1000 minor units ends
// at 1300 after a 500 top-up, a 200 payment and a rejected 2000 withdrawal.
#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn balance_follows_the_ledger_trace() {
    let client = TestClient::new();
    let account = client.create_account().await;

    let (status, receipt) = client
        .post_operation(
            "/api/wallets/top-up",
            &account.access_token,
            json!({ "amount": 1000 }),
            None,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(receipt["balance"], 1000);

    let (status, receipt) = client
        .post_operation(
            "/api/wallets/top-up",
            &account.access_token,
            json!({ "amount": 500 }),
            None,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(receipt["balance"], 1500);

    let (status, receipt) = client
        .post_operation(
            "/api/wallets/pay",
            &account.access_token,
            json!({ "amount": 200, "reference": "merchant1" }),
            None,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(receipt["balance"], 1300);

    let (status, _) = client
        .post_operation(
            "/api/wallets/withdraw",
            &account.access_token,
            json!({ "amount": 2000 }),
            None,
        )
        .await;
    assert_eq!(status, 422);

    assert_eq!(client.balance_of(&account).await, 1300);
}

#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn zero_and_negative_amounts_are_rejected() {
    let client = TestClient::new();
    let account = client.create_account().await;

    for amount in [0, -500] {
        let (status, _) = client
            .post_operation(
                "/api/wallets/top-up",
                &account.access_token,
                json!({ "amount": amount }),
                None,
            )
            .await;
        assert_eq!(status, 400);
    }

    assert_eq!(client.balance_of(&account).await, 0);
}

// No lost updates: concurrent top-ups against the same wallet must all land.
#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn concurrent_top_ups_all_apply() {
    let client = TestClient::new();
    let account = client.create_account().await;

    let results = futures::future::join_all((0..8).map(|_| {
        client.post_operation(
            "/api/wallets/top-up",
            &account.access_token,
            json!({ "amount": 10 }),
            None,
        )
    }))
    .await;

    for (status, _) in results {
        assert_eq!(status, 200);
    }

    assert_eq!(client.balance_of(&account).await, 80);
}

#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn transfer_moves_funds_atomically() {
    let client = TestClient::new();
    let sender = client.create_account().await;
    let receiver = client.create_account().await;

    let (status, _) = client
        .post_operation(
            "/api/wallets/top-up",
            &sender.access_token,
            json!({ "amount": 500 }),
            None,
        )
        .await;
    assert_eq!(status, 200);

    let (status, receipt) = client
        .post_operation(
            "/api/wallets/transfer",
            &sender.access_token,
            json!({ "dest_wallet_id": receiver.wallet_id, "amount": 200 }),
            None,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(receipt["balance"], 300);
    assert_eq!(receipt["dest_balance"], 200);

    assert_eq!(client.balance_of(&sender).await, 300);
    assert_eq!(client.balance_of(&receiver).await, 200);
}

#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn transfer_to_own_wallet_is_rejected() {
    let client = TestClient::new();
    let account = client.create_account().await;

    let (status, _) = client
        .post_operation(
            "/api/wallets/transfer",
            &account.access_token,
            json!({ "dest_wallet_id": account.wallet_id, "amount": 100 }),
            None,
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn transfer_with_insufficient_funds_changes_nothing() {
    let client = TestClient::new();
    let sender = client.create_account().await;
    let receiver = client.create_account().await;

    let (status, _) = client
        .post_operation(
            "/api/wallets/transfer",
            &sender.access_token,
            json!({ "dest_wallet_id": receiver.wallet_id, "amount": 100 }),
            None,
        )
        .await;
    assert_eq!(status, 422);

    assert_eq!(client.balance_of(&sender).await, 0);
    assert_eq!(client.balance_of(&receiver).await, 0);
}

// Replaying an idempotency key returns the original receipt and applies the
// mutation exactly once.
#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn idempotency_key_replay_does_not_reapply() {
    let client = TestClient::new();
    let account = client.create_account().await;

    let (status, first) = client
        .post_operation(
            "/api/wallets/top-up",
            &account.access_token,
            json!({ "amount": 250 }),
            Some("topup-retry-1"),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(first["replayed"], false);

    let (status, second) = client
        .post_operation(
            "/api/wallets/top-up",
            &account.access_token,
            json!({ "amount": 250 }),
            Some("topup-retry-1"),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(second["replayed"], true);
    assert_eq!(second["transaction_id"], first["transaction_id"]);
    assert_eq!(second["balance"], first["balance"]);

    assert_eq!(client.balance_of(&account).await, 250);
}

#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn history_is_filterable_by_kind() {
    let client = TestClient::new();
    let account = client.create_account().await;

    for _ in 0..2 {
        let (status, _) = client
            .post_operation(
                "/api/wallets/top-up",
                &account.access_token,
                json!({ "amount": 100 }),
                None,
            )
            .await;
        assert_eq!(status, 200);
    }
    let (status, _) = client
        .post_operation(
            "/api/wallets/pay",
            &account.access_token,
            json!({ "amount": 50, "reference": "merchant1" }),
            None,
        )
        .await;
    assert_eq!(status, 200);

    let history = client
        .get_json("/api/transactions?kind=TOPUP", &account.access_token)
        .await;
    assert_eq!(history["items"].as_array().unwrap().len(), 2);
    assert_eq!(history["meta"]["total"], 2);

    let history = client
        .get_json("/api/transactions", &account.access_token)
        .await;
    assert_eq!(history["meta"]["total"], 3);
}
