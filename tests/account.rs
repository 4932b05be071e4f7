mod common;

use common::TestClient;

#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn register_login_and_fetch_profile() {
    let client = TestClient::new();

    let account = client.create_account().await;

    let profile = client.get_json("/api/users/profile", &account.access_token).await;
    assert_eq!(profile["email"], account.email.as_str());

    let wallet = client.get_json("/api/wallets/profile", &account.access_token).await;
    assert_eq!(wallet["balance"], 0);
    assert_eq!(wallet["version"], 0);
}

#[tokio::test]
#[ignore = "requires a running server and a postgres instance"]
async fn duplicate_registration_is_rejected() {
    let client = TestClient::new();

    let account = client.create_account().await;
    let status = client.try_register(account.email.as_str()).await;

    assert_eq!(status, 409);
}
