use reqwest::StatusCode;
use serde_json::{json, Value};
use ulid::Ulid;

pub struct TestClient {
    base_url: String,
    http: reqwest::Client,
}

pub struct TestAccount {
    pub email: String,
    pub access_token: String,
    pub wallet_id: String,
}

impl TestClient {
    pub fn new() -> Self {
        Self {
            base_url: std::env::var("EWALLET_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            http: reqwest::Client::new(),
        }
    }

    pub async fn create_account(&self) -> TestAccount {
        let email = format!("{}@example.com", Ulid::new().to_string().to_lowercase());

        let response = self
            .http
            .post(format!("{}/api/users", self.base_url))
            .json(&json!({
                "email": email,
                "name": "Test User",
                "password": "hunter2hunter2",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = self
            .http
            .post(format!("{}/api/users/login", self.base_url))
            .json(&json!({ "email": email, "password": "hunter2hunter2" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tokens = response.json::<Value>().await.unwrap();
        let access_token = tokens["access_token"].as_str().unwrap().to_string();

        let wallet = self.get_json("/api/wallets/profile", access_token.as_str()).await;
        let wallet_id = wallet["id"].as_str().unwrap().to_string();

        TestAccount {
            email,
            access_token,
            wallet_id,
        }
    }

    pub async fn try_register(&self, email: &str) -> u16 {
        self.http
            .post(format!("{}/api/users", self.base_url))
            .json(&json!({
                "email": email,
                "name": "Test User",
                "password": "hunter2hunter2",
            }))
            .send()
            .await
            .unwrap()
            .status()
            .as_u16()
    }

    pub async fn get_json(&self, path: &str, access_token: &str) -> Value {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.json::<Value>().await.unwrap()
    }

    pub async fn post_operation(
        &self,
        path: &str,
        access_token: &str,
        body: Value,
        idempotency_key: Option<&str>,
    ) -> (u16, Value) {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
            .json(&body);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn balance_of(&self, account: &TestAccount) -> i64 {
        let wallet = self
            .get_json("/api/wallets/profile", account.access_token.as_str())
            .await;
        wallet["balance"].as_i64().unwrap()
    }
}
