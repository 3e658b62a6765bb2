//! Shared helpers for HTTP API tests.

#![allow(dead_code)]

use async_trait::async_trait;
use entitle_license::LicenseEngine;
use entitle_notify::{Mailer, NotifyResult, QueueConfig, SendQueue};
use entitle_server::{AppState, build_router};
use entitle_store::{NewLicense, Store, StoreConfig};
use entitle_types::Sn;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const ADMIN_TOKEN: &str = "admin-test-token";
pub const INTEROP_SECRET: &str = "interop-test-secret";

/// Records every message handed to it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// `(to, subject)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> NotifyResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

/// A running server on an OS-assigned port.
pub struct TestServer {
    pub base: String,
    pub state: Arc<AppState>,
    pub mailer: Arc<RecordingMailer>,
    pub client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn store(&self) -> &Store {
        self.state.engine.store()
    }

    /// Inserts an unbound default-product license.
    pub fn seed(&self, value: &str) {
        self.store()
            .insert_license(&NewLicense::new(Sn::from_stored(value)), chrono::Utc::now())
            .unwrap();
    }

    /// POSTs `body` and returns `(status, json)`.
    pub async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        read(resp).await
    }

    /// POSTs `body` with an `X-Forwarded-For` origin.
    pub async fn post_from(&self, path: &str, origin: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .header("x-forwarded-for", origin)
            .json(&body)
            .send()
            .await
            .unwrap();
        read(resp).await
    }

    /// POSTs to an admin route with the configured bearer token.
    pub async fn admin_post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .json(&body)
            .send()
            .await
            .unwrap();
        read(resp).await
    }

    pub async fn admin_get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .unwrap();
        read(resp).await
    }

    /// Polls a notify task until it leaves `running`.
    pub async fn wait_task_done(&self, task_id: i64) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let (status, body) = self
                .admin_get(&format!("/admin/notify/tasks/{task_id}"))
                .await;
            assert_eq!(status, 200);
            if body["status"] != "running" {
                return body;
            }
            assert!(tokio::time::Instant::now() < deadline, "task {task_id} never finished");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Waits until the mailer has seen `n` messages.
    pub async fn wait_mail(&self, n: usize) -> Vec<(String, String)> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let sent = self.mailer.sent();
            if sent.len() >= n {
                return sent;
            }
            assert!(tokio::time::Instant::now() < deadline, "only {} of {n} mails sent", sent.len());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn read(resp: reqwest::Response) -> (u16, Value) {
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Spin up the HTTP server with an admin token and interop secret.
pub async fn spawn_test_server() -> TestServer {
    spawn_with(Some(ADMIN_TOKEN)).await
}

pub async fn spawn_with(admin_token: Option<&str>) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let store =
        Arc::new(Store::open(dir.path().join("entitle.db"), &StoreConfig::default()).unwrap());
    let engine = LicenseEngine::new(store.clone())
        .with_interop_secret(INTEROP_SECRET)
        .unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let queue = SendQueue::new(
        store,
        mailer.clone(),
        QueueConfig {
            batch_size: 5,
            batch_interval: Duration::from_millis(10),
        },
    );
    let state = Arc::new(AppState {
        engine,
        queue,
        mailer: mailer.clone(),
        admin_token: admin_token.map(str::to_string),
    });

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        state,
        mailer,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}
