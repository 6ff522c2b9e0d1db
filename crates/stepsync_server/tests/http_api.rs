//! End-to-end tests of the HTTP API over a real socket.

use serde_json::{json, Value};
use stepsync_server::{ServerConfig, SinkServer};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Running {
    base: String,
    client: reqwest::Client,
    dir: TempDir,
    _shutdown: oneshot::Sender<()>,
}

async fn start() -> Running {
    start_with(|config| config).await
}

async fn start_with(configure: impl FnOnce(ServerConfig) -> ServerConfig) -> Running {
    let dir = tempfile::tempdir().unwrap();
    let config = configure(ServerConfig::default().with_data_dir(dir.path()));
    let server = SinkServer::new(config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server.serve_with_shutdown(listener, async {
        let _ = rx.await;
    }));

    Running {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        dir,
        _shutdown: tx,
    }
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post_raw(&self, body: &str) -> (u16, Value) {
        let response = self
            .client
            .post(self.url("/steps"))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

#[tokio::test]
async fn health_check() {
    let server = start().await;
    let body: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn append_list_delete() {
    let server = start().await;
    let samples = json!({"samples": [
        {"uuid": "A", "startDate": "2024-05-01T08:00:00Z", "endDate": "2024-05-01T08:10:00Z",
         "count": 120, "sourceBundleId": "com.example"},
        {"uuid": "B", "startDate": "2024-05-01T09:00:00Z", "endDate": "2024-05-01T09:10:00Z",
         "count": 80, "sourceBundleId": "com.example", "sourceDeviceName": "Watch"}
    ]});

    let (status, body) = server.post_raw(&samples.to_string()).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"saved": 2, "message": "Success"}));

    let listed: Value = server
        .client
        .get(server.url("/steps"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["total"], 2);
    assert_eq!(listed["samples"][1]["sourceDeviceName"], "Watch");

    let file = std::fs::read_to_string(server.dir.path().join("steps.jsonl")).unwrap();
    assert_eq!(file.lines().count(), 2);

    let deleted: Value = server
        .client
        .delete(server.url("/steps"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted, json!({"message": "All steps deleted successfully"}));

    let response = server.client.delete(server.url("/steps")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let again: Value = response.json().await.unwrap();
    assert_eq!(again, json!({"message": "No steps file to delete"}));
}

#[tokio::test]
async fn malformed_bodies_are_400() {
    let server = start().await;

    let (status, body) = server.post_raw("{nope").await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "Invalid JSON"}));

    let (status, body) = server.post_raw(r#"{"data": []}"#).await;
    assert_eq!(status, 400);
    assert_eq!(
        body,
        json!({"error": "Invalid request body. Expected {\"samples\": [...]}"})
    );

    let (status, body) = server.post_raw(r#"{"samples": 3}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "samples must be a list"}));

    let (status, body) = server.post_raw(r#"{"samples": [1]}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "Each sample must be a JSON object"}));
}

fn many_samples(n: usize) -> Value {
    let samples: Vec<Value> = (0..n)
        .map(|i| {
            json!({"uuid": format!("sample-{i:08}"), "startDate": "2024-05-01T08:00:00Z",
                   "endDate": "2024-05-01T08:10:00Z", "count": i,
                   "sourceBundleId": "com.example.health.steps.tracker",
                   "sourceDeviceName": "Phone"})
        })
        .collect();
    json!({ "samples": samples })
}

#[tokio::test]
async fn large_append_is_accepted_by_default() {
    let server = start().await;
    let body = many_samples(15_000).to_string();
    assert!(body.len() > 2 * 1024 * 1024);

    let (status, reply) = server.post_raw(&body).await;
    assert_eq!(status, 200);
    assert_eq!(reply["saved"], 15_000);

    let file = std::fs::read_to_string(server.dir.path().join("steps.jsonl")).unwrap();
    assert_eq!(file.lines().count(), 15_000);
}

#[tokio::test]
async fn oversized_append_is_a_json_400() {
    let server = start_with(|config| config.with_max_body_bytes(Some(1024))).await;
    let body = many_samples(50).to_string();
    assert!(body.len() > 1024);

    let (status, reply) = server.post_raw(&body).await;
    assert_eq!(status, 400);
    let message = reply["error"].as_str().unwrap();
    assert!(message.starts_with("Request body rejected"), "{message}");
    assert!(!server.dir.path().join("steps.jsonl").exists());

    let (status, reply) = server.post_raw(&many_samples(1).to_string()).await;
    assert_eq!(status, 200);
    assert_eq!(reply["saved"], 1);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let server = start().await;
    let response = server
        .client
        .get(server.url("/health"))
        .header("origin", "http://example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
