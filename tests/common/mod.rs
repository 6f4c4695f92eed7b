//! Shared fixtures for integration tests: a mock classification service.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub api_key: Option<String>,
    pub body: Value,
}

pub struct MockService {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl MockService {
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

pub async fn start_mock_service(status: u16, response_body: &'static str) -> MockService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://127.0.0.1:{}", addr.port());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let recorder = seen.clone();
    tokio::spawn(async move {
        let detect = axum::routing::post(move |req: Request<Body>| {
            let recorder = recorder.clone();
            async move {
                let api_key = req
                    .headers()
                    .get("x-api-key")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
                    .await
                    .unwrap();
                let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
                recorder.lock().unwrap().push(SeenRequest { api_key, body });

                Ok::<_, Infallible>(
                    Response::builder()
                        .status(status)
                        .header("Content-Type", "application/json")
                        .body(Body::from(response_body))
                        .unwrap(),
                )
            }
        });
        let health = axum::routing::get(move || async move {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(status)
                    .header("Content-Type", "application/json")
                    .body(Body::from(response_body))
                    .unwrap(),
            )
        });

        let app = Router::new()
            .route("/api/detect-voice", detect)
            .route("/api/health", health);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    MockService {
        base_url,
        seen,
        shutdown_tx,
    }
}

/// A port nothing listens on: bind, read the port, release it.
pub async fn unused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

