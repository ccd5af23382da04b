//! Local HTTP fixtures for probe and check tests.

use axum::{http::StatusCode, response::Redirect, routing::get, Router};
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve a handful of canned endpoints on an ephemeral port.
///
/// Returns the base URL, e.g. `http://127.0.0.1:40123`.
pub async fn spawn_fixture_server() -> String {
    let router = Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route("/redirect", get(|| async { Redirect::temporary("/ok") }))
        .route(
            "/error",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "late"
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

/// A URL on a local port that nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}
