mod common;

use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::{Value, json};

use adifpush::{
    config::{CloudlogConfig, UploadConfig},
    upload::{CloudlogClient, QsoUploader, UploadError},
};

use common::{K2XYZ, W1ABC};

type Seen = Arc<Mutex<Vec<Value>>>;

async fn serve(status: StatusCode, body: String) -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route(
            "/index.php/api/qso",
            post(move |State(seen): State<Seen>, Json(v): Json<Value>| {
                let body = body.clone();
                async move {
                    seen.lock().expect("lock").push(v);
                    (status, body)
                }
            }),
        )
        .with_state(Arc::clone(&seen));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}/"), seen)
}

fn client(url: &str) -> CloudlogClient {
    let cfg = CloudlogConfig::new(url, "secret-key", "3").expect("cfg");
    CloudlogClient::new(&cfg, &UploadConfig::default()).expect("client")
}

#[tokio::test]
async fn created_is_success_and_line_is_forwarded_verbatim() {
    let (url, seen) = serve(StatusCode::CREATED, "{\"status\":\"created\"}".into()).await;

    client(&url).push(K2XYZ).await.expect("accepted");

    let posted = seen.lock().expect("lock").clone();
    assert_eq!(
        posted,
        vec![json!({
            "key": "secret-key",
            "station_profile_id": "3",
            "type": "adif",
            "string": K2XYZ,
        })]
    );
}

#[tokio::test]
async fn ok_is_success() {
    let (url, _) = serve(StatusCode::OK, String::new()).await;
    assert_eq!(client(&url).push(W1ABC).await, Ok(()));
}

#[tokio::test]
async fn other_status_reports_code_and_truncated_body() {
    let (url, _) = serve(StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(250)).await;

    match client(&url).push(W1ABC).await {
        Err(UploadError::Status { code, body }) => {
            assert_eq!(code, 500);
            assert_eq!(body.len(), 100);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn accepted_202_is_still_a_failure() {
    let (url, _) = serve(StatusCode::ACCEPTED, "queued".into()).await;
    assert_eq!(
        client(&url).push(W1ABC).await,
        Err(UploadError::Status {
            code: 202,
            body: "queued".to_string()
        })
    );
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let res = client(&format!("http://{addr}")).push(W1ABC).await;
    assert!(matches!(res, Err(UploadError::Transport(_))), "got {res:?}");
}
