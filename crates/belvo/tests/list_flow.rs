use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use belvo::{Builder, Client, Credentials, Error};
use serde_json::{json, Value};

const AUTHORIZATION: &str = "Basic aWQ6cGFzc3dvcmQ=";

struct Upstream {
    base: String,
    hits: AtomicUsize,
}

fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let base = format!("http://{}/api", listener.local_addr().unwrap());

    (listener, base)
}

fn serve(listener: TcpListener, router: Router) {
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(router.into_make_service());

    tokio::spawn(async move {
        server.await.unwrap();
    });
}

fn client(base: &str) -> Client {
    Builder::new()
        .with_credentials(Credentials {
            secret_id: "id".into(),
            secret_password: "password".into(),
        })
        .with_base_url(base)
        .build()
        .unwrap()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == AUTHORIZATION)
}

async fn paged_transactions(
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Extension(upstream): Extension<Arc<Upstream>>,
) -> (StatusCode, Json<Value>) {
    upstream.hits.fetch_add(1, Ordering::SeqCst);

    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": "authentication_failed", "message": "bad credentials"})),
        );
    }

    let link = params.get("link").cloned().unwrap_or_default();
    let next = |page: u32| {
        Value::String(format!(
            "{}/transactions/?link={}&page={}",
            upstream.base, link, page
        ))
    };

    let body = match params.get("page").map(String::as_str) {
        None => json!({
            "count": 4,
            "next": next(2),
            "previous": null,
            "results": [
                {"id": "t1", "account": "a1", "amount": 10.0},
                {"id": "t2", "account": "a1", "amount": 20.0},
            ],
        }),
        Some("2") => json!({
            "count": 4,
            "next": next(3),
            "previous": null,
            "results": [{"id": "t3", "account": "a2", "amount": 30.0}],
        }),
        Some("3") => json!({
            "count": 4,
            "next": null,
            "previous": null,
            "results": [{"id": "t4", "account": {"id": "a2"}, "amount": 40}],
        }),
        Some(_) => return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))),
    };

    (StatusCode::OK, Json(body))
}

async fn failing_second_page(
    Query(params): Query<HashMap<String, String>>,
    Extension(upstream): Extension<Arc<Upstream>>,
) -> (StatusCode, Json<Value>) {
    match params.get("page") {
        None => (
            StatusCode::OK,
            Json(json!({
                "count": 2,
                "next": format!("{}/accounts/?link=l&page=2", upstream.base),
                "previous": null,
                "results": [{"id": "a1"}],
            })),
        ),
        Some(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!([{"code": "too_many_sessions", "message": "slow down"}])),
        ),
    }
}

async fn not_json() -> &'static str {
    "this is not json"
}

fn upstream(base: &str) -> Arc<Upstream> {
    Arc::new(Upstream {
        base: base.to_string(),
        hits: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn follows_next_until_exhausted() {
    let (listener, base) = bind();
    let state = upstream(&base);
    let router = Router::new()
        .route("/api/transactions/", get(paged_transactions))
        .layer(Extension(state.clone()));
    serve(listener, router);

    let txs = client(&base).transactions("link-42").await.unwrap();

    let ids: Vec<&str> = txs.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3", "t4"]);
    assert_eq!(txs[3].account, "a2");
    assert_eq!(txs[3].amount, 40.0);
    assert_eq!(state.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn single_page_owners() {
    let (listener, base) = bind();
    let router = Router::new().route(
        "/api/owners/",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            Json(json!({
                "count": 1,
                "next": null,
                "previous": null,
                "results": [{
                    "id": "o1",
                    "link": params.get("link").cloned().unwrap_or_default(),
                    "display_name": "Jane Doe",
                }],
            }))
        }),
    );
    serve(listener, router);

    let owners = client(&base).owners("link-42").await.unwrap();

    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].id, "o1");
    assert_eq!(owners[0].link, "link-42");
    assert_eq!(owners[0].display_name, "Jane Doe");
}

#[tokio::test]
async fn rejected_credentials_surface_provider_error() {
    let (listener, base) = bind();
    let router = Router::new()
        .route("/api/transactions/", get(paged_transactions))
        .layer(Extension(upstream(&base)));
    serve(listener, router);

    let bad = Builder::new()
        .with_credentials(Credentials {
            secret_id: "id".into(),
            secret_password: "wrong".into(),
        })
        .with_base_url(&base)
        .build()
        .unwrap();

    match bad.transactions("link-42").await {
        Err(Error::Api {
            status,
            code,
            message,
        }) => {
            assert_eq!(status, 401);
            assert_eq!(code, "authentication_failed");
            assert_eq!(message, "bad credentials");
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn failure_on_later_page_discards_everything() {
    let (listener, base) = bind();
    let router = Router::new()
        .route("/api/accounts/", get(failing_second_page))
        .layer(Extension(upstream(&base)));
    serve(listener, router);

    let result = client(&base).accounts("l").await;

    assert!(matches!(result, Err(Error::Api { status: 429, .. })));
}

#[tokio::test]
async fn undecodable_body() {
    let (listener, base) = bind();
    serve(listener, Router::new().route("/api/owners/", get(not_json)));

    let result = client(&base).owners("l").await;

    assert!(matches!(result, Err(Error::Decode(_))));
}

#[tokio::test]
async fn unreachable_upstream() {
    let (listener, base) = bind();
    drop(listener);

    let result = client(&base).owners("l").await;

    assert!(matches!(result, Err(Error::Transport { .. })));
}
