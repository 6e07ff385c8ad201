use std::{net::SocketAddr, sync::Arc};

use access::Session;
use async_trait::async_trait;
use chrono::{Days, Utc};
use reqwest::StatusCode;
use roster::{ActivityPeriod, Client, GracePeriod, MemoryStore, Product, Store, StoreError};
use serde_json::{Value, json};
use server::{
    build_router,
    config::Config,
    database::{MemorySessions, SessionSource},
    state::State,
};
use tokio::net::TcpListener;
use uuid::Uuid;

const ADMIN: &str = "admin-token";
const COACH: &str = "coach-token";
const NO_ROLE: &str = "plain-token";
const CS_REP: &str = "csrep-token";

/// Session backend whose every lookup fails.
struct BrokenSessions;

#[async_trait]
impl SessionSource for BrokenSessions {
    async fn get_session(&self, _token: &str) -> Result<Option<Session>, StoreError> {
        Err(StoreError::Unavailable("session store down".to_string()))
    }
}

struct Harness {
    addr: SocketAddr,
    store: Arc<MemoryStore>,
    http: reqwest::Client,
}

impl Harness {
    async fn start(cron_secret: Option<&str>) -> Self {
        let sessions = Arc::new(MemorySessions::default());
        sessions.insert(ADMIN, Session::new("u_admin", Some("admin"))).await;
        sessions.insert(COACH, Session::new("u_coach", Some("coach"))).await;
        sessions.insert(NO_ROLE, Session::new("u_plain", None)).await;
        sessions.insert(CS_REP, Session::new("u_rep", Some("csRep"))).await;

        Self::with_sessions(cron_secret, sessions).await
    }

    async fn with_sessions(cron_secret: Option<&str>, sessions: Arc<dyn SessionSource>) -> Self {
        let store = Arc::new(MemoryStore::default());
        let config = Config {
            port: 0,
            redis_url: String::new(),
            grace_threshold_days: 30,
            cron_secret: cron_secret.map(str::to_string),
        };
        let state = State::with_parts(config, store.clone(), sessions);
        let app = build_router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });

        Self {
            addr,
            store,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn lapsed_client(&self, name: &str, ended_days_ago: u64) -> Uuid {
        let now = Utc::now();
        let client = Client::new(name, format!("{name}@example.com"), now);
        self.store.insert_client(&client).await.unwrap();

        let today = now.date_naive();
        self.store
            .insert_activity_period(&ActivityPeriod {
                id: Uuid::new_v4(),
                client_id: client.id,
                product_id: None,
                start_date: today.checked_sub_days(Days::new(200)).unwrap(),
                end_date: Some(today.checked_sub_days(Days::new(ended_days_ago)).unwrap()),
            })
            .await
            .unwrap();

        client.id
    }
}

async fn body(response: reqwest::Response) -> (StatusCode, Value) {
    let status = response.status();
    let json = response.json::<Value>().await.expect("json body");
    (status, json)
}

#[tokio::test]
async fn cron_post_and_get_share_the_envelope() {
    let h = Harness::start(None).await;
    let lapsed = h.lapsed_client("lapsed", 40).await;
    h.lapsed_client("recent", 10).await;

    let (status, json) = body(h.http.post(h.url("/cron/grace-periods")).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["created"], json!([lapsed.to_string()]));
    assert_eq!(json["data"]["skipped"], json!([]));
    assert_eq!(json["data"]["errors"], json!([]));
    assert!(json["timestamp"].is_string());

    let (status, json) = body(h.http.get(h.url("/cron/grace-periods")).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["created"], json!([]));
    assert_eq!(json["data"]["skipped"], json!([lapsed.to_string()]));
}

#[tokio::test]
async fn cron_reports_partial_failure_as_success() {
    let h = Harness::start(None).await;
    let ok = h.lapsed_client("ok", 45).await;
    let broken = h.lapsed_client("broken", 40).await;
    h.store.fail_grace_inserts_for(broken).await;

    let (status, json) = body(h.http.post(h.url("/cron/grace-periods")).send().await.unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["created"], json!([ok.to_string()]));
    assert_eq!(json["data"]["errors"][0]["clientId"], broken.to_string());
}

#[tokio::test]
async fn cron_load_failure_is_a_500_envelope() {
    let h = Harness::start(None).await;
    h.lapsed_client("lapsed", 40).await;
    h.store.fail_loads();

    let (status, json) = body(h.http.post(h.url("/cron/grace-periods")).send().await.unwrap()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Grace period detection failed");
    assert!(json["timestamp"].is_string());
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn cron_secret_is_enforced_when_configured() {
    let h = Harness::start(Some("s3cret")).await;

    let (status, json) = body(h.http.post(h.url("/cron/grace-periods")).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let response = h
        .http
        .post(h.url("/cron/grace-periods"))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn permissions_need_a_session() {
    let h = Harness::start(None).await;

    let (status, json) = body(h.http.get(h.url("/permissions")).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Authentication required");

    let response = h
        .http
        .get(h.url("/permissions"))
        .bearer_auth("unknown-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unreadable_session_is_no_session() {
    let h = Harness::with_sessions(None, Arc::new(BrokenSessions)).await;

    let (status, json) = body(
        h.http
            .get(h.url("/permissions"))
            .bearer_auth(ADMIN)
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Authentication required");
}

#[tokio::test]
async fn permissions_for_role_and_default() {
    let h = Harness::start(None).await;

    let (status, json) = body(
        h.http
            .get(h.url("/permissions"))
            .header("cookie", format!("session_token={COACH}"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["principal"], json!({"id": "u_coach", "role": "coach"}));
    assert_eq!(json["statement"]["testimonial"], json!(["create", "read", "update", "list"]));
    assert!(json["statement"].get("payment").is_none());

    let (_, json) = body(
        h.http
            .get(h.url("/permissions"))
            .bearer_auth(NO_ROLE)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["principal"]["role"], "user");
    assert_eq!(json["statement"], json!({"client": ["read", "list"], "coach": ["read", "list"]}));
}

#[tokio::test]
async fn create_client_is_gated_and_validated() {
    let h = Harness::start(None).await;
    let url = h.url("/clients");

    let response = h
        .http
        .post(&url)
        .bearer_auth(COACH)
        .json(&json!({"name": "Ada", "email": "ada@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, json) = body(
        h.http
            .post(&url)
            .bearer_auth(CS_REP)
            .json(&json!({"name": " ", "email": "nope"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["field"], "name");
    assert_eq!(json["errors"][1]["field"], "email");

    let (status, json) = body(
        h.http
            .post(&url)
            .bearer_auth(CS_REP)
            .json(&json!({"name": "Ada", "email": "Ada@Example.com"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["email"], "ada@example.com");

    let (status, json) = body(
        h.http
            .post(&url)
            .bearer_auth(ADMIN)
            .json(&json!({"name": "Ada Again", "email": "ada@example.com"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"], json!([{"field": "email", "message": "Already in use"}]));
}

#[tokio::test]
async fn malformed_bodies_are_field_errors() {
    let h = Harness::start(None).await;
    let url = h.url("/clients");

    let (status, json) = body(
        h.http
            .post(&url)
            .bearer_auth(ADMIN)
            .json(&json!({"name": 5, "email": "ada@example.com"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["field"], "body");
    assert!(json["errors"][0]["message"].as_str().unwrap().contains("name"));

    let (status, json) = body(
        h.http
            .post(&url)
            .bearer_auth(ADMIN)
            .header("content-type", "application/json")
            .body("{")
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["field"], "body");

    let (status, _) = body(
        h.http
            .post(h.url(&format!("/clients/{}/activity-periods", Uuid::new_v4())))
            .bearer_auth(ADMIN)
            .header("content-type", "text/plain")
            .body("startDate=2026-10-10")
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn new_activity_period_resolves_grace_period() {
    let h = Harness::start(None).await;
    let client_id = h.lapsed_client("returning", 60).await;
    let product = Product {
        id: Uuid::new_v4(),
        name: "Sprint".to_string(),
        duration_days: Some(90),
    };
    h.store.insert_product(&product).await.unwrap();

    h.http.post(h.url("/cron/grace-periods")).send().await.unwrap();
    assert!(h.store.active_grace_period(client_id).await.unwrap().is_some());

    let (status, json) = body(
        h.http
            .post(h.url(&format!("/clients/{client_id}/activity-periods")))
            .bearer_auth(CS_REP)
            .json(&json!({"productId": product.id, "startDate": Utc::now().date_naive().to_string()}))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["activityPeriod"]["clientId"], client_id.to_string());
    assert_eq!(json["resolvedGracePeriod"]["status"], "resolved");
    assert!(h.store.active_grace_period(client_id).await.unwrap().is_none());

    let (_, json) = body(h.http.post(h.url("/cron/grace-periods")).send().await.unwrap()).await;
    assert_eq!(json["data"]["created"], json!([]));
    assert_eq!(json["data"]["skipped"], json!([]));
}

#[tokio::test]
async fn activity_period_errors() {
    let h = Harness::start(None).await;

    let (status, json) = body(
        h.http
            .post(h.url("/clients/not-a-uuid/activity-periods"))
            .bearer_auth(ADMIN)
            .json(&json!({"startDate": "2026-10-10", "endDate": "2026-10-01"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["errors"],
        json!([
            {"field": "clientId", "message": "Invalid id"},
            {"field": "endDate", "message": "Must not be before the start date"},
        ])
    );

    let (status, json) = body(
        h.http
            .post(h.url(&format!("/clients/{}/activity-periods", Uuid::new_v4())))
            .bearer_auth(ADMIN)
            .json(&json!({"startDate": "2026-10-10"}))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Client not found");
}

#[tokio::test]
async fn operators_list_and_resolve_grace_periods() {
    let h = Harness::start(None).await;
    let client_id = h.lapsed_client("flagged", 90).await;
    h.http.post(h.url("/cron/grace-periods")).send().await.unwrap();

    let response = h
        .http
        .get(h.url("/grace-periods"))
        .bearer_auth(NO_ROLE)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let active: Vec<GracePeriod> = h
        .http
        .get(h.url("/grace-periods"))
        .bearer_auth(COACH)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].client_id, client_id);

    let resolve = h.url(&format!("/clients/{client_id}/grace-periods/resolve"));

    let response = h.http.post(&resolve).bearer_auth(COACH).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, json) = body(h.http.post(&resolve).bearer_auth(CS_REP).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "resolved");

    let response = h.http.post(&resolve).bearer_auth(CS_REP).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
