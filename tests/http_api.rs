use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tower::ServiceExt;
use ulid::Ulid;

use courtslot::api::{create_router, AppState};
use courtslot::clock::{local_ms, ManualClock};
use courtslot::config::Policy;
use courtslot::engine::{Collaborators, Engine};
use courtslot::notify::NotifyHub;
use courtslot::pricing::PriceTable;

// ── Test infrastructure ──────────────────────────────────────

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    admin: Ulid,
    prices_file: PathBuf,
}

fn start_test_app() -> TestApp {
    let dir = std::env::temp_dir().join(format!("courtslot_http_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();

    let morning = local_ms(
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        Policy::default().utc_offset,
    );
    let clock = Arc::new(ManualClock::new(morning));
    let hub = Arc::new(NotifyHub::new());
    let prices = Arc::new(PriceTable::new());
    let engine = Engine::new(
        dir.join("bookings.wal"),
        Policy::default(),
        Collaborators {
            notifier: hub.clone(),
            pricing: prices.clone(),
            clock: clock.clone(),
        },
    )
    .unwrap();

    let prices_file = dir.join("prices.json");
    let router = create_router(AppState {
        engine: Arc::new(engine),
        hub,
        prices,
        prices_file: Some(prices_file.clone()),
    });
    TestApp {
        router,
        clock,
        admin: Ulid::new(),
        prices_file,
    }
}

async fn call(app: &TestApp, method: &str, uri: &str, who: Option<(Ulid, &str)>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some((user, role)) = who {
        req = req.header("x-user-id", user.to_string()).header("x-user-role", role);
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register_court(app: &TestApp, manager: Ulid) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/v1/courts",
        Some((app.admin, "admin")),
        Some(json!({ "name": "Court C", "manager_id": manager.to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

fn booking_body(court: &str, start: &str, end: &str, size: &str, team: &str) -> Value {
    json!({
        "court_id": court,
        "date": "2026-10-20",
        "start_time": start,
        "end_time": end,
        "match_size": size,
        "team_name": team,
        "contact_phone": "+1 555 0100",
        "player_count": 5
    })
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_open() {
    let app = start_test_app();
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn slots_list_thirty_entries() {
    let app = start_test_app();
    let court = register_court(&app, Ulid::new()).await;

    let (status, body) = call(&app, "GET", &format!("/v1/courts/{court}/slots?date=2026-10-20"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let slots = body["data"].as_array().unwrap();
    assert_eq!(slots.len(), 30);
    assert_eq!(slots[0]["status"], "past");
    assert_eq!(slots[0]["label"], "6:00 AM - 7:00 AM");
    assert_eq!(slots[2]["status"], "available");
}

#[tokio::test]
async fn unknown_court_is_404_envelope() {
    let app = start_test_app();
    let (status, body) = call(
        &app,
        "GET",
        &format!("/v1/courts/{}/slots?date=2026-10-20", Ulid::new()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn booking_requires_identity() {
    let app = start_test_app();
    let court = register_court(&app, Ulid::new()).await;
    let (status, body) = call(
        &app,
        "POST",
        "/v1/bookings",
        None,
        Some(booking_body(&court, "10:00", "11:00", "5v5", "Rovers")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn malformed_json_is_400_envelope() {
    let app = start_test_app();
    let (status, body) = call(
        &app,
        "POST",
        "/v1/bookings",
        Some((Ulid::new(), "player")),
        Some(json!({ "court_id": "nope" })),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn book_confirm_and_conflict() {
    let app = start_test_app();
    let manager = Ulid::new();
    let court = register_court(&app, manager).await;

    let (status, body) = call(
        &app,
        "PUT",
        &format!("/v1/courts/{court}/prices"),
        Some((manager, "manager")),
        Some(json!([{ "start_time": "10:00 AM", "end_time": "11:00 AM", "match_size": "5v5", "price": "800" }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["entries"], 1);

    // Written back, so a restarted process reloads the same price.
    let reloaded = PriceTable::new();
    assert_eq!(reloaded.load_json(&app.prices_file).unwrap(), 1);

    let alice = Ulid::new();
    let (status, body) = call(
        &app,
        "POST",
        "/v1/bookings",
        Some((alice, "player")),
        Some(booking_body(&court, "10:00 AM", "11:00 AM", "5v5", "Alpha")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["total_price"], "800");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        "PATCH",
        &format!("/v1/bookings/{id}/status"),
        Some((alice, "player")),
        Some(json!({ "status": "confirmed", "payment_method": "cash" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "confirmed");

    let (status, body) = call(
        &app,
        "POST",
        "/v1/bookings",
        Some((Ulid::new(), "player")),
        Some(booking_body(&court, "10:00", "11:00", "5v5", "Late")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "SLOT_CONFLICT");

    let (_, body) = call(&app, "GET", &format!("/v1/courts/{court}/slots?date=2026-10-20"), None, None).await;
    let ten = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["start_time"] == "10:00:00" && s["match_size"] == "5v5")
        .unwrap()
        .clone();
    assert_eq!(ten["status"], "booked");

    let (status, body) = call(&app, "GET", "/v1/stats", Some((app.admin, "admin")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["confirmed"], 1);
    assert_eq!(body["data"]["revenue"], "800");
}

#[tokio::test]
async fn matchmaking_join_over_http() {
    let app = start_test_app();
    let court = register_court(&app, Ulid::new()).await;
    let bravo = Ulid::new();
    let charlie = Ulid::new();

    let mut seek = booking_body(&court, "2:00 PM", "3:00 PM", "7v7", "Bravo");
    seek["matchmaking"] = json!(true);
    let (status, body) = call(&app, "POST", "/v1/bookings", Some((bravo, "player")), Some(seek)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "finding_team");

    let (status, body) = call(
        &app,
        "POST",
        "/v1/bookings/join",
        Some((charlie, "player")),
        Some(booking_body(&court, "14:00", "15:00", "7v7", "Charlie")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["seeker"]["status"], "confirmed");
    assert_eq!(body["data"]["joiner"]["status"], "confirmed");
    assert_eq!(body["data"]["joiner"]["payment_method"], "cash");

    let (status, _) = call(
        &app,
        "POST",
        "/v1/bookings/join",
        Some((Ulid::new(), "player")),
        Some(booking_body(&court, "14:00", "15:00", "7v7", "Delta")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, "GET", &format!("/v1/users/{charlie}/bookings"), Some((charlie, "player")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_inside_last_hour_is_guard_violation() {
    let app = start_test_app();
    let court = register_court(&app, Ulid::new()).await;
    let alice = Ulid::new();

    let (_, body) = call(
        &app,
        "POST",
        "/v1/bookings",
        Some((alice, "player")),
        Some(booking_body(&court, "09:00", "10:00", "5v5", "Alpha")),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    app.clock.advance(2 * 3_600_000 + 30 * 60_000);
    let (status, body) = call(&app, "POST", &format!("/v1/bookings/{id}/cancel"), Some((alice, "player")), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "GUARD_VIOLATION");
}

#[tokio::test]
async fn strangers_get_403() {
    let app = start_test_app();
    let court = register_court(&app, Ulid::new()).await;
    let alice = Ulid::new();
    let (_, body) = call(
        &app,
        "POST",
        "/v1/bookings",
        Some((alice, "player")),
        Some(booking_body(&court, "18:00", "19:00", "5v5", "Alpha")),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "GET", &format!("/v1/bookings/{id}"), Some((Ulid::new(), "player")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = call(
        &app,
        "GET",
        &format!("/v1/courts/{court}/bookings"),
        Some((Ulid::new(), "manager")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
