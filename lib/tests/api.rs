use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use http::{header, Request, StatusCode};
use lettre::Message;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tower::ServiceExt;

use dripline::axum::{layer, router, Router};
use dripline::{Config, Database, DeliveryError, Mailer, NotificationKind, Notifier, Subscriber};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Message>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: Message) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

struct App {
    router: Router,
    db: Arc<Database>,
    mailer: Arc<RecordingMailer>,
    notifier: Notifier,
    _templates: tempfile::TempDir,
}

fn app() -> App {
    let templates = tempfile::tempdir().unwrap();
    let mut config = Config {
        base_url: "https://mail.example.com".to_string(),
        ..Default::default()
    };
    config.campaign.templates = templates.path().to_path_buf();
    let entry = config.campaign.day(1).unwrap();
    std::fs::write(
        templates.path().join(&entry.template),
        r#"<html><body>Hi {{first_name}} <a href="https://x.com">x</a></body></html>"#,
    )
    .unwrap();

    let db = Arc::new(Database::temporary().unwrap());
    let mailer = Arc::new(RecordingMailer::default());
    let notifier = Notifier::new();
    let router = layer(
        router(),
        Arc::new(config),
        db.clone(),
        mailer.clone(),
        notifier.clone(),
    );
    App {
        router,
        db,
        mailer,
        notifier,
        _templates: templates,
    }
}

async fn send(app: &App, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let res = app.router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

async fn get(app: &App, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn post(app: &App, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();
    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn create_subscriber_requires_email() {
    let app = app();
    let (status, body) = post(&app, "/api/subscribers", json!({ "first_name": "Al" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email is required");
}

#[tokio::test]
async fn duplicate_subscriber_conflicts() {
    let app = app();
    let (status, body) = post(&app, "/api/subscribers", json!({ "email": "A@b.com" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["status"], "active");

    let (status, _) = post(&app, "/api/subscribers", json!({ "email": "a@B.com" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn deleting_missing_subscriber_is_not_found() {
    let app = app();
    let uri = format!("/api/subscribers/{}", uuid::Uuid::new_v4());
    let req = Request::delete(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Subscriber not found");
}

#[tokio::test]
async fn status_cannot_go_back_to_active() {
    let app = app();
    let (_, created) = post(&app, "/api/subscribers", json!({ "email": "a@b.com" })).await;
    let uri = format!("/api/subscribers/{}", created["id"].as_str().unwrap());
    let put = |status: &str| {
        Request::put(&uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "status": status }).to_string()))
            .unwrap()
    };

    let (status, _, _) = send(&app, put("unsubscribed")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, put("active")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pixel_is_served_for_unknown_ids() {
    let app = app();
    let req = Request::get("/track-open/not-a-real-id")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/gif");
    assert!(headers[header::CACHE_CONTROL]
        .to_str()
        .unwrap()
        .contains("no-cache"));
    assert_eq!(body, dripline::axum::tracking::PIXEL.to_vec());

    let (_, events) = get(&app, "/api/tracking/events").await;
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["action"], "opened");
    assert_eq!(events[0]["tracking_id"], "not-a-real-id");
}

#[tokio::test]
async fn click_redirects_to_target() {
    let app = app();
    let req = Request::get("/track-click/abc?url=https%3A%2F%2Fx.com%2Fmenu")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "https://x.com/menu");

    let req = Request::get("/track-click/abc?url=javascript%3Aalert(1)")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, req).await;
    assert_eq!(headers[header::LOCATION], "/");

    // a target that can't be put into a header still redirects
    let req = Request::get("/track-click/abc?url=%2Fa%0Ab")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "/");
}

#[tokio::test]
async fn run_sends_and_updates_stats() {
    let app = app();
    post(&app, "/api/subscribers", json!({ "email": "a@b.com" })).await;
    post(&app, "/api/subscribers", json!({ "email": "c@d.com" })).await;

    let (status, body) = post(&app, "/api/campaigns/run", json!({ "day": 1, "batchSize": 10 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Campaign 1 sent successfully");
    assert_eq!(body["results"]["sent"], 2);
    assert_eq!(app.mailer.sent.lock().unwrap().len(), 2);

    let (_, body) = post(&app, "/api/campaigns/run", json!({ "day": 1 })).await;
    assert_eq!(body["message"], "No eligible subscribers found");
    assert_eq!(body["results"]["total"], 0);

    // open one of the sent emails through its tracking id
    let sent: Vec<_> = app
        .db
        .get_collection::<dripline::ActivityEvent>()
        .unwrap();
    let tracking_id = sent[0].tracking_id.clone();
    let req = Request::get(format!("/track-open/{tracking_id}"))
        .body(Body::empty())
        .unwrap();
    send(&app, req).await;

    let (_, stats) = get(&app, "/api/campaigns/stats").await;
    assert_eq!(stats["total_sent"], 2);
    assert_eq!(stats["total_opens"], 1);
    assert_eq!(stats["open_rate"], 50.0);
    assert_eq!(stats["total_subscribers"], 2);

    let (_, days) = get(&app, "/api/tracking/by-day").await;
    assert_eq!(days[0]["day"], 1);
    assert_eq!(days[0]["opens"], 1);

    let subs = app.db.get_collection::<Subscriber>().unwrap();
    assert!(subs.iter().all(|s| s.current_day == 1));
}

#[tokio::test]
async fn run_without_template_is_not_found() {
    let app = app();
    let (status, body) = post(&app, "/api/campaigns/run", json!({ "day": 5 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Template for day 5 not found");
}

#[tokio::test]
async fn unsubscribe_link_requires_token() {
    let app = app();
    let sub = Subscriber::new("a@b.com");
    app.db.set(&sub).unwrap();

    let (status, _) = get(&app, "/unsubscribe?email=a%40b.com&token=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/unsubscribe?email=a%40b.com&token={}", sub.unsubscribe_token);
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let stored = app.db.get::<Subscriber>(sub.id).unwrap();
    assert_eq!(stored.status, dripline::Status::Unsubscribed);
}

#[tokio::test]
async fn bounce_stats_and_deletion() {
    let app = app();
    let bounce = dripline::BounceRecord::new("a@b.com", dripline::BounceType::Soft, "mailbox full");
    app.db.set(&bounce).unwrap();

    let (_, stats) = get(&app, "/api/bounces/stats").await;
    assert_eq!(stats["total_bounces"], 1);
    assert_eq!(stats["bounce_rate"], 0.0);
    assert_eq!(stats["bounce_types"]["soft"], 1);

    let req = Request::delete(format!("/api/bounces/{}", bounce.id))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = send(
        &app,
        Request::delete(format!("/api/bounces/{}", bounce.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn campaign_requires_fields() {
    let app = app();
    let (status, body) = post(&app, "/api/campaigns", json!({ "name": "Spring" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please fill in all required fields");

    let (status, campaign) = post(
        &app,
        "/api/campaigns",
        json!({
            "name": "Spring",
            "subject": "Hello",
            "content": "<p>hi</p>",
            "sender_email": "bar@example.com",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(campaign["status"], "scheduled");
    assert!(campaign["sent_date"].is_null());

    let (_, dashboard) = get(&app, "/api/dashboard").await;
    assert_eq!(dashboard["table_stats"]["campaigns"], 1);
}

async fn post_raw(app: &App, body: &'static str, content_type: Option<&str>) -> (StatusCode, Value) {
    let mut req = Request::post("/api/campaigns/run");
    if let Some(content_type) = content_type {
        req = req.header(header::CONTENT_TYPE, content_type);
    }
    let (status, _, body) = send(app, req.body(Body::from(body)).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn malformed_run_request_sends_nothing() {
    let app = app();
    post(&app, "/api/subscribers", json!({ "email": "a@b.com" })).await;

    for body in [r#"{"day":"3"}"#, r#"{"day":3"#, r#"{"day":1,"batchSize":-5}"#, "day=1"] {
        let (status, res) = post_raw(&app, body, Some("application/json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(res["error"].as_str().unwrap().contains("invalid run request"));
    }
    assert!(app.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_request_is_read_without_content_type() {
    let app = app();
    post(&app, "/api/subscribers", json!({ "email": "a@b.com" })).await;

    // the requested day is honored, there is no template for it
    let (status, body) = post_raw(&app, r#"{"day":3}"#, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Template for day 3 not found");
    assert!(app.mailer.sent.lock().unwrap().is_empty());

    // an empty body runs the first day with defaults
    let (status, body) = post_raw(&app, "", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"]["sent"], 1);
}

async fn first_stream_frame(app: &App, publish: impl FnOnce(&Notifier)) -> String {
    let req = Request::get("/api/stream").body(Body::empty()).unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/event-stream");

    publish(&app.notifier);

    let mut body = res.into_body().into_data_stream();
    let frame = body.next().await.unwrap().unwrap();
    String::from_utf8(frame.to_vec()).unwrap()
}

#[tokio::test]
async fn stream_names_events_by_kind() {
    let app = app();
    let frame = first_stream_frame(&app, |notifier| {
        notifier.publish(NotificationKind::Subscriber);
    })
    .await;
    assert!(frame.contains("event: subscriber\n"), "{frame}");
    assert!(frame.contains("id: 1\n"), "{frame}");
    assert!(frame.contains(r#""seq":1"#), "{frame}");
}

#[tokio::test]
async fn lagging_stream_gets_resync() {
    let app = app();
    let frame = first_stream_frame(&app, |notifier| {
        for _ in 0..dripline::notify::CHANNEL_CAPACITY + 5 {
            notifier.publish(NotificationKind::Activity);
        }
    })
    .await;
    assert!(frame.contains("event: resync\n"), "{frame}");
}
