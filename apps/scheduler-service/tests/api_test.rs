//! 内部 API のルーティングテスト
//!
//! `build_router` で組み立てたルーターに `oneshot` でリクエストを送り、
//! ステータスコードとレスポンス本文を検証する。

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use chrono::{DateTime, Utc};
use followupmate_domain::{
    clock::{Clock, FixedClock},
    schedule::{DelayTable, FollowUpPolicy},
};
use followupmate_infra::mock::{
    MockEmailLogRepository,
    MockFollowUpRepository,
    MockMessageTemplateRepository,
    MockNotificationSender,
    MockUserRepository,
};
use followupmate_scheduler_service::{
    app_builder::build_router,
    handler::{FollowUpApiState, SchedulerState},
    usecase::{
        FollowUpUseCase,
        notification::{DeliveryAdapter, TemplateRenderer},
        scheduling::{SchedulerRunner, SchedulingPass},
    },
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

const OWNER: &str = "0190a000-0000-7000-8000-000000000001";
const OTHER: &str = "0190a000-0000-7000-8000-000000000002";

fn app() -> Router {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
        DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap(),
    ));
    let followups = MockFollowUpRepository::new();
    let delivery = DeliveryAdapter::new(
        Arc::new(MockNotificationSender::new()),
        Arc::new(MockEmailLogRepository::new()),
        clock.clone(),
        Duration::from_secs(30),
    );
    let pass = SchedulingPass::new(
        Arc::new(followups.clone()),
        Arc::new(MockMessageTemplateRepository::new()),
        Arc::new(MockUserRepository::new()),
        TemplateRenderer::new().unwrap(),
        delivery,
        DelayTable::default(),
    );
    let followup_state = Arc::new(FollowUpApiState {
        usecase: FollowUpUseCase::new(
            Arc::new(followups),
            clock.clone(),
            FollowUpPolicy::default(),
        ),
    });
    let scheduler_state = Arc::new(SchedulerState {
        runner: Arc::new(SchedulerRunner::new(pass, clock)),
    });
    build_router(followup_state, scheduler_state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn create_body() -> Value {
    json!({
        "client_name": "田中太郎",
        "client_email": "tanaka@example.com",
        "subject": "ご提案の件について",
        "follow_up_date": "2025-07-01",
        "follow_up_time": "09:30"
    })
}

async fn create(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/internal/follow-ups?user_id={OWNER}"),
        Some(create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_ヘルスチェックはhealthyを返す() {
    let (status, body) = send(&app(), Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_作成したフォローアップが一覧に含まれる() {
    let app = app();
    let id = create(&app).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/internal/follow-ups?user_id={OWNER}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], id.as_str());
    assert_eq!(items[0]["status"], "pending");
    assert_eq!(items[0]["scheduling_state"], "scheduled");
    assert_eq!(items[0]["attempt_count"], 0);
    assert_eq!(items[0]["max_attempts"], 3);
    assert_eq!(items[0]["follow_up_time"], "09:30");
    assert_eq!(items[0]["next_due_at"], "2025-07-01T09:30:00Z");
}

#[tokio::test]
async fn test_不正な入力の作成は400を返す() {
    let mut body = create_body();
    body["client_email"] = json!("not-an-email");

    let (status, _) = send(
        &app(),
        Method::POST,
        &format!("/internal/follow-ups?user_id={OWNER}"),
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_返信済みにすると送信状態がrepliedになる() {
    let app = app();
    let id = create(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/internal/follow-ups/{id}/replied?user_id={OWNER}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["scheduling_state"], "replied");
    assert!(body["data"]["replied_at"].is_string());
}

#[tokio::test]
async fn test_ステータスを変更できる() {
    let app = app();
    let id = create(&app).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/internal/follow-ups/{id}/status?user_id={OWNER}"),
        Some(json!({ "status": "cancelled" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
}

#[tokio::test]
async fn test_不明なステータスは400を返す() {
    let app = app();
    let id = create(&app).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/internal/follow-ups/{id}/status?user_id={OWNER}"),
        Some(json!({ "status": "archived" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_期日を変更すると次回送信予定が更新される() {
    let app = app();
    let id = create(&app).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/internal/follow-ups/{id}/schedule?user_id={OWNER}"),
        Some(json!({ "follow_up_date": "2025-08-15" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["next_due_at"], "2025-08-15T00:00:00Z");
}

#[tokio::test]
async fn test_他人のフォローアップは404を返す() {
    let app = app();
    let id = create(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/internal/follow-ups/{id}/replied?user_id={OTHER}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_削除すると204を返し一覧から消える() {
    let app = app();
    let id = create(&app).await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/internal/follow-ups/{id}?user_id={OWNER}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/internal/follow-ups/{}?user_id={OWNER}", Uuid::now_v7()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/internal/follow-ups?user_id={OWNER}"),
        None,
    )
    .await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_スケジューラを手動実行すると集計を返す() {
    let (status, body) = send(&app(), Method::POST, "/internal/scheduler/run", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "due": 0, "sent": 0, "failed": 0, "exhausted": 0, "superseded": 0 })
    );
}
