mod common;

use common::{ADMIN_TOKEN, spawn_test_server, spawn_with};
use entitle_types::Sn;
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Auth ─────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_require_the_bearer_token() {
    let server = spawn_test_server().await;

    let (missing, body) = server.post("/admin/licenses/purge-disabled", json!({})).await;
    assert_eq!(missing, 401);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let wrong = server
        .client
        .post(server.url("/admin/licenses/purge-disabled"))
        .bearer_auth("not-the-token")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    let (ok, _) = server.admin_post("/admin/licenses/purge-disabled", json!({})).await;
    assert_eq!(ok, 200);
}

#[tokio::test]
async fn admin_routes_are_locked_without_a_configured_token() {
    let server = spawn_with(None).await;

    let resp = server
        .client
        .get(server.url("/admin/notify/tasks/1"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn client_routes_do_not_need_the_token() {
    let server = spawn_with(None).await;
    let (status, _) = server.post("/activate", json!({"sn": "X"})).await;
    assert_eq!(status, 200);
}

// ── Inventory ────────────────────────────────────────────────────

#[tokio::test]
async fn created_licenses_are_claimable() {
    let server = spawn_test_server().await;

    let (status, body) = server
        .admin_post("/admin/licenses", json!({"count": 3, "validDays": 30}))
        .await;
    assert_eq!(status, 200);
    let sns: Vec<String> = serde_json::from_value(body["sns"].clone()).unwrap();
    assert_eq!(sns.len(), 3);
    assert!(sns.iter().all(|s| Sn::from_stored(s.as_str()).is_canonical_format()));

    let (_, claimed) = server.post("/request-sn", json!({"email": "ann@example.com"})).await;
    assert_eq!(claimed["code"], "SUCCESS");
    assert!(sns.contains(&claimed["sn"].as_str().unwrap().to_string()));
}

#[tokio::test]
async fn license_batch_size_is_bounded() {
    let server = spawn_test_server().await;

    let (zero, body) = server.admin_post("/admin/licenses", json!({"count": 0})).await;
    let (huge, _) = server.admin_post("/admin/licenses", json!({"count": 1001})).await;

    assert_eq!(zero, 400);
    assert_eq!(body["code"], "INVALID_REQUEST");
    assert_eq!(huge, 400);
}

#[tokio::test]
async fn out_of_range_validity_is_rejected_and_inventory_stays_usable() {
    let server = spawn_test_server().await;

    for days in [0, -5, 100_000_000] {
        let (status, body) = server
            .admin_post("/admin/licenses", json!({"count": 1, "validDays": days}))
            .await;
        assert_eq!(status, 400, "validDays {days}");
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    server.seed("AAAA-BBBB-CCCC-0001");
    let (status, claimed) = server.post("/request-sn", json!({"email": "ann@example.com"})).await;
    assert_eq!(status, 200);
    assert_eq!(claimed["sn"], "AAAA-BBBB-CCCC-0001");
}

#[tokio::test]
async fn disabling_an_sn_blocks_activation() {
    let server = spawn_test_server().await;
    server.seed("AAAA-BBBB-CCCC-0001");
    server.post("/request-sn", json!({"email": "ann@example.com"})).await;

    let (status, _) = server
        .admin_post(
            "/admin/licenses/active",
            json!({"sn": "AAAA-BBBB-CCCC-0001", "active": false}),
        )
        .await;
    assert_eq!(status, 200);

    let (_, body) = server.post("/activate", json!({"sn": "AAAA-BBBB-CCCC-0001"})).await;
    assert_eq!(body["code"], "SN_DISABLED");
}

#[tokio::test]
async fn deleting_an_unknown_sn_is_not_found() {
    let server = spawn_test_server().await;

    let (status, body) = server
        .admin_post("/admin/licenses/delete", json!({"sn": "ZZZZ-ZZZZ-ZZZZ-ZZZZ"}))
        .await;

    assert_eq!(status, 404);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn force_delete_removes_a_bound_sn() {
    let server = spawn_test_server().await;
    server.seed("AAAA-BBBB-CCCC-0001");
    server.post("/request-sn", json!({"email": "ann@example.com"})).await;

    let (status, _) = server
        .admin_post("/admin/licenses/delete", json!({"sn": "AAAA-BBBB-CCCC-0001"}))
        .await;
    assert_eq!(status, 200);

    let (_, body) = server.post("/activate", json!({"sn": "AAAA-BBBB-CCCC-0001"})).await;
    assert_eq!(body["code"], "INVALID_SN");
}

// ── Notification tasks ───────────────────────────────────────────

#[tokio::test]
async fn notify_task_runs_to_completion() {
    let server = spawn_test_server().await;
    let emails: Vec<String> = (0..7).map(|i| format!("user{i}@example.com")).collect();

    let (status, started) = server
        .admin_post(
            "/admin/notify/tasks",
            json!({"subject": "Hello {{.Email}}", "body": "<p>news</p>", "emails": emails}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(started["totalCount"], 7);

    let task_id = started["taskId"].as_i64().unwrap();
    let done = server.wait_task_done(task_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["sentCount"], 7);
    assert_eq!(done["pending"], 0);
    assert!(done["completedAt"].is_string());

    let sent = server.mailer.sent();
    assert_eq!(sent.len(), 7);
    assert!(sent.iter().any(|(to, subject)| {
        to == "user3@example.com" && subject == "Hello user3@example.com"
    }));
}

#[tokio::test]
async fn notify_task_without_recipients_is_refused() {
    let server = spawn_test_server().await;

    let (status, body) = server
        .admin_post(
            "/admin/notify/tasks",
            json!({"subject": "Hello", "body": "news", "emails": ["  "]}),
        )
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn simultaneous_task_starts_admit_one() {
    let server = spawn_test_server().await;
    let emails: Vec<String> = (0..200).map(|i| format!("user{i}@example.com")).collect();
    let body = json!({"subject": "Hello", "body": "<p>news</p>", "emails": emails});

    let ((a, first), (b, second)) = tokio::join!(
        server.admin_post("/admin/notify/tasks", body.clone()),
        server.admin_post("/admin/notify/tasks", body.clone())
    );

    let mut statuses = vec![a, b];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 409]);
    let (started, rejected) = if a == 200 { (first, second) } else { (second, first) };
    assert_eq!(rejected["code"], "TASK_RUNNING");

    let done = server.wait_task_done(started["taskId"].as_i64().unwrap()).await;
    assert_eq!(done["sentCount"], 200);
}

#[tokio::test]
async fn unknown_task_is_not_found_and_cannot_be_cancelled() {
    let server = spawn_test_server().await;

    let (status, _) = server.admin_get("/admin/notify/tasks/42").await;
    assert_eq!(status, 404);

    let (status, body) = server.admin_post("/admin/notify/tasks/42/cancel", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "TASK_NOT_RUNNING");
}
