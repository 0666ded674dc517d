use crate::helpers::TestApp;
use chrono::{TimeDelta, Utc};
use reqwest::Response;
use uuid::Uuid;
use wiremock::{
    matchers::{header, method, path},
    Mock, ResponseTemplate,
};

const GMAIL_SEND_PATH: &str = "/gmail/v1/users/me/messages/send";

#[tokio::test]
async fn anonymous_senders_get_a_json_unauthorized() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let resp = app
        .post_send_email(&serde_json::json!({ "leadId": Uuid::new_v4(), "subject": "Hi" }), None)
        .await;

    // Assert
    assert_eq!(401, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("Unauthorized", body["message"]);
}

#[tokio::test]
async fn invalid_drafts_are_rejected_before_sending() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.member).await;

    // Act
    let resp = app
        .post_send_email(&serde_json::json!({ "subject": "  ", "textBody": "Hello" }), None)
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("Invalid email payload.", body["message"]);
    assert!(body["issues"]["leadId"].is_array());
    assert!(body["issues"]["subject"].is_array());
}

#[tokio::test]
async fn wrongly_typed_fields_are_reported_as_field_issues() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.member).await;
    let mut body = draft(Uuid::new_v4());
    body["cc"] = serde_json::json!("a@example.com");

    // Act
    let resp = app.post_send_email(&body, None).await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("Invalid email payload.", body["message"]);
    assert!(body["issues"]["payload"].is_array());
}

#[tokio::test]
async fn members_without_a_mailbox_cannot_send() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.member).await;

    // Act
    let resp = app
        .post_send_email(&draft(lead_id), None)
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        "No workspace email assigned. Please contact an administrator.",
        body["message"]
    );
}

#[tokio::test]
async fn members_cannot_send_from_someone_elses_mailbox() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let own = app.insert_workspace_email("own@example.com", "token", 3600).await;
    let other = app.insert_workspace_email("other@example.com", "token", 3600).await;
    app.assign_workspace(app.member.id, own).await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.member).await;
    let mut body = draft(lead_id);
    body["workspaceEmailId"] = serde_json::json!(other);

    // Act
    let resp = app.post_send_email(&body, None).await;

    // Assert
    assert_eq!(403, resp.status().as_u16());
}

#[tokio::test]
async fn sending_logs_the_email_and_marks_the_lead() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let mailbox = app.insert_workspace_email("sales@example.com", "valid-token", 3600).await;
    app.assign_workspace(app.member.id, mailbox).await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.member).await;

    Mock::given(path(GMAIL_SEND_PATH))
        .and(method("POST"))
        .and(header("Authorization", "Bearer valid-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "msg-1", "threadId": "thread-1" })),
        )
        .expect(1)
        .mount(&app.google_server)
        .await;

    // Act
    let resp = app.post_send_email(&draft(lead_id), None).await;

    // Assert
    assert_eq!(200, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(true, body["success"]);
    assert_eq!("msg-1", body["messageId"]);
    assert_eq!("thread-1", body["threadId"]);

    let status: String = sqlx::query_scalar("SELECT status FROM leads WHERE id = $1")
        .bind(lead_id)
        .fetch_one(&app.db_pool)
        .await
        .unwrap();
    assert_eq!("email-send", status);

    let activity: serde_json::Value = {
        app.post_logout().await;
        app.log_in(&app.admin).await;
        app.get("/admin/email-activity").await.json().await.unwrap()
    };
    let events = activity["events"].as_array().unwrap();
    assert_eq!(1, events.len());
    assert_eq!("Following up", events[0]["subject"]);
    assert_eq!(app.member.email, events[0]["actorEmail"]);
}

#[tokio::test]
async fn retried_sends_are_only_delivered_once() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let mailbox = app.insert_workspace_email("sales@example.com", "valid-token", 3600).await;
    app.assign_workspace(app.member.id, mailbox).await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.member).await;

    Mock::given(path(GMAIL_SEND_PATH))
        .and(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "msg-1", "threadId": "thread-1" })),
        )
        .expect(1)
        .mount(&app.google_server)
        .await;
    let key = Uuid::new_v4().to_string();

    // Act
    let first = app.post_send_email(&draft(lead_id), Some(&key)).await;
    let second = app.post_send_email(&draft(lead_id), Some(&key)).await;

    // Assert
    assert_eq!(200, first.status().as_u16());
    assert_eq!(200, second.status().as_u16());
    assert_eq!(first.text().await.unwrap(), second.text().await.unwrap());
}

#[tokio::test]
async fn expired_access_tokens_are_refreshed_before_sending() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let mailbox = app.insert_workspace_email("sales@example.com", "stale-token", -60).await;
    app.assign_workspace(app.member.id, mailbox).await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.member).await;

    Mock::given(path("/token"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-token",
            "expires_in": 3599,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&app.google_server)
        .await;
    Mock::given(path(GMAIL_SEND_PATH))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "msg-2" })))
        .expect(1)
        .mount(&app.google_server)
        .await;

    // Act
    let resp = app.post_send_email(&draft(lead_id), None).await;

    // Assert
    assert_eq!(200, resp.status().as_u16());
    let stored: String =
        sqlx::query_scalar("SELECT access_token FROM workspace_emails WHERE id = $1")
            .bind(mailbox)
            .fetch_one(&app.db_pool)
            .await
            .unwrap();
    assert_eq!("fresh-token", stored);
}

fn draft(lead_id: Uuid) -> serde_json::Value {
    serde_json::json!({
        "leadId": lead_id,
        "subject": "Following up",
        "textBody": "Hi Ada, do you have a minute this week?",
    })
}

impl TestApp {
    pub async fn post_send_email(
        &self,
        body: &serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Response {
        let mut request = self
            .api_client
            .post(format!("{}/api/send-email", self.addr))
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// A linked mailbox whose access token expires `expires_in` seconds from now.
    pub async fn insert_workspace_email(
        &self,
        email: &str,
        access_token: &str,
        expires_in: i64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO workspace_emails (
                id, email, display_name, access_token, refresh_token, token_expires_at, created_by
            )
            VALUES ($1, $2, 'Sales', $3, 'refresh-token', $4, $5)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(access_token)
        .bind(Utc::now() + TimeDelta::seconds(expires_in))
        .bind(self.admin.id)
        .execute(&self.db_pool)
        .await
        .expect("Failed to insert a workspace email");
        id
    }

    pub async fn assign_workspace(&self, user_id: Uuid, workspace_email_id: Uuid) {
        sqlx::query("UPDATE users SET workspace_email_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(workspace_email_id)
            .execute(&self.db_pool)
            .await
            .expect("Failed to assign a workspace email");
    }
}
