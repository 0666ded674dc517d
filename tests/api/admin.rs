use crate::helpers::{assert_redirects_to, TestApp};
use regex::Regex;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

#[tokio::test]
async fn team_members_cannot_reach_admin_pages() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.member).await;

    // Act
    let resp = app.get("/admin/leads").await;

    // Assert
    assert_eq!(403, resp.status().as_u16());
}

#[tokio::test]
async fn the_dashboard_counts_this_weeks_leads() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.create_lead("Grace Hopper", "grace@example.com").await;
    app.log_in(&app.admin).await;

    // Act
    let dashboard: serde_json::Value = app.get("/admin/dashboard").await.json().await.unwrap();

    // Assert
    assert_eq!(2, dashboard["totalLeads"]);
    assert_eq!(2, dashboard["leadsThisWeek"]);
    assert_eq!(0, dashboard["emailsThisWeek"]);
    assert_eq!(2, dashboard["latestLeads"].as_array().unwrap().len());
}

#[tokio::test]
async fn assigning_a_lead_records_an_event() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.admin).await;

    // Act
    let resp = app
        .post_json(
            &format!("/admin/leads/{lead_id}/assign"),
            &serde_json::json!({ "assignedTo": app.member.id }),
        )
        .await;

    // Assert
    assert_eq!(200, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(app.member.id.to_string(), body["lead"]["assignedTo"]);

    let event_type: String = sqlx::query_scalar(
        "SELECT event_type FROM lead_events WHERE lead_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(lead_id)
    .fetch_one(&app.db_pool)
    .await
    .unwrap();
    assert_eq!("assigned", event_type);
}

#[tokio::test]
async fn leads_can_be_unassigned() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.admin).await;
    let path = format!("/admin/leads/{lead_id}/assign");
    app.post_json(&path, &serde_json::json!({ "assignedTo": app.member.id }))
        .await;

    // Act
    let resp = app
        .post_json(&path, &serde_json::json!({ "assignedTo": "unassign" }))
        .await;

    // Assert
    assert_eq!(200, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["lead"]["assignedTo"].is_null());
}

#[tokio::test]
async fn assignments_are_validated() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.admin).await;

    // Act - Part 1 - Unknown member
    let resp = app
        .post_json(
            &format!("/admin/leads/{lead_id}/assign"),
            &serde_json::json!({ "assignedTo": Uuid::new_v4() }),
        )
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("Unknown team member.", body["issues"]["assignedTo"][0]);

    // Act - Part 2 - Unknown lead
    let resp = app
        .post_json(
            &format!("/admin/leads/{}/assign", Uuid::new_v4()),
            &serde_json::json!({ "assignedTo": app.member.id }),
        )
        .await;

    // Assert
    assert_eq!(404, resp.status().as_u16());

    // Act - Part 3 - Garbage target
    let resp = app
        .post_json(
            &format!("/admin/leads/{lead_id}/assign"),
            &serde_json::json!({ "assignedTo": "nobody" }),
        )
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
}

#[tokio::test]
async fn admins_can_add_team_members_who_can_then_sign_in() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;
    let body = serde_json::json!({
        "fullName": "Grace Hopper",
        "email": "Grace@Example.com",
        "password": "cobol-forever",
    });

    // Act - Part 1 - Create the member
    let resp = app.post_json("/admin/team", &body).await;
    assert_eq!(201, resp.status().as_u16());

    // Act - Part 2 - Same email again
    let resp = app.post_json("/admin/team", &body).await;
    assert_eq!(409, resp.status().as_u16());

    // Act - Part 3 - The member signs in
    app.post_logout().await;
    let resp = app.post_login("grace@example.com", "cobol-forever").await;

    // Assert
    assert_redirects_to(&resp, "/otp");
}

#[tokio::test]
async fn invalid_team_members_are_reported_field_by_field() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;

    // Act
    let resp = app
        .post_json(
            "/admin/team",
            &serde_json::json!({ "fullName": "", "email": "nope", "password": "short" }),
        )
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    for field in ["fullName", "email", "password"] {
        assert!(body["issues"][field].is_array(), "No issue was reported for {field}.");
    }
}

#[tokio::test]
async fn invited_members_receive_a_temporary_password_they_can_sign_in_with() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;
    let body = serde_json::json!({ "email": "New.Hire@Example.com", "fullName": "New Hire" });

    // Act - Part 1 - Send the invite
    let resp = app.post_json("/admin/team/invite", &body).await;

    // Assert
    assert_eq!(201, resp.status().as_u16());
    let requests = app.email_server.received_requests().await.unwrap();
    let invite: serde_json::Value = requests.last().unwrap().body_json().unwrap();
    assert_eq!("new.hire@example.com", invite["to"][0]);
    assert_eq!(app.admin.email, invite["reply_to"]);
    let text = invite["text"].as_str().unwrap();
    assert!(text.contains("/login"));
    let password = Regex::new(r"Temporary password: (\w+)")
        .unwrap()
        .captures(text)
        .unwrap()[1]
        .to_string();

    // Act - Part 2 - Same email again
    let resp = app.post_json("/admin/team/invite", &body).await;
    assert_eq!(409, resp.status().as_u16());

    // Act - Part 3 - The invited member signs in
    app.post_logout().await;
    let resp = app.post_login("new.hire@example.com", &password).await;

    // Assert
    assert_redirects_to(&resp, "/otp");
}

#[tokio::test]
async fn no_account_is_kept_when_the_invite_email_fails() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;
    app.email_server.reset().await;
    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // Act
    let resp = app
        .post_json("/admin/team/invite", &serde_json::json!({ "email": "new@example.com" }))
        .await;

    // Assert
    assert_eq!(500, resp.status().as_u16());
    assert_eq!(2, app.count_rows("users").await);
}

#[tokio::test]
async fn invites_need_a_valid_email() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;

    // Act
    let resp = app
        .post_json("/admin/team/invite", &serde_json::json!({ "email": "nope" }))
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["issues"]["email"].is_array());
}

#[tokio::test]
async fn removing_a_member_unassigns_their_leads() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.admin).await;
    app.post_json(
        &format!("/admin/leads/{lead_id}/assign"),
        &serde_json::json!({ "assignedTo": app.member.id }),
    )
    .await;

    // Act
    let resp = app
        .post_json(
            &format!("/admin/team/{}/delete", app.member.id),
            &serde_json::json!({}),
        )
        .await;

    // Assert
    assert_eq!(200, resp.status().as_u16());
    let assigned_to: Option<Uuid> =
        sqlx::query_scalar("SELECT assigned_to FROM leads WHERE id = $1")
            .bind(lead_id)
            .fetch_one(&app.db_pool)
            .await
            .unwrap();
    assert_eq!(None, assigned_to);
}

#[tokio::test]
async fn admins_cannot_remove_themselves() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;

    // Act
    let resp = app
        .post_json(
            &format!("/admin/team/{}/delete", app.admin.id),
            &serde_json::json!({}),
        )
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("You cannot remove your own account.", body["message"]);
}

#[tokio::test]
async fn assigned_mailboxes_cannot_be_deleted() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let mailbox = app.insert_workspace_email("sales@example.com", "token", 3600).await;
    app.log_in(&app.admin).await;
    let resp = app
        .post_json(
            &format!("/admin/team/{}/workspace-email", app.member.id),
            &serde_json::json!({ "workspaceEmailId": mailbox }),
        )
        .await;
    assert_eq!(200, resp.status().as_u16());
    let delete_path = format!("/admin/workspace-emails/{mailbox}/delete");

    // Act - Part 1 - Delete while assigned
    let resp = app.post_json(&delete_path, &serde_json::json!({})).await;
    assert_eq!(409, resp.status().as_u16());
    assert_eq!(1, app.count_rows("workspace_emails").await);

    // Act - Part 2 - Unassign, then delete
    app.post_json(
        &format!("/admin/team/{}/workspace-email", app.member.id),
        &serde_json::json!({ "workspaceEmailId": "unassign" }),
    )
    .await;
    let resp = app.post_json(&delete_path, &serde_json::json!({})).await;

    // Assert
    assert_eq!(200, resp.status().as_u16());
    assert_eq!(0, app.count_rows("workspace_emails").await);

    // Act - Part 3 - Already gone
    let resp = app.post_json(&delete_path, &serde_json::json!({})).await;
    assert_eq!(404, resp.status().as_u16());
}

#[tokio::test]
async fn templates_are_stored_with_a_plain_text_body() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;

    // Act - Part 1 - Create the template
    let resp = app
        .post_json(
            "/admin/email-templates",
            &serde_json::json!({
                "templateName": "Intro",
                "subject": "Nice to meet you",
                "body": "<p>Hi there</p><p>Talk soon</p>",
            }),
        )
        .await;

    // Assert
    assert_eq!(201, resp.status().as_u16());
    let template: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("Hi there\nTalk soon", template["bodyText"]);

    // Act - Part 2 - Team members can read it
    app.post_logout().await;
    app.log_in(&app.member).await;
    let templates: serde_json::Value = app.get("/team/email-templates").await.json().await.unwrap();
    assert_eq!(1, templates.as_array().unwrap().len());
}

#[tokio::test]
async fn invalid_templates_are_rejected() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;

    // Act
    let resp = app
        .post_json(
            "/admin/email-templates",
            &serde_json::json!({ "templateName": "x", "subject": "Hi", "body": "" }),
        )
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("Invalid template.", body["message"]);
    assert!(body["issues"]["body"].is_array());
}
