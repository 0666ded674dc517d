use crate::helpers::TestApp;
use uuid::Uuid;

#[tokio::test]
async fn members_only_see_their_own_leads() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let mine = app.create_lead("Ada Lovelace", "ada@example.com").await;
    let theirs = app.create_lead("Grace Hopper", "grace@example.com").await;
    app.assign(mine, app.member.id).await;
    app.log_in(&app.member).await;

    // Act - Part 1 - List
    let leads: serde_json::Value = app.get("/team/leads").await.json().await.unwrap();

    // Assert
    let leads = leads.as_array().unwrap();
    assert_eq!(1, leads.len());
    assert_eq!(mine.to_string(), leads[0]["id"]);

    // Act - Part 2 - Someone else's lead
    let resp = app.get(&format!("/team/leads/{theirs}")).await;

    // Assert
    assert_eq!(404, resp.status().as_u16());
}

#[tokio::test]
async fn the_lead_detail_includes_its_history() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.assign(lead_id, app.member.id).await;
    app.log_in(&app.member).await;

    // Act
    let resp = app.get(&format!("/team/leads/{lead_id}")).await;

    // Assert
    assert_eq!(200, resp.status().as_u16());
    let detail: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("Ada Lovelace", detail["lead"]["name"]);
    let events: Vec<&str> = detail["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["eventType"].as_str().unwrap())
        .collect();
    assert!(events.contains(&"created"));
    assert!(detail["workspaceEmailId"].is_null());
    assert!(detail["templates"].is_array());
}

#[tokio::test]
async fn members_can_move_their_leads_through_the_pipeline() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.assign(lead_id, app.member.id).await;
    app.log_in(&app.member).await;
    let path = format!("/team/leads/{lead_id}/status");

    // Act - Part 1 - Unknown status
    let resp = app
        .post_json(&path, &serde_json::json!({ "status": "archived" }))
        .await;

    // Assert
    assert_eq!(400, resp.status().as_u16());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!("Invalid status.", body["message"]);

    // Act - Part 2 - Valid status
    let resp = app
        .post_json(&path, &serde_json::json!({ "status": "qualified" }))
        .await;

    // Assert
    assert_eq!(200, resp.status().as_u16());
    let dashboard: serde_json::Value = app.get("/team/dashboard").await.json().await.unwrap();
    assert_eq!(1, dashboard["totalLeads"]);
    assert_eq!(1, dashboard["activeLeads"]);
    assert_eq!("qualified", dashboard["recentLeads"][0]["status"]);

    let payload: serde_json::Value = sqlx::query_scalar(
        "SELECT payload FROM lead_events WHERE lead_id = $1 AND event_type = 'status_changed'",
    )
    .bind(lead_id)
    .fetch_one(&app.db_pool)
    .await
    .unwrap();
    assert_eq!("new", payload["from"]);
    assert_eq!("qualified", payload["to"]);
}

#[tokio::test]
async fn members_cannot_change_leads_they_do_not_own() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let lead_id = app.create_lead("Ada Lovelace", "ada@example.com").await;
    app.log_in(&app.member).await;

    // Act
    let resp = app
        .post_json(
            &format!("/team/leads/{lead_id}/status"),
            &serde_json::json!({ "status": "won" }),
        )
        .await;

    // Assert
    assert_eq!(404, resp.status().as_u16());
}

impl TestApp {
    async fn assign(&self, lead_id: Uuid, user_id: Uuid) {
        sqlx::query("UPDATE leads SET assigned_to = $2 WHERE id = $1")
            .bind(lead_id)
            .bind(user_id)
            .execute(&self.db_pool)
            .await
            .expect("Failed to assign a lead");
    }
}
