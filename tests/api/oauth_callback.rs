use crate::helpers::TestApp;
use reqwest::{Response, Url};
use std::collections::HashMap;
use wiremock::{
    matchers::{header, method, path},
    Mock, ResponseTemplate,
};

fn redirect_params(resp: &Response) -> HashMap<String, String> {
    assert_eq!(303, resp.status().as_u16());
    let location = resp.headers().get("Location").unwrap().to_str().unwrap();
    let url = Url::parse(location).unwrap();
    assert_eq!("/admin/workspace-emails", url.path());
    url.query_pairs().into_owned().collect()
}

#[tokio::test]
async fn a_callback_without_a_pending_link_is_rejected() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let resp = app
        .get("/api/google/oauth/callback?code=abc&state=xyz")
        .await;

    // Assert
    let params = redirect_params(&resp);
    assert_eq!(
        "Authorization session expired. Please start over.",
        params["error"]
    );
}

#[tokio::test]
async fn linking_a_mailbox_stores_its_tokens() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;
    let state = app.start_linking("sales@example.com").await;

    Mock::given(path("/token"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 3599,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&app.google_server)
        .await;
    Mock::given(path("/gmail/v1/users/me/profile"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "emailAddress": "sales@example.com" })),
        )
        .expect(1)
        .mount(&app.google_server)
        .await;

    // Act
    let resp = app
        .get(&format!("/api/google/oauth/callback?code=auth-code&state={state}"))
        .await;

    // Assert
    let params = redirect_params(&resp);
    assert_eq!("linked", params["status"]);

    let mailboxes: serde_json::Value = app.get("/admin/workspace-emails").await.json().await.unwrap();
    let mailboxes = mailboxes.as_array().unwrap();
    assert_eq!(1, mailboxes.len());
    assert_eq!("sales@example.com", mailboxes[0]["email"]);
    assert!(mailboxes[0].get("accessToken").is_none());
    assert!(mailboxes[0].get("refreshToken").is_none());
}

#[tokio::test]
async fn a_mismatched_state_is_rejected() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;
    app.start_linking("sales@example.com").await;

    // Act
    let resp = app
        .get("/api/google/oauth/callback?code=auth-code&state=forged")
        .await;

    // Assert
    let params = redirect_params(&resp);
    assert_eq!("Authorization state mismatch. Please start over.", params["error"]);
    assert_eq!(0, app.count_rows("workspace_emails").await);
}

#[tokio::test]
async fn an_invalid_client_gets_a_configuration_hint() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.admin).await;
    let state = app.start_linking("sales@example.com").await;

    Mock::given(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "The OAuth client was not found.",
        })))
        .mount(&app.google_server)
        .await;

    // Act
    let resp = app
        .get(&format!("/api/google/oauth/callback?code=auth-code&state={state}"))
        .await;

    // Assert
    let params = redirect_params(&resp);
    assert!(params["error"].starts_with("Google OAuth invalid_client."));
}

impl TestApp {
    /// Starts the consent flow as the signed-in admin and returns its state token.
    async fn start_linking(&self, email: &str) -> String {
        let resp = self
            .post_json(
                "/admin/workspace-emails",
                &serde_json::json!({ "email": email, "displayName": "Sales" }),
            )
            .await;
        assert_eq!(200, resp.status().as_u16());

        let body: serde_json::Value = resp.json().await.unwrap();
        let auth_url = Url::parse(body["authUrl"].as_str().unwrap()).unwrap();
        let params: HashMap<String, String> = auth_url.query_pairs().into_owned().collect();
        assert_eq!(email, params["login_hint"]);
        params["state"].clone()
    }
}
