use crate::helpers::{self, TestApp};
use reqwest::Response;
use uuid::Uuid;

#[tokio::test]
async fn you_must_be_logged_in_to_see_the_change_password_form() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let resp = app.get("/account/password").await;

    // Assert
    helpers::assert_redirects_to(&resp, "/login")
}

#[tokio::test]
async fn you_must_be_logged_in_to_change_your_password() {
    // Arrange
    let app = TestApp::spawn().await;
    let new_password = Uuid::new_v4();

    // Act
    let resp = app
        .post_change_password(&serde_json::json!({
            "current_password": Uuid::new_v4(),
            "new_password": &new_password,
            "new_password_check": &new_password,
        }))
        .await;

    // Assert
    helpers::assert_redirects_to(&resp, "/login")
}

#[tokio::test]
async fn new_password_fields_must_match() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.member).await;

    // Act - Part 1 - Try to change the password
    let resp = app
        .post_change_password(&serde_json::json!({
            "current_password": &app.member.password,
            "new_password": Uuid::new_v4(),
            "new_password_check": Uuid::new_v4(),
        }))
        .await;

    // Assert
    helpers::assert_redirects_to(&resp, "/account/password");

    // Act - Part 2 - Follow the redirect
    let html = app.get_html("/account/password").await;
    assert!(html.contains(
        "<p><i>You entered two different new passwords - the field values must match.</i></p>"
    ))
}

#[tokio::test]
async fn current_password_must_be_valid() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let new_password = Uuid::new_v4();
    app.log_in(&app.member).await;

    // Act - Part 1 - Try to change the password
    let resp = app
        .post_change_password(&serde_json::json!({
            "current_password": Uuid::new_v4(),
            "new_password": &new_password,
            "new_password_check": &new_password,
        }))
        .await;

    // Assert
    helpers::assert_redirects_to(&resp, "/account/password");

    // Act - Part 2 - Follow the redirect
    let html = app.get_html("/account/password").await;
    assert!(html.contains("<p><i>The current password is incorrect.</i></p>"))
}

#[tokio::test]
async fn new_password_must_be_long_enough() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    app.log_in(&app.member).await;

    // Act
    let resp = app
        .post_change_password(&serde_json::json!({
            "current_password": &app.member.password,
            "new_password": "short",
            "new_password_check": "short",
        }))
        .await;

    // Assert
    helpers::assert_redirects_to(&resp, "/account/password");
    let html = app.get_html("/account/password").await;
    assert!(html.contains("Passwords must be between 8 and 128 characters long."))
}

#[tokio::test]
async fn changing_password_works() {
    // Arrange
    let app = TestApp::spawn_with_db().await;
    let new_password = Uuid::new_v4().to_string();
    app.log_in(&app.member).await;

    // Act - Part 1 - Change password
    let resp = app
        .post_change_password(&serde_json::json!({
            "current_password": &app.member.password,
            "new_password": &new_password,
            "new_password_check": &new_password,
        }))
        .await;
    helpers::assert_redirects_to(&resp, "/account/password");

    // Act - Part 2 - Follow the redirect
    let html = app.get_html("/account/password").await;
    assert!(html.contains("<p><i>Your password has been changed.</i></p>"));

    // Act - Part 3 - The old password no longer works
    app.post_logout().await;
    let resp = app.post_login(&app.member.email, &app.member.password).await;
    helpers::assert_redirects_to(&resp, "/login");

    // Act - Part 4 - The new one does
    let resp = app.post_login(&app.member.email, &new_password).await;
    helpers::assert_redirects_to(&resp, "/otp");
}

impl TestApp {
    async fn post_change_password(&self, body: &serde_json::Value) -> Response {
        self.post_form("/account/password", body).await
    }
}
