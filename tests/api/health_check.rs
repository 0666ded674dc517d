use crate::helpers::TestApp;

#[tokio::test]
async fn health_check_works() {
    // Arrange
    let app = TestApp::spawn().await;

    // Act
    let resp = app.get("/health_check").await;

    // Assert
    assert!(resp.status().is_success());
    assert_eq!(Some(0), resp.content_length());
}
