use crate::helpers::spawn_app;

#[tokio::test]
async fn health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/health_check", app.addr))
        .send()
        .await
        .expect("execute request");
    assert!(resp.status().is_success());

    assert_eq!(resp.content_length().unwrap(), 0); // empty body
}

#[tokio::test]
async fn health_check_has_no_cors_headers() {
    let app = spawn_app().await;
    let resp = reqwest::Client::new()
        .get(format!("{}/health_check", app.addr))
        .header("Origin", "https://plannosaur.com")
        .send()
        .await
        .expect("execute request");

    assert!(resp.headers().get("access-control-allow-origin").is_none());
}
