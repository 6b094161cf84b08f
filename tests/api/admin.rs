use std::collections::HashSet;

use serde_json::json;
use serde_json::Value;
use uuid::Uuid;

use crate::helpers::spawn_app;
use crate::helpers::TestApp;
use crate::helpers::ADMIN_KEY;

async fn seed(
    app: &TestApp,
    n: usize,
) {
    // distinct addresses, so that seeding is not rate limited
    for i in 1..=n {
        let resp = app
            .post_waitlist_from(
                &format!("10.0.0.{i}"),
                &json!({ "email": format!("user{i}@example.com"), "utmMedium": "cpc" }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 200);
    }
}

#[tokio::test]
async fn list_second_page() {
    let app = spawn_app().await;
    seed(&app, 25).await;

    let resp = app.get_signups(Some(ADMIN_KEY), "page=2&limit=10").await;
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total"], 25);
    assert_eq!(body["page"], 2);
    assert_eq!(body["pages"], 3);

    let signups = body["signups"].as_array().unwrap();
    let emails: Vec<&str> = signups
        .iter()
        .map(|s| s["email"].as_str().unwrap())
        .collect();
    let expected: Vec<String> = (6..=15).rev().map(|i| format!("user{i}@example.com")).collect();
    assert_eq!(emails, expected);

    let first = signups[0].as_object().unwrap();
    for field in ["id", "email", "source", "created_at", "utm_source", "utm_medium", "utm_campaign"] {
        assert!(first.contains_key(field), "{field}");
    }
    assert!(!first.contains_key("ip_address"));
    assert_eq!(first["utm_medium"], "cpc");
}

#[tokio::test]
async fn list_defaults() {
    let app = spawn_app().await;
    seed(&app, 3).await;

    let body: Value = app
        .get_signups(Some(ADMIN_KEY), "page=x&limit=")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["page"], 1);
    assert_eq!(body["pages"], 1);
    assert_eq!(body["signups"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn list_empty() {
    let app = spawn_app().await;
    let body: Value = app
        .get_signups(Some(ADMIN_KEY), "")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "signups": [], "total": 0, "page": 1, "pages": 0 }));
}

#[tokio::test]
async fn list_unauthorized() {
    let app = spawn_app().await;
    seed(&app, 1).await;

    for key in [None, Some(""), Some("wrong")] {
        let resp = app.get_signups(key, "").await;
        assert_eq!(resp.status().as_u16(), 405, "{key:?}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "message": "Method Not Allowed" }));
    }
}

#[tokio::test]
async fn list_pages_do_not_overlap_on_equal_timestamps() {
    let app = spawn_app().await;
    for i in 0..25 {
        sqlx::query(
            "INSERT INTO waitlist_signups (id, email, ip_address, created_at) VALUES ($1, $2, \
             '10.0.0.1', '2024-10-15T00:00:00Z')",
        )
        .bind(Uuid::new_v4())
        .bind(format!("same{i}@example.com"))
        .execute(&app.pool)
        .await
        .unwrap();
    }

    let mut seen = Vec::new();
    for page in 1..=3 {
        let body: Value = app
            .get_signups(Some(ADMIN_KEY), &format!("page={page}&limit=10"))
            .await
            .json()
            .await
            .unwrap();
        for s in body["signups"].as_array().unwrap() {
            seen.push(s["id"].as_str().unwrap().to_string());
        }
    }

    assert_eq!(seen.len(), 25);
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), 25);
}
