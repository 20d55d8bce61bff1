mod common;

use anyhow::Result;
use axum::http::{header, StatusCode};
use serde_json::json;

use common::TestApp;
use dyntables::config::AppConfig;

async fn product_table(app: &TestApp) -> Result<String> {
    let id = app.create_table("Summer Stock", "sale", "private").await?;
    app.add_column(&id, json!({"name": "title", "type": "text", "required": true})).await?;
    app.add_column(&id, json!({"name": "launched", "type": "date"})).await?;
    Ok(id)
}

#[tokio::test]
async fn import_append_and_replace() -> Result<()> {
    let app = TestApp::new().await?;
    let id = product_table(&app).await?;
    let import = format!("/api/tables/{}/import", id);
    app.add_row(&id, json!({"title": "Existing", "price": 1})).await?;

    let res = app
        .post(
            &import,
            &app.admin_token,
            json!({"rows": [
                {"title": "Hat", "price": 12, "qty": 4},
                // Exported shape: envelope keys are ignored
                {"id": "old", "title": "Scarf", "price": "9.99", "createdAt": "2024-01-01T00:00:00.000Z"}
            ]}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    let summary = res.data();
    assert_eq!(summary["mode"], "append");
    assert_eq!(summary["imported"], 2);
    assert_eq!(summary["replaced"], 0);

    let page = app.get(&format!("/api/tables/{}/rows", id), &app.admin_token).await?.data();
    assert_eq!(page["total"], 3);

    let res = app
        .post(
            &import,
            &app.admin_token,
            json!({"mode": "replace", "rows": [{"title": "Only", "price": 5}]}),
        )
        .await?;
    assert_eq!(res.data()["replaced"], 3);
    assert_eq!(res.data()["imported"], 1);

    let page = app.get(&format!("/api/tables/{}/rows", id), &app.admin_token).await?.data();
    assert_eq!(page["total"], 1);
    Ok(())
}

#[tokio::test]
async fn invalid_rows_abort_or_are_skipped() -> Result<()> {
    let app = TestApp::new().await?;
    let id = product_table(&app).await?;
    let import = format!("/api/tables/{}/import", id);
    let rows = json!([
        {"title": "Good", "price": 3},
        {"price": 3},
        {"title": "Bad date", "price": 3, "launched": "someday"}
    ]);

    let res = app.post(&import, &app.admin_token, json!({"rows": rows})).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields = &res.json()["field_errors"];
    assert_eq!(fields["rows[1].title"], "is required");
    assert!(fields["rows[2].launched"].is_string());

    // Nothing was written
    let page = app.get(&format!("/api/tables/{}/rows", id), &app.admin_token).await?.data();
    assert_eq!(page["total"], 0);

    let res = app
        .post(&import, &app.admin_token, json!({"rows": rows, "skipInvalid": true}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let summary = res.data();
    assert_eq!(summary["imported"], 1);
    assert_eq!(summary["skipped"], 2);
    assert_eq!(summary["errors"][0]["index"], 1);
    assert_eq!(summary["errors"][1]["index"], 2);
    Ok(())
}

#[tokio::test]
async fn import_size_is_limited() -> Result<()> {
    let mut config = AppConfig::development();
    config.api.max_import_rows = 2;
    let app = TestApp::with_config(config).await?;
    let id = product_table(&app).await?;

    let rows: Vec<_> = (0..3).map(|i| json!({"title": format!("Item {}", i), "price": i})).collect();
    let res = app
        .post(&format!("/api/tables/{}/import", id), &app.admin_token, json!({"rows": rows}))
        .await?;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn export_json_and_csv() -> Result<()> {
    let app = TestApp::new().await?;
    let id = product_table(&app).await?;
    app.add_row(&id, json!({"title": "Hat, wool", "price": 12, "launched": "2024-05-01"})).await?;

    let res = app.get(&format!("/api/tables/{}/export", id), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(
        res.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Summer_Stock.json\""
    );
    let records = res.json();
    assert_eq!(records[0]["title"], "Hat, wool");
    assert!(records[0]["id"].is_string());
    assert!(records[0]["updatedAt"].is_string());

    let res = app.get(&format!("/api/tables/{}/export?format=csv", id), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    let mut lines = res.text.lines();
    assert_eq!(lines.next(), Some("id,price,qty,title,launched,createdAt,updatedAt"));
    let row = lines.next().unwrap_or_default();
    assert!(row.contains(",12,0,\"Hat, wool\",2024-05-01,"), "{}", row);

    let res = app.get(&format!("/api/tables/{}/export?format=xls", id), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn generate_rows_for_a_table() -> Result<()> {
    let app = TestApp::new().await?;
    let id = product_table(&app).await?;
    app.add_column(&id, json!({"name": "country", "type": "country"})).await?;
    app.add_column(&id, json!({"name": "phone", "type": "@store/phone-numbers:phone"})).await?;
    let generate = format!("/api/tables/{}/generate", id);

    let res = app
        .post(&generate, &app.admin_token, json!({"count": 15, "seed": 7}))
        .await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    let summary = res.data();
    assert_eq!(summary["requested"], 15);
    assert_eq!(summary["generated"], 15);

    let first = &summary["rows"][0]["data"];
    assert!(first["title"].is_string());
    assert!(first["price"].as_f64().map_or(false, |p| p >= 0.0));
    assert!(first["phone"].as_str().map_or(false, |p| p.starts_with('+')));

    let page = app.get(&format!("/api/tables/{}/rows", id), &app.admin_token).await?.data();
    assert_eq!(page["total"], 15);

    for count in [0, 5000] {
        let res = app.post(&generate, &app.admin_token, json!({"count": count})).await?;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    let reader = app.token(json!(["read"]), None).await?;
    let res = app.post(&generate, &reader, json!({"count": 1})).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}
