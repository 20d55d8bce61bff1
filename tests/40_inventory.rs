mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn buying_decrements_stock() -> Result<()> {
    let app = TestApp::new().await?;
    let shop = app.create_table("Shop", "sale", "public").await?;
    let mug = app.add_row(&shop, json!({"price": 8, "qty": 3})).await?;
    let buyer = app.token(json!(["read", "write"]), Some(vec![shop.clone()])).await?;

    let availability = format!("/api/public/tables/{}/items/{}/availability", shop, mug);
    let body = app.get(&format!("{}?quantity=3", availability), &buyer).await?.json();
    assert_eq!(body, json!({"available": true, "availableQty": 3, "requestedQty": 3}));

    let res = app
        .post("/api/public/buy", &buyer, json!({"tableId": shop, "itemId": mug, "quantity": 2}))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["quantity"], 2);
    assert_eq!(body["item"]["qty"], 1);
    assert_eq!(body["item"]["tableName"], "Shop");

    let res = app
        .post("/api/public/buy", &buyer, json!({"tableId": shop, "itemId": mug, "quantity": 2}))
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["error"], "Insufficient quantity available");

    // Quantity defaults to one; junk quantities on availability do too
    let res = app
        .post("/api/public/buy", &buyer, json!({"tableId": shop, "itemId": mug}))
        .await?;
    assert_eq!(res.json()["item"]["qty"], 0);

    let body = app.get(&format!("{}?quantity=lots", availability), &buyer).await?.json();
    assert_eq!(body["available"], false);
    assert_eq!(body["requestedQty"], 1);

    for junk in ["0", "-5"] {
        let body = app.get(&format!("{}?quantity={}", availability, junk), &buyer).await?.json();
        assert_eq!(body["available"], false, "{}", junk);
        assert_eq!(body["requestedQty"], 1, "{}", junk);
    }

    let res = app
        .post("/api/public/buy", &buyer, json!({"tableId": shop, "itemId": mug, "quantity": 0}))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn renting_toggles_used_and_available() -> Result<()> {
    let app = TestApp::new().await?;
    let bikes = app.create_table("Bikes", "rent", "shared").await?;
    let bike = app.add_row(&bikes, json!({"price": 25, "fee": 5})).await?;
    let body = json!({"tableId": bikes, "itemId": bike});

    let availability = format!("/api/public/tables/{}/items/{}/availability", bikes, bike);
    assert_eq!(app.get(&availability, &app.admin_token).await?.json()["availableQty"], 1);

    let res = app.post("/api/public/rent", &app.admin_token, body.clone()).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    let item = &res.json()["item"];
    assert_eq!(item["used"], true);
    assert_eq!(item["available"], false);

    assert_eq!(app.get(&availability, &app.admin_token).await?.json()["availableQty"], 0);

    let res = app.post("/api/public/rent", &app.admin_token, body.clone()).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app.post("/api/public/release", &app.admin_token, body.clone()).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["item"]["used"], false);
    assert_eq!(res.json()["item"]["available"], true);

    let res = app.post("/api/public/release", &app.admin_token, body).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn actions_check_table_type_and_permissions() -> Result<()> {
    let app = TestApp::new().await?;
    let shop = app.create_table("Shop", "sale", "public").await?;
    let mug = app.add_row(&shop, json!({"price": 8, "qty": 3})).await?;
    let bikes = app.create_table("Bikes", "rent", "public").await?;
    let bike = app.add_row(&bikes, json!({"price": 25})).await?;

    let res = app
        .post("/api/public/rent", &app.admin_token, json!({"tableId": shop, "itemId": mug}))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post("/api/public/buy", &app.admin_token, json!({"tableId": bikes, "itemId": bike}))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let reader = app.token(json!(["read"]), Some(vec![shop.clone()])).await?;
    let res = app
        .post("/api/public/buy", &reader, json!({"tableId": shop, "itemId": mug}))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post("/api/public/buy", &app.admin_token, json!({"tableId": "", "itemId": mug}))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post("/api/public/buy", &app.admin_token, json!({"tableId": shop, "itemId": "ghost"}))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["error"], "Item not found");

    let res = app.post("/api/public/buy", &app.admin_token, json!({"itemId": mug})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}
