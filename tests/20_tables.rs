mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

fn column_names(detail: &Value) -> Vec<String> {
    detail["columns"]
        .as_array()
        .map(|cols| {
            cols.iter()
                .filter_map(|c| c["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn sale_tables_get_protected_columns() -> Result<()> {
    let app = TestApp::new().await?;
    let id = app.create_table("Shop", "sale", "public").await?;

    let res = app.get(&format!("/api/tables/{}", id), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::OK);
    let detail = res.data();
    assert_eq!(detail["tableType"], "sale");
    assert_eq!(detail["rowCount"], 0);
    assert_eq!(column_names(&detail), vec!["price", "qty"]);

    let rent = app.create_table("Bikes", "rent", "public").await?;
    let res = app.get(&format!("/api/tables/{}/columns", rent), &app.admin_token).await?;
    let names: Vec<Value> = res.data().as_array().cloned().unwrap_or_default();
    let names: Vec<&str> = names.iter().filter_map(|c| c["name"].as_str()).collect();
    assert_eq!(names, vec!["price", "fee", "used", "available"]);
    Ok(())
}

#[tokio::test]
async fn table_names_are_required() -> Result<()> {
    let app = TestApp::new().await?;
    let res = app.post("/api/tables", &app.admin_token, json!({"name": "   "})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.post("/api/tables", &app.admin_token, json!({"name": "x", "tableType": "auction"})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST, "{}", res.text);
    Ok(())
}

#[tokio::test]
async fn column_rules() -> Result<()> {
    let app = TestApp::new().await?;
    let id = app.create_table("Shop", "sale", "private").await?;
    let columns = format!("/api/tables/{}/columns", id);

    app.add_column(&id, json!({"name": "title", "type": "text", "required": true})).await?;

    let dup = app.post(&columns, &app.admin_token, json!({"name": "TITLE", "type": "text"})).await?;
    assert_eq!(dup.status, StatusCode::CONFLICT);

    let bad_name = app.post(&columns, &app.admin_token, json!({"name": "1st", "type": "text"})).await?;
    assert_eq!(bad_name.status, StatusCode::BAD_REQUEST);

    let bad_type = app.post(&columns, &app.admin_token, json!({"name": "x", "type": "blob"})).await?;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST, "{}", bad_type.text);

    for reserved in ["id", "createdAt", "tableName"] {
        let res = app.post(&columns, &app.admin_token, json!({"name": reserved, "type": "text"})).await?;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{}", reserved);
    }

    // Protected columns stay put
    let list = app.get(&columns, &app.admin_token).await?.data();
    let price_id = list
        .as_array()
        .and_then(|cols| cols.iter().find(|c| c["name"] == "price"))
        .and_then(|c| c["id"].as_str())
        .unwrap_or_default()
        .to_string();

    let res = app.delete(&format!("{}/{}", columns, price_id), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app
        .put(&format!("{}/{}", columns, price_id), &app.admin_token, json!({"name": "cost"}))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn rows_are_validated_and_filtered() -> Result<()> {
    let app = TestApp::new().await?;
    let id = app.create_table("Shop", "sale", "private").await?;
    app.add_column(&id, json!({"name": "title", "type": "text", "required": true})).await?;
    app.add_column(&id, json!({"name": "origin", "type": "country"})).await?;
    let rows = format!("/api/tables/{}/rows", id);

    let res = app
        .post(&rows, &app.admin_token, json!({"price": -3, "origin": "Atlantis", "extra": 1}))
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = res.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields = &body["field_errors"];
    assert_eq!(fields["title"], "is required");
    assert!(fields["price"].is_string());
    assert!(fields["origin"].is_string());
    assert_eq!(fields["extra"], "Unknown column");

    let lamp = app
        .add_row(&id, json!({"title": "Lamp", "price": "12.5", "origin": "de"}))
        .await?;
    app.add_row(&id, json!({"title": "Desk", "price": 80, "qty": 2})).await?;

    let res = app.get(&format!("{}/{}", rows, lamp), &app.admin_token).await?;
    let data = &res.data()["data"];
    assert_eq!(data["price"], 12.5);
    assert_eq!(data["origin"], "DE");
    assert_eq!(data["qty"], 0);

    let res = app.get(&format!("{}?where%5Btitle%5D=desk", rows), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    let page = res.data();
    assert_eq!(page["total"], 1);
    assert_eq!(page["rows"][0]["data"]["title"], "Desk");

    let res = app.get(&format!("{}?where%5B1bad%5D=x", rows), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    // Partial update merges over stored data
    let res = app
        .put(&format!("{}/{}", rows, lamp), &app.admin_token, json!({"qty": 4}))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(res.data()["data"]["qty"], 4);
    assert_eq!(res.data()["data"]["title"], "Lamp");

    let res = app
        .put(&format!("{}/{}", rows, lamp), &app.admin_token, json!({"qty": -1}))
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = app.delete(&format!("{}/{}", rows, lamp), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::OK);
    let res = app.get(&format!("{}/{}", rows, lamp), &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.delete(&rows, &app.admin_token).await?;
    assert_eq!(res.data()["deleted"], 1);
    Ok(())
}

#[tokio::test]
async fn table_type_change_needs_an_empty_table() -> Result<()> {
    let app = TestApp::new().await?;
    let id = app.create_table("Things", "default", "private").await?;
    app.add_column(&id, json!({"name": "title", "type": "text"})).await?;
    let path = format!("/api/tables/{}", id);

    let res = app.put(&path, &app.admin_token, json!({"tableType": "rent"})).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(column_names(&res.data()), vec!["title", "price", "fee", "used", "available"]);

    app.add_row(&id, json!({"title": "Kayak", "price": 30})).await?;
    let res = app.put(&path, &app.admin_token, json!({"tableType": "sale"})).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app.put(&path, &app.admin_token, json!({"name": "Rentals"})).await?;
    assert_eq!(res.data()["name"], "Rentals");
    assert_eq!(res.data()["rowCount"], 1);

    let res = app.delete(&path, &app.admin_token).await?;
    assert_eq!(res.data()["deleted"], true);
    assert_eq!(app.get(&path, &app.admin_token).await?.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn tables_of_other_users_are_not_found() -> Result<()> {
    let app = TestApp::new().await?;
    let id = app.create_table("Mine", "default", "public").await?;

    let other = app.state.users().create("Other", "other@example.com").await?;
    let secret = app
        .state
        .tokens()
        .create(&other.id, common::new_token("other", json!(["admin"])))
        .await?
        .token
        .unwrap_or_default();

    let res = app.get(&format!("/api/tables/{}", id), &secret).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    let res = app.get("/api/tables", &secret).await?;
    assert_eq!(res.data().as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn scoped_tokens_only_reach_their_tables() -> Result<()> {
    let app = TestApp::new().await?;
    let a = app.create_table("A", "default", "private").await?;
    let b = app.create_table("B", "default", "private").await?;
    let scoped = app.token(json!(["read", "write"]), Some(vec![a.clone()])).await?;

    let res = app.get("/api/tables", &scoped).await?;
    let ids: Vec<Value> = res.data().as_array().cloned().unwrap_or_default();
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0]["id"], a.as_str());

    let res = app.get(&format!("/api/tables/{}", b), &scoped).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn module_types_validate_and_pin_their_module() -> Result<()> {
    let app = TestApp::new().await?;

    let res = app.get("/api/column-types", &app.admin_token).await?;
    let types = res.data();
    let ids: Vec<&str> = types
        .as_array()
        .map(|t| t.iter().filter_map(|t| t["id"].as_str()).collect())
        .unwrap_or_default();
    assert!(ids.contains(&"country"));
    assert!(ids.contains(&"@store/phone-numbers:phone"));

    let id = app.create_table("Contacts", "default", "private").await?;
    app.add_column(&id, json!({"name": "phone", "type": "@store/phone-numbers:phone"})).await?;

    let rows = format!("/api/tables/{}/rows", id);
    let res = app.post(&rows, &app.admin_token, json!({"phone": "call me"})).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    app.add_row(&id, json!({"phone": "+1 (555) 010-2000"})).await?;

    let disable = "/api/modules/%40store%2Fphone-numbers/disable";
    let res = app.post(disable, &app.admin_token, json!({})).await?;
    assert_eq!(res.status, StatusCode::CONFLICT, "{}", res.text);

    let res = app.delete("/api/modules/%40store%2Fphone-numbers", &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn modules_can_be_installed_and_toggled() -> Result<()> {
    let app = TestApp::new().await?;
    let module = json!({
        "id": "@acme/codes",
        "name": "Codes",
        "columnTypes": [{"name": "sku", "base": "text", "pattern": "^[A-Z]{3}-[0-9]{4}$"}]
    });

    let res = app.post("/api/modules", &app.admin_token, module.clone()).await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    let res = app.post("/api/modules", &app.admin_token, module).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .post("/api/modules", &app.admin_token, json!({"id": "acme", "name": "Bad"}))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.post("/api/modules/%40acme%2Fcodes/disable", &app.admin_token, json!({})).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["enabled"], false);

    // Disabled module types no longer resolve
    let id = app.create_table("Stock", "default", "private").await?;
    let res = app
        .post(
            &format!("/api/tables/{}/columns", id),
            &app.admin_token,
            json!({"name": "code", "type": "@acme/codes:sku"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    app.post("/api/modules/%40acme%2Fcodes/enable", &app.admin_token, json!({})).await?;
    app.add_column(&id, json!({"name": "code", "type": "@acme/codes:sku"})).await?;

    let res = app.delete("/api/modules/%40missing%2Fnope", &app.admin_token).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn admin_tokens_reach_every_own_table_despite_a_list() -> Result<()> {
    let app = TestApp::new().await?;
    let a = app.create_table("A", "sale", "public").await?;
    let b = app.create_table("B", "sale", "public").await?;
    let admin = app.token(json!(["admin"]), Some(vec![a.clone()])).await?;

    let res = app.get("/api/tables", &admin).await?;
    assert_eq!(res.data().as_array().map(Vec::len), Some(2));

    let res = app.get(&format!("/api/tables/{}", b), &admin).await?;
    assert_eq!(res.status, StatusCode::OK);

    let body = app.get("/api/public/tables", &admin).await?.json();
    assert_eq!(body["count"], 2);
    let res = app.get(&format!("/api/public/tables/{}/items", b), &admin).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}
