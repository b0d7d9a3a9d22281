mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{error_code, spawn_app};

#[tokio::test]
async fn crud_through_the_api() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;
    let org_id = t.create_org(&admin, "Alpha", None).await?;
    let scheduler = t.register("Sky").await?;
    t.add_member(&admin, org_id, scheduler.user_id, "scheduler").await?;

    let (status, body) = t
        .post(
            "/resources",
            &scheduler,
            json!({"org_id": org_id, "name": "Van", "description": "Line one\nLine <em>two</em>"}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["type"], "");
    assert_eq!(body["data"]["is_active"], true);
    assert_eq!(body["data"]["description"], "Line one\nLine two");
    let uri = format!("/resources/{}", body["data"]["resource_id"]);

    let (status, body) = t
        .put(&uri, &scheduler, json!({"capacity": "-3", "is_active": "no", "description": null}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["capacity"], 3);
    assert_eq!(body["data"]["is_active"], false);
    assert!(body["data"]["description"].is_null());
    assert_eq!(body["data"]["name"], "Van");

    let (status, body) = t.delete(&uri, &scheduler).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden_role");

    let (status, _) = t.delete(&uri, &admin).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.get(&uri, &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn list_filters_and_windows() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;
    let org_id = t.create_org(&admin, "Alpha", None).await?;
    for name in ["E", "A", "D", "B", "C"] {
        t.create_resource(&admin, org_id, name).await?;
    }
    t.post("/resources", &admin, json!({"org_id": org_id, "name": "Z", "type": "car", "is_active": false}))
        .await?;

    let (status, body) = t
        .get(&format!("/resources?org_id={}&type=room&limit=2&offset=1", org_id), &admin)
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["total"], 5);
    assert_eq!(body["data"]["items"][0]["name"], "B");
    assert_eq!(body["data"]["items"][1]["name"], "C");

    let (_, by_page) = t
        .get(&format!("/resources?org_id={}&type=room&page=2&per_page=2", org_id), &admin)
        .await?;
    assert_eq!(by_page["data"]["items"][0]["name"], "C");
    assert_eq!(by_page["data"]["items"][1]["name"], "D");

    let (_, inactive) = t
        .get(&format!("/resources?org_id={}&is_active=false", org_id), &admin)
        .await?;
    assert_eq!(inactive["data"]["total"], 1);
    assert_eq!(inactive["data"]["items"][0]["type"], "car");

    Ok(())
}
