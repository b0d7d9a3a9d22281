mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{error_code, spawn_app};

#[tokio::test]
async fn create_then_get_round_trips_name_and_parent() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;

    let parent = t.create_org(&admin, "Holding", None).await?;
    let child = t.create_org(&admin, "  <b>Branch</b> ", Some(parent)).await?;

    let (status, body) = t.get(&format!("/organizations/{}", child), &admin).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Branch");
    assert_eq!(body["data"]["parent_org_id"], parent);
    assert_eq!(body["data"]["plugin_roles"], json!([]));

    Ok(())
}

#[tokio::test]
async fn only_site_admins_create_and_unknown_parents_are_rejected() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;
    let user = t.register("Uma").await?;

    let (status, body) = t.post("/organizations", &user, json!({"name": "Mine"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden_site_admin");

    let (status, body) = t.post("/organizations", &admin, json!({"name": "Orphan", "parent_org_id": 77})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid_parent");

    let (status, body) = t.post("/organizations", &admin, json!({"name": "   "})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid_param");

    Ok(())
}

#[tokio::test]
async fn hierarchy_changes_are_guarded() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;
    let top = t.create_org(&admin, "Top", None).await?;
    let middle = t.create_org(&admin, "Middle", Some(top)).await?;
    let bottom = t.create_org(&admin, "Bottom", Some(middle)).await?;

    let (status, body) = t
        .put(&format!("/organizations/{}", top), &admin, json!({"parent_org_id": top}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "self_parent");

    let (status, body) = t
        .put(&format!("/organizations/{}", top), &admin, json!({"parent_org_id": bottom}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "parent_cycle");

    let manager = t.register("Mona").await?;
    t.add_member(&admin, bottom, manager.user_id, "org_admin").await?;

    let (status, body) = t
        .put(&format!("/organizations/{}", bottom), &manager, json!({"parent_org_id": null}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "hierarchy_requires_site_admin");

    let (status, body) = t
        .put(&format!("/organizations/{}", bottom), &manager, json!({"name": "Bottom Renamed"}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Bottom Renamed");
    assert_eq!(body["data"]["parent_org_id"], middle);

    let (status, body) = t
        .put(&format!("/organizations/{}", bottom), &admin, json!({"parent_org_id": null}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["data"]["parent_org_id"].is_null());

    Ok(())
}

#[tokio::test]
async fn org_admin_edits_without_moving_the_organization() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;
    let top = t.create_org(&admin, "Top", None).await?;
    let child = t.create_org(&admin, "Child", Some(top)).await?;

    let manager = t.register("Mona").await?;
    t.add_member(&admin, child, manager.user_id, "org_admin").await?;

    let (status, body) = t
        .put(&format!("/organizations/{}", child), &manager, json!({"parent_org_id": child}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(error_code(&body), "self_parent");

    let (status, body) = t
        .put(
            &format!("/organizations/{}", child),
            &manager,
            json!({"name": "Child Renamed", "parent_org_id": top}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Child Renamed");
    assert_eq!(body["data"]["parent_org_id"], top);

    let root_manager = t.register("Rita").await?;
    t.add_member(&admin, top, root_manager.user_id, "org_admin").await?;
    let (status, body) = t
        .put(
            &format!("/organizations/{}", top),
            &root_manager,
            json!({"name": "Top Renamed", "parent_org_id": null}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Top Renamed");

    Ok(())
}

#[tokio::test]
async fn empty_update_changes_nothing() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;
    let org_id = t.create_org(&admin, "Alpha", None).await?;

    let (_, before) = t.get(&format!("/organizations/{}", org_id), &admin).await?;
    let (status, after) = t.put(&format!("/organizations/{}", org_id), &admin, json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["data"]["name"], before["data"]["name"]);
    assert_eq!(after["data"]["updated_at"], before["data"]["updated_at"]);

    Ok(())
}

#[tokio::test]
async fn members_only_list_their_own_organizations() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;
    let alpha = t.create_org(&admin, "Alpha", None).await?;
    t.create_org(&admin, "Beta", None).await?;

    let emp = t.register("Erin").await?;
    t.add_member(&admin, alpha, emp.user_id, "employee").await?;

    let (status, body) = t.get("/organizations", &emp).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["org_id"], alpha);

    let (_, body) = t.get("/organizations", &admin).await?;
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = t.get("/organizations?page=2&per_page=1", &admin).await?;
    assert_eq!(body["data"]["items"][0]["name"], "Beta");
    assert_eq!(body["data"]["offset"], 1);

    Ok(())
}

#[tokio::test]
async fn delete_is_not_implemented() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.site_admin("Root").await?;
    let org_id = t.create_org(&admin, "Alpha", None).await?;

    let (status, body) = t.delete(&format!("/organizations/{}", org_id), &admin).await?;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(error_code(&body), "not_implemented");

    let (status, _) = t.get(&format!("/organizations/{}", org_id), &admin).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
