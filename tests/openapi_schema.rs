use serde_json::Value;

#[test]
fn openapi_documents_scheduling_routes() -> anyhow::Result<()> {
    // Build the OpenAPI document the same way the server does
    let doc = shift_planner::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let paths = v
        .get("paths")
        .and_then(Value::as_object)
        .expect("paths must exist");

    for path in [
        "/organizations",
        "/organizations/{id}",
        "/organization_members",
        "/organization_members/{user_id}",
        "/resources/{id}",
        "/shifts",
        "/shifts/summary",
        "/dashboard-stats",
        "/auth/login",
        "/api/health",
    ] {
        assert!(paths.contains_key(path), "OpenAPI missing path '{}'", path);
    }

    let shift_put = &paths["/shifts/{id}"]["put"];
    let props = shift_put["requestBody"]["content"]["application/json"]["schema"]["properties"]
        .as_object()
        .expect("shift update body properties");
    for key in ["start_time", "end_time", "status", "resource_id"] {
        assert!(props.contains_key(key), "shift update body missing '{}'", key);
    }

    Ok(())
}

#[test]
fn openapi_has_entity_components() -> anyhow::Result<()> {
    let doc = shift_planner::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let schemas = v["components"]["schemas"].as_object().expect("components.schemas");
    for name in ["Organization", "Member", "Resource", "Shift", "ApiError"] {
        assert!(schemas.contains_key(name), "OpenAPI missing schema '{}'", name);
    }

    let shift = schemas["Shift"]["properties"].as_object().expect("Shift.properties");
    for key in ["start_time", "end_time", "status", "org_id"] {
        assert!(shift.contains_key(key), "Shift schema missing '{}'", key);
    }

    Ok(())
}
