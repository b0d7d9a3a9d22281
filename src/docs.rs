use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes::{self, dashboard, health, RouteDescriptor, Verb};
use crate::validation::{FieldKind, FieldSpec};

#[derive(OpenApi)]
#[openapi(
	components(
		schemas(
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::organization::Organization,
			models::organization::OrganizationDetail,
			models::member::Member,
			models::member::InternalRole,
			models::resource::Resource,
			models::shift::Shift,
			models::shift::ShiftStatus,
			dashboard::DashboardStats,
			dashboard::ShiftSummary,
			health::HealthResponse
		)
	),
	tags(
		(name = "Auth", description = "Accounts and tokens"),
		(name = "Organizations", description = "Organization tree"),
		(name = "Members", description = "Organization membership, internal and plugin roles"),
		(name = "Resources", description = "Bookable resources of an organization"),
		(name = "Shifts", description = "Scheduled shifts"),
		(name = "Dashboard", description = "Aggregates (placeholders)"),
		(name = "Health", description = "Liveness")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_paths(&mut doc);
	ensure_components(&mut doc);
	ensure_global_security(&mut doc);
	ensure_openapi_version(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_paths(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};
	let Some(paths) = root
		.entry("paths")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
	else {
		return;
	};

	for (path, value) in account_paths().into_iter().chain(table_paths()) {
		if let Some(existing) = paths.get_mut(path.as_str()) {
			merge_values(existing, &value);
		} else {
			paths.insert(path, value);
		}
	}
}

/// Paths for the descriptor-driven endpoints.
fn table_paths() -> Map<String, Value> {
	let mut paths = Map::new();

	for route in routes::route_table() {
		let path = openapi_path(route.path);
		let operation = json!({ route.verb.as_str(): operation(route) });
		match paths.get_mut(&path) {
			Some(existing) => merge_values(existing, &operation),
			None => {
				paths.insert(path, operation);
			}
		}
	}

	paths
}

fn operation(route: &RouteDescriptor) -> Value {
	let in_path = path_params(route.path);
	let mut parameters = Vec::new();
	let mut properties = Map::new();
	let mut required = Vec::new();

	for field in route.schema.fields {
		if in_path.contains(&field.name) {
			parameters.push(json!({
				"name": field.name,
				"in": "path",
				"required": true,
				"schema": field_schema(field)
			}));
		} else if matches!(route.verb, Verb::Get | Verb::Delete) {
			parameters.push(json!({
				"name": field.name,
				"in": "query",
				"required": field.required,
				"description": field.description,
				"schema": field_schema(field)
			}));
		} else {
			properties.insert(field.name.to_string(), field_schema(field));
			if field.required {
				required.push(field.name);
			}
		}
	}

	let success = if route.verb == Verb::Post { "201" } else { "200" };
	let mut op = json!({
		"tags": [route.tag],
		"summary": route.summary,
		"security": [{"bearerAuth": []}],
		"parameters": parameters,
		"responses": {
			success: envelope_response(route.summary),
			"400": {"description": "Invalid parameters", "content": error_content()},
			"401": {"description": "Not logged in", "content": error_content()},
			"403": {"description": "Insufficient role", "content": error_content()},
			"404": {"description": "Not found", "content": error_content()}
		}
	});

	if !properties.is_empty() {
		op["requestBody"] = json!({
			"required": !required.is_empty(),
			"content": {"application/json": {"schema": {
				"type": "object",
				"properties": properties,
				"required": required
			}}}
		});
	}

	op
}

fn field_schema(field: &FieldSpec) -> Value {
	let mut schema = json!({ "type": field.kind.type_name() });
	match field.kind {
		FieldKind::Id => schema["minimum"] = json!(1),
		FieldKind::Int => schema["minimum"] = json!(0),
		FieldKind::DateTime => schema["format"] = json!("date-time"),
		FieldKind::Date => schema["format"] = json!("date"),
		FieldKind::Enum(values) => schema["enum"] = json!(values),
		FieldKind::KeyList => schema["items"] = json!({"type": "string"}),
		FieldKind::Bool | FieldKind::Text | FieldKind::Textarea => {}
	}
	if field.nullable {
		schema["nullable"] = json!(true);
	}
	if !field.description.is_empty() {
		schema["description"] = json!(field.description);
	}
	schema
}

/// `/shifts/:id` becomes `/shifts/{id}`.
fn openapi_path(path: &str) -> String {
	path.split('/')
		.map(|segment| match segment.strip_prefix(':') {
			Some(name) => format!("{{{name}}}"),
			None => segment.to_string(),
		})
		.collect::<Vec<_>>()
		.join("/")
}

fn path_params(path: &str) -> Vec<&str> {
	path.split('/').filter_map(|segment| segment.strip_prefix(':')).collect()
}

fn envelope_response(description: &str) -> Value {
	json!({
		"description": description,
		"content": {"application/json": {"schema": {"$ref": "#/components/schemas/ApiEnvelope"}}}
	})
}

fn error_content() -> Value {
	json!({"application/json": {"schema": {"$ref": "#/components/schemas/ApiError"}}})
}

fn account_paths() -> Map<String, Value> {
	let mut paths = Map::new();

	paths.insert(
		"/auth/register".to_string(),
		json!({
			"post": {
				"tags": ["Auth"],
				"security": [],
				"requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/RegisterRequest"}}}},
				"responses": {
					"201": envelope_response("User registered; data is an AuthResponse"),
					"400": {"description": "Invalid parameters", "content": error_content()},
					"409": {"description": "Email already in use", "content": error_content()}
				}
			}
		}),
	);

	paths.insert(
		"/auth/login".to_string(),
		json!({
			"post": {
				"tags": ["Auth"],
				"security": [],
				"requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/LoginRequest"}}}},
				"responses": {
					"200": envelope_response("Login successful; data is an AuthResponse"),
					"401": {"description": "Invalid credentials", "content": error_content()}
				}
			}
		}),
	);

	paths.insert(
		"/auth/me".to_string(),
		json!({
			"get": {
				"tags": ["Auth"],
				"security": [{"bearerAuth": []}],
				"responses": {
					"200": envelope_response("Current user; data is a User"),
					"401": {"description": "Not logged in", "content": error_content()}
				}
			}
		}),
	);

	paths.insert(
		"/auth/logout".to_string(),
		json!({
			"post": {
				"tags": ["Auth"],
				"security": [{"bearerAuth": []}],
				"responses": {"200": envelope_response("Logout acknowledged")}
			}
		}),
	);

	paths.insert(
		"/api/health".to_string(),
		json!({
			"get": {
				"tags": ["Health"],
				"security": [],
				"responses": {"200": envelope_response("Health check; data is a HealthResponse")}
			}
		}),
	);

	paths
}

fn ensure_components(doc: &mut Value) {
	let Some(components) = doc
		.as_object_mut()
		.map(|root| root.entry("components").or_insert_with(|| Value::Object(Map::new())))
		.and_then(Value::as_object_mut)
	else {
		return;
	};

	if let Some(schemes) = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
	{
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}

	if let Some(schemas) = components
		.entry("schemas")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
	{
		schemas.insert(
			"ApiEnvelope".to_string(),
			json!({
				"type": "object",
				"required": ["success", "message"],
				"properties": {
					"success": {"type": "boolean", "example": true},
					"message": {"type": "string"},
					"data": {"type": "object", "description": "Entity, list page or other payload"}
				}
			}),
		);
		schemas.insert(
			"ApiError".to_string(),
			json!({
				"type": "object",
				"required": ["success", "message", "data"],
				"properties": {
					"success": {"type": "boolean", "example": false},
					"message": {"type": "string"},
					"data": {
						"type": "object",
						"required": ["code", "status"],
						"properties": {
							"code": {"type": "string", "example": "forbidden_role"},
							"status": {"type": "integer", "example": 403},
							"params": {"type": "object", "additionalProperties": {"type": "string"}}
						}
					}
				}
			}),
		);
	}
}

fn ensure_global_security(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	}
}

fn ensure_openapi_version(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("openapi").or_insert_with(|| Value::String("3.1.0".to_string()));
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let tls_enabled = std::env::var("CERT_PATH").is_ok() && std::env::var("KEY_PATH").is_ok();
	let scheme = if tls_enabled { "https" } else { "http" };
	let server_url = format!("{}://localhost:{}", scheme, port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

fn merge_values(target: &mut Value, addition: &Value) {
	match (target, addition) {
		(Value::Object(dest), Value::Object(src)) => {
			for (key, value) in src {
				if let Some(existing) = dest.get_mut(key) {
					merge_values(existing, value);
				} else {
					dest.insert(key.clone(), value.clone());
				}
			}
		}
		(Value::Array(dest), Value::Array(src)) => {
			for item in src {
				if !dest.contains(item) {
					dest.push(item.clone());
				}
			}
		}
		_ => {}
	}
}
