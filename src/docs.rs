use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{audit, authz, entity, lifecycle, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::roles::list_roles,
		routes::users::list_users,
		routes::users::create_user,
		routes::users::get_user,
		routes::users::update_user,
		routes::users::delete_user,
		routes::leads::list_leads,
		routes::leads::create_lead,
		routes::leads::get_lead,
		routes::leads::update_lead,
		routes::leads::delete_lead,
		routes::leads::convert_lead,
		routes::clients::list_clients,
		routes::clients::create_client,
		routes::clients::get_client,
		routes::clients::update_client,
		routes::clients::delete_client,
		routes::sites::list_sites,
		routes::sites::create_site,
		routes::sites::get_site,
		routes::sites::update_site,
		routes::sites::delete_site,
		routes::quotations::list_quotations,
		routes::quotations::create_quotation,
		routes::quotations::get_quotation,
		routes::quotations::update_quotation,
		routes::quotations::delete_quotation,
		routes::job_orders::list_job_orders,
		routes::job_orders::create_job_order,
		routes::job_orders::get_job_order,
		routes::job_orders::update_job_order,
		routes::job_orders::delete_job_order,
		routes::invoices::list_invoices,
		routes::invoices::create_invoice,
		routes::invoices::get_invoice,
		routes::invoices::update_invoice,
		routes::invoices::delete_invoice,
		routes::masters::list_service_types,
		routes::masters::create_service_type,
		routes::masters::update_service_type,
		routes::masters::delete_service_type,
		routes::records::restore_record,
		routes::records::list_deleted_records,
		routes::audit::list_audit_logs,
		routes::audit::verify_audit_chain
	),
	components(
		schemas(
			routes::health::HealthResponse,
			routes::auth::MessageResponse,
			routes::records::RestoreRequest,
			authz::Role,
			authz::Action,
			authz::RoleGrant,
			entity::EntityKind,
			audit::AuditAction,
			audit::AuditRecord,
			audit::AuditPage,
			audit::ChainReport,
			lifecycle::DeletedRecord,
			lifecycle::DeletedPage,
			models::user::User,
			models::user::UserWithRoles,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::lead::Lead,
			models::lead::LeadStatus,
			models::lead::LeadCreateRequest,
			models::lead::LeadUpdateRequest,
			models::lead::LeadConvertRequest,
			models::client::Client,
			models::client::ClientCreateRequest,
			models::client::ClientUpdateRequest,
			models::site::Site,
			models::site::SiteCreateRequest,
			models::site::SiteUpdateRequest,
			models::quotation::Quotation,
			models::quotation::QuotationStatus,
			models::quotation::QuotationCreateRequest,
			models::quotation::QuotationUpdateRequest,
			models::job_order::JobOrder,
			models::job_order::JobStatus,
			models::job_order::JobOrderCreateRequest,
			models::job_order::JobOrderUpdateRequest,
			models::invoice::Invoice,
			models::invoice::InvoiceStatus,
			models::invoice::InvoiceCreateRequest,
			models::invoice::InvoiceUpdateRequest,
			models::service_type::ServiceType,
			models::service_type::ServiceTypeCreateRequest,
			models::service_type::ServiceTypeUpdateRequest
		)
	),
	tags(
		(name = "Health", description = "Liveness and database check"),
		(name = "Auth", description = "Bootstrap registration, login and sessions"),
		(name = "Roles", description = "Role catalogue"),
		(name = "Users", description = "User and role administration"),
		(name = "Leads", description = "Sales leads and conversion"),
		(name = "Clients", description = "Client records"),
		(name = "Sites", description = "Client service locations"),
		(name = "Quotations", description = "Quotations"),
		(name = "Job Orders", description = "Field service jobs"),
		(name = "Invoices", description = "Invoicing"),
		(name = "Masters", description = "Master data"),
		(name = "Records", description = "Deleted records and restore"),
		(name = "Audit", description = "Audit trail")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_global_security(&mut doc);
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else { return; };
	let components = root.entry("components").or_insert_with(|| json!({}));
	let Some(components) = components.as_object_mut() else { return; };
	let schemes = components.entry("securitySchemes").or_insert_with(|| json!({}));
	let Some(schemes) = schemes.as_object_mut() else { return; };

	schemes.entry("bearerAuth").or_insert_with(|| {
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		})
	});
}

/// Every operation needs a bearer token unless its annotation opted out with
/// an explicit empty requirement.
fn ensure_global_security(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	}
}

fn add_examples(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };
		for operation in operations.values_mut() {
			apply_parameter_examples(operation);
			apply_request_examples(operation);
		}
	}
}

fn apply_parameter_examples(operation: &mut Value) {
	let Some(parameters) = operation.get_mut("parameters").and_then(Value::as_array_mut) else { return; };

	for parameter in parameters.iter_mut() {
		if parameter.get("name").and_then(Value::as_str) == Some("id") {
			if let Some(obj) = parameter.as_object_mut() {
				obj.entry("example")
					.or_insert_with(|| json!("00000000-0000-0000-0000-000000000000"));
			}
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(app_json) = operation
		.get_mut("requestBody")
		.and_then(|body| body.get_mut("content"))
		.and_then(|content| content.get_mut("application/json"))
		.and_then(Value::as_object_mut)
	else {
		return;
	};
	let Some(reference) = app_json
		.get("schema")
		.and_then(|schema| schema.get("$ref"))
		.and_then(Value::as_str)
	else {
		return;
	};

	let example = match reference {
		"#/components/schemas/RegisterRequest" => json!({
			"name": "Ada Lovelace",
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		}),
		"#/components/schemas/LoginRequest" => json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		}),
		"#/components/schemas/UserCreateRequest" => json!({
			"name": "Grace Hopper",
			"email": "grace@example.com",
			"password": "C0bolRocks!",
			"roles": ["OPERATIONS_MANAGER"]
		}),
		"#/components/schemas/LeadCreateRequest" => json!({
			"name": "Maria Santos",
			"company": "Santos Bakery",
			"phone": "+63 917 000 0000",
			"source": "referral"
		}),
		"#/components/schemas/JobOrderCreateRequest" => json!({
			"client_id": "00000000-0000-0000-0000-000000000000",
			"description": "Replace compressor on unit 3",
			"scheduled_for": "2026-11-02T01:00:00Z"
		}),
		"#/components/schemas/RestoreRequest" => json!({
			"entity_type": "job_order",
			"entity_id": "00000000-0000-0000-0000-000000000000"
		}),
		_ => return,
	};

	app_json.insert("example".to_string(), example);
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{port}");

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr
				.iter()
				.any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
