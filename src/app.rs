use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::RoleRegistry;
use crate::errors::AppError;
use crate::routes::{
    audit, auth, clients, health, invoices, job_orders, leads, masters, quotations, records, roles, sites, users,
};
use crate::session::TokenConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: Arc<TokenConfig>,
    pub roles: Arc<RoleRegistry>,
}

impl AppState {
    pub fn new(pool: SqlitePool, tokens: TokenConfig, roles: RoleRegistry) -> Self {
        Self {
            pool,
            tokens: Arc::new(tokens),
            roles: Arc::new(roles),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let tokens = TokenConfig::from_env()?;
    let state = AppState::new(pool, tokens, RoleRegistry::standard());

    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        );

    let lead_routes = Router::new()
        .route("/", get(leads::list_leads).post(leads::create_lead))
        .route(
            "/:id",
            get(leads::get_lead).put(leads::update_lead).delete(leads::delete_lead),
        )
        .route("/:id/convert", post(leads::convert_lead));

    let client_routes = Router::new()
        .route("/", get(clients::list_clients).post(clients::create_client))
        .route(
            "/:id",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        );

    let site_routes = Router::new()
        .route("/", get(sites::list_sites).post(sites::create_site))
        .route(
            "/:id",
            get(sites::get_site).put(sites::update_site).delete(sites::delete_site),
        );

    let quotation_routes = Router::new()
        .route("/", get(quotations::list_quotations).post(quotations::create_quotation))
        .route(
            "/:id",
            get(quotations::get_quotation)
                .put(quotations::update_quotation)
                .delete(quotations::delete_quotation),
        );

    let job_order_routes = Router::new()
        .route("/", get(job_orders::list_job_orders).post(job_orders::create_job_order))
        .route(
            "/:id",
            get(job_orders::get_job_order)
                .put(job_orders::update_job_order)
                .delete(job_orders::delete_job_order),
        );

    let invoice_routes = Router::new()
        .route("/", get(invoices::list_invoices).post(invoices::create_invoice))
        .route(
            "/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        );

    let master_routes = Router::new()
        .route(
            "/service-types",
            get(masters::list_service_types).post(masters::create_service_type),
        )
        .route(
            "/service-types/:id",
            axum::routing::put(masters::update_service_type).delete(masters::delete_service_type),
        );

    let record_routes = Router::new()
        .route("/restore", post(records::restore_record))
        .route("/deleted", get(records::list_deleted_records));

    let audit_routes = Router::new()
        .route("/", get(audit::list_audit_logs))
        .route("/verify", get(audit::verify_audit_chain));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/roles", get(roles::list_roles))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/leads", lead_routes)
        .nest("/clients", client_routes)
        .nest("/sites", site_routes)
        .nest("/quotations", quotation_routes)
        .nest("/job-orders", job_order_routes)
        .nest("/invoices", invoice_routes)
        .nest("/masters", master_routes)
        .nest("/records", record_routes)
        .nest("/audit-logs", audit_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
