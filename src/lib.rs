pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;
pub mod secret;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::application::gateway_orders::GatewayOrderService;
use crate::application::order_service::OrderService;
use crate::application::reconciliation::ReconciliationService;
use crate::config::PaymentPolicy;
use crate::domain::gateway::PaymentGateway;
use crate::domain::ports::PaymentStore;
use crate::domain::signature::SignatureVerifier;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    info!("🗄️ Applied {} pending migration(s)", applied.len());
    Ok(())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::payments::create_gateway_order,
        handlers::payments::verify_payment,
        handlers::payments::report_payment_failure,
        handlers::transactions::list_transactions,
    ),
    tags(
        (name = "orders", description = "Checkout and order lookup"),
        (name = "payments", description = "Gateway orders and payment reconciliation"),
        (name = "transactions", description = "Payment ledger"),
    )
)]
pub struct ApiDoc;

/// Services shared by every worker. Cloning is cheap: each service holds
/// `Arc`s to the store and gateway.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub reconciliation: ReconciliationService,
    pub gateway_orders: GatewayOrderService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        policy: PaymentPolicy,
    ) -> Self {
        Self {
            orders: OrderService::new(store.clone(), policy.clone()),
            reconciliation: ReconciliationService::new(store, verifier, policy.clone()),
            gateway_orders: GatewayOrderService::new(gateway, policy),
        }
    }
}

/// Registers extractors config, services, routes and the OpenAPI UI.
pub fn configure(cfg: &mut web::ServiceConfig, state: AppState) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::json_error))
        .app_data(web::QueryConfig::default().error_handler(handlers::query_error))
        .app_data(web::Data::new(state.orders))
        .app_data(web::Data::new(state.reconciliation))
        .app_data(web::Data::new(state.gateway_orders))
        .service(
            web::scope("/orders")
                .route("", web::post().to(handlers::orders::create_order))
                .route("/{id}", web::get().to(handlers::orders::get_order)),
        )
        .service(
            web::scope("/payments")
                .route("/gateway-orders", web::post().to(handlers::payments::create_gateway_order))
                .route("/verify", web::post().to(handlers::payments::verify_payment))
                .route("/failures", web::post().to(handlers::payments::report_payment_failure)),
        )
        .route(
            "/users/{user_id}/transactions",
            web::get().to(handlers::transactions::list_transactions),
        )
        .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()));
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(state: AppState, host: &str, port: u16) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Logger::default())
            .configure(move |cfg| configure(cfg, state))
    })
    .bind((host.to_string(), port))?
    .run())
}
