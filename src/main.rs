use std::sync::Arc;

use dotenvy::dotenv;
use log::{error, info};
use storefront_payments::config::AppConfig;
use storefront_payments::domain::signature::SignatureVerifier;
use storefront_payments::infrastructure::payment_store::DieselPaymentStore;
use storefront_payments::infrastructure::razorpay::RazorpayGateway;
use storefront_payments::{build_server, create_pool, run_migrations, AppState};

fn fatal(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!("{context}: {e}");
    std::io::Error::other(format!("{context}: {e}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| fatal("Invalid configuration", e))?;

    let pool = create_pool(&config.database_url).map_err(|e| fatal("Failed to create DB pool", e))?;
    run_migrations(&pool).map_err(|e| fatal("Failed to run database migrations", e))?;

    let verifier = SignatureVerifier::new(config.gateway.key_secret.clone())
        .map_err(|e| fatal("Invalid gateway secret", e))?;
    let gateway = RazorpayGateway::new(&config.gateway).map_err(|e| fatal("Invalid gateway client", e))?;

    let state = AppState::new(
        Arc::new(DieselPaymentStore::new(pool)),
        Arc::new(gateway),
        verifier,
        config.policy.clone(),
    );

    info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(state, &config.host, config.port)?.await
}
