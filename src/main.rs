use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use storefront_orders as api;
use storefront_orders::{
    config::AppConfig,
    repositories::{SeaOrmDirectory, SeaOrmOrderStore},
    services::payments::{MockPaymentGateway, PaymentGateway, StripeConfig, StripeGateway},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    let gateway = payment_gateway(&cfg)?;
    if cfg.webhook_secret().is_none() {
        warn!("APP__PAYMENT_WEBHOOK_SECRET not set; payment webhooks will be refused");
    }

    // Aggregate app services used by HTTP handlers
    let services = api::handlers::AppServices::new(
        Arc::new(SeaOrmOrderStore::new(db_arc.clone())),
        Arc::new(SeaOrmDirectory::new(db_arc.clone())),
        gateway,
        &cfg,
    );

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    // Compose shared app state
    let app_state = api::AppState {
        db: Some(db_arc),
        config: Arc::new(cfg),
        services,
    };
    let app = api::build_router(app_state);

    // Bind and serve
    info!("storefront-orders listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("storefront-orders stopped");
    Ok(())
}

fn payment_gateway(cfg: &AppConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    if !cfg.uses_stripe() {
        warn!("Using the mock payment gateway; no real charges will be made");
        return Ok(Arc::new(MockPaymentGateway::new()));
    }

    let secret_key = cfg
        .stripe_secret_key
        .clone()
        .context("stripe_secret_key is required for the stripe provider")?;
    let mut stripe = StripeConfig::new(secret_key);
    stripe.webhook_tolerance_secs = cfg.payment_webhook_tolerance_secs;
    if let Some(base) = &cfg.stripe_api_base {
        stripe = stripe.with_api_base(base.clone());
    }
    info!(api_base = %stripe.api_base, "Using Stripe payment gateway");
    Ok(Arc::new(StripeGateway::new(stripe)?))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
