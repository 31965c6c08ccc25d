pub mod checkout;
pub mod dashboard;
pub mod orders;
pub mod payment_webhooks;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    repositories::{DirectoryStore, OrderStore},
    services::{
        analytics::DashboardService, checkout::CheckoutService, orders::OrderService,
        payments::PaymentGateway,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    /// Wires the services over the given stores and payment gateway, tuned by `config`.
    pub fn new(
        order_store: Arc<dyn OrderStore>,
        directory: Arc<dyn DirectoryStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let orders = OrderService::new(order_store.clone())
            .with_page_limits(config.api_default_page_size, config.api_max_page_size);
        let checkout = CheckoutService::new(orders.clone(), gateway)
            .with_default_currency(config.default_currency.clone())
            .with_gateway_timeout(config.gateway_timeout());
        let dashboard = DashboardService::new(order_store, directory);

        Self {
            orders: Arc::new(orders),
            checkout: Arc::new(checkout),
            dashboard: Arc::new(dashboard),
        }
    }
}
