use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::{PaymentGateway, PaymentIntent};
use crate::errors::ServiceError;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Stripe configuration
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
    pub webhook_tolerance_secs: u64,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            webhook_tolerance_secs: crate::webhooks::DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Payment intents over the Stripe REST API (form-encoded requests, JSON responses).
#[derive(Clone, Debug)]
pub struct StripeGateway {
    config: StripeConfig,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Result<Self, ServiceError> {
        // The per-call deadline is enforced by the caller; this only guards
        // against sockets that never close.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    async fn read_intent(response: reqwest::Response) -> Result<PaymentIntent, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Stripe API error: {}", error_text);
            return Err(match status {
                StatusCode::NOT_FOUND => {
                    ServiceError::NotFound(format!("Payment intent not found: {}", error_text))
                }
                StatusCode::BAD_REQUEST => {
                    ServiceError::ValidationError(format!("Stripe rejected request: {}", error_text))
                }
                _ => ServiceError::ExternalServiceError(format!(
                    "Stripe returned {}: {}",
                    status, error_text
                )),
            });
        }

        response.json::<PaymentIntent>().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, metadata))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, ServiceError> {
        let mut params: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        let mut keys: Vec<_> = metadata.into_iter().collect();
        keys.sort();
        for (key, value) in keys {
            params.push((format!("metadata[{}]", key), value));
        }

        let response = self
            .client
            .post(self.url("/v1/payment_intents"))
            .basic_auth(&self.config.secret_key, Some(""))
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Stripe API error: {}", e)))?;

        let intent = Self::read_intent(response).await?;
        info!(intent_id = %intent.id, "PaymentIntent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError> {
        if intent_id.is_empty() || intent_id.contains('/') {
            return Err(ServiceError::ValidationError(format!(
                "Invalid payment intent id '{}'",
                intent_id
            )));
        }

        let response = self
            .client
            .get(self.url(&format!("/v1/payment_intents/{}", intent_id)))
            .basic_auth(&self.config.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Stripe API error: {}", e)))?;

        Self::read_intent(response).await
    }

    fn webhook_tolerance_secs(&self) -> u64 {
        self.config.webhook_tolerance_secs
    }
}
