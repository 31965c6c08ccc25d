use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{AsRefStr, Display};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::webhooks;

pub mod mock;
pub mod stripe;

pub use mock::MockPaymentGateway;
pub use stripe::{StripeConfig, StripeGateway};

/// Gateway-side lifecycle of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    pub fn is_success(self) -> bool {
        self == PaymentIntentStatus::Succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: PaymentIntentStatus,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub receipt_email: Option<String>,
}

impl PaymentIntent {
    pub fn order_reference(&self) -> Option<&str> {
        self.metadata
            .get(webhooks::ORDER_ID_METADATA_KEY)
            .map(String::as_str)
    }
}

/// External payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, ServiceError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError>;

    fn webhook_tolerance_secs(&self) -> u64 {
        webhooks::DEFAULT_TOLERANCE_SECS
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
        secret: &str,
    ) -> Result<(), ServiceError> {
        webhooks::verify_signature(
            payload,
            signature_header,
            secret,
            self.webhook_tolerance_secs(),
            chrono::Utc::now().timestamp(),
        )
    }
}
