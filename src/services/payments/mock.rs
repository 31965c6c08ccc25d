use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::{PaymentGateway, PaymentIntent, PaymentIntentStatus};
use crate::errors::ServiceError;

/// In-process gateway for local development and tests.
///
/// Intents start in `requires_payment_method` unless `auto_succeed` is set;
/// [`MockPaymentGateway::set_status`] simulates the customer completing payment.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    intents: DashMap<String, PaymentIntent>,
    auto_succeed: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_succeed() -> Self {
        Self {
            intents: DashMap::new(),
            auto_succeed: true,
        }
    }

    pub fn set_status(
        &self,
        intent_id: &str,
        status: PaymentIntentStatus,
    ) -> Result<(), ServiceError> {
        let mut intent = self.intents.get_mut(intent_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Payment intent {} not found", intent_id))
        })?;
        intent.status = status;
        Ok(())
    }

    pub fn set_receipt_email(&self, intent_id: &str, email: impl Into<String>) {
        if let Some(mut intent) = self.intents.get_mut(intent_id) {
            intent.receipt_email = Some(email.into());
        }
    }

    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, ServiceError> {
        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
            id: id.clone(),
            status: if self.auto_succeed {
                PaymentIntentStatus::Succeeded
            } else {
                PaymentIntentStatus::RequiresPaymentMethod
            },
            amount: amount_minor,
            currency: currency.to_lowercase(),
            metadata,
            receipt_email: None,
        };
        debug!(intent_id = %id, amount_minor, "mock intent created");
        self.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError> {
        self.intents
            .get(intent_id)
            .map(|intent| intent.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Payment intent {} not found", intent_id)))
    }
}
