//! Payment webhook envelope parsing and Stripe-style signature handling.
//!
//! Signature header format: `t=<unix seconds>,v1=<hex hmac-sha256>` where the
//! MAC covers `"{t}.{raw payload}"`. Several `v1` entries may be present
//! during secret rotation; any match is accepted.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;
pub const ORDER_ID_METADATA_KEY: &str = "orderId";

/// Signs payloads the way the gateway does, for simulating webhook deliveries.
pub struct SignatureGenerator {
    secret: String,
}

impl SignatureGenerator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign_payload(&self, timestamp: i64, payload: &[u8]) -> Result<String, ServiceError> {
        let mac = mac_for(&self.secret, &timestamp.to_string(), payload)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Full header value for `payload` signed at `timestamp`.
    pub fn header_value(&self, timestamp: i64, payload: &[u8]) -> Result<String, ServiceError> {
        Ok(format!(
            "t={},v1={}",
            timestamp,
            self.sign_payload(timestamp, payload)?
        ))
    }
}

fn mac_for(secret: &str, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks `header` against `payload`, rejecting stale timestamps.
///
/// `now` is a unix timestamp in seconds.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), ServiceError> {
    if secret.is_empty() {
        return Err(ServiceError::ServiceUnavailable(
            "Webhook signing secret is not configured".to_string(),
        ));
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        ServiceError::SignatureVerification("missing timestamp in signature header".to_string())
    })?;
    if signatures.is_empty() {
        return Err(ServiceError::SignatureVerification(
            "missing v1 signature in signature header".to_string(),
        ));
    }

    let issued_at: i64 = timestamp.parse().map_err(|_| {
        ServiceError::SignatureVerification(format!("malformed timestamp '{}'", timestamp))
    })?;
    if now.abs_diff(issued_at) > tolerance_secs {
        return Err(ServiceError::SignatureVerification(format!(
            "timestamp {} outside tolerance of {}s",
            issued_at, tolerance_secs
        )));
    }

    let mut matched = false;
    for candidate in signatures {
        let Ok(bytes) = hex::decode(candidate) else {
            continue;
        };
        if mac_for(secret, timestamp, payload)?.verify_slice(&bytes).is_ok() {
            matched = true;
            break;
        }
    }

    if matched {
        Ok(())
    } else {
        Err(ServiceError::SignatureVerification(
            "no matching v1 signature".to_string(),
        ))
    }
}

/// How a webhook event type is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    PaymentSucceeded,
    PaymentFailed,
    Other,
}

impl EventClass {
    pub fn of(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" | "payment.succeeded" | "charge.succeeded" => {
                EventClass::PaymentSucceeded
            }
            "payment_intent.payment_failed" | "payment.failed" | "charge.failed" => {
                EventClass::PaymentFailed
            }
            _ => EventClass::Other,
        }
    }
}

/// Envelope of an incoming gateway event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEventData {
    #[serde(default)]
    pub object: Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, ServiceError> {
        serde_json::from_slice(payload)
            .map_err(|e| ServiceError::ValidationError(format!("Invalid webhook payload: {}", e)))
    }

    pub fn class(&self) -> EventClass {
        EventClass::of(&self.event_type)
    }

    fn object_str(&self, key: &str) -> Option<&str> {
        self.data.object.get(key).and_then(Value::as_str)
    }

    /// Identifier of the intent or charge the event describes.
    pub fn object_id(&self) -> Option<&str> {
        self.object_str("id")
    }

    pub fn object_status(&self) -> Option<&str> {
        self.object_str("status")
    }

    pub fn receipt_email(&self) -> Option<&str> {
        self.object_str("receipt_email")
    }

    /// Raw `orderId` metadata, if any.
    pub fn raw_order_id(&self) -> Option<&str> {
        self.data
            .object
            .get("metadata")
            .and_then(|m| m.get(ORDER_ID_METADATA_KEY))
            .and_then(Value::as_str)
    }

    /// `orderId` metadata parsed as an order id; `None` when absent or malformed.
    pub fn order_id(&self) -> Option<Uuid> {
        self.raw_order_id()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    }
}
