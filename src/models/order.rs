use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;

/// Lifecycle status of an order.
///
/// `delivered` and `cancelled` are terminal. Cancellation is only possible
/// before the order has shipped.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Statuses reachable from `self` in a single transition.
    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    /// Re-applying the current status is not a valid transition.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Tracking numbers only make sense once the parcel has left.
    pub fn accepts_tracking_number(self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
    }

    /// Pending orders are unpaid and cancelled orders never settled.
    pub fn counts_toward_revenue(self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

/// Line item snapshot taken when the order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    /// Catalog reference; absent when the product has since been removed.
    pub product_id: Option<Uuid>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub size: String,
    pub image: String,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "Recipient name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

/// Gateway confirmation recorded once a payment succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentResult {
    /// Gateway transaction identifier
    pub id: String,
    /// Status string as reported by the gateway
    pub status: String,
    pub update_time: DateTime<Utc>,
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub payment_result: Option<PaymentResult>,
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by every persisted update.
    pub version: i32,
}

impl Order {
    /// Moves the order to `target`, enforcing the lifecycle table.
    ///
    /// This is the only place where `status`, `tracking_number` and
    /// `delivered_at` change after creation.
    pub fn transition_to(
        &mut self,
        target: OrderStatus,
        tracking_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if !self.status.can_transition_to(target) {
            return Err(ServiceError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        self.status = target;
        if let Some(tracking) = tracking_number.map(str::trim).filter(|t| !t.is_empty()) {
            if target.accepts_tracking_number() {
                self.tracking_number = Some(tracking.to_string());
            } else {
                tracing::debug!(order_id = %self.id, status = %target, "ignoring tracking number before shipment");
            }
        }
        if target == OrderStatus::Delivered {
            self.delivered_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Records a successful payment and moves a pending order to processing.
    pub fn record_payment(
        &mut self,
        confirmation: &PaymentConfirmation,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if self.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Processing,
            });
        }

        self.payment_result = Some(PaymentResult {
            id: confirmation.transaction_id.clone(),
            status: confirmation.status.clone(),
            update_time: now,
            email_address: confirmation.payer_email.clone(),
        });
        self.transition_to(OrderStatus::Processing, None, now)
    }
}

/// Payment details handed to the lifecycle after the gateway reports success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentConfirmation {
    #[validate(length(min = 1, message = "Transaction id is required"))]
    #[serde(alias = "id")]
    pub transaction_id: String,
    #[validate(length(min = 1, message = "Payment status is required"))]
    pub status: String,
    #[serde(default, alias = "email_address")]
    pub payer_email: Option<String>,
}

/// Price as submitted by a client: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(serde_json::Number),
    Text(String),
}

impl PriceInput {
    /// Coerces the raw value into a non-negative decimal.
    pub fn coerce(&self, field: &str) -> Result<Decimal, ServiceError> {
        let raw = match self {
            PriceInput::Number(n) => n.to_string(),
            PriceInput::Text(s) => s.trim().to_string(),
        };

        let value = Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .map_err(|_| {
                ServiceError::ValidationError(format!("{field} must be a number, got '{raw}'"))
            })?;

        if value.is_sign_negative() && !value.is_zero() {
            return Err(ServiceError::ValidationError(format!(
                "{field} must not be negative"
            )));
        }
        Ok(value.normalize())
    }
}

impl From<Decimal> for PriceInput {
    fn from(value: Decimal) -> Self {
        PriceInput::Text(value.to_string())
    }
}

impl From<u32> for PriceInput {
    fn from(value: u32) -> Self {
        PriceInput::Number(value.into())
    }
}

/// Line item as submitted at checkout, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewOrderItem {
    #[serde(default, alias = "product")]
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: String,
    pub quantity: i64,
    #[serde(alias = "price")]
    #[schema(value_type = String, example = "49.99")]
    pub unit_price: PriceInput,
    #[validate(length(min = 1, message = "Item size is required"))]
    pub size: String,
    #[serde(default)]
    pub image: String,
}

/// Cart snapshot used to place an order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewOrder {
    pub user_id: Uuid,
    #[serde(alias = "order_items")]
    pub items: Vec<NewOrderItem>,
    #[validate]
    pub shipping_address: ShippingAddress,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    #[schema(value_type = String, example = "100.00")]
    pub items_price: PriceInput,
    #[schema(value_type = String, example = "10.00")]
    pub tax_price: PriceInput,
    #[schema(value_type = String, example = "5.00")]
    pub shipping_price: PriceInput,
    #[schema(value_type = String, example = "115.00")]
    pub total_price: PriceInput,
}

impl NewOrder {
    /// Validates the snapshot and builds a pending order.
    pub fn into_order(self, now: DateTime<Utc>) -> Result<Order, ServiceError> {
        self.validate()?;

        if self.items.is_empty() {
            return Err(ServiceError::ValidationError("No order items".to_string()));
        }

        let mut items = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.into_iter().enumerate() {
            item.validate()?;
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Item {} quantity must be at least 1",
                    index + 1
                )));
            }
            let quantity = u32::try_from(item.quantity).map_err(|_| {
                ServiceError::ValidationError(format!("Item {} quantity is too large", index + 1))
            })?;
            items.push(OrderItem {
                product_id: item.product_id,
                name: item.name,
                quantity,
                unit_price: item.unit_price.coerce("unit_price")?,
                size: item.size,
                image: item.image,
            });
        }

        let items_price = self.items_price.coerce("items_price")?;
        let tax_price = self.tax_price.coerce("tax_price")?;
        let shipping_price = self.shipping_price.coerce("shipping_price")?;
        let total_price = self.total_price.coerce("total_price")?;

        let expected_total = items_price
            .checked_add(tax_price)
            .and_then(|sum| sum.checked_add(shipping_price))
            .ok_or_else(|| ServiceError::ValidationError("prices overflow".to_string()))?;
        if total_price != expected_total {
            return Err(ServiceError::ValidationError(format!(
                "total_price {} does not equal items_price + tax_price + shipping_price ({})",
                total_price, expected_total
            )));
        }

        Ok(Order {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            items,
            shipping_address: self.shipping_address,
            payment_method: self.payment_method,
            payment_result: None,
            items_price,
            tax_price,
            shipping_price,
            total_price,
            status: OrderStatus::Pending,
            tracking_number: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }
}
