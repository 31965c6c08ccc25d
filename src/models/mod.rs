pub mod order;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub use order::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, PaymentConfirmation, PaymentResult,
    PriceInput, ShippingAddress,
};

/// Purchaser details resolved for reporting views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
}
