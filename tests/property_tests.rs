//! Property-based tests for the order lifecycle, price handling and webhook
//! signatures.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use storefront_orders::{
    models::{NewOrder, NewOrderItem, OrderStatus, PriceInput, ShippingAddress},
    services::checkout::to_minor_units,
    webhooks::{verify_signature, SignatureGenerator},
};
use uuid::Uuid;

fn status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop_oneof![
        Just(OrderStatus::Pending),
        Just(OrderStatus::Processing),
        Just(OrderStatus::Shipped),
        Just(OrderStatus::Delivered),
        Just(OrderStatus::Cancelled),
    ]
}

/// Amount in cents rendered as a major-unit string, e.g. `1234` -> `"12.34"`.
fn price_strategy() -> impl Strategy<Value = (u64, String)> {
    (0u64..10_000_000).prop_map(|cents| (cents, format!("{}.{:02}", cents / 100, cents % 100)))
}

fn draft(items: &str, tax: &str, shipping: &str, total: &str) -> NewOrder {
    NewOrder {
        user_id: Uuid::new_v4(),
        items: vec![NewOrderItem {
            product_id: None,
            name: "Item".into(),
            quantity: 1,
            unit_price: PriceInput::Text(items.into()),
            size: "OS".into(),
            image: String::new(),
        }],
        shipping_address: ShippingAddress {
            full_name: "N".into(),
            street: "S".into(),
            city: "C".into(),
            postal_code: "P".into(),
            country: "US".into(),
        },
        payment_method: "card".into(),
        items_price: PriceInput::Text(items.into()),
        tax_price: PriceInput::Text(tax.into()),
        shipping_price: PriceInput::Text(shipping.into()),
        total_price: PriceInput::Text(total.into()),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Whatever sequence of transitions is attempted, the order only ever
    /// moves along allowed edges and rejected attempts change nothing.
    #[test]
    fn transitions_follow_the_table(targets in prop::collection::vec(status_strategy(), 0..12)) {
        let mut order = draft("10.00", "0", "0", "10.00").into_order(Utc::now()).unwrap();

        for target in targets {
            let before = order.clone();
            match order.transition_to(target, Some("TRACK-1"), Utc::now()) {
                Ok(()) => {
                    prop_assert!(before.status.can_transition_to(target));
                    prop_assert_eq!(order.status, target);
                    prop_assert_eq!(order.delivered_at.is_some(), target == OrderStatus::Delivered);
                    if target.accepts_tracking_number() {
                        prop_assert_eq!(order.tracking_number.as_deref(), Some("TRACK-1"));
                    }
                }
                Err(_) => {
                    prop_assert!(!before.status.can_transition_to(target));
                    prop_assert_eq!(&order, &before);
                }
            }
        }
    }

    #[test]
    fn terminal_states_accept_nothing(target in status_strategy()) {
        prop_assert!(!OrderStatus::Delivered.can_transition_to(target));
        prop_assert!(!OrderStatus::Cancelled.can_transition_to(target));
    }

    /// An order is accepted exactly when the total equals the sum of its parts.
    #[test]
    fn total_must_equal_the_sum_of_parts(
        (items_cents, items) in price_strategy(),
        (tax_cents, tax) in price_strategy(),
        (shipping_cents, shipping) in price_strategy(),
        skew in -3i64..=3,
    ) {
        let total_cents = (items_cents + tax_cents + shipping_cents) as i64 + skew;
        prop_assume!(total_cents >= 0);
        let total = Decimal::new(total_cents, 2).to_string();

        let result = draft(&items, &tax, &shipping, &total).into_order(Utc::now());
        prop_assert_eq!(result.is_ok(), skew == 0);
        if let Ok(order) = result {
            prop_assert_eq!(order.total_price, Decimal::new(total_cents, 2));
            prop_assert_eq!(order.status, OrderStatus::Pending);
        }
    }

    #[test]
    fn minor_units_match_cents((cents, price) in price_strategy()) {
        let amount: Decimal = price.parse().unwrap();
        prop_assert_eq!(to_minor_units(amount).unwrap(), cents as i64);
    }

    #[test]
    fn numeric_and_string_prices_coerce_alike(cents in 0u32..1_000_000) {
        let whole = cents / 100;
        let from_number = PriceInput::from(whole).coerce("price").unwrap();
        let from_text = PriceInput::Text(format!(" {whole} ")).coerce("price").unwrap();
        prop_assert_eq!(from_number, from_text);
    }

    /// Any change to the signed bytes invalidates the signature.
    #[test]
    fn signatures_bind_the_exact_payload(
        payload in prop::collection::vec(any::<u8>(), 1..256),
        flip in any::<prop::sample::Index>(),
    ) {
        let now = 1_700_000_000;
        let header = SignatureGenerator::new("whsec_prop").header_value(now, &payload).unwrap();
        prop_assert!(verify_signature(&payload, &header, "whsec_prop", 300, now).is_ok());

        let mut tampered = payload.clone();
        let i = flip.index(tampered.len());
        tampered[i] ^= 0x01;
        prop_assert!(verify_signature(&tampered, &header, "whsec_prop", 300, now).is_err());
    }
}
