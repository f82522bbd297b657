//! Property-based tests for money formatting, invoice aggregation and
//! composite keys.

use beach_club_api::{
    invoice::{aggregate, Invoice, LineItem},
    locator::{format_instant, RecordKey},
    money::{format_brl, parse_brl, round_cents},
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn cents_strategy() -> impl Strategy<Value = Decimal> {
    (-10_000_000_000i64..10_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn line_item_strategy() -> impl Strategy<Value = LineItem> {
    (
        prop_oneof!["Water", "Juice", "Coconut", "Ice", "Beer"],
        1i64..50,
        0i64..100_000,
    )
        .prop_map(|(name, quantity, cents)| LineItem::new(name, quantity, Decimal::new(cents, 2)))
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ]{0,20}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn formatted_amounts_parse_back(amount in cents_strategy()) {
        let text = format_brl(amount);
        prop_assert!(text.contains("R$ "));
        prop_assert_eq!(parse_brl(&text).unwrap(), amount);
    }

    #[test]
    fn rounding_is_idempotent(units in -1_000_000i64..1_000_000, scale in 0u32..6) {
        let amount = Decimal::new(units, scale);
        let once = round_cents(amount);
        prop_assert_eq!(round_cents(once), once);
        prop_assert!(once.scale() <= 2);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn aggregation_preserves_quantities_and_totals(items in prop::collection::vec(line_item_strategy(), 0..40)) {
        let lines = aggregate(&items).unwrap();

        let item_qty: i64 = items.iter().map(|i| i.quantity).sum();
        let line_qty: i64 = lines.iter().map(|l| l.quantity).sum();
        prop_assert_eq!(item_qty, line_qty);

        let item_total: Decimal = items.iter().map(|i| i.line_total().unwrap()).sum();
        let invoice = Invoice::build("Cliente", Utc::now(), &items).unwrap();
        prop_assert_eq!(invoice.grand_total, item_total);

        let mut names: Vec<&str> = lines.iter().map(|l| l.product_name.as_str()).collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        prop_assert_eq!(names.len(), count, "each product appears on one line");
    }

    #[test]
    fn keys_are_stable_and_split_back(
        client in name_strategy(),
        product in name_strategy(),
        micros in 0i64..4_000_000_000_000_000,
    ) {
        let at = Utc.timestamp_micros(micros).single().unwrap();
        let first = RecordKey::for_order(&client, &product, &at).unwrap();
        let second = RecordKey::for_order(&client, &product, &at).unwrap();
        prop_assert_eq!(&first, &second);

        let instant = format_instant(&at);
        prop_assert_eq!(first.fields(), vec![client.as_str(), product.as_str(), instant.as_str()]);
        prop_assert_eq!(RecordKey::parse(first.as_str()).unwrap(), first);
    }

    #[test]
    fn changing_any_field_changes_the_key(
        client in name_strategy(),
        other_client in name_strategy(),
        product in name_strategy(),
        other_product in name_strategy(),
        micros in 0i64..4_000_000_000_000_000,
        shift in 1i64..86_400_000_000,
    ) {
        let at = Utc.timestamp_micros(micros).single().unwrap();
        let later = Utc.timestamp_micros(micros + shift).single().unwrap();
        let key = RecordKey::for_order(&client, &product, &at).unwrap();

        if other_client != client {
            prop_assert_ne!(&key, &RecordKey::for_order(&other_client, &product, &at).unwrap());
        }
        if other_product != product {
            prop_assert_ne!(&key, &RecordKey::for_order(&client, &other_product, &at).unwrap());
        }
        prop_assert_ne!(&key, &RecordKey::for_order(&client, &product, &later).unwrap());
    }
}

#[test]
fn near_identical_fields_give_distinct_keys() {
    let at = Utc.timestamp_micros(1_717_236_000_000_000).single().unwrap();
    let next_micro = Utc.timestamp_micros(1_717_236_000_000_001).single().unwrap();
    let key = RecordKey::for_order("Ana", "Water", &at).unwrap();

    assert_ne!(key, RecordKey::for_order("Ana ", "Water", &at).unwrap());
    assert_ne!(key, RecordKey::for_order("ana", "Water", &at).unwrap());
    assert_ne!(key, RecordKey::for_order("Ana", "Water ", &at).unwrap());
    assert_ne!(key, RecordKey::for_order("Ana", "Water", &next_micro).unwrap());
    // shifting text between fields must not collide either
    assert_ne!(
        RecordKey::for_order("Ana W", "ater", &at).unwrap(),
        RecordKey::for_order("Ana", "W ater", &at).unwrap()
    );
}
