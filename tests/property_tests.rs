//! Property-based tests for order assembly and supplier splitting.
//!
//! These run the pure checkout stages over generated carts and check the
//! money and grouping invariants hold for every input.

use chrono::Utc;
use dropship_checkout::{
    entities::order::PaymentMethod,
    services::{
        catalog::{CartLine, ProductSnapshot, SupplierSnapshot},
        cod_eligibility,
        fulfillment_splitter::split,
        order_assembler::{assemble, CustomerSnapshot},
    },
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use uuid::Uuid;

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn suppliers() -> Vec<SupplierSnapshot> {
    (0..3)
        .map(|i| SupplierSnapshot {
            id: Uuid::new_v4(),
            name: format!("supplier-{}", i),
            supports_cod: i != 2,
            lead_time_days: 2,
        })
        .collect()
}

/// (price, quantity, supplier index or none, cod flag, dropship cost)
type LineSeed = (Decimal, i32, Option<usize>, bool, Option<Decimal>);

fn line_strategy() -> impl Strategy<Value = LineSeed> {
    (
        price_strategy(),
        1i32..50,
        proptest::option::of(0usize..3),
        any::<bool>(),
        proptest::option::of(price_strategy()),
    )
}

fn build_lines(seeds: &[LineSeed], suppliers: &[SupplierSnapshot]) -> Vec<CartLine> {
    seeds
        .iter()
        .enumerate()
        .map(|(i, (price, qty, supplier, cod, cost))| CartLine {
            cart_item_id: Uuid::new_v4(),
            quantity: *qty,
            product: ProductSnapshot {
                id: Uuid::new_v4(),
                name: format!("product-{}", i),
                price: *price,
                stock: None,
                cod_allowed: *cod,
                dropship_cost: *cost,
                supplier: supplier.map(|s| suppliers[s].clone()),
            },
        })
        .collect()
}

fn customer() -> CustomerSnapshot {
    CustomerSnapshot {
        user_id: Uuid::new_v4(),
        name: "Prop".into(),
        email: "prop@example.com".into(),
    }
}

proptest! {
    #[test]
    fn total_is_sum_of_line_totals(seeds in prop::collection::vec(line_strategy(), 1..12)) {
        let suppliers = suppliers();
        let lines = build_lines(&seeds, &suppliers);
        let draft = assemble(customer(), &lines, PaymentMethod::Online, false, None, Utc::now());

        let sum: Decimal = draft.items.iter().map(|i| i.total_price).sum();
        prop_assert_eq!(draft.total_price, sum);
        for item in &draft.items {
            prop_assert_eq!(item.total_price, item.unit_price * Decimal::from(item.quantity));
            prop_assert!(item.total_price.scale() <= 2);
        }
    }

    #[test]
    fn one_fulfillment_per_distinct_supplier(seeds in prop::collection::vec(line_strategy(), 1..12)) {
        let suppliers = suppliers();
        let lines = build_lines(&seeds, &suppliers);
        let draft = assemble(customer(), &lines, PaymentMethod::Cod, true, None, Utc::now());
        let splits = split(&draft);

        let expected: BTreeSet<Uuid> = draft.items.iter().filter_map(|i| i.supplier_id).collect();
        let actual: BTreeSet<Uuid> = splits.iter().map(|f| f.supplier_id).collect();
        prop_assert_eq!(splits.len(), actual.len());
        prop_assert_eq!(actual, expected);

        for f in &splits {
            prop_assert_eq!(f.order_id, draft.id);
            prop_assert!(f.supplier_subtotal > Decimal::ZERO);
        }
    }

    #[test]
    fn cod_verdict_matches_every_line(seeds in prop::collection::vec(line_strategy(), 1..12)) {
        let suppliers = suppliers();
        let lines = build_lines(&seeds, &suppliers);
        let verdict = cod_eligibility::evaluate(&lines);

        let all_allow = lines.iter().all(|l| {
            l.product.cod_allowed && l.product.supplier.as_ref().map_or(true, |s| s.supports_cod)
        });
        prop_assert_eq!(verdict.allowed, all_allow);
        prop_assert_eq!(verdict.blocking_product.is_some(), !all_allow);
    }
}
