//! Property-based tests for the pricing engine
//!
//! The quote calculation is pure, so its invariants can be checked across a
//! wide range of prices, conditions and damage combinations rather than a few
//! hand-picked cases.

use bayern_ankauf::pricing::{
    ConditionLevel, DamageFlag, calculate_price, format_euro, round2,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

// PROPERTY TEST STRATEGIES

/// Strategy to generate a base price in cents between 0 and 5.000,00 €
fn base_price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=500_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn condition_strategy() -> impl Strategy<Value = ConditionLevel> {
    prop::sample::select(ConditionLevel::ALL.to_vec())
}

/// Strategy to generate damage flag lists, duplicates included
fn damage_flags_strategy() -> impl Strategy<Value = Vec<DamageFlag>> {
    prop::collection::vec(prop::sample::select(DamageFlag::ALL.to_vec()), 0..12)
}

// PROPERTY TESTS
proptest! {
    /// Property: without damage, the final price is the rounded post-condition price
    #[test]
    fn prop_no_damage_is_condition_price(
        base in base_price_strategy(),
        condition in condition_strategy(),
    ) {
        let quote = calculate_price(base, condition, &[]);

        prop_assert_eq!(quote.final_price_euro, round2(base * condition.factor()));
        prop_assert_eq!(quote.total_damage_deduction_euro, Decimal::ZERO);
        prop_assert!(quote.damage_deductions.is_empty());
    }

    /// Property: the final price is never negative, however many flags are stacked
    #[test]
    fn prop_final_price_is_never_negative(
        base in base_price_strategy(),
        condition in condition_strategy(),
        flags in damage_flags_strategy(),
    ) {
        let quote = calculate_price(base, condition, &flags);
        prop_assert!(quote.final_price_euro >= Decimal::ZERO);
    }

    /// Property: the final price never exceeds the post-condition price
    #[test]
    fn prop_damage_only_lowers_the_price(
        base in base_price_strategy(),
        condition in condition_strategy(),
        flags in damage_flags_strategy(),
    ) {
        let quote = calculate_price(base, condition, &flags);
        prop_assert!(quote.final_price_euro <= round2(base * condition.factor()));
    }

    /// Property: the breakdown is internally consistent
    ///
    /// One deduction record per supplied flag, in order, with the total equal to
    /// the sum of the rounded records and every amount at cent precision.
    #[test]
    fn prop_breakdown_is_consistent(
        base in base_price_strategy(),
        condition in condition_strategy(),
        flags in damage_flags_strategy(),
    ) {
        let quote = calculate_price(base, condition, &flags);

        let listed: Vec<DamageFlag> = quote.damage_deductions.iter().map(|d| d.flag).collect();
        prop_assert_eq!(&listed, &flags);

        let sum: Decimal = quote.damage_deductions.iter().map(|d| d.deduction_euro).sum();
        prop_assert_eq!(quote.total_damage_deduction_euro, round2(sum));

        let expected_final = round2(base * condition.factor() - quote.total_damage_deduction_euro)
            .max(Decimal::ZERO);
        prop_assert_eq!(quote.final_price_euro, expected_final);

        for amount in [
            quote.condition_deduction_euro,
            quote.total_damage_deduction_euro,
            quote.final_price_euro,
        ] {
            prop_assert_eq!(amount, round2(amount));
        }
    }

    /// Property: identical input gives an identical breakdown
    #[test]
    fn prop_calculation_is_deterministic(
        base in base_price_strategy(),
        condition in condition_strategy(),
        flags in damage_flags_strategy(),
    ) {
        prop_assert_eq!(
            calculate_price(base, condition, &flags),
            calculate_price(base, condition, &flags)
        );
    }

    /// Property: formatted amounts always end in two decimals and the euro sign
    #[test]
    fn prop_format_euro_shape(base in base_price_strategy()) {
        let formatted = format_euro(base);
        prop_assert!(formatted.ends_with(" €"), "{}", formatted);

        let number = formatted.trim_end_matches(" €");
        let (integer, fraction) = number.split_once(',').expect("decimal comma");
        prop_assert_eq!(fraction.len(), 2);
        prop_assert!(integer.split('.').skip(1).all(|group| group.len() == 3));
    }
}

/// A good-condition device with a cracked display
#[test]
fn good_device_with_cracked_display() {
    let quote = calculate_price(
        Decimal::from(1000),
        ConditionLevel::Gut,
        &[DamageFlag::DisplayRiss],
    );

    assert_eq!(quote.condition_deduction_euro, Decimal::from(150));
    assert_eq!(quote.damage_deductions[0].deduction_euro, Decimal::from(170));
    assert_eq!(quote.final_price_euro, Decimal::from(680));
}

/// A defective, water-damaged device with a broken display is worth nothing
#[test]
fn severe_damage_clamps_to_zero() {
    let quote = calculate_price(
        Decimal::from(100),
        ConditionLevel::Defekt,
        &[DamageFlag::Wasserschaden, DamageFlag::DisplayDefekt],
    );

    assert_eq!(quote.final_price_euro, Decimal::ZERO);
    assert!(!quote.final_price_euro.is_sign_negative());
}
