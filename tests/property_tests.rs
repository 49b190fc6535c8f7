//! Property-based tests for the allocation engine and its unit math.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use printbroker_api::pricing::{
    allocate, to_cpm, to_total, AllocationMode, AllocationRequest, RateCard,
};

fn cents(lo: i64, hi: i64) -> impl Strategy<Value = Decimal> {
    (lo..hi).prop_map(|c| Decimal::new(c, 2))
}

prop_compose! {
    /// A rate card whose standard rate covers print and paper, so the
    /// margin pool is non-negative.
    fn profitable_rate_card()(
        print in cents(500, 10_000),
        material_cost in cents(500, 8_000),
        markup in cents(0, 2_000),
        pool in cents(0, 5_000),
    ) -> RateCard {
        let material_charge = material_cost + markup;
        RateCard {
            size_key: "6x9".to_string(),
            print_cost_per_m: print,
            material_cost_per_m: material_cost,
            material_charge_per_m: material_charge,
            standard_rate_per_m: print + material_charge + pool,
            minimum_rate_per_m: None,
        }
    }
}

fn any_mode() -> impl Strategy<Value = AllocationMode> {
    prop_oneof![
        Just(AllocationMode::Standard),
        Just(AllocationMode::PrinterSuppliesMaterial),
        Just(AllocationMode::IntermediaryWaivesMaterialMargin),
    ]
}

proptest! {
    /// Converting a job total to CPM and back returns the original cents.
    #[test]
    fn cpm_conversion_round_trips(
        total in cents(1, 10_000_000),
        quantity in 1i64..2_000_000,
    ) {
        let cpm = to_cpm(total, quantity).unwrap();
        prop_assert_eq!(to_total(cpm, quantity).unwrap(), total);
    }

    /// The customer's money is fully accounted for: broker margin plus the
    /// intermediary invoice equals the customer total, exactly at CPM
    /// granularity and within independent rounding on totals.
    #[test]
    fn customer_total_splits_completely(
        rates in profitable_rate_card(),
        mode in any_mode(),
        quantity in 1i64..2_000_000,
    ) {
        let breakdown = allocate(&AllocationRequest {
            quantity,
            mode,
            rates,
            known_customer_total: None,
        }).unwrap();

        prop_assert_eq!(
            breakdown.broker_margin.cpm + breakdown.intermediary_total.cpm,
            breakdown.customer.cpm
        );
        let total_drift = (breakdown.customer.total
            - breakdown.broker_margin.total
            - breakdown.intermediary_total.total)
            .abs();
        prop_assert!(total_drift <= dec!(0.02), "drift {total_drift}");
    }

    /// Standard mode: the pool splits evenly and the paper markup lands in
    /// the intermediary's material margin.
    #[test]
    fn standard_mode_splits_pool_evenly(
        rates in profitable_rate_card(),
        quantity in 1i64..2_000_000,
    ) {
        let markup = rates.material_charge_per_m - rates.material_cost_per_m;
        let breakdown = allocate(&AllocationRequest {
            quantity,
            mode: AllocationMode::Standard,
            rates,
            known_customer_total: None,
        }).unwrap();

        prop_assert_eq!(
            breakdown.broker_margin.cpm,
            breakdown.intermediary_print_margin.cpm
        );
        prop_assert_eq!(breakdown.intermediary_material_margin.cpm, markup);
        prop_assert_eq!(
            breakdown.intermediary_total_margin.cpm,
            breakdown.intermediary_print_margin.cpm + markup
        );
    }

    /// Supply mode always splits 10/10/80 of customer revenue, and the
    /// paper markup is forced to zero.
    #[test]
    fn supply_mode_is_ten_ten_eighty(
        rates in profitable_rate_card(),
        quantity in 1i64..2_000_000,
    ) {
        let breakdown = allocate(&AllocationRequest {
            quantity,
            mode: AllocationMode::PrinterSuppliesMaterial,
            rates,
            known_customer_total: None,
        }).unwrap();

        let customer_cpm = breakdown.customer.cpm;
        prop_assert_eq!(breakdown.broker_margin.cpm, customer_cpm * dec!(0.10));
        prop_assert_eq!(breakdown.intermediary_total.cpm, customer_cpm * dec!(0.90));
        prop_assert_eq!(breakdown.printer_total.cpm, customer_cpm * dec!(0.80));
        prop_assert_eq!(breakdown.intermediary_material_margin.total, Decimal::ZERO);
        prop_assert_eq!(breakdown.material_charge.cpm, breakdown.material_cost.cpm);
    }

    /// Waiver mode: no paper markup is taken and the widened pool still
    /// splits evenly.
    #[test]
    fn waiver_mode_takes_no_material_margin(
        rates in profitable_rate_card(),
        quantity in 1i64..2_000_000,
    ) {
        let breakdown = allocate(&AllocationRequest {
            quantity,
            mode: AllocationMode::IntermediaryWaivesMaterialMargin,
            rates,
            known_customer_total: None,
        }).unwrap();

        prop_assert_eq!(breakdown.intermediary_material_margin.total, Decimal::ZERO);
        prop_assert_eq!(breakdown.material_charge.cpm, breakdown.material_cost.cpm);
        prop_assert_eq!(
            breakdown.broker_margin.cpm,
            breakdown.intermediary_print_margin.cpm
        );
        prop_assert_eq!(
            breakdown.intermediary_total_margin.cpm,
            breakdown.intermediary_print_margin.cpm
        );
    }

    /// A pinned customer amount is stored verbatim, never re-rounded away.
    #[test]
    fn pinned_totals_survive_verbatim(
        rates in profitable_rate_card(),
        mode in any_mode(),
        total in cents(1, 10_000_000),
        quantity in 1i64..2_000_000,
    ) {
        let breakdown = allocate(&AllocationRequest {
            quantity,
            mode,
            rates,
            known_customer_total: Some(total),
        }).unwrap();
        prop_assert_eq!(breakdown.customer.total, total);
    }

    /// Pricing forward and then re-pricing from the resulting invoice total
    /// reproduces the same breakdown when the quantity divides evenly.
    #[test]
    fn forward_and_reverse_agree_on_even_quantities(
        rates in profitable_rate_card(),
        mode in any_mode(),
        thousands in 1i64..2_000,
    ) {
        let quantity = thousands * 1000;
        let forward = allocate(&AllocationRequest {
            quantity,
            mode,
            rates: rates.clone(),
            known_customer_total: None,
        }).unwrap();
        let reverse = allocate(&AllocationRequest {
            quantity,
            mode,
            rates,
            known_customer_total: Some(forward.customer.total),
        }).unwrap();
        prop_assert_eq!(forward, reverse);
    }

    /// On awkward quantities the two directions still agree to the cent on
    /// every stored total.
    #[test]
    fn forward_and_reverse_agree_within_a_cent(
        rates in profitable_rate_card(),
        mode in any_mode(),
        quantity in 1000i64..2_000_000,
    ) {
        let forward = allocate(&AllocationRequest {
            quantity,
            mode,
            rates: rates.clone(),
            known_customer_total: None,
        }).unwrap();
        let reverse = allocate(&AllocationRequest {
            quantity,
            mode,
            rates,
            known_customer_total: Some(forward.customer.total),
        }).unwrap();

        let pairs = [
            (forward.broker_margin.total, reverse.broker_margin.total),
            (forward.intermediary_total.total, reverse.intermediary_total.total),
            (forward.printer_total.total, reverse.printer_total.total),
            (
                forward.intermediary_total_margin.total,
                reverse.intermediary_total_margin.total,
            ),
        ];
        for (fwd, rev) in pairs {
            prop_assert!((fwd - rev).abs() <= dec!(0.01), "{fwd} vs {rev}");
        }
    }
}
