//! Property-based tests for the dsPopSim core.
//!
//! Uses proptest to generate temperature series, parameter updates and
//! switch histories, then verify the model's invariants hold.

use dspop_core::cell::CellSimulator;
use dspop_core::diapause::DiapauseState;
use dspop_core::params::{DiapauseParams, ParamKey, ParameterSet};
use dspop_core::rates;
use dspop_core::sim::SimConfig;
use dspop_core::temperature::TemperatureSeries;
use dspop_core::validation::diff_histories;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_temperatures(max_days: usize) -> impl Strategy<Value = TemperatureSeries> {
    proptest::collection::vec(-10.0f64..40.0, 1..=max_days)
        .prop_map(|daily| TemperatureSeries::new(daily).expect("finite"))
}

fn arb_config() -> impl Strategy<Value = SimConfig> {
    (any::<bool>(), any::<bool>()).prop_map(|(ignore_fruit, ignore_diapause)| SimConfig {
        ignore_fruit,
        ignore_diapause,
        ..SimConfig::default()
    })
}

/// A flat-name update with a value that may or may not be valid.
fn arb_update() -> impl Strategy<Value = (ParamKey, f64)> {
    let keys = ParamKey::all();
    (0..keys.len(), -2.0f64..30.0).prop_map(move |(i, v)| (keys[i], v))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    // -----------------------------------------------------------------------
    // Property 1: every stage stays non-negative after every tick
    // -----------------------------------------------------------------------
    #[test]
    fn populations_never_negative(temps in arb_temperatures(60), config in arb_config()) {
        let mut cell = CellSimulator::new(ParameterSet::default(), config);
        cell.run_constant(temps.at_day(0), 1.0);
        cell.run(&temps, 40.0);
        for (name, series) in cell.history().named_series() {
            for v in series.values() {
                prop_assert!(v >= 0.0, "{} = {}", name, v);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Property 2: fruit quality stays in [0.05, 1]
    // -----------------------------------------------------------------------
    #[test]
    fn fruit_quality_bounded(temps in arb_temperatures(120)) {
        let mut cell = CellSimulator::default();
        cell.run(&temps, 150.0);
        for q in cell.history().fruit().values() {
            prop_assert!((0.05..=1.0).contains(&q));
        }
    }

    // -----------------------------------------------------------------------
    // Property 3: two runs with the same inputs are bit-identical
    // -----------------------------------------------------------------------
    #[test]
    fn runs_are_deterministic(temps in arb_temperatures(30), config in arb_config()) {
        let mut a = CellSimulator::new(ParameterSet::default(), config.clone());
        let mut b = CellSimulator::new(ParameterSet::default(), config);
        a.run(&temps, 30.0);
        b.run(&temps, 30.0);
        prop_assert!(diff_histories(a.history(), b.history()).is_empty());
        prop_assert_eq!(a.state_hash(), b.state_hash());
    }

    // -----------------------------------------------------------------------
    // Property 4: an update either applies completely or not at all
    // -----------------------------------------------------------------------
    #[test]
    fn updates_are_atomic(updates in proptest::collection::vec(arb_update(), 1..6)) {
        let mut params = ParameterSet::default();
        let before = params.clone();
        match params.set_many(updates.clone()) {
            Ok(()) => {
                // last write wins for repeated keys
                for (key, _) in &updates {
                    let last = updates.iter().rev().find(|(k, _)| k == key).map(|(_, v)| *v);
                    prop_assert_eq!(Some(params.get(*key).unwrap()), last);
                }
                prop_assert!(params.validate().is_ok());
            }
            Err(_) => prop_assert_eq!(params, before),
        }
    }

    // -----------------------------------------------------------------------
    // Property 5: switch2 never depends on the switch1 of the same tick
    // -----------------------------------------------------------------------
    #[test]
    fn switch2_uses_previous_switch1(
        steps in proptest::collection::vec((0.0f64..24.0, -5.0f64..35.0), 1..50),
    ) {
        let params = DiapauseParams { critical_temp: 18.0, daylight_hours: 10.0 };
        let mut state = DiapauseState::new();
        for (day, (hours, t)) in steps.into_iter().enumerate() {
            let expected_s2 =
                rates::diapause_switch2(hours, state.s1, state.s2, params.daylight_hours);
            state = state.transition(hours, t, &params, day as u32).state;
            prop_assert_eq!(state.s2, expected_s2);
        }
    }

    // -----------------------------------------------------------------------
    // Property 6: rate functions stay finite and in range
    // -----------------------------------------------------------------------
    #[test]
    fn rates_are_finite(t in -50.0f64..60.0, hours in 0.0f64..24.0) {
        let params = ParameterSet::default();
        let fec = rates::fecundity(t, params.general().fertility_tmax);
        prop_assert!(fec.is_finite() && fec >= 0.0);
        let mult = rates::diapause_fecundity_multiplier(hours);
        prop_assert!((0.0..=1.0).contains(&mult));
        for stage in dspop_core::stage::Stage::ALL {
            let sp = params.stage(stage);
            prop_assert!(rates::development_rate(t, sp.development_max).is_finite());
            prop_assert!(rates::mortality_rate(t, &sp.mortality).is_finite());
        }
    }
}
