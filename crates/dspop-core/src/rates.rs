//! Temperature-, photoperiod- and resource-dependent rate functions.
//!
//! Everything here is pure: no state, no allocation. Degenerate numeric
//! domains (negative bases under fractional powers, temperatures outside a
//! viable window) resolve to a defined value instead of NaN.

use crate::params::{FruitParams, MortalityParams};

/// Reference fruit quality in the saturating fruit-effect ratio.
pub const FRUIT_Q_CONSTANT: f64 = 0.5;

/// Floor of the fruit-quality range.
pub const MIN_FRUIT_QUALITY: f64 = 0.05;

/// Ceiling of the fruit-quality range.
pub const MAX_FRUIT_QUALITY: f64 = 1.0;

// ---------------------------------------------------------------------------
// Fecundity
// ---------------------------------------------------------------------------

const FECUNDITY_D: f64 = 5.88;
const FECUNDITY_L: f64 = 52.68;
const FECUNDITY_PEAK_T: f64 = 23.26;
const FECUNDITY_WIDTH: f64 = 2740.50;
const FECUNDITY_EXPONENT: f64 = 88.38;
const FECUNDITY_SCALE: f64 = 3.3315e-304;

/// Eggs per female per day at temperature `t`.
///
/// Zero above `fertility_tmax` and outside the curve's domain. The large
/// exponent is evaluated in log space so the intermediate power never
/// overflows.
pub fn fecundity(t: f64, fertility_tmax: f64) -> f64 {
    if t > fertility_tmax {
        return 0.0;
    }
    if t * t + FECUNDITY_D * FECUNDITY_D >= FECUNDITY_L * FECUNDITY_L {
        return 0.0;
    }
    let base = FECUNDITY_WIDTH - (t - FECUNDITY_PEAK_T).powi(2);
    if base <= 0.0 {
        return 0.0;
    }
    (FECUNDITY_SCALE.ln() + FECUNDITY_EXPONENT * base.ln()).exp()
}

/// Fraction of fecundity retained at the given day length. Decreasing in
/// darkness: long days give a multiplier near 1, short days near 0.
pub fn diapause_fecundity_multiplier(daylight_hours: f64) -> f64 {
    const A: f64 = 0.04056;
    const K: f64 = 99.8;
    const V: f64 = 1.2428535918;
    const M: f64 = 0.0;
    const Q: f64 = 3.23967951563418e-16;
    const B: f64 = -2.871323611;

    let expo = Q * (-B * (daylight_hours - M)).exp();
    let in_diapause = A + (K - A) / (1.0 + expo).powf(1.0 / V);
    ((100.0 - in_diapause) / 100.0).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Diapause switches
// ---------------------------------------------------------------------------

/// Next value of the first diapause switch.
///
/// Turns off when both switches were on and the day has shortened below
/// `threshold_hours`; turns on when the second switch was off and the
/// temperature exceeds `critical_temp`; otherwise holds.
pub fn diapause_switch1(
    daylight_hours: f64,
    t: f64,
    prev_s1: bool,
    prev_s2: bool,
    critical_temp: f64,
    threshold_hours: f64,
) -> bool {
    if prev_s1 && prev_s2 && daylight_hours < threshold_hours {
        false
    } else if !prev_s2 && t > critical_temp {
        true
    } else {
        prev_s1
    }
}

/// Next value of the second diapause switch. Takes the *previous* first
/// switch, never the one computed for the same tick.
pub fn diapause_switch2(
    daylight_hours: f64,
    prev_s1: bool,
    prev_s2: bool,
    threshold_hours: f64,
) -> bool {
    if !prev_s1 {
        false
    } else if daylight_hours >= threshold_hours {
        true
    } else {
        prev_s2
    }
}

// ---------------------------------------------------------------------------
// Development and mortality
// ---------------------------------------------------------------------------

const BRIERE_A: f64 = 0.0001113;
const BRIERE_T0: f64 = 9.8504;
const BRIERE_TL: f64 = 30.99;

/// Briere development rate for the temperature-driven stages, scaled by the
/// stage's development-max parameter. Zero outside `[T0, TL]` and for a
/// non-positive divisor.
pub fn development_rate(t: f64, development_max: f64) -> f64 {
    if !(BRIERE_T0..=BRIERE_TL).contains(&t) || development_max <= 0.0 {
        return 0.0;
    }
    BRIERE_A * t * (t - BRIERE_T0) * (BRIERE_TL - t).sqrt() / development_max
}

/// Stage mortality. The tolerable window is closed at both ends.
pub fn mortality_rate(t: f64, mortality: &MortalityParams) -> f64 {
    if !(mortality.min_temp <= t && t <= mortality.max_temp) {
        return mortality.max;
    }
    let x = t - mortality.tau;
    let [b0, b1, b2, b3] = mortality.betas;
    b0 + x * (b1 + x * (b2 + x * b3))
}

// ---------------------------------------------------------------------------
// Fruit effects
// ---------------------------------------------------------------------------

fn quality_ratio(quality: f64, n: f64) -> f64 {
    (quality / FRUIT_Q_CONSTANT).powf(n)
}

/// Multiplier on juvenile development. Near 1 for good fruit, `1 - m` for
/// poor fruit.
pub fn fruit_development_effect(quality: f64, fruit: &FruitParams) -> f64 {
    let ratio = quality_ratio(quality, fruit.n);
    fruit.m * ratio / (1.0 + ratio) + 1.0 - fruit.m
}

/// Additive mortality from poor fruit, at most a tenth of the stage's
/// maximum mortality.
pub fn fruit_mortality_effect(quality: f64, max_mortality: f64, fruit: &FruitParams) -> f64 {
    let ratio = quality_ratio(quality, fruit.n);
    0.1 * max_mortality / (1.0 + ratio)
}

/// Fruit growth period `G(T)`. `None` at or below the base temperature,
/// where fruit does not grow.
pub fn growth_signal(t: f64, base_temp: f64) -> Option<f64> {
    (t > base_temp).then(|| 1100.0 / (t - base_temp) + 30.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSet;
    use crate::stage::Stage;

    #[test]
    fn fecundity_peaks_near_optimum() {
        let peak = fecundity(23.26, 30.0);
        assert!(peak > 1.0 && peak < 5.0, "peak = {peak}");
        assert!(fecundity(15.0, 30.0) < peak);
        assert!(fecundity(28.0, 30.0) < peak);
    }

    #[test]
    fn fecundity_zero_above_tmax_and_out_of_domain() {
        assert_eq!(fecundity(30.5, 30.0), 0.0);
        assert_eq!(fecundity(60.0, 100.0), 0.0);
        // (T - 23.26)^2 > 2740.5 for T far below zero
        assert_eq!(fecundity(-40.0, 30.0), 0.0);
    }

    #[test]
    fn diapause_multiplier_is_monotone_and_bounded() {
        let mut last = -1.0;
        for h in 0..=24 {
            let m = diapause_fecundity_multiplier(f64::from(h));
            assert!((0.0..=1.0).contains(&m));
            assert!(m >= last, "not increasing at {h}h");
            last = m;
        }
        assert!(diapause_fecundity_multiplier(2.0) < 0.01);
        assert!(diapause_fecundity_multiplier(16.0) > 0.9);
    }

    #[test]
    fn switch1_hysteresis() {
        // same inputs, different history
        assert!(!diapause_switch1(8.0, 25.0, true, true, 18.0, 10.0));
        assert!(diapause_switch1(8.0, 25.0, false, false, 18.0, 10.0));
        // hold
        assert!(diapause_switch1(12.0, 10.0, true, true, 18.0, 10.0));
        assert!(!diapause_switch1(12.0, 10.0, false, false, 18.0, 10.0));
        // s2 on blocks re-activation
        assert!(!diapause_switch1(12.0, 25.0, false, true, 18.0, 10.0));
    }

    #[test]
    fn switch2_rules() {
        assert!(!diapause_switch2(15.0, false, true, 10.0));
        assert!(diapause_switch2(10.0, true, false, 10.0));
        assert!(!diapause_switch2(9.0, true, false, 10.0));
        assert!(diapause_switch2(9.0, true, true, 10.0));
    }

    #[test]
    fn development_window() {
        assert_eq!(development_rate(9.0, 0.72), 0.0);
        assert_eq!(development_rate(31.0, 0.72), 0.0);
        assert!(development_rate(25.0, 0.72) > 0.0);
        assert_eq!(development_rate(25.0, 0.0), 0.0);
        let r = development_rate(20.0, 1.0);
        let expected = BRIERE_A * 20.0 * (20.0 - BRIERE_T0) * (BRIERE_TL - 20.0_f64).sqrt();
        assert!((r - expected).abs() < 1e-15);
    }

    #[test]
    fn mortality_lower_bound_is_inclusive() {
        let params = ParameterSet::default();
        let mort = params.stage(Stage::Eggs).mortality;
        let at_bound = mortality_rate(mort.min_temp, &mort);
        let x = mort.min_temp - mort.tau;
        let poly = mort.betas[0] + mort.betas[1] * x + mort.betas[2] * x * x + mort.betas[3] * x * x * x;
        assert!((at_bound - poly).abs() < 1e-12);
        assert_ne!(at_bound, mort.max);

        assert_eq!(mortality_rate(mort.min_temp - 0.01, &mort), mort.max);
        assert_eq!(mortality_rate(mort.max_temp + 0.01, &mort), mort.max);
    }

    #[test]
    fn fruit_effects_saturate() {
        let params = ParameterSet::default();
        let fruit = params.fruit();
        let good = fruit_development_effect(1.0, fruit);
        let poor = fruit_development_effect(MIN_FRUIT_QUALITY, fruit);
        assert!(good > poor);
        assert!(good <= 1.0);
        assert!((poor - (1.0 - fruit.m)).abs() < 0.01);

        let mort_good = fruit_mortality_effect(1.0, 0.3, fruit);
        let mort_poor = fruit_mortality_effect(MIN_FRUIT_QUALITY, 0.3, fruit);
        assert!(mort_good < mort_poor);
        assert!(mort_poor <= 0.03);
    }

    #[test]
    fn growth_signal_undefined_at_or_below_base() {
        assert_eq!(growth_signal(4.0, 4.0), None);
        assert_eq!(growth_signal(-2.0, 4.0), None);
        assert_eq!(growth_signal(15.0, 4.0), Some(1100.0 / 11.0 + 30.0));
    }
}
