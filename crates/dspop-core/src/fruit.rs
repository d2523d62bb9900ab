//! Fruit-quality sub-model with a time-lagged harvest rule.

use crate::params::FruitParams;
use crate::rates::{self, MAX_FRUIT_QUALITY, MIN_FRUIT_QUALITY};

/// Slots in the calendar ring.
pub const DAYS_PER_YEAR: usize = 365;

// ---------------------------------------------------------------------------
// DayRing
// ---------------------------------------------------------------------------

/// One value per calendar day, overwritten each year.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRing {
    data: Vec<f64>,
    fill: f64,
}

impl DayRing {
    pub fn new(fill: f64) -> Self {
        Self {
            data: vec![fill; DAYS_PER_YEAR],
            fill,
        }
    }

    pub fn get(&self, day_of_year: usize) -> f64 {
        self.data[day_of_year % DAYS_PER_YEAR]
    }

    pub fn set(&mut self, day_of_year: usize, value: f64) {
        self.data[day_of_year % DAYS_PER_YEAR] = value;
    }

    /// Reset every slot to the fill value.
    pub fn clear(&mut self) {
        for slot in &mut self.data {
            *slot = self.fill;
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// FruitModel
// ---------------------------------------------------------------------------

/// Fruit quality of one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct FruitModel {
    quality: f64,
    ring: DayRing,
    /// Lagged quality crossed the harvest cutoff this year.
    harvested: bool,
    harvest_day: Option<u32>,
    max_fruit_day: Option<f64>,
}

impl Default for FruitModel {
    fn default() -> Self {
        Self::new()
    }
}

impl FruitModel {
    pub fn new() -> Self {
        Self {
            quality: MIN_FRUIT_QUALITY,
            ring: DayRing::new(MIN_FRUIT_QUALITY),
            harvested: false,
            harvest_day: None,
            max_fruit_day: None,
        }
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn is_harvested(&self) -> bool {
        self.harvested
    }

    /// First day the harvest flag was raised.
    pub fn harvest_day(&self) -> Option<u32> {
        self.harvest_day
    }

    /// Time at which quality first reached 1.0 (to two decimals).
    pub fn max_fruit_day(&self) -> Option<f64> {
        self.max_fruit_day
    }

    pub fn ring(&self) -> &DayRing {
        &self.ring
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance quality by one tick and return the new value.
    ///
    /// `day` is the whole elapsed day and `time` the elapsed time in days.
    pub fn step(&mut self, t: f64, day: u32, time: f64, dt: f64, params: &FruitParams) -> f64 {
        let index = day as usize % DAYS_PER_YEAR;

        let mut lagged = MIN_FRUIT_QUALITY;
        let lag_index = index as f64 - params.time_lag;
        if lag_index > 0.0 {
            lagged = self.ring.get(lag_index as usize);
            if lagged > params.harvest_cutoff && !self.harvested {
                self.harvested = true;
                if self.harvest_day.is_none() {
                    self.harvest_day = Some(day);
                }
                tracing::debug!(day, "fruit harvest");
            }
        } else {
            self.harvested = false;
        }
        if index == 0 {
            self.quality = MIN_FRUIT_QUALITY;
        }
        if self.harvested {
            lagged = MAX_FRUIT_QUALITY;
        }

        let harvest = if lagged > params.harvest_cutoff {
            params.harvest_drop
        } else {
            0.0
        };
        let derivative = match rates::growth_signal(t, params.base_temp) {
            Some(g) => self.quality * (params.gt_multiplier / g - harvest),
            None => self.quality * -harvest,
        };
        self.quality = (self.quality + derivative * dt).clamp(MIN_FRUIT_QUALITY, MAX_FRUIT_QUALITY);

        if self.max_fruit_day.is_none() && round2(self.quality) == 1.0 {
            self.max_fruit_day = Some(time);
        }
        self.ring.set(index, self.quality);
        self.quality
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
