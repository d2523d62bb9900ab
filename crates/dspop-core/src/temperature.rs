//! Daily temperature input for one cell.

/// Why a temperature series was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemperatureError {
    #[error("temperature series is empty")]
    Empty,
    #[error("temperature on day {day} is not a finite number")]
    NonFinite { day: usize },
}

/// A non-empty series of finite daily temperatures. Days past the end wrap
/// around to the start.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSeries {
    daily: Vec<f64>,
}

impl TemperatureSeries {
    pub fn new(daily: Vec<f64>) -> Result<Self, TemperatureError> {
        if daily.is_empty() {
            return Err(TemperatureError::Empty);
        }
        if let Some(day) = daily.iter().position(|t| !t.is_finite()) {
            return Err(TemperatureError::NonFinite { day });
        }
        Ok(Self { daily })
    }

    /// A single repeating temperature.
    pub fn constant(t: f64) -> Result<Self, TemperatureError> {
        Self::new(vec![t])
    }

    pub fn len(&self) -> usize {
        self.daily.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty()
    }

    /// Temperature on elapsed `day`.
    pub fn at_day(&self, day: u32) -> f64 {
        self.daily[day as usize % self.daily.len()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.daily
    }
}

impl TryFrom<Vec<f64>> for TemperatureSeries {
    type Error = TemperatureError;

    fn try_from(daily: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(daily)
    }
}
