//! Astronomical day-length approximation.

/// Tilt of the earth's axis, degrees.
const AXIAL_TILT: f64 = 23.439;

/// Winter solstice day of December for 2000..=2020.
const SOLSTICE_DAYS: [i32; 21] = [
    21, 21, 22, 22, 21, 21, 22, 22, 21, 21, 21, 22, 21, 21, 21, 22, 21, 21, 21, 22, 21,
];

/// December day of the winter solstice. Years outside the table use the
/// 21st.
pub fn solstice_day(calendar_year: Option<i32>) -> i32 {
    match calendar_year {
        Some(year) if (2000..=2020).contains(&year) => SOLSTICE_DAYS[(year - 2000) as usize],
        _ => 21,
    }
}

/// Days between the solstice and the start of the calendar year, added to
/// the day-of-year before evaluating [`daylight_hours`].
pub fn solstice_offset(calendar_year: Option<i32>) -> i32 {
    31 - solstice_day(calendar_year)
}

/// Hours of daylight `days_since_solstice` days after the winter solstice
/// at `latitude` degrees.
///
/// The intermediate term is clamped to `[0, 2]`, which yields 0 hours in
/// polar night and 24 in polar day rather than NaN.
pub fn daylight_hours(days_since_solstice: i32, latitude: f64) -> f64 {
    let j = std::f64::consts::PI / 182.625;
    let m = 1.0
        - latitude.to_radians().tan()
            * (AXIAL_TILT.to_radians() * (j * f64::from(days_since_solstice)).cos()).tan();
    let m = m.clamp(0.0, 2.0);
    (1.0 - m).acos().to_degrees() / 180.0 * 24.0
}
