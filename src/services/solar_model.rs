/// ============================================================
///  First-order PV yield model
///
///   1. Cell temperature – NOCT approximation
///   2. Power output     – P = P_stc × (G/1000) × [1 + γ(T_cell − 25)]
///   3. Tilt boost       – latitude × season table, blended
///                         between reference latitude bands
///   4. Energy bands     – low / base / high for one hour
/// ============================================================

use chrono::{DateTime, Datelike, TimeZone};

use crate::errors::RangeError;
use crate::models::panel::PanelSpec;

// ─── Model validity ranges ───────────────────────────────────
const AMBIENT_MIN_C: f64 = -40.0;
const AMBIENT_MAX_C: f64 = 85.0;
const IRRADIANCE_MAX_W_M2: f64 = 1200.0;

// ─── Reference conditions ────────────────────────────────────
const STC_IRRADIANCE: f64 = 1000.0; // W/m²
const STC_CELL_TEMP_C: f64 = 25.0;
const NOCT_IRRADIANCE: f64 = 800.0; // W/m²
const NOCT_AMBIENT_C: f64 = 20.0;

/// Shading, soiling and inverter losses applied to the base estimate.
pub const LOW_BAND_FACTOR: f64 = 0.9;

// ─── Tilt boost tables (index 0 = January) ───────────────────
pub const BOOST_EQUATORIAL: [f64; 12] = [
    1.04, 1.03, 1.02, 1.02, 1.02, 1.02, 1.02, 1.02, 1.02, 1.02, 1.03, 1.04,
];
pub const BOOST_MID_LAT: [f64; 12] = [
    1.30, 1.25, 1.15, 1.10, 1.05, 1.02, 1.03, 1.08, 1.12, 1.18, 1.25, 1.32,
];
pub const BOOST_HIGH_LAT: [f64; 12] = [
    1.45, 1.35, 1.22, 1.12, 1.06, 1.02, 1.03, 1.09, 1.18, 1.28, 1.38, 1.48,
];

const EQUATORIAL_LIMIT_DEG: f64 = 15.0;
const MID_LAT_START_DEG: f64 = 35.0;
const MID_LAT_END_DEG: f64 = 55.0;
const HIGH_LAT_START_DEG: f64 = 70.0;

/// Estimated cell temperature (°C) from ambient temperature and GHI.
///
/// Out-of-range inputs are rejected, not clamped.
pub fn estimate_cell_temp(
    spec: &PanelSpec,
    ambient_temp_c: f64,
    irradiance_w_m2: f64,
) -> Result<f64, RangeError> {
    // NaN fails both comparisons, so test for containment rather than exclusion
    if !(AMBIENT_MIN_C..=AMBIENT_MAX_C).contains(&ambient_temp_c) {
        return Err(RangeError::Ambient(ambient_temp_c));
    }
    if !(0.0..=IRRADIANCE_MAX_W_M2).contains(&irradiance_w_m2) {
        return Err(RangeError::Irradiance(irradiance_w_m2));
    }

    Ok(ambient_temp_c
        + (irradiance_w_m2 / NOCT_IRRADIANCE) * (spec.noct_temp_c() - NOCT_AMBIENT_C))
}

/// Energy (Wh) produced over `duration_hours` at constant conditions.
pub fn energy_wh(
    spec: &PanelSpec,
    ambient_temp_c: f64,
    irradiance_w_m2: f64,
    duration_hours: f64,
) -> Result<f64, RangeError> {
    let cell_temp_c = estimate_cell_temp(spec, ambient_temp_c, irradiance_w_m2)?;

    let temp_factor = 1.0 + spec.temp_coeff_per_deg_c() * (cell_temp_c - STC_CELL_TEMP_C);
    let power_w = (spec.rated_power_watts() * (irradiance_w_m2 / STC_IRRADIANCE) * temp_factor)
        .max(0.0);

    Ok(power_w * duration_hours)
}

/// Energy (Wh) for one hour at constant conditions.
pub fn hourly_energy_wh(
    spec: &PanelSpec,
    ambient_temp_c: f64,
    irradiance_w_m2: f64,
) -> Result<f64, RangeError> {
    energy_wh(spec, ambient_temp_c, irradiance_w_m2, 1.0)
}

/// Optimistic multiplier for an optimally tilted panel versus a flat GHI estimate.
///
/// The month is read from the timestamp's own calendar, so pass local time.
/// Southern latitudes use the table entry six months away.
pub fn tilt_boost<Tz: TimeZone>(lat: f64, timestamp: &DateTime<Tz>) -> f64 {
    let mut month = timestamp.month0() as usize;
    if lat < 0.0 {
        month = (month + 6) % 12;
    }

    let eq = BOOST_EQUATORIAL[month];
    let mid = BOOST_MID_LAT[month];
    let hi = BOOST_HIGH_LAT[month];

    let a = lat.abs();
    if a <= EQUATORIAL_LIMIT_DEG {
        eq
    } else if a <= MID_LAT_START_DEG {
        lerp(eq, mid, (a - EQUATORIAL_LIMIT_DEG) / (MID_LAT_START_DEG - EQUATORIAL_LIMIT_DEG))
    } else if a <= MID_LAT_END_DEG {
        mid
    } else if a <= HIGH_LAT_START_DEG {
        lerp(mid, hi, (a - MID_LAT_END_DEG) / (HIGH_LAT_START_DEG - MID_LAT_END_DEG))
    } else {
        hi
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// One hour of energy in the three reporting bands.
///
/// `low <= base <= high` holds as long as the boost tables stay >= 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyBands {
    pub low: f64,
    pub base: f64,
    pub high: f64,
}

pub fn hourly_energy_bands<Tz: TimeZone>(
    spec: &PanelSpec,
    ambient_temp_c: f64,
    irradiance_w_m2: f64,
    lat: f64,
    timestamp: &DateTime<Tz>,
) -> Result<EnergyBands, RangeError> {
    let base = hourly_energy_wh(spec, ambient_temp_c, irradiance_w_m2)?;
    Ok(EnergyBands {
        low: base * LOW_BAND_FACTOR,
        base,
        high: base * tilt_boost(lat, timestamp),
    })
}
