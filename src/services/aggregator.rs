use chrono::NaiveDate;
use tracing::debug;

use crate::errors::SampleError;
use crate::models::estimate::{DayEstimate, HourlyEstimatePoint, WeatherDay};
use crate::models::panel::PanelSpec;
use crate::services::solar_model;

/// Where and when a day estimate applies.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub lat: f64,
    pub lon: f64,
    pub date: NaiveDate,
}

/// Runs the yield model over every hour of `day`, in order.
///
/// All-or-nothing: the first hour the model rejects fails the whole day,
/// since the running totals would otherwise silently miss its contribution.
pub fn estimate_day(
    spec: &PanelSpec,
    day: &WeatherDay,
    site: &Site,
) -> Result<DayEstimate, SampleError> {
    let mut points = Vec::with_capacity(day.hours.len());
    let (mut total_base, mut total_low, mut total_high) = (0.0, 0.0, 0.0);

    for hour in &day.hours {
        let bands = solar_model::hourly_energy_bands(
            spec,
            hour.ambient_temp_c,
            hour.irradiance_ghi_w_m2,
            site.lat,
            &hour.local_timestamp,
        )
        .map_err(|source| SampleError {
            at: hour.local_timestamp,
            source,
        })?;

        total_base += bands.base;
        total_low += bands.low;
        total_high += bands.high;

        points.push(HourlyEstimatePoint {
            timestamp: hour.local_timestamp,
            ambient_temp_c: hour.ambient_temp_c,
            ghi: hour.irradiance_ghi_w_m2,
            energy_wh_base: bands.base,
            energy_wh_low: bands.low,
            energy_wh_high: bands.high,
            cumulative_base: total_base,
            cumulative_low: total_low,
            cumulative_high: total_high,
        });
    }

    debug!(
        panel = spec.model_id(),
        hours = points.len(),
        total_wh = total_base,
        "Day estimate computed"
    );

    Ok(DayEstimate {
        panel_id: spec.model_id().to_string(),
        lat: site.lat,
        lon: site.lon,
        timezone_id: day.timezone_id.clone(),
        calendar_date: site.date,
        total_wh_base: total_base,
        total_wh_low: total_low,
        total_wh_high: total_high,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RangeError;
    use crate::models::estimate::HourlySample;
    use chrono::{FixedOffset, TimeZone};

    fn panel() -> PanelSpec {
        PanelSpec::new("Mono-Default-400", 400.0, -0.0035, 45.0).unwrap()
    }

    fn site() -> Site {
        Site {
            lat: 45.07,
            lon: 7.68,
            date: NaiveDate::from_ymd_opt(2025, 6, 21).unwrap(),
        }
    }

    /// Bell-shaped irradiance over a 24 h day in UTC+2.
    fn summer_day() -> WeatherDay {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let hours = (0..24)
            .map(|h| {
                let ghi = (900.0 - 25.0 * ((h as f64) - 13.0).powi(2)).max(0.0);
                HourlySample {
                    local_timestamp: tz.with_ymd_and_hms(2025, 6, 21, h, 0, 0).unwrap(),
                    ambient_temp_c: 18.0 + h as f64 * 0.5,
                    irradiance_ghi_w_m2: ghi,
                }
            })
            .collect();
        WeatherDay {
            timezone_id: "Europe/Rome".to_string(),
            hours,
        }
    }

    #[test]
    fn test_empty_day_yields_zero_totals() {
        let day = WeatherDay {
            timezone_id: "UTC".to_string(),
            hours: vec![],
        };
        let est = estimate_day(&panel(), &day, &site()).unwrap();
        assert!(est.points.is_empty());
        assert_eq!(est.total_wh_base, 0.0);
        assert_eq!(est.total_wh_low, 0.0);
        assert_eq!(est.total_wh_high, 0.0);
    }

    #[test]
    fn test_one_point_per_hour_in_order() {
        let day = summer_day();
        let est = estimate_day(&panel(), &day, &site()).unwrap();
        assert_eq!(est.points.len(), 24);
        for (p, h) in est.points.iter().zip(&day.hours) {
            assert_eq!(p.timestamp, h.local_timestamp);
            assert_eq!(p.ambient_temp_c, h.ambient_temp_c);
            assert_eq!(p.ghi, h.irradiance_ghi_w_m2);
        }
        assert_eq!(est.timezone_id, "Europe/Rome");
        assert_eq!(est.panel_id, "Mono-Default-400");
    }

    #[test]
    fn test_cumulative_monotone_and_matches_totals() {
        let est = estimate_day(&panel(), &summer_day(), &site()).unwrap();

        let mut prev = (0.0, 0.0, 0.0);
        let mut sums = (0.0, 0.0, 0.0);
        for p in &est.points {
            assert!(p.energy_wh_base >= 0.0 && p.energy_wh_low >= 0.0 && p.energy_wh_high >= 0.0);
            assert!(p.energy_wh_low <= p.energy_wh_base && p.energy_wh_base <= p.energy_wh_high);

            sums.0 += p.energy_wh_base;
            sums.1 += p.energy_wh_low;
            sums.2 += p.energy_wh_high;
            assert_eq!(p.cumulative_base, sums.0);
            assert_eq!(p.cumulative_low, sums.1);
            assert_eq!(p.cumulative_high, sums.2);

            assert!(p.cumulative_base >= prev.0);
            assert!(p.cumulative_low >= prev.1);
            assert!(p.cumulative_high >= prev.2);
            prev = (p.cumulative_base, p.cumulative_low, p.cumulative_high);
        }

        let last = est.points.last().unwrap();
        assert_eq!(last.cumulative_base, est.total_wh_base);
        assert_eq!(last.cumulative_low, est.total_wh_low);
        assert_eq!(last.cumulative_high, est.total_wh_high);
        assert!(est.total_wh_base > 0.0);
    }

    #[test]
    fn test_single_bad_hour_fails_whole_day() {
        let mut day = summer_day();
        day.hours[12].ambient_temp_c = 90.0;
        let bad_at = day.hours[12].local_timestamp;

        let err = estimate_day(&panel(), &day, &site()).unwrap_err();
        assert_eq!(err.at, bad_at);
        assert_eq!(err.source, RangeError::Ambient(90.0));
    }

    #[test]
    fn test_bad_irradiance_in_first_hour() {
        let mut day = summer_day();
        day.hours[0].irradiance_ghi_w_m2 = -5.0;
        assert!(estimate_day(&panel(), &day, &site()).is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let est = estimate_day(&panel(), &summer_day(), &site()).unwrap();
        let v = serde_json::to_value(&est).unwrap();
        for key in ["panel", "lat", "lon", "timezone", "date", "totalWh", "totalLowWh", "totalHighWh", "points"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["date"], "2025-06-21");
        let p = &v["points"][13];
        for key in [
            "time", "ambient", "ghi", "energyWh", "energyWhLow", "energyWhHigh",
            "cumulativeWh", "cumulativeLow", "cumulativeHigh",
        ] {
            assert!(p.get(key).is_some(), "missing point field {key}");
        }
        assert_eq!(p["time"], "2025-06-21T13:00:00+02:00");
    }
}
