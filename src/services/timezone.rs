use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

/// How the zone for a request was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSource {
    Requested,
    /// The requested id did not parse; UTC was used instead.
    InvalidFallback,
    /// No zone was requested; approximated from longitude.
    LongitudeEstimate,
}

impl ZoneSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneSource::Requested => "requested",
            ZoneSource::InvalidFallback => "invalid_fallback",
            ZoneSource::LongitudeEstimate => "longitude_estimate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedZone {
    pub tz: Tz,
    pub source: ZoneSource,
}

impl ResolvedZone {
    pub fn name(&self) -> &'static str {
        self.tz.name()
    }
}

/// Picks the IANA zone for an estimate request.
///
/// Both fallbacks can hide a caller mistake, so each one is logged.
pub fn resolve(requested: Option<&str>, lat: f64, lon: f64) -> ResolvedZone {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => ResolvedZone {
                tz,
                source: ZoneSource::Requested,
            },
            Err(_) => {
                warn!(requested = name, lat, lon, "Unknown timezone id, falling back to UTC");
                ResolvedZone {
                    tz: Tz::UTC,
                    source: ZoneSource::InvalidFallback,
                }
            }
        },
        None => {
            let tz = zone_from_longitude(lon);
            info!(lat, lon, zone = tz.name(), "No timezone given, estimated from longitude");
            ResolvedZone {
                tz,
                source: ZoneSource::LongitudeEstimate,
            }
        }
    }
}

/// Nautical zone for a longitude: 15° per hour, clamped to the `Etc/GMT` range.
///
/// `Etc/GMT` ids use POSIX sign order, so UTC+2 is `Etc/GMT-2`.
pub fn zone_from_longitude(lon: f64) -> Tz {
    let offset_h = (lon / 15.0).round().clamp(-12.0, 14.0) as i32;
    let name = match offset_h {
        0 => "Etc/GMT".to_string(),
        h if h > 0 => format!("Etc/GMT-{h}"),
        h => format!("Etc/GMT+{}", -h),
    };
    name.parse::<Tz>().unwrap_or(Tz::UTC)
}

/// Local calendar date of `now` in `tz`.
pub fn local_date(tz: &Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(tz).date_naive()
}

/// First instant of `date` in `tz`.
///
/// Zones that skip midnight on a DST change start the day at the first
/// valid local time after it.
pub fn start_of_day(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    for step in 0..=2 {
        if let Some(t) = tz
            .from_local_datetime(&(midnight + Duration::hours(step)))
            .earliest()
        {
            return t;
        }
    }
    tz.from_utc_datetime(&midnight)
}
