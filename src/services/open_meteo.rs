use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::{Client, RequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::WeatherConfig;
use crate::errors::WeatherError;
use crate::models::estimate::{HourlySample, WeatherDay};
use crate::models::weather::{GeocodeResponse, GeocodeResult, HourlyForecastResponse};

/// Anything that can supply one day of hourly weather for a site.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_day(
        &self,
        lat: f64,
        lon: f64,
        date: NaiveDate,
        timezone: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherDay, WeatherError>;
}

/// Open-Meteo forecast + geocoding client.
#[derive(Clone, Debug)]
pub struct OpenMeteoClient {
    client: Client,
    forecast_url: String,
    geocoding_url: String,
}

impl OpenMeteoClient {
    pub fn new(cfg: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            forecast_url: cfg.forecast_url.clone(),
            geocoding_url: cfg.geocoding_url.clone(),
        })
    }

    /// Hourly temperature and shortwave radiation for one local day.
    pub async fn fetch_hourly_weather(
        &self,
        lat: f64,
        lon: f64,
        date: NaiveDate,
        timezone: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherDay, WeatherError> {
        let day = date.format("%Y-%m-%d").to_string();
        let request = self.client.get(&self.forecast_url).query(&[
            ("latitude", format!("{lat:.6}")),
            ("longitude", format!("{lon:.6}")),
            ("hourly", "temperature_2m,shortwave_radiation".to_string()),
            ("timezone", timezone.to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
        ]);

        let resp: HourlyForecastResponse = send_json(request, cancel).await?;
        let weather = into_weather_day(resp)?;
        debug!(lat, lon, %date, hours = weather.hours.len(), "Hourly weather fetched");
        Ok(weather)
    }

    /// City search; queries shorter than two characters return nothing.
    pub async fn geocode(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<GeocodeResult>, WeatherError> {
        let name = name.trim();
        if name.chars().count() < 2 {
            return Ok(Vec::new());
        }

        let request = self.client.get(&self.geocoding_url).query(&[
            ("name", name),
            ("count", "5"),
            ("language", "en"),
            ("format", "json"),
        ]);

        let mut resp: GeocodeResponse = send_json(request, cancel).await?;
        resp.results.truncate(5);
        Ok(resp.results)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_day(
        &self,
        lat: f64,
        lon: f64,
        date: NaiveDate,
        timezone: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherDay, WeatherError> {
        self.fetch_hourly_weather(lat, lon, date, timezone, cancel).await
    }
}

/// Sends `request` and decodes a JSON body, aborting as soon as `cancel` fires.
async fn send_json<T: serde::de::DeserializeOwned>(
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<T, WeatherError> {
    if cancel.is_cancelled() {
        return Err(WeatherError::Cancelled);
    }

    let call = async {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice::<T>(&bytes).map_err(|e| WeatherError::Malformed(e.to_string()))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WeatherError::Cancelled),
        result = call => result,
    }
}

fn into_weather_day(resp: HourlyForecastResponse) -> Result<WeatherDay, WeatherError> {
    let series = resp.hourly;
    let n = series.time.len();
    if n == 0 {
        return Err(WeatherError::EmptyHourly);
    }
    if series.temperature_2m.len() != n || series.shortwave_radiation.len() != n {
        return Err(WeatherError::Malformed(format!(
            "hourly series lengths differ: time={}, temperature_2m={}, shortwave_radiation={}",
            n,
            series.temperature_2m.len(),
            series.shortwave_radiation.len()
        )));
    }

    let tz = resp.timezone.parse::<Tz>().unwrap_or_else(|_| {
        warn!(timezone = %resp.timezone, "Upstream timezone not recognised, reading times as UTC");
        Tz::UTC
    });

    let mut hours = Vec::with_capacity(n);
    for (i, raw) in series.time.iter().enumerate() {
        let local_timestamp = parse_local_time(raw, &tz).ok_or_else(|| WeatherError::TimeParse {
            value: raw.clone(),
            tz: resp.timezone.clone(),
        })?;
        let (Some(ambient_temp_c), Some(irradiance_ghi_w_m2)) =
            (series.temperature_2m[i], series.shortwave_radiation[i])
        else {
            return Err(WeatherError::Malformed(format!("missing value at {raw}")));
        };
        hours.push(HourlySample {
            local_timestamp,
            ambient_temp_c,
            irradiance_ghi_w_m2,
        });
    }

    Ok(WeatherDay {
        timezone_id: resp.timezone,
        hours,
    })
}

const LOCAL_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Open-Meteo returns wall-clock times without an offset when a timezone is requested.
fn parse_local_time(s: &str, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t);
    }
    LOCAL_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|t| t.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    fn client_for(server: &ServerGuard) -> OpenMeteoClient {
        OpenMeteoClient::new(&WeatherConfig {
            forecast_url: format!("{}/v1/forecast", server.url()),
            geocoding_url: format!("{}/v1/search", server.url()),
            timeout_secs: 5,
            user_agent: "test-agent".to_string(),
        })
        .unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 21).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_hourly_weather_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("latitude".into(), "59.329300".into()),
                Matcher::UrlEncoded("longitude".into(), "18.068600".into()),
                Matcher::UrlEncoded("hourly".into(), "temperature_2m,shortwave_radiation".into()),
                Matcher::UrlEncoded("timezone".into(), "Europe/Stockholm".into()),
                Matcher::UrlEncoded("start_date".into(), "2025-06-21".into()),
                Matcher::UrlEncoded("end_date".into(), "2025-06-21".into()),
            ]))
            .match_header("user-agent", "test-agent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "timezone": "Europe/Stockholm",
                    "hourly": {
                        "time": ["2025-06-21T11:00", "2025-06-21T12:00"],
                        "temperature_2m": [19.5, 21.0],
                        "shortwave_radiation": [640.0, 702.5]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let weather = client_for(&server)
            .fetch_hourly_weather(59.3293, 18.0686, day(), "Europe/Stockholm", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(weather.timezone_id, "Europe/Stockholm");
        assert_eq!(weather.hours.len(), 2);
        assert_eq!(weather.hours[1].ambient_temp_c, 21.0);
        assert_eq!(weather.hours[1].irradiance_ghi_w_m2, 702.5);
        assert_eq!(weather.hours[0].local_timestamp.to_rfc3339(), "2025-06-21T11:00:00+02:00");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let result = client_for(&server)
            .fetch_hourly_weather(0.0, 0.0, day(), "UTC", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(WeatherError::Status(503))));
    }

    #[tokio::test]
    async fn test_empty_hourly_data() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"timezone":"UTC","hourly":{"time":[],"temperature_2m":[],"shortwave_radiation":[]}}"#)
            .create_async()
            .await;

        let result = client_for(&server)
            .fetch_hourly_weather(0.0, 0.0, day(), "UTC", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(WeatherError::EmptyHourly)));
    }

    #[tokio::test]
    async fn test_malformed_payloads() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let result = client_for(&server)
            .fetch_hourly_weather(0.0, 0.0, day(), "UTC", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(WeatherError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let server = Server::new_async().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client_for(&server)
            .fetch_hourly_weather(0.0, 0.0, day(), "UTC", &cancel)
            .await;
        assert!(matches!(result, Err(WeatherError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_for_upstream() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stall = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = OpenMeteoClient::new(&WeatherConfig {
            forecast_url: format!("http://{addr}/v1/forecast"),
            geocoding_url: format!("http://{addr}/v1/search"),
            timeout_secs: 30,
            user_agent: "test-agent".to_string(),
        })
        .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = client
            .fetch_hourly_weather(0.0, 0.0, day(), "UTC", &cancel)
            .await;
        assert!(matches!(result, Err(WeatherError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));

        let geocoded = client.geocode("Gothenburg", &cancel).await;
        assert!(matches!(geocoded, Err(WeatherError::Cancelled)));
        stall.abort();
    }

    #[tokio::test]
    async fn test_geocode() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "Gothenburg".into()),
                Matcher::UrlEncoded("count".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "results": [
                        {"name": "Gothenburg", "country": "Sweden", "latitude": 57.70716, "longitude": 11.96679, "timezone": "Europe/Stockholm"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let results = client_for(&server)
            .geocode(" Gothenburg ", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].timezone, "Europe/Stockholm");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_geocode_short_query_skips_upstream() {
        let server = Server::new_async().await;
        let results = client_for(&server)
            .geocode("a", &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_geocode_without_results_key() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"generationtime_ms":0.5}"#)
            .create_async()
            .await;

        let results = client_for(&server)
            .geocode("Xyzzy", &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_mismatched_series_rejected() {
        let resp: HourlyForecastResponse = serde_json::from_value(json!({
            "timezone": "UTC",
            "hourly": {
                "time": ["2025-06-21T00:00", "2025-06-21T01:00"],
                "temperature_2m": [10.0],
                "shortwave_radiation": [0.0, 0.0]
            }
        }))
        .unwrap();
        assert!(matches!(into_weather_day(resp), Err(WeatherError::Malformed(_))));
    }

    #[test]
    fn test_null_value_rejected() {
        let resp: HourlyForecastResponse = serde_json::from_value(json!({
            "timezone": "UTC",
            "hourly": {
                "time": ["2025-06-21T00:00"],
                "temperature_2m": [null],
                "shortwave_radiation": [0.0]
            }
        }))
        .unwrap();
        assert!(matches!(into_weather_day(resp), Err(WeatherError::Malformed(_))));
    }

    #[test]
    fn test_unparsable_time_fails_fast() {
        let resp: HourlyForecastResponse = serde_json::from_value(json!({
            "timezone": "UTC",
            "hourly": {
                "time": ["2025-06-21T00:00", "yesterday"],
                "temperature_2m": [10.0, 11.0],
                "shortwave_radiation": [0.0, 0.0]
            }
        }))
        .unwrap();
        assert!(matches!(into_weather_day(resp), Err(WeatherError::TimeParse { .. })));
    }

    #[test]
    fn test_parse_local_time_formats() {
        let tz = chrono_tz::Europe::Berlin;
        for s in ["2025-01-10T08:00", "2025-01-10T08:00:00", "2025-01-10 08:00", "2025-01-10T08:00:00+01:00"] {
            let t = parse_local_time(s, &tz).unwrap();
            assert_eq!(t.to_rfc3339(), "2025-01-10T08:00:00+01:00", "input {s}");
        }
        assert!(parse_local_time("10/01/2025 08:00", &tz).is_none());
    }
}
