//! Polygon.io REST client.
//!
//! Grouped daily aggregates, 1-minute aggregates and ticker reference data
//! over the v2/v3 endpoints. Responses are cached content-addressed; the
//! API key is read from the environment, appended to requests only, and
//! never cached or logged.

use super::http_cache::HttpCache;
use super::provider::{rth_open_utc, strip_premarket, DataError, MarketData};
use crate::domain::{Bar, DailyBar, ReferenceRecord};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const API_KEY_ENV: &str = "POLYGON_API_KEY";
const CACHE_DIR_ENV: &str = "YBI_HTTP_CACHE_DIR";

pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: reqwest::blocking::Client,
    cache: Option<HttpCache>,
}

// Manual Debug so the API key can never leak through `{:?}`.
impl std::fmt::Debug for PolygonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolygonClient")
            .field("base_url", &self.base_url)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl PolygonClient {
    pub fn from_env() -> Result<Self, DataError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DataError::Auth(format!("missing {API_KEY_ENV} environment variable")))?;

        let cache = match std::env::var(CACHE_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Some(HttpCache::new(dir.trim())?),
            _ => None,
        };

        Ok(Self::new(api_key, cache))
    }

    pub fn new(api_key: String, cache: Option<HttpCache>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key,
            base_url: "https://api.polygon.io".to_string(),
            client,
            cache,
        }
    }

    /// GET with cache-first lookup. `params` never contains the API key;
    /// it is added to the live request only, so the cache key is free of
    /// secrets and identical across accounts.
    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, DataError> {
        let url = format!("{}{}", self.base_url, path);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&url, params) {
                debug!(path, "cache hit");
                return Ok(hit);
            }
        }

        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("apiKey", self.api_key.clone()));

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .map_err(|e| classify_transport(path, &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::Auth(format!("provider rejected credentials ({status})")));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(DataError::Unavailable(format!("{path}: HTTP {status}")));
        }

        let body: Value = response
            .json()
            .map_err(|e| DataError::Unavailable(format!("{path}: bad JSON: {e}")))?;

        if body.get("status").and_then(Value::as_str) == Some("ERROR") {
            let msg = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
            return Err(DataError::Unavailable(format!("{path}: provider ERROR: {msg}")));
        }

        if let Some(cache) = &self.cache {
            cache.put(&url, params, &body)?;
        }

        Ok(body)
    }

    fn results(body: &Value) -> &[Value] {
        body.get("results").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn classify_transport(path: &str, e: &reqwest::Error) -> DataError {
    if e.is_timeout() {
        DataError::Unavailable(format!("{path}: request timed out"))
    } else {
        DataError::Unavailable(format!("{path}: transport error: {e}"))
    }
}

fn field_f64(row: &Value, name: &str) -> Option<f64> {
    row.get(name).and_then(Value::as_f64)
}

fn parse_minute_row(row: &Value) -> Option<Bar> {
    let ms = row.get("t").and_then(Value::as_i64)?;
    let ts = Utc.timestamp_millis_opt(ms).single()?;
    Some(Bar {
        ts,
        open: field_f64(row, "o")?,
        high: field_f64(row, "h")?,
        low: field_f64(row, "l")?,
        close: field_f64(row, "c")?,
        volume: field_f64(row, "v").unwrap_or(0.0),
    })
}

fn parse_daily_row(date: NaiveDate, row: &Value) -> Option<DailyBar> {
    Some(DailyBar {
        date,
        open: field_f64(row, "o")?,
        high: field_f64(row, "h")?,
        low: field_f64(row, "l")?,
        close: field_f64(row, "c")?,
        volume: field_f64(row, "v").unwrap_or(0.0),
    })
}

impl MarketData for PolygonClient {
    fn minute_bars(
        &self,
        ticker: &str,
        date: NaiveDate,
        include_premarket: bool,
    ) -> Result<Vec<Bar>, DataError> {
        let path = format!(
            "/v2/aggs/ticker/{ticker}/range/1/minute/{date}/{date}",
            date = date.format("%Y-%m-%d")
        );
        let params = [
            ("adjusted", "true".to_string()),
            ("sort", "asc".to_string()),
            ("limit", "50000".to_string()),
        ];
        let body = self.get(&path, &params)?;

        let mut bars: Vec<Bar> =
            Self::results(&body).iter().filter_map(parse_minute_row).collect();
        bars.sort_by_key(|b| b.ts);
        bars.dedup_by_key(|b| b.ts);

        if !include_premarket {
            bars = strip_premarket(bars, rth_open_utc(date));
        }
        Ok(bars)
    }

    fn daily_bar(&self, ticker: &str, date: NaiveDate) -> Result<Option<DailyBar>, DataError> {
        let path = format!(
            "/v2/aggs/ticker/{ticker}/range/1/day/{date}/{date}",
            date = date.format("%Y-%m-%d")
        );
        let params = [("adjusted", "true".to_string())];
        let body = self.get(&path, &params)?;
        Ok(Self::results(&body).first().and_then(|row| parse_daily_row(date, row)))
    }

    fn grouped_daily(&self, date: NaiveDate) -> Result<BTreeMap<String, DailyBar>, DataError> {
        let path = format!(
            "/v2/aggs/grouped/locale/us/market/stocks/{date}",
            date = date.format("%Y-%m-%d")
        );
        let params = [("adjusted", "true".to_string())];
        let body = self.get(&path, &params)?;

        let mut out = BTreeMap::new();
        for row in Self::results(&body) {
            let Some(ticker) = row.get("T").and_then(Value::as_str) else {
                continue;
            };
            if let Some(daily) = parse_daily_row(date, row) {
                out.insert(ticker.to_string(), daily);
            }
        }
        Ok(out)
    }

    fn reference(&self, ticker: &str) -> Result<Option<ReferenceRecord>, DataError> {
        let path = format!("/v3/reference/tickers/{ticker}");
        let body = match self.get(&path, &[]) {
            Ok(body) => body,
            Err(DataError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(results) = body.get("results") else {
            return Ok(None);
        };
        let asset_type = results
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let active = results.get("active").and_then(Value::as_bool).unwrap_or(false);
        Ok(Some(ReferenceRecord {
            ticker: ticker.to_string(),
            is_common_stock: asset_type == "CS",
            asset_type,
            active,
        }))
    }
}
