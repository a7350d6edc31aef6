//! Response contracts for every endpoint.
//!
//! Field names follow the backend's JSON exactly (it mixes `snake_case` and
//! `camelCase` between endpoints). Missing collections decode as empty and
//! missing counters as zero, so a partially-populated payload still yields a
//! usable value.

use serde::{Deserialize, Serialize};

use super::error::ApiError;

// ---------------------------------------------------------------------------
// Sites and ingestion status
// ---------------------------------------------------------------------------

/// One tracked site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteInfo {
    pub id: String,
    pub name: String,
}

/// Body of `GET /api/websites`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsitesResponse {
    #[serde(default)]
    pub websites: Option<Vec<WebsiteInfo>>,
}

/// Body of `GET /api/status`: snapshot of log ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    #[serde(default)]
    pub log_parsing: bool,
    /// Percent complete (0–100) while `log_parsing` is set.
    #[serde(default)]
    pub log_parsing_progress: Option<u8>,
}

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

/// Visitors and pageviews per time bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesStats {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub visitors: Vec<u64>,
    #[serde(default)]
    pub pageviews: Vec<u64>,
    #[serde(default, rename = "pvMinusUv", skip_serializing_if = "Option::is_none")]
    pub pv_minus_uv: Option<Vec<i64>>,
}

impl TimeSeriesStats {
    /// Number of time buckets.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Check that `labels`, `visitors` and `pageviews` line up bucket for bucket.
    pub fn validate(&self) -> Result<(), ApiError> {
        let n = self.labels.len();
        if self.visitors.len() != n || self.pageviews.len() != n {
            return Err(ApiError::decode(format!(
                "timeseries length mismatch: {} labels, {} visitors, {} pageviews",
                n,
                self.visitors.len(),
                self.pageviews.len()
            )));
        }
        Ok(())
    }

    /// `(label, visitors, pageviews)` per bucket.
    pub fn buckets(&self) -> impl Iterator<Item = (&str, u64, u64)> {
        self.labels
            .iter()
            .zip(&self.visitors)
            .zip(&self.pageviews)
            .map(|((label, uv), pv)| (label.as_str(), *uv, *pv))
    }
}

// ---------------------------------------------------------------------------
// Ranked breakdowns
// ---------------------------------------------------------------------------

/// Ranked breakdown for one dimension (URL, referer, browser, OS, device,
/// location). Row `i` across all columns describes `key[i]`; rows arrive in
/// descending rank order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleSeriesStats {
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub uv: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv_percent: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv_percent: Option<Vec<f64>>,
}

/// One row of a [`SimpleSeriesStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow<'a> {
    pub key: &'a str,
    pub uv: u64,
    pub uv_percent: Option<f64>,
    pub pv: Option<u64>,
    pub pv_percent: Option<f64>,
}

impl SimpleSeriesStats {
    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Rows in rank order. Columns shorter than `key` yield `None`/zero.
    pub fn rows(&self) -> impl Iterator<Item = SeriesRow<'_>> {
        self.key.iter().enumerate().map(move |(i, key)| SeriesRow {
            key,
            uv: self.uv.get(i).copied().unwrap_or(0),
            uv_percent: column(&self.uv_percent, i),
            pv: column(&self.pv, i),
            pv_percent: column(&self.pv_percent, i),
        })
    }
}

fn column<T: Copy>(values: &Option<Vec<T>>, i: usize) -> Option<T> {
    values.as_ref().and_then(|v| v.get(i).copied())
}

// ---------------------------------------------------------------------------
// Realtime
// ---------------------------------------------------------------------------

/// One row of a realtime breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSeriesItem {
    pub name: String,
    #[serde(default)]
    pub count: u64,
    /// Share of the window's activity, 0–100.
    #[serde(default)]
    pub percent: f64,
}

/// Activity within the last `window` minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_minutes: Option<u32>,
    #[serde(default)]
    pub active_count: u64,
    #[serde(default)]
    pub active_series: Vec<u64>,
    #[serde(default)]
    pub device_breakdown: Vec<RealtimeSeriesItem>,
    #[serde(default)]
    pub referers: Vec<RealtimeSeriesItem>,
    #[serde(default)]
    pub pages: Vec<RealtimeSeriesItem>,
    #[serde(default)]
    pub entry_pages: Vec<RealtimeSeriesItem>,
    #[serde(default)]
    pub browsers: Vec<RealtimeSeriesItem>,
    #[serde(default)]
    pub locations: Vec<RealtimeSeriesItem>,
}

// ---------------------------------------------------------------------------
// Overall and session summary
// ---------------------------------------------------------------------------

/// Headline counters for a period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverallStats {
    pub pv: u64,
    pub uv: u64,
    /// Bytes sent.
    pub traffic: u64,
    pub session_count: u64,
    pub active_visitor_count: u64,
    pub new_visitor_count: u64,
    pub returning_visitor_count: u64,
    pub prev_new_visitor_count: u64,
    pub prev_returning_visitor_count: u64,
    pub entry_pages: SimpleSeriesStats,
    pub compare: OverallCompare,
    pub status_code_hits: StatusCodeHits,
    pub status_code_hits_previous: StatusCodeHits,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverallCompare {
    pub previous: OverallSnapshot,
    pub forecast: OverallSnapshot,
    pub same_time: OverallSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverallSnapshot {
    pub pv: u64,
    pub uv: u64,
    pub session_count: u64,
}

/// Hits grouped by HTTP status class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCodeHits {
    pub s2xx: u64,
    pub s3xx: u64,
    pub s4xx: u64,
    pub s5xx: u64,
    pub other: u64,
}

impl StatusCodeHits {
    pub fn total(&self) -> u64 {
        self.s2xx + self.s3xx + self.s4xx + self.s5xx + self.other
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_count: u64,
    pub bounce_count: u64,
    pub bounce_rate: f64,
    pub avg_duration_seconds: i64,
}

// ---------------------------------------------------------------------------
// Raw log and session search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub pages: u32,
}

/// One parsed access-log line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub id: i64,
    pub ip: String,
    pub timestamp: i64,
    /// Backend-formatted local time.
    pub time: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub bytes_sent: u64,
    pub referer: String,
    pub user_browser: String,
    pub user_os: String,
    pub user_device: String,
    pub domestic_location: String,
    pub global_location: String,
    pub pageview_flag: bool,
    pub is_new_visitor: bool,
}

/// Body of `GET /api/stats/logs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsPage {
    pub logs: Vec<LogEntry>,
    pub ip_parsing: bool,
    pub ip_parsing_progress: u8,
    pub pagination: Pagination,
}

/// One reconstructed visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEntry {
    pub ip: String,
    pub domestic_location: String,
    pub global_location: String,
    pub user_device: String,
    pub user_browser: String,
    pub user_os: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub start_time: String,
    pub duration_seconds: i64,
    pub page_count: u32,
    pub entry_url: String,
    pub exit_url: String,
}

/// Body of `GET /api/stats/session`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsPage {
    pub sessions: Vec<SessionEntry>,
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_series_decodes_snake_case_percents() {
        let json = r#"{"key":["/","/about"],"uv":[10,4],"uv_percent":[71,29],"pv":[30,5]}"#;
        let stats: SimpleSeriesStats = serde_json::from_str(json).unwrap();
        let rows: Vec<_> = stats.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "/");
        assert_eq!(rows[0].uv_percent, Some(71.0));
        assert_eq!(rows[1].pv, Some(5));
        assert_eq!(rows[1].pv_percent, None);
    }

    #[test]
    fn app_status_progress_is_optional() {
        let status: AppStatus = serde_json::from_str(r#"{"log_parsing":false}"#).unwrap();
        assert!(!status.log_parsing);
        assert_eq!(status.log_parsing_progress, None);

        let status: AppStatus =
            serde_json::from_str(r#"{"log_parsing":true,"log_parsing_progress":42}"#).unwrap();
        assert_eq!(status.log_parsing_progress, Some(42));
    }

    #[test]
    fn realtime_decodes_camel_case() {
        let json = r#"{
            "windowMinutes": 30,
            "activeCount": 3,
            "activeSeries": [0, 1, 2],
            "deviceBreakdown": [{"name": "Desktop", "count": 2, "percent": 66.7}],
            "entryPages": []
        }"#;
        let stats: RealtimeStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.window_minutes, Some(30));
        assert_eq!(stats.active_series, vec![0, 1, 2]);
        assert_eq!(stats.device_breakdown[0].name, "Desktop");
        assert!(stats.referers.is_empty());
    }

    #[test]
    fn timeseries_validate_detects_mismatch() {
        let ok = TimeSeriesStats {
            labels: vec!["0:00".into(), "1:00".into()],
            visitors: vec![1, 2],
            pageviews: vec![3, 4],
            pv_minus_uv: None,
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.buckets().nth(1), Some(("1:00", 2, 4)));

        let bad = TimeSeriesStats {
            pageviews: vec![3],
            ..ok
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn overall_tolerates_partial_payload() {
        let json = r#"{"pv": 120, "uv": 40, "statusCodeHits": {"s2xx": 100, "s4xx": 20}}"#;
        let stats: OverallStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.pv, 120);
        assert_eq!(stats.status_code_hits.total(), 120);
        assert_eq!(stats.compare.previous.pv, 0);
    }

    #[test]
    fn logs_page_decodes_pagination() {
        let json = r#"{
            "logs": [{"id": 7, "ip": "1.2.3.4", "url": "/", "status_code": 200,
                      "pageview_flag": true, "is_new_visitor": false}],
            "ip_parsing": false,
            "ip_parsing_progress": 100,
            "pagination": {"total": 1, "page": 1, "pageSize": 20, "pages": 1}
        }"#;
        let page: LogsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.logs[0].status_code, 200);
        assert_eq!(page.pagination.page_size, 20);
    }
}
