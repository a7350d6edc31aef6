//! Typed client for the NginxPulse statistics API.
//!
//! [`StatsClient`] has one method per endpoint. Stats methods go through a
//! single generic route: the [`Dimension`] picks the path and the parameter
//! schema, [`schema::build_params`] applies the schema and normalizes, and
//! the [`Transport`] issues the request. Decoding into the response type is
//! the last step; nothing is cached, retried or de-duplicated.
//!
//! ```rust,ignore
//! use pulse_query::api::{HttpTransport, StatsClient};
//!
//! let client = StatsClient::new(HttpTransport::new("http://127.0.0.1:8089"));
//! for site in client.fetch_websites()? {
//!     let urls = client.fetch_url_stats(&site.id, "today", None)?;
//!     println!("{}: {} urls", site.name, urls.len());
//! }
//! ```

pub mod error;
pub mod params;
pub mod query;
pub mod schema;
pub mod transport;
pub mod types;

use serde::de::DeserializeOwned;

use crate::config::PulseConfig;

pub use error::{ApiError, ErrorKind, FALLBACK_MESSAGE};
pub use params::{ParamValue, QueryParams, normalize};
pub use query::{LocationType, LogsQuery, NewVisitor, SessionsQuery, SortOrder, StatusClass, ViewType};
pub use schema::{Dimension, IncludeIf, ParamSpec};
pub use transport::{HttpTransport, Transport};
pub use types::{
    AppStatus, LogsPage, OverallStats, RealtimeStats, SessionSummary, SessionsPage,
    SimpleSeriesStats, TimeSeriesStats, WebsiteInfo, WebsitesResponse,
};

pub const WEBSITES_PATH: &str = "/api/websites";
pub const STATUS_PATH: &str = "/api/status";

/// One typed operation per analytics endpoint.
#[derive(Debug)]
pub struct StatsClient<T = HttpTransport> {
    transport: T,
}

impl StatsClient<HttpTransport> {
    /// Client over an [`HttpTransport`] built from the resolved config.
    pub fn from_config(config: &PulseConfig) -> Self {
        Self::new(HttpTransport::from_config(config))
    }
}

impl<T: Transport> StatsClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -- Sites and status --

    /// All tracked sites. A body without `websites` yields an empty list.
    pub fn fetch_websites(&self) -> Result<Vec<WebsiteInfo>, ApiError> {
        let body: WebsitesResponse = self.get(WEBSITES_PATH, &QueryParams::new())?;
        Ok(body.websites.unwrap_or_default())
    }

    pub fn fetch_app_status(&self) -> Result<AppStatus, ApiError> {
        self.get(STATUS_PATH, &QueryParams::new())
    }

    // -- Aggregate stats --

    /// Visitors and pageviews per bucket. Fails with [`ErrorKind::Decode`]
    /// if the backend's three series differ in length.
    pub fn fetch_time_series_stats(
        &self,
        website_id: &str,
        time_range: &str,
        view_type: ViewType,
    ) -> Result<TimeSeriesStats, ApiError> {
        let stats: TimeSeriesStats = self.fetch_stats(
            Dimension::Timeseries,
            [
                ("id", ParamValue::from(website_id)),
                ("timeRange", ParamValue::from(time_range)),
                ("viewType", ParamValue::from(view_type)),
            ],
        )?;
        stats.validate()?;
        Ok(stats)
    }

    pub fn fetch_overall_stats(
        &self,
        website_id: &str,
        time_range: &str,
        entry_limit: Option<u32>,
    ) -> Result<OverallStats, ApiError> {
        self.fetch_stats(
            Dimension::Overall,
            [
                ("id", ParamValue::from(website_id)),
                ("timeRange", ParamValue::from(time_range)),
                ("entryLimit", ParamValue::from(entry_limit)),
            ],
        )
    }

    /// Ranked breakdown for one of the plain dimensions (`url`, `referer`,
    /// `browser`, `os`, `device`). `limit` defaults to 10.
    pub fn fetch_ranked_stats(
        &self,
        dimension: Dimension,
        website_id: &str,
        time_range: &str,
        limit: Option<u32>,
    ) -> Result<SimpleSeriesStats, ApiError> {
        if !Dimension::RANKED.contains(&dimension) {
            return Err(ApiError::invalid_query(format!(
                "'{dimension}' is not a ranked stats dimension"
            )));
        }
        self.fetch_stats(
            dimension,
            [
                ("id", ParamValue::from(website_id)),
                ("timeRange", ParamValue::from(time_range)),
                ("limit", ParamValue::from(limit.or(dimension.default_limit()))),
            ],
        )
    }

    pub fn fetch_url_stats(
        &self,
        website_id: &str,
        time_range: &str,
        limit: Option<u32>,
    ) -> Result<SimpleSeriesStats, ApiError> {
        self.fetch_ranked_stats(Dimension::Url, website_id, time_range, limit)
    }

    pub fn fetch_referer_stats(
        &self,
        website_id: &str,
        time_range: &str,
        limit: Option<u32>,
    ) -> Result<SimpleSeriesStats, ApiError> {
        self.fetch_ranked_stats(Dimension::Referer, website_id, time_range, limit)
    }

    pub fn fetch_browser_stats(
        &self,
        website_id: &str,
        time_range: &str,
        limit: Option<u32>,
    ) -> Result<SimpleSeriesStats, ApiError> {
        self.fetch_ranked_stats(Dimension::Browser, website_id, time_range, limit)
    }

    pub fn fetch_os_stats(
        &self,
        website_id: &str,
        time_range: &str,
        limit: Option<u32>,
    ) -> Result<SimpleSeriesStats, ApiError> {
        self.fetch_ranked_stats(Dimension::Os, website_id, time_range, limit)
    }

    pub fn fetch_device_stats(
        &self,
        website_id: &str,
        time_range: &str,
        limit: Option<u32>,
    ) -> Result<SimpleSeriesStats, ApiError> {
        self.fetch_ranked_stats(Dimension::Device, website_id, time_range, limit)
    }

    /// Location breakdown. `limit` defaults to 99.
    pub fn fetch_location_stats(
        &self,
        website_id: &str,
        time_range: &str,
        location_type: LocationType,
        limit: Option<u32>,
    ) -> Result<SimpleSeriesStats, ApiError> {
        let dimension = Dimension::Location;
        self.fetch_stats(
            dimension,
            [
                ("id", ParamValue::from(website_id)),
                ("locationType", ParamValue::from(location_type)),
                ("timeRange", ParamValue::from(time_range)),
                ("limit", ParamValue::from(limit.or(dimension.default_limit()))),
            ],
        )
    }

    pub fn fetch_session_summary(
        &self,
        website_id: &str,
        time_range: &str,
    ) -> Result<SessionSummary, ApiError> {
        self.fetch_stats(
            Dimension::SessionSummary,
            [("id", ParamValue::from(website_id)), ("timeRange", ParamValue::from(time_range))],
        )
    }

    /// Activity over the last `window_minutes` minutes.
    pub fn fetch_realtime_stats(
        &self,
        website_id: &str,
        window_minutes: u32,
    ) -> Result<RealtimeStats, ApiError> {
        self.fetch_stats(
            Dimension::Realtime,
            [("id", ParamValue::from(website_id)), ("window", ParamValue::from(window_minutes))],
        )
    }

    // -- Searches --

    pub fn fetch_logs(&self, query: &LogsQuery) -> Result<LogsPage, ApiError> {
        self.fetch_stats(Dimension::Logs, query.to_values())
    }

    pub fn fetch_sessions(&self, query: &SessionsQuery) -> Result<SessionsPage, ApiError> {
        self.fetch_stats(Dimension::Session, query.to_values())
    }

    // -- Internal --

    /// The generic route every stats method funnels through.
    fn fetch_stats<R, I>(&self, dimension: Dimension, values: I) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        I: IntoIterator<Item = (&'static str, ParamValue)>,
    {
        let params = schema::build_params(dimension, values)?;
        self.get(&dimension.path(), &params)
    }

    fn get<R: DeserializeOwned>(&self, path: &str, params: &QueryParams) -> Result<R, ApiError> {
        let body = self.transport.get_json(path, params)?;
        serde_json::from_value(body)
            .map_err(|e| ApiError::decode(format!("unexpected response shape from {path}: {e}")))
    }
}

impl<T: Transport + Clone> Clone for StatsClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}
