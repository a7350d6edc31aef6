//! Stats dimensions and their parameter schemas.
//!
//! Each [`Dimension`] owns a static table of [`ParamSpec`]s describing which
//! query parameters it accepts, which are required, and under what condition
//! an optional one is actually sent. [`build_params`] is the one place those
//! rules are applied.

use std::fmt;
use std::str::FromStr;

use super::error::ApiError;
use super::params::{ParamValue, QueryParams, normalize};

/// Shared prefix of every stats endpoint.
pub const STATS_PREFIX: &str = "/api/stats/";

// ---------------------------------------------------------------------------
// Parameter schema
// ---------------------------------------------------------------------------

/// Condition under which an optional parameter is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeIf {
    /// Sent whenever a value is supplied.
    Present,
    /// Sent when supplied and not the empty string. `"0"` is sent.
    NonEmpty,
    /// Sent only when truthy; `false`, zero and `""` are dropped.
    Truthy,
}

impl IncludeIf {
    pub fn admits(self, value: &ParamValue) -> bool {
        match self {
            Self::Present => !value.is_absent(),
            Self::NonEmpty => value.is_non_empty(),
            Self::Truthy => value.is_truthy(),
        }
    }
}

/// One accepted query parameter of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    /// Ignored for required parameters.
    pub include_if: IncludeIf,
}

const fn required(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
        include_if: IncludeIf::Present,
    }
}

const fn optional(name: &'static str, include_if: IncludeIf) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
        include_if,
    }
}

const TIMESERIES: &[ParamSpec] = &[required("id"), required("timeRange"), required("viewType")];

const OVERALL: &[ParamSpec] = &[
    required("id"),
    required("timeRange"),
    optional("entryLimit", IncludeIf::Present),
];

const RANKED: &[ParamSpec] = &[
    required("id"),
    required("timeRange"),
    optional("limit", IncludeIf::Present),
];

const LOCATION: &[ParamSpec] = &[
    required("id"),
    required("timeRange"),
    required("locationType"),
    optional("limit", IncludeIf::Present),
];

const SESSION_SUMMARY: &[ParamSpec] = &[required("id"), required("timeRange")];

const REALTIME: &[ParamSpec] = &[required("id"), required("window")];

const LOGS: &[ParamSpec] = &[
    required("id"),
    required("page"),
    required("pageSize"),
    required("sortField"),
    required("sortOrder"),
    optional("filter", IncludeIf::NonEmpty),
    optional("timeRange", IncludeIf::NonEmpty),
    optional("statusClass", IncludeIf::NonEmpty),
    optional("statusCode", IncludeIf::NonEmpty),
    optional("excludeInternal", IncludeIf::Truthy),
    optional("ipFilter", IncludeIf::NonEmpty),
    optional("timeStart", IncludeIf::NonEmpty),
    optional("timeEnd", IncludeIf::NonEmpty),
    optional("locationFilter", IncludeIf::NonEmpty),
    optional("urlFilter", IncludeIf::NonEmpty),
    optional("pageviewOnly", IncludeIf::Truthy),
    optional("newVisitor", IncludeIf::NonEmpty),
    optional("distinctIp", IncludeIf::Truthy),
];

const SESSION: &[ParamSpec] = &[
    required("id"),
    required("page"),
    required("pageSize"),
    optional("timeRange", IncludeIf::NonEmpty),
    optional("timeStart", IncludeIf::NonEmpty),
    optional("timeEnd", IncludeIf::NonEmpty),
    optional("ipFilter", IncludeIf::NonEmpty),
    optional("deviceFilter", IncludeIf::NonEmpty),
    optional("browserFilter", IncludeIf::NonEmpty),
    optional("osFilter", IncludeIf::NonEmpty),
];

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// One analytics breakdown served under `/api/stats/<tag>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Timeseries,
    Overall,
    Url,
    Referer,
    Browser,
    Os,
    Device,
    Location,
    SessionSummary,
    Realtime,
    Logs,
    Session,
}

impl Dimension {
    pub const ALL: [Dimension; 12] = [
        Self::Timeseries,
        Self::Overall,
        Self::Url,
        Self::Referer,
        Self::Browser,
        Self::Os,
        Self::Device,
        Self::Location,
        Self::SessionSummary,
        Self::Realtime,
        Self::Logs,
        Self::Session,
    ];

    /// Dimensions answered with a ranked [`SimpleSeriesStats`](super::types::SimpleSeriesStats)
    /// and a plain `limit` parameter.
    pub const RANKED: [Dimension; 5] = [
        Self::Url,
        Self::Referer,
        Self::Browser,
        Self::Os,
        Self::Device,
    ];

    /// Wire tag of the dimension.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeseries => "timeseries",
            Self::Overall => "overall",
            Self::Url => "url",
            Self::Referer => "referer",
            Self::Browser => "browser",
            Self::Os => "os",
            Self::Device => "device",
            Self::Location => "location",
            Self::SessionSummary => "session_summary",
            Self::Realtime => "realtime",
            Self::Logs => "logs",
            Self::Session => "session",
        }
    }

    /// Endpoint path, e.g. `/api/stats/url`.
    pub fn path(self) -> String {
        format!("{STATS_PREFIX}{}", self.as_str())
    }

    pub fn schema(self) -> &'static [ParamSpec] {
        match self {
            Self::Timeseries => TIMESERIES,
            Self::Overall => OVERALL,
            Self::Url | Self::Referer | Self::Browser | Self::Os | Self::Device => RANKED,
            Self::Location => LOCATION,
            Self::SessionSummary => SESSION_SUMMARY,
            Self::Realtime => REALTIME,
            Self::Logs => LOGS,
            Self::Session => SESSION,
        }
    }

    /// Default `limit` applied by the typed façade when the caller gives none.
    pub fn default_limit(self) -> Option<u32> {
        match self {
            Self::Url | Self::Referer | Self::Browser | Self::Os | Self::Device => Some(10),
            Self::Location => Some(99),
            _ => None,
        }
    }

    fn spec(self, name: &str) -> Option<&'static ParamSpec> {
        self.schema().iter().find(|spec| spec.name == name)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ApiError::invalid_query(format!("unsupported stats dimension: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Apply a dimension's schema to raw values and normalize the result.
///
/// Fails without touching the network when a required parameter is missing
/// or a parameter the dimension does not accept is supplied.
pub fn build_params<I, V>(dimension: Dimension, values: I) -> Result<QueryParams, ApiError>
where
    I: IntoIterator<Item = (&'static str, V)>,
    V: Into<ParamValue>,
{
    let mut admitted: Vec<(&'static str, ParamValue)> = Vec::new();

    for (name, value) in values {
        let value = value.into();
        let spec = dimension.spec(name).ok_or_else(|| {
            ApiError::invalid_query(format!(
                "parameter '{name}' is not accepted by stats dimension '{dimension}'"
            ))
        })?;

        if spec.required {
            if value.is_absent() {
                return Err(missing(dimension, name));
            }
            admitted.push((name, value));
        } else if spec.include_if.admits(&value) {
            admitted.push((name, value));
        }
    }

    if let Some(spec) = dimension
        .schema()
        .iter()
        .filter(|spec| spec.required)
        .find(|spec| !admitted.iter().any(|(name, _)| *name == spec.name))
    {
        return Err(missing(dimension, spec.name));
    }

    Ok(normalize(admitted))
}

fn missing(dimension: Dimension, name: &str) -> ApiError {
    ApiError::invalid_query(format!(
        "missing required parameter '{name}' for stats dimension '{dimension}'"
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
