//! Request-side types: backend filter tokens and the two paginated searches.

use std::fmt;
use std::str::FromStr;

use super::error::ApiError;
use super::params::ParamValue;

macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $token:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $token),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($token => Ok(Self::$variant),)+
                    other => Err(ApiError::invalid_query(format!(
                        concat!("invalid ", stringify!($name), " '{}' (expected one of: {})"),
                        other,
                        [$($token),+].join(", ")
                    ))),
                }
            }
        }

        impl From<$name> for ParamValue {
            fn from(value: $name) -> Self {
                ParamValue::Str(value.as_str().to_string())
            }
        }
    };
}

token_enum! {
    /// Bucket granularity of a timeseries.
    ViewType { Hourly => "hourly", Daily => "daily" }
}

token_enum! {
    /// Geographic granularity of a location breakdown.
    LocationType { Domestic => "domestic", Global => "global", City => "city" }
}

token_enum! {
    SortOrder { Asc => "asc", Desc => "desc" }
}

token_enum! {
    /// HTTP status class filter for the log search.
    StatusClass { Success => "2xx", Redirect => "3xx", ClientError => "4xx", ServerError => "5xx" }
}

token_enum! {
    /// New/returning visitor filter for the log search.
    NewVisitor { All => "all", New => "new", Returning => "returning" }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Desc
    }
}

// ---------------------------------------------------------------------------
// Log search
// ---------------------------------------------------------------------------

/// Parameters of `GET /api/stats/logs`.
///
/// The first five fields are always sent. Every `Option` filter is sent only
/// when set and non-empty; the boolean flags are sent (as `true`) only when
/// set, an explicit `false` is never put on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogsQuery {
    pub website_id: String,
    pub page: u32,
    pub page_size: u32,
    pub sort_field: String,
    pub sort_order: SortOrder,
    /// Free-text filter.
    pub filter: Option<String>,
    pub time_range: Option<String>,
    pub status_class: Option<StatusClass>,
    /// Exact status code. `"0"` is a legitimate value and is sent.
    pub status_code: Option<String>,
    pub exclude_internal: bool,
    pub ip_filter: Option<String>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub location_filter: Option<String>,
    pub url_filter: Option<String>,
    pub pageview_only: bool,
    pub new_visitor: Option<NewVisitor>,
    pub distinct_ip: bool,
}

impl LogsQuery {
    pub fn new(
        website_id: impl Into<String>,
        page: u32,
        page_size: u32,
        sort_field: impl Into<String>,
        sort_order: SortOrder,
    ) -> Self {
        Self {
            website_id: website_id.into(),
            page,
            page_size,
            sort_field: sort_field.into(),
            sort_order,
            ..Self::default()
        }
    }

    pub(crate) fn to_values(&self) -> Vec<(&'static str, ParamValue)> {
        vec![
            ("id", self.website_id.as_str().into()),
            ("page", self.page.into()),
            ("pageSize", self.page_size.into()),
            ("sortField", self.sort_field.as_str().into()),
            ("sortOrder", self.sort_order.into()),
            ("filter", self.filter.clone().into()),
            ("timeRange", self.time_range.clone().into()),
            ("statusClass", self.status_class.into()),
            ("statusCode", self.status_code.clone().into()),
            ("excludeInternal", self.exclude_internal.into()),
            ("ipFilter", self.ip_filter.clone().into()),
            ("timeStart", self.time_start.clone().into()),
            ("timeEnd", self.time_end.clone().into()),
            ("locationFilter", self.location_filter.clone().into()),
            ("urlFilter", self.url_filter.clone().into()),
            ("pageviewOnly", self.pageview_only.into()),
            ("newVisitor", self.new_visitor.into()),
            ("distinctIp", self.distinct_ip.into()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Session search
// ---------------------------------------------------------------------------

/// Parameters of `GET /api/stats/session`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionsQuery {
    pub website_id: String,
    pub page: u32,
    pub page_size: u32,
    pub time_range: Option<String>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub ip_filter: Option<String>,
    pub device_filter: Option<String>,
    pub browser_filter: Option<String>,
    pub os_filter: Option<String>,
}

impl SessionsQuery {
    pub fn new(website_id: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            website_id: website_id.into(),
            page,
            page_size,
            ..Self::default()
        }
    }

    pub(crate) fn to_values(&self) -> Vec<(&'static str, ParamValue)> {
        vec![
            ("id", self.website_id.as_str().into()),
            ("page", self.page.into()),
            ("pageSize", self.page_size.into()),
            ("timeRange", self.time_range.clone().into()),
            ("timeStart", self.time_start.clone().into()),
            ("timeEnd", self.time_end.clone().into()),
            ("ipFilter", self.ip_filter.clone().into()),
            ("deviceFilter", self.device_filter.clone().into()),
            ("browserFilter", self.browser_filter.clone().into()),
            ("osFilter", self.os_filter.clone().into()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_case_insensitively() {
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!("4xx".parse::<StatusClass>().unwrap(), StatusClass::ClientError);
        assert_eq!(" returning ".parse::<NewVisitor>().unwrap(), NewVisitor::Returning);
        assert_eq!("city".parse::<LocationType>().unwrap(), LocationType::City);
    }

    #[test]
    fn invalid_token_lists_choices() {
        let err = "6xx".parse::<StatusClass>().unwrap_err();
        assert!(err.message().contains("2xx, 3xx, 4xx, 5xx"));
    }

    #[test]
    fn logs_query_values_cover_every_filter() {
        let values = LogsQuery::new("1", 1, 20, "timestamp", SortOrder::Asc).to_values();
        assert_eq!(values.len(), 18);
        assert_eq!(values[4], ("sortOrder", ParamValue::from("asc")));
    }

    #[test]
    fn sessions_query_defaults_are_unset() {
        let q = SessionsQuery::new("1", 2, 10);
        assert!(q.time_range.is_none());
        assert_eq!(q.to_values().len(), 10);
    }
}
