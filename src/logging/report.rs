//! Aggregation over the request log for `pulse history`.

use std::collections::HashMap;

use super::RequestLogEntry;

/// Per-endpoint request statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointStat {
    pub endpoint: String,
    pub count: usize,
    pub failures: usize,
    pub unauthorized: usize,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
}

impl EndpointStat {
    pub fn failure_pct(&self) -> f64 {
        pct(self.failures, self.count)
    }
}

/// Summary of a set of log entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySummary {
    pub total_requests: usize,
    pub failures: usize,
    pub avg_latency_ms: f64,
    /// Sorted by request count, descending; ties by endpoint name.
    pub endpoints: Vec<EndpointStat>,
}

impl HistorySummary {
    pub fn failure_pct(&self) -> f64 {
        pct(self.failures, self.total_requests)
    }
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

pub fn summarize(entries: &[RequestLogEntry]) -> HistorySummary {
    if entries.is_empty() {
        return HistorySummary::default();
    }

    let mut groups: HashMap<&str, Vec<&RequestLogEntry>> = HashMap::new();
    for entry in entries {
        groups.entry(entry.endpoint.as_str()).or_default().push(entry);
    }

    let mut endpoints: Vec<EndpointStat> = groups
        .into_iter()
        .map(|(endpoint, group)| {
            let total_latency: u64 = group.iter().map(|e| e.latency_ms).sum();
            EndpointStat {
                endpoint: endpoint.to_string(),
                count: group.len(),
                failures: group.iter().filter(|e| !e.success).count(),
                unauthorized: group.iter().filter(|e| e.status == Some(401)).count(),
                avg_latency_ms: total_latency as f64 / group.len() as f64,
                max_latency_ms: group.iter().map(|e| e.latency_ms).max().unwrap_or(0),
            }
        })
        .collect();

    endpoints.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.endpoint.cmp(&b.endpoint))
    });

    let total_latency: u64 = entries.iter().map(|e| e.latency_ms).sum();

    HistorySummary {
        total_requests: entries.len(),
        failures: entries.iter().filter(|e| !e.success).count(),
        avg_latency_ms: total_latency as f64 / entries.len() as f64,
        endpoints,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(endpoint: &str, status: Option<u16>, latency_ms: u64, ok: bool) -> RequestLogEntry {
        RequestLogEntry::new(endpoint, status, latency_ms, (!ok).then_some("boom"))
    }

    #[test]
    fn empty_log_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.failure_pct(), 0.0);
        assert!(summary.endpoints.is_empty());
    }

    #[test]
    fn groups_by_endpoint_and_orders_by_count() {
        let entries = vec![
            entry("/api/stats/url", Some(200), 10, true),
            entry("/api/stats/url", Some(200), 30, true),
            entry("/api/stats/url", Some(401), 5, false),
            entry("/api/websites", Some(200), 8, true),
            entry("/api/status", None, 15000, false),
        ];
        let summary = summarize(&entries);

        assert_eq!(summary.total_requests, 5);
        assert_eq!(summary.failures, 2);
        assert!((summary.failure_pct() - 40.0).abs() < f64::EPSILON);

        let top = &summary.endpoints[0];
        assert_eq!(top.endpoint, "/api/stats/url");
        assert_eq!(top.count, 3);
        assert_eq!(top.unauthorized, 1);
        assert!((top.avg_latency_ms - 15.0).abs() < f64::EPSILON);
        assert_eq!(top.max_latency_ms, 30);

        // ties broken alphabetically
        assert_eq!(summary.endpoints[1].endpoint, "/api/status");
        assert_eq!(summary.endpoints[2].endpoint, "/api/websites");
    }
}
