//! CLI command implementations for pulse.
//!
//! Provides subcommand handlers for:
//! - `pulse websites` / `pulse status`: sites and ingestion progress
//! - `pulse timeseries|overall|top|location|session-summary|realtime`: stats
//! - `pulse logs` / `pulse sessions`: paged searches
//! - `pulse key set|clear|show`: access-key management
//! - `pulse config show|init|set|reset`: configuration management
//! - `pulse history`: summary of the local request log

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use pulse_query::api::types::{LogsPage, SessionsPage, SimpleSeriesStats};
use pulse_query::api::{
    Dimension, LocationType, LogsQuery, SessionsQuery, StatsClient, ViewType,
};
use pulse_query::auth::{AuthRequired, FileCredentialStore};
use pulse_query::config;
use pulse_query::logging::RequestLog;
use pulse_query::logging::report::{self, HistorySummary};

/// Output format for query commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Client from the resolved config, with a hint printed on 401.
fn client() -> StatsClient {
    let client = StatsClient::from_config(&config::load());
    client
        .transport()
        .auth_notifier()
        .subscribe(|event: &AuthRequired| {
            eprintln!(
                "{} {} (run `pulse key set <key>`)",
                "Access key required:".yellow().bold(),
                event.message
            );
        });
    client
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_header(title: &str) {
    println!("{}", title.bold().cyan());
    println!("{}", "=".repeat(60));
}

// ---------------------------------------------------------------------------
// pulse websites | status
// ---------------------------------------------------------------------------

pub fn run_websites(format: OutputFormat) -> Result<()> {
    let websites = client().fetch_websites()?;

    if format == OutputFormat::Json {
        return print_json(&websites);
    }
    if websites.is_empty() {
        println!("{}", "No websites configured on the backend.".yellow());
        return Ok(());
    }

    print_header("Websites");
    println!("  {:<20} Name", "ID");
    println!("  {}", "-".repeat(58));
    for site in &websites {
        println!("  {:<20} {}", truncate(&site.id, 20), site.name);
    }
    Ok(())
}

pub fn run_status(format: OutputFormat) -> Result<()> {
    let status = client().fetch_app_status()?;

    if format == OutputFormat::Json {
        return print_json(&status);
    }
    if status.log_parsing {
        let progress = status
            .log_parsing_progress
            .map(|p| format!(" ({p}%)"))
            .unwrap_or_default();
        println!("{} parsing logs{}", "…".yellow().bold(), progress);
    } else {
        println!("{} logs are up to date", "✓".green().bold());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// pulse timeseries | overall | session-summary | realtime
// ---------------------------------------------------------------------------

pub fn run_timeseries(
    website_id: &str,
    time_range: &str,
    view: ViewType,
    format: OutputFormat,
) -> Result<()> {
    let stats = client().fetch_time_series_stats(website_id, time_range, view)?;

    if format == OutputFormat::Json {
        return print_json(&stats);
    }

    print_header(&format!("Traffic for {website_id} ({time_range}, {view})"));
    println!("  {:<20} {:>12} {:>12}", "Bucket", "Visitors", "Pageviews");
    println!("  {}", "-".repeat(46));
    for (i, (label, uv, pv)) in stats.buckets().enumerate() {
        let line = format!(
            "  {:<20} {:>12} {:>12}",
            truncate(label, 20),
            format_number(uv),
            format_number(pv)
        );
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
    Ok(())
}

pub fn run_overall(
    website_id: &str,
    time_range: &str,
    entry_limit: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let stats = client().fetch_overall_stats(website_id, time_range, entry_limit)?;

    if format == OutputFormat::Json {
        return print_json(&stats);
    }

    print_header(&format!("Overview for {website_id} ({time_range})"));
    println!(
        "  {} {} (prev {})",
        "Pageviews:  ".bold(),
        format_number(stats.pv),
        format_number(stats.compare.previous.pv)
    );
    println!(
        "  {} {} (prev {})",
        "Visitors:   ".bold(),
        format_number(stats.uv),
        format_number(stats.compare.previous.uv)
    );
    println!("  {} {}", "Sessions:   ".bold(), format_number(stats.session_count));
    println!(
        "  {} {} new / {} returning",
        "Visitor mix:".bold(),
        format_number(stats.new_visitor_count),
        format_number(stats.returning_visitor_count)
    );
    println!("  {} {}", "Traffic:    ".bold(), format_bytes(stats.traffic));

    let hits = &stats.status_code_hits;
    println!(
        "  {} 2xx {}  3xx {}  {}  {}",
        "Status:     ".bold(),
        hits.s2xx,
        hits.s3xx,
        format!("4xx {}", hits.s4xx).yellow(),
        format!("5xx {}", hits.s5xx).red(),
    );

    if !stats.entry_pages.is_empty() {
        println!();
        print_series_table("Entry pages", &stats.entry_pages);
    }
    Ok(())
}

pub fn run_session_summary(website_id: &str, time_range: &str, format: OutputFormat) -> Result<()> {
    let summary = client().fetch_session_summary(website_id, time_range)?;

    if format == OutputFormat::Json {
        return print_json(&summary);
    }

    print_header(&format!("Sessions for {website_id} ({time_range})"));
    println!("  {} {}", "Sessions:    ".bold(), format_number(summary.session_count));
    println!(
        "  {} {:.1}% ({} single-page)",
        "Bounce rate: ".bold(),
        summary.bounce_rate,
        summary.bounce_count
    );
    println!(
        "  {} {}",
        "Avg duration:".bold(),
        format_duration(summary.avg_duration_seconds)
    );
    Ok(())
}

pub fn run_realtime(website_id: &str, window: u32, format: OutputFormat) -> Result<()> {
    let stats = client().fetch_realtime_stats(website_id, window)?;

    if format == OutputFormat::Json {
        return print_json(&stats);
    }

    let minutes = stats.window_minutes.unwrap_or(window);
    print_header(&format!("Realtime for {website_id} (last {minutes} min)"));
    println!("  {} {}", "Active visitors:".bold(), stats.active_count);

    for (title, items) in [
        ("Pages", &stats.pages),
        ("Entry pages", &stats.entry_pages),
        ("Referers", &stats.referers),
        ("Devices", &stats.device_breakdown),
        ("Browsers", &stats.browsers),
        ("Locations", &stats.locations),
    ] {
        if items.is_empty() {
            continue;
        }
        println!();
        println!("{}", title.bold().cyan());
        for item in items.iter().take(10) {
            println!(
                "  {:<40} {:>6} {:>6.1}%",
                truncate(&item.name, 40),
                item.count,
                item.percent
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// pulse top | location
// ---------------------------------------------------------------------------

pub fn run_top(
    dimension: Dimension,
    website_id: &str,
    time_range: &str,
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let stats = client().fetch_ranked_stats(dimension, website_id, time_range, limit)?;

    if format == OutputFormat::Json {
        return print_json(&stats);
    }
    print_series_table(&format!("Top {dimension} for {website_id} ({time_range})"), &stats);
    Ok(())
}

pub fn run_location(
    website_id: &str,
    time_range: &str,
    location_type: LocationType,
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let stats = client().fetch_location_stats(website_id, time_range, location_type, limit)?;

    if format == OutputFormat::Json {
        return print_json(&stats);
    }
    print_series_table(
        &format!("Locations ({location_type}) for {website_id} ({time_range})"),
        &stats,
    );
    Ok(())
}

fn print_series_table(title: &str, stats: &SimpleSeriesStats) {
    if stats.is_empty() {
        println!("{}", format!("{title}: no data.").yellow());
        return;
    }

    print_header(title);
    println!("  {:<40} {:>8} {:>7} {:>8}", "Key", "UV", "UV %", "PV");
    println!("  {}", "-".repeat(66));
    for (i, row) in stats.rows().enumerate() {
        let line = format!(
            "  {:<40} {:>8} {:>7} {:>8}",
            truncate(row.key, 40),
            format_number(row.uv),
            row.uv_percent.map(|p| format!("{p:.1}%")).unwrap_or_default(),
            row.pv.map(format_number).unwrap_or_default(),
        );
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
}

// ---------------------------------------------------------------------------
// pulse logs | sessions
// ---------------------------------------------------------------------------

pub fn run_logs(query: &LogsQuery, format: OutputFormat) -> Result<()> {
    let page = client().fetch_logs(query)?;

    if format == OutputFormat::Json {
        return print_json(&page);
    }
    print_logs_table(&page);
    Ok(())
}

fn print_logs_table(page: &LogsPage) {
    if page.logs.is_empty() {
        println!("{}", "No matching log entries.".yellow());
        return;
    }

    println!(
        "  {:<20} {:<16} {:<6} {:>4} {}",
        "Time", "IP", "Method", "Code", "URL"
    );
    println!("  {}", "-".repeat(78));
    for entry in &page.logs {
        let code = entry.status_code.to_string();
        let code = match entry.status_code {
            500.. => code.red(),
            400..=499 => code.yellow(),
            _ => code.normal(),
        };
        println!(
            "  {:<20} {:<16} {:<6} {:>4} {}",
            truncate(&entry.time, 20),
            truncate(&entry.ip, 16),
            entry.method,
            code,
            truncate(&entry.url, 60),
        );
    }
    print_pagination(page.pagination.page, page.pagination.pages, page.pagination.total);
    if page.ip_parsing {
        println!(
            "  {} locations still resolving ({}%)",
            "Note:".dimmed(),
            page.ip_parsing_progress
        );
    }
}

pub fn run_sessions(query: &SessionsQuery, format: OutputFormat) -> Result<()> {
    let page = client().fetch_sessions(query)?;

    if format == OutputFormat::Json {
        return print_json(&page);
    }
    print_sessions_table(&page);
    Ok(())
}

fn print_sessions_table(page: &SessionsPage) {
    if page.sessions.is_empty() {
        println!("{}", "No matching sessions.".yellow());
        return;
    }

    println!(
        "  {:<20} {:<16} {:>5} {:>9} {}",
        "Start", "IP", "Pages", "Duration", "Entry → Exit"
    );
    println!("  {}", "-".repeat(78));
    for session in &page.sessions {
        println!(
            "  {:<20} {:<16} {:>5} {:>9} {} → {}",
            truncate(&session.start_time, 20),
            truncate(&session.ip, 16),
            session.page_count,
            format_duration(session.duration_seconds),
            truncate(&session.entry_url, 30),
            truncate(&session.exit_url, 30),
        );
    }
    print_pagination(page.pagination.page, page.pagination.pages, page.pagination.total);
}

fn print_pagination(page: u32, pages: u32, total: u64) {
    println!();
    println!(
        "  {}",
        format!("page {page} of {pages} ({} total)", format_number(total)).dimmed()
    );
}

// ---------------------------------------------------------------------------
// pulse key set | clear | show
// ---------------------------------------------------------------------------

fn key_store() -> Result<FileCredentialStore> {
    config::load()
        .auth
        .key_file_path()
        .map(FileCredentialStore::new)
        .ok_or_else(|| anyhow::anyhow!("no key file location (auth.key_file is empty)"))
}

pub fn run_key_set(key: &str) -> Result<()> {
    let store = key_store()?;
    store.save(key)?;
    println!(
        "{} Access key saved to {}",
        "✓".green().bold(),
        store.path().display()
    );
    Ok(())
}

pub fn run_key_clear() -> Result<()> {
    let store = key_store()?;
    if store.clear()? {
        println!("{} Access key removed", "✓".green().bold());
    } else {
        println!("{}", "No stored access key.".dimmed());
    }
    Ok(())
}

pub fn run_key_show() -> Result<()> {
    let cfg = config::load();
    if cfg
        .auth
        .access_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty())
    {
        println!(
            "{} using an inline key (PULSE_ACCESS_KEY or auth.access_key)",
            "✓".green().bold()
        );
        return Ok(());
    }

    let store = key_store()?;
    if store.path().exists() {
        println!(
            "{} using the key stored in {}",
            "✓".green().bold(),
            store.path().display()
        );
    } else {
        println!(
            "{} no access key configured; requests are sent without one",
            "·".dimmed()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// pulse config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective pulse Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.nginxpulse/config.toml", global_exists);
    print_source(".nginxpulse.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "PULSE_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.nginxpulse/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// pulse history
// ---------------------------------------------------------------------------

/// Summarize the request log, optionally limited to the last `days` days.
pub fn run_history(days: Option<u32>, format: OutputFormat) -> Result<()> {
    let Some(log_path) = config::load().logging.log_path() else {
        println!("{}", "Request logging has no path configured.".yellow());
        return Ok(());
    };
    let entries = RequestLog::new(log_path).read_since_days(days);
    let summary = report::summarize(&entries);

    if summary.total_requests == 0 {
        println!(
            "{}",
            "No requests logged yet. Run a query to populate the history.".yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_history_json(&summary),
        OutputFormat::Table => {
            print_history_table(&summary);
            Ok(())
        }
    }
}

fn print_history_table(summary: &HistorySummary) {
    print_header("Request History");
    println!(
        "  {} {}",
        "Requests:   ".bold(),
        format_number(summary.total_requests as u64)
    );
    println!(
        "  {} {} ({:.1}%)",
        "Failures:   ".bold(),
        summary.failures,
        summary.failure_pct()
    );
    println!("  {} {:.0}ms", "Avg latency:".bold(), summary.avg_latency_ms);
    println!();

    println!(
        "  {:<28} {:>6} {:>8} {:>5} {:>8} {:>8}",
        "Endpoint", "Count", "Fail %", "401", "Avg ms", "Max ms"
    );
    println!("  {}", "-".repeat(68));
    for (i, stat) in summary.endpoints.iter().enumerate() {
        let line = format!(
            "  {:<28} {:>6} {:>7.1}% {:>5} {:>8.0} {:>8}",
            truncate(&stat.endpoint, 28),
            stat.count,
            stat.failure_pct(),
            stat.unauthorized,
            stat.avg_latency_ms,
            stat.max_latency_ms,
        );
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn print_history_json(summary: &HistorySummary) -> Result<()> {
    let value = serde_json::json!({
        "total_requests": summary.total_requests,
        "failures": summary.failures,
        "failure_pct": summary.failure_pct(),
        "avg_latency_ms": summary.avg_latency_ms,
        "endpoints": summary.endpoints.iter().map(|e| serde_json::json!({
            "endpoint": e.endpoint,
            "count": e.count,
            "failures": e.failures,
            "unauthorized": e.unauthorized,
            "avg_latency_ms": e.avg_latency_ms,
            "max_latency_ms": e.max_latency_ms,
        })).collect::<Vec<_>>(),
    });
    print_json(&value)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Format a number with comma separators for readability.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    match seconds {
        0..=59 => format!("{seconds}s"),
        60..=3599 => format!("{}m {:02}s", seconds / 60, seconds % 60),
        _ => format!("{}h {:02}m", seconds / 3600, (seconds % 3600) / 60),
    }
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(-3), "0s");
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 05s");
        assert_eq!(format_duration(3720), "1h 02m");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("/页面/统计", 3), "/页…");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str_opt(Some("csv")),
            OutputFormat::Table
        );
    }
}
