use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use pulse_query::api::{
    Dimension, LocationType, LogsQuery, NewVisitor, SessionsQuery, SortOrder, StatusClass,
    ViewType,
};

mod cli;

#[derive(Debug, Parser)]
#[command(name = "pulse")]
#[command(about = "Query NginxPulse access-log analytics from the terminal")]
struct App {
    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List tracked websites
    Websites,
    /// Show log ingestion status
    Status,
    /// Visitors and pageviews over time
    Timeseries {
        website_id: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Bucket granularity: hourly or daily
        #[arg(long, default_value = "hourly")]
        view: ViewType,
    },
    /// Headline counters for a period
    Overall {
        website_id: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Number of entry pages to include
        #[arg(long)]
        entry_limit: Option<u32>,
    },
    /// Ranked breakdown: url, referer, browser, os or device
    Top {
        dimension: Dimension,
        website_id: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Maximum rows (default: 10)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Visitors by location
    Location {
        website_id: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Granularity: domestic, global or city
        #[arg(long = "type", default_value = "global")]
        location_type: LocationType,
        /// Maximum rows (default: 99)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Session count, bounce rate and average duration
    SessionSummary {
        website_id: String,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Activity in the last few minutes
    Realtime {
        website_id: String,
        /// Window size in minutes
        #[arg(long, default_value = "30")]
        window: u32,
    },
    /// Search raw access-log entries
    Logs(LogsArgs),
    /// Search reconstructed visitor sessions
    Sessions(SessionsArgs),
    /// Manage the stored access key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// View and edit configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Summarize the local request log
    History {
        /// Only include the last N days
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Debug, Args)]
struct RangeArgs {
    /// Time range token: today, yesterday, week, last7days, month,
    /// last30days or a YYYY-MM-DD date
    #[arg(long = "range", default_value = "today")]
    time_range: String,
}

#[derive(Debug, Args)]
struct LogsArgs {
    website_id: String,
    #[arg(long, default_value = "1")]
    page: u32,
    #[arg(long, default_value = "20")]
    page_size: u32,
    #[arg(long, default_value = "timestamp")]
    sort_field: String,
    #[arg(long, default_value = "desc")]
    sort_order: SortOrder,
    /// Free-text filter
    #[arg(long)]
    filter: Option<String>,
    #[arg(long = "range")]
    time_range: Option<String>,
    /// 2xx, 3xx, 4xx or 5xx
    #[arg(long)]
    status_class: Option<StatusClass>,
    #[arg(long)]
    status_code: Option<String>,
    /// Hide requests from internal addresses
    #[arg(long)]
    exclude_internal: bool,
    #[arg(long)]
    ip: Option<String>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    end: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    url: Option<String>,
    /// Only requests counted as pageviews
    #[arg(long)]
    pageview_only: bool,
    /// all, new or returning
    #[arg(long)]
    new_visitor: Option<NewVisitor>,
    /// One row per IP
    #[arg(long)]
    distinct_ip: bool,
}

impl From<LogsArgs> for LogsQuery {
    fn from(args: LogsArgs) -> Self {
        Self {
            filter: args.filter,
            time_range: args.time_range,
            status_class: args.status_class,
            status_code: args.status_code,
            exclude_internal: args.exclude_internal,
            ip_filter: args.ip,
            time_start: args.start,
            time_end: args.end,
            location_filter: args.location,
            url_filter: args.url,
            pageview_only: args.pageview_only,
            new_visitor: args.new_visitor,
            distinct_ip: args.distinct_ip,
            ..LogsQuery::new(
                args.website_id,
                args.page,
                args.page_size,
                args.sort_field,
                args.sort_order,
            )
        }
    }
}

#[derive(Debug, Args)]
struct SessionsArgs {
    website_id: String,
    #[arg(long, default_value = "1")]
    page: u32,
    #[arg(long, default_value = "20")]
    page_size: u32,
    #[arg(long = "range")]
    time_range: Option<String>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    end: Option<String>,
    #[arg(long)]
    ip: Option<String>,
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    browser: Option<String>,
    #[arg(long)]
    os: Option<String>,
}

impl From<SessionsArgs> for SessionsQuery {
    fn from(args: SessionsArgs) -> Self {
        Self {
            time_range: args.time_range,
            time_start: args.start,
            time_end: args.end,
            ip_filter: args.ip,
            device_filter: args.device,
            browser_filter: args.browser,
            os_filter: args.os,
            ..SessionsQuery::new(args.website_id, args.page, args.page_size)
        }
    }
}

#[derive(Debug, Subcommand)]
enum KeyAction {
    /// Store an access key for subsequent requests
    Set { key: String },
    /// Remove the stored access key
    Clear,
    /// Show where the key comes from (never prints the key)
    Show,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default config file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `server.base_url`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();
    let fmt = cli::OutputFormat::from_str_opt(Some(app.format.as_str()));

    match app.command {
        Commands::Websites => cli::run_websites(fmt),
        Commands::Status => cli::run_status(fmt),
        Commands::Timeseries {
            website_id,
            range,
            view,
        } => cli::run_timeseries(&website_id, &range.time_range, view, fmt),
        Commands::Overall {
            website_id,
            range,
            entry_limit,
        } => cli::run_overall(&website_id, &range.time_range, entry_limit, fmt),
        Commands::Top {
            dimension,
            website_id,
            range,
            limit,
        } => cli::run_top(dimension, &website_id, &range.time_range, limit, fmt),
        Commands::Location {
            website_id,
            range,
            location_type,
            limit,
        } => cli::run_location(&website_id, &range.time_range, location_type, limit, fmt),
        Commands::SessionSummary { website_id, range } => {
            cli::run_session_summary(&website_id, &range.time_range, fmt)
        }
        Commands::Realtime { website_id, window } => cli::run_realtime(&website_id, window, fmt),
        Commands::Logs(args) => cli::run_logs(&args.into(), fmt),
        Commands::Sessions(args) => cli::run_sessions(&args.into(), fmt),
        Commands::Key { action } => match action {
            KeyAction::Set { key } => cli::run_key_set(&key),
            KeyAction::Clear => cli::run_key_clear(),
            KeyAction::Show => cli::run_key_show(),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
        Commands::History { days } => cli::run_history(days, fmt),
    }
}
