use clap::{Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use stock_core::cache::TtlPolicy;
use stock_core::provider::yahoo::{DEFAULT_COOKIE_URL, DEFAULT_QUERY_URL, YahooConfig};
use stock_core::retry::RetryPolicy;
use stock_schema::schema::DataKind;

const DEFAULT_BIND_HOST: &str = "0.0.0.0";
const DEFAULT_MCP_PORT: u16 = 3001;
const DEFAULT_API_PORT: u16 = 8001;
const DEFAULT_ERROR_TTL_SECS: u64 = 10;
const DEFAULT_SWEEP_SECS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_API_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Parser, Debug)]
#[command(name = "stock-mcpd", version, about = "Stock market data MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "STOCK_BIND_HOST", default_value = DEFAULT_BIND_HOST)]
    bind_host: IpAddr,

    #[arg(long, env = "MCP_PORT", default_value_t = DEFAULT_MCP_PORT)]
    mcp_port: u16,

    #[arg(long, env = "API_PORT", default_value_t = DEFAULT_API_PORT)]
    api_port: u16,

    #[arg(
        long = "stdio",
        env = "STOCK_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "STOCK_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(
        long,
        env = "STOCK_API_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    api_serve: bool,

    #[arg(
        long,
        env = "STOCK_MCP_STATEFUL",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    mcp_stateful: bool,

    #[arg(long, env = "STOCK_API_MAX_BODY_BYTES", default_value_t = DEFAULT_API_MAX_BODY_BYTES)]
    api_max_body_bytes: usize,

    #[arg(long, env = "STOCK_TTL_PROFILE_SECS")]
    ttl_profile_secs: Option<u64>,

    #[arg(long, env = "STOCK_TTL_STATEMENT_SECS")]
    ttl_statement_secs: Option<u64>,

    #[arg(long, env = "STOCK_TTL_HISTORY_SECS")]
    ttl_history_secs: Option<u64>,

    /// Applies to recommendations, price targets and revisions.
    #[arg(long, env = "STOCK_TTL_ANALYST_SECS")]
    ttl_analyst_secs: Option<u64>,

    /// Applies to corporate actions and the earnings calendar.
    #[arg(long, env = "STOCK_TTL_EVENTS_SECS")]
    ttl_events_secs: Option<u64>,

    #[arg(long, env = "STOCK_TTL_NEWS_SECS")]
    ttl_news_secs: Option<u64>,

    #[arg(long, env = "STOCK_TTL_SECTOR_SECS")]
    ttl_sector_secs: Option<u64>,

    #[arg(long, env = "STOCK_ERROR_TTL_SECS", default_value_t = DEFAULT_ERROR_TTL_SECS)]
    error_ttl_secs: u64,

    #[arg(long, env = "STOCK_CACHE_SWEEP_SECS", default_value_t = DEFAULT_SWEEP_SECS)]
    cache_sweep_secs: u64,

    #[arg(long, env = "STOCK_RETRY_ATTEMPTS", default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    retry_attempts: u32,

    #[arg(long, env = "STOCK_RETRY_BACKOFF_MS", default_value_t = DEFAULT_RETRY_BACKOFF_MS)]
    retry_backoff_ms: u64,

    #[arg(
        long,
        env = "STOCK_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    #[arg(long, env = "YAHOO_QUERY_URL", default_value = DEFAULT_QUERY_URL)]
    yahoo_query_url: String,

    #[arg(long, env = "YAHOO_COOKIE_URL", default_value = DEFAULT_COOKIE_URL)]
    yahoo_cookie_url: String,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct StockConfig {
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub api_serve: bool,
    pub mcp_stateful: bool,
    pub mcp_addr: SocketAddr,
    pub api_addr: SocketAddr,
    pub api_max_body_bytes: usize,
    pub ttl: TtlPolicy,
    pub sweep_interval: Duration,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub yahoo: YahooConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
    NothingToServe,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
            Self::NothingToServe => write!(
                f,
                "no transport enabled; set STOCK_MCP_SERVE, STOCK_API_SERVE or STOCK_ENABLE_STDIO"
            ),
        }
    }
}

impl Error for ConfigError {}

impl StockConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for StockConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !(args.enable_stdio || args.mcp_serve || args.api_serve) {
            return Err(ConfigError::NothingToServe);
        }
        if args.mcp_serve && args.api_serve && args.mcp_port == args.api_port {
            return Err(ConfigError::InvalidSetting {
                name: "API_PORT",
                value: format!("{} (same as MCP_PORT)", args.api_port),
            });
        }

        let sweep_interval = positive_secs("STOCK_CACHE_SWEEP_SECS", args.cache_sweep_secs)?;
        let request_timeout =
            positive_secs("STOCK_REQUEST_TIMEOUT_SECS", args.request_timeout_secs)?;
        if args.retry_attempts == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "STOCK_RETRY_ATTEMPTS",
                value: args.retry_attempts.to_string(),
            });
        }
        let retry = RetryPolicy::new(args.retry_attempts)
            .with_initial_backoff(Duration::from_millis(args.retry_backoff_ms));

        let ttl = ttl_policy(&args);
        let yahoo = YahooConfig {
            query_url: base_url("YAHOO_QUERY_URL", args.yahoo_query_url)?,
            cookie_url: base_url("YAHOO_COOKIE_URL", args.yahoo_cookie_url)?,
        };

        Ok(Self {
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            api_serve: args.api_serve,
            mcp_stateful: args.mcp_stateful,
            mcp_addr: SocketAddr::new(args.bind_host, args.mcp_port),
            api_addr: SocketAddr::new(args.bind_host, args.api_port),
            api_max_body_bytes: args.api_max_body_bytes,
            ttl,
            sweep_interval,
            retry,
            request_timeout,
            yahoo,
        })
    }
}

fn ttl_policy(args: &CliArgs) -> TtlPolicy {
    let overrides = [
        (DataKind::Profile, args.ttl_profile_secs),
        (DataKind::Statement, args.ttl_statement_secs),
        (DataKind::History, args.ttl_history_secs),
        (DataKind::Recommendations, args.ttl_analyst_secs),
        (DataKind::PriceTargets, args.ttl_analyst_secs),
        (DataKind::Revisions, args.ttl_analyst_secs),
        (DataKind::CorporateActions, args.ttl_events_secs),
        (DataKind::Calendar, args.ttl_events_secs),
        (DataKind::News, args.ttl_news_secs),
        (DataKind::SectorTop, args.ttl_sector_secs),
    ];
    overrides
        .into_iter()
        .filter_map(|(kind, secs)| secs.map(|secs| (kind, Duration::from_secs(secs))))
        .fold(
            TtlPolicy::default().with_error_ttl(Duration::from_secs(args.error_ttl_secs)),
            |policy, (kind, ttl)| policy.with_kind_ttl(kind, ttl),
        )
}

fn positive_secs(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidSetting {
            name,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn base_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidSetting { name, value })
    }
}
