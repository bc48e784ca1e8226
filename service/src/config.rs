use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

/// Default number of undelivered events kept per thread.
pub const DEFAULT_SSE_BUFFER_SIZE: usize = 1024;

/// Default idle time (3 hours) after which an unused thread is evicted.
pub const DEFAULT_SSE_IDLE_TTL_SECS: u64 = 3 * 60 * 60;

/// Default period (24 hours) between two idle-thread sweeps.
pub const DEFAULT_SSE_CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Maximum number of undelivered events buffered per thread. When a thread's
    /// buffer is full the oldest event is dropped. 0 selects the default.
    #[arg(long, env, default_value_t = DEFAULT_SSE_BUFFER_SIZE)]
    pub sse_buffer_size: usize,

    /// Seconds a thread may stay without a connection and without pending events
    /// before it is evicted.
    #[arg(long, env, default_value_t = DEFAULT_SSE_IDLE_TTL_SECS)]
    pub sse_idle_ttl_secs: u64,

    /// Seconds between two sweeps for idle threads.
    #[arg(long, env, default_value_t = DEFAULT_SSE_CLEANUP_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub sse_cleanup_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    /// The `host:port` address the server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.interface(), self.port)
    }

    pub fn sse_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.sse_idle_ttl_secs)
    }

    pub fn sse_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.sse_cleanup_interval_secs)
    }
}
