use clap::Parser;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Runs a loopback demo of Maekawa's distributed mutual exclusion: `--peers`
/// tasks each bind a TCP port, dial every other peer, and repeatedly contend
/// for a shared critical section through quorum voting.
#[derive(Parser, Debug)]
#[command(version, author, about)]
pub struct Opts {
    /// Number of peers in the system.
    #[arg(short = 'n', long, default_value_t = 4, env = "MAEKAWA_PEERS")]
    pub peers: u32,

    /// TCP port peer 0 listens on; peer i listens on base-port + i.
    #[arg(long, default_value_t = 9000, env = "MAEKAWA_BASE_PORT")]
    pub base_port: u16,

    /// Number of request/critical-section/release cycles each peer runs
    /// before the process exits.
    #[arg(short = 'i', long = "iterations", default_value_t = 3, env = "MAEKAWA_ITERATIONS")]
    pub iterations: u32,

    /// The default console log level, used when RUST_LOG is not set.
    #[arg(value_enum, short = 'v', long = "log-level", env = "MAEKAWA_LOG_LEVEL_CONSOLE")]
    pub log_level: Option<LogLevel>,
}
