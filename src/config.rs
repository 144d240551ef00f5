use std::{fs::read_to_string, net::SocketAddr, str::FromStr};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Proxy {
    ///
    /// proxy listen address
    ///
    /// The address and port the UDP server is bound to. Clients and
    /// origin servers both talk to this one socket; the binding address
    /// should be reachable from both sides.
    ///
    #[serde(default = "Proxy::listen")]
    pub listen: SocketAddr,
    ///
    /// Capacity of the outbound scratch buffer in bytes.
    ///
    /// One rewritten request is built at a time. A request whose
    /// rewritten form does not fit is answered 4.02.
    ///
    #[serde(default = "Proxy::pdu_buffer_size")]
    pub pdu_buffer_size: usize,
    ///
    /// Number of concurrent in-flight proxied requests.
    ///
    /// When every slot is taken, further requests are answered 5.00
    /// until an exchange completes. Fixed at startup, no dynamic growth.
    ///
    #[serde(default = "Proxy::max_requests_waiting")]
    pub max_requests_waiting: usize,
    ///
    /// Seconds before an unanswered upstream request is dropped.
    ///
    /// The default matches MAX_TRANSMIT_WAIT of RFC 7252. The client
    /// gets no response for a dropped exchange and is expected to
    /// retransmit.
    ///
    #[serde(default = "Proxy::request_timeout")]
    pub request_timeout: u64,
    ///
    /// Registered network interface ids.
    ///
    /// A zone-id in a Proxy-Uri must name one of these ids. When exactly
    /// one id is registered it is selected implicitly for zone-less
    /// URIs; link-local origins are rejected otherwise.
    ///
    #[serde(default)]
    pub interfaces: Vec<u32>,
}

impl Proxy {
    fn listen() -> SocketAddr {
        "[::]:5683".parse().unwrap()
    }

    fn pdu_buffer_size() -> usize {
        1024
    }

    fn max_requests_waiting() -> usize {
        16
    }

    fn request_timeout() -> u64 {
        93
    }
}

impl Default for Proxy {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
            pdu_buffer_size: Self::pdu_buffer_size(),
            max_requests_waiting: Self::max_requests_waiting(),
            request_timeout: Self::request_timeout(),
            interfaces: Default::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Cache {
    ///
    /// response cache switch
    ///
    /// When disabled, every cache interaction is elided and origin
    /// responses are relayed verbatim.
    ///
    #[serde(default = "Cache::enabled")]
    pub enabled: bool,
    ///
    /// Maximum number of cached responses.
    ///
    /// When the cache is full, the entry closest to its freshness
    /// deadline is evicted.
    ///
    #[serde(default = "Cache::capacity")]
    pub capacity: usize,
}

impl Cache {
    fn enabled() -> bool {
        true
    }

    fn capacity() -> usize {
        16
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            enabled: Self::enabled(),
            capacity: Self::capacity(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    ///
    /// log level
    ///
    /// An enum representing the available verbosity levels of the logger.
    ///
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub proxy: Proxy,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub log: Log,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    ///
    /// Specify the configuration file path
    ///
    /// Example: coap-proxy --config /etc/coap-proxy/config.toml
    ///
    #[arg(long, short)]
    config: Option<String>,
}

impl Config {
    ///
    /// Load configure from config file and command line parameters.
    ///
    /// Load command line parameters, if the configuration file path is
    /// specified, the configuration is read from the configuration file,
    /// otherwise the default configuration is used.
    ///
    pub fn load() -> Result<Self> {
        Ok(match Cli::parse().config {
            Some(path) => toml::from_str(&read_to_string(&path)?)?,
            None => Self::default(),
        })
    }
}
