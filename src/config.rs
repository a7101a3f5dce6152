use std::{fs::read_to_string, str::FromStr};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

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
    #[serde(default)]
    pub level: LogLevel,
}

/// The profile a synthetic packet stream exercises (§6a).
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StreamProfile {
    IpOnly,
    Udp,
    UdpLite,
    Rtp,
    Esp,
    Uncompressed,
}

impl Default for StreamProfile {
    fn default() -> Self {
        Self::IpOnly
    }
}

/// A synthetic flow fed through the compressor (§6a "demo harness
/// surface"): `packets` identical-shaped packets, with the IP-ID (and, for
/// RTP, SN/TS) stepping by one each time.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Stream {
    #[serde(default)]
    pub profile: StreamProfile,
    #[serde(default = "Stream::packets")]
    pub packets: u32,
    #[serde(default = "Stream::rtp_port")]
    pub rtp_port: u16,
}

impl Stream {
    fn packets() -> u32 {
        100
    }

    fn rtp_port() -> u16 {
        5004
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self {
            profile: StreamProfile::default(),
            packets: Self::packets(),
            rtp_port: Self::rtp_port(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub stream: Stream,
    #[serde(default = "Config::max_cid")]
    pub max_cid: u16,
    #[serde(default)]
    pub mrru: usize,
}

impl Config {
    fn max_cid() -> u16 {
        15
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: Log::default(),
            stream: Stream::default(),
            max_cid: Self::max_cid(),
            mrru: 0,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
struct Cli {
    /// Specify the configuration file path; defaults built in if absent.
    #[arg(long, short)]
    config: Option<String>,
}

impl Config {
    /// Loads from the `--config` file if given, falling back to defaults
    /// (mirrors the `Cli::parse().config` read-then-parse pattern).
    pub fn load() -> Result<Self> {
        match Cli::parse().config {
            Some(path) => Ok(serde_json5::from_str(&read_to_string(path)?)?),
            None => Ok(Self::default()),
        }
    }
}
