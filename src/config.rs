use crate::agent::DEFAULT_BATCH_INTERVAL;
use crate::perf::PerfCacheOptions;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "evagent", about = "Batches profiles for the profile store")]
pub struct AgentConfig {
    /// gRPC address of the profile store.
    #[arg(long, env = "EVAGENT_STORE_ADDRESS", default_value = "http://[::1]:3333")]
    pub store_address: String,

    /// Seconds between batch flushes.
    #[arg(
        long,
        env = "EVAGENT_BATCH_INTERVAL",
        default_value_t = DEFAULT_BATCH_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub batch_interval_secs: u64,

    /// Compress WriteRaw requests with gzip.
    #[arg(long, env = "EVAGENT_STORE_GZIP")]
    pub store_gzip: bool,

    /// Directory holding perf-<pid>.map files.
    #[arg(long, env = "EVAGENT_PERF_MAP_DIR", default_value = "/tmp")]
    pub perf_map_dir: PathBuf,

    /// Maximum number of pids whose perf maps are cached.
    #[arg(long, default_value_t = 10_000)]
    pub perf_cache_capacity: u64,

    /// Perf maps larger than this many bytes are refused.
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    pub perf_map_max_size: u64,

    /// Demangle C++ and Rust symbols found in perf maps.
    #[arg(long, global = true)]
    pub demangle: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the batcher until interrupted (the default).
    Run,
    /// Resolve addresses against the perf map of a process.
    Symbolize {
        #[arg(long)]
        pid: u32,
        /// Hex addresses, with or without a 0x prefix.
        #[arg(required = true, value_parser = parse_addr)]
        addrs: Vec<u64>,
    },
}

fn parse_addr(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid address {:?}: {}", s, e))
}

impl AgentConfig {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }

    pub fn perf_cache_options(&self) -> PerfCacheOptions {
        PerfCacheOptions {
            perf_map_dir: self.perf_map_dir.clone(),
            capacity: self.perf_cache_capacity,
            max_size: self.perf_map_max_size,
            demangle: self.demangle,
        }
    }
}
