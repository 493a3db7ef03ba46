use anyhow::Context;
use clap::Parser;
use evagent::agent::Batcher;
use evagent::config::{AgentConfig, Command};
use evagent::perf::PerfCache;
use evagent::profilestorepb::profile_store_service_client::ProfileStoreServiceClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::codec::CompressionEncoding;
use tonic::transport::Endpoint;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    colog::init();

    let cfg = AgentConfig::parse();

    match cfg.command.clone().unwrap_or(Command::Run) {
        Command::Run => run(cfg).await,
        Command::Symbolize { pid, addrs } => symbolize(&cfg, pid, &addrs),
    }
}

async fn run(cfg: AgentConfig) -> anyhow::Result<()> {
    log::info!("Connecting to profile store at {}", cfg.store_address);
    let channel = Endpoint::from_shared(cfg.store_address.clone())
        .context("invalid profile store address")?
        .connect_lazy();

    let mut client = ProfileStoreServiceClient::new(channel);
    if cfg.store_gzip {
        client = client.send_compressed(CompressionEncoding::Gzip);
    }

    let batcher = Arc::new(Batcher::with_interval(
        Box::new(client),
        cfg.batch_interval(),
    ));

    let ctx = CancellationToken::new();
    let handle = tokio::spawn({
        let batcher = Arc::clone(&batcher);
        let ctx = ctx.clone();
        async move { batcher.run(ctx).await }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    log::info!("Shutting down");
    ctx.cancel();

    if let Err(e) = handle.await? {
        log::info!("Batcher exited: {}", e);
    }

    let report = batcher.report();
    log::info!(
        "Last batch sent at {:?}, error: {:?}, {} series dropped",
        report.last_batch_sent_at,
        report.last_batch_send_error.map(|e| e.message().to_string()),
        batcher.pending().await
    );
    Ok(())
}

fn symbolize(cfg: &AgentConfig, pid: u32, addrs: &[u64]) -> anyhow::Result<()> {
    let cache = PerfCache::new(cfg.perf_cache_options());
    let map = cache
        .cache_for_pid(pid)
        .with_context(|| format!("reading {}", cache.perf_map_path(pid).display()))?;

    for addr in addrs {
        match map.lookup(*addr) {
            Some(symbol) => println!("{:#x} {}", addr, symbol),
            None => println!("{:#x} ??", addr),
        }
    }
    Ok(())
}
