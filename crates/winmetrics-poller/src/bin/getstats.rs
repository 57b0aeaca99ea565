//! Polls a `/debug/vars` endpoint and prints collectd `PUTVAL` lines for
//! the HTTP endpoint, RPC and process memory stats it publishes.

use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use winmetrics_poller::{CollectdRecorder, Error, Poller};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// instance name appended to the plugin name
    #[arg(short, long)]
    instance: Option<String>,

    /// hostname to report under
    #[arg(long, env = "HOSTNAME", default_value = "localhost")]
    host: String,

    /// snapshot URL to poll
    #[arg(short, long, default_value = "http://127.0.0.1:9000/debug/vars")]
    url: String,

    /// poll interval in seconds
    #[arg(short, long, default_value_t = 10)]
    watch: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let watch = args.watch.max(1);
    info!(url = %args.url, watch, "getstats polling");

    let mut poller = Poller::new(args.url);
    let mut rec = CollectdRecorder::new(std::io::stdout(), args.host, args.instance, watch);
    let mut ticker = tokio::time::interval(Duration::from_secs(watch));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = poller.fetch().await {
            warn!(error = %e, url = %poller.base_url(), "fetch failed");
            continue;
        }
        if let Err(e) = poller.http_stats(&mut rec) {
            warn!(error = %e, "http stats skipped");
        }
        if let Err(e) = poller.rpc_stats(&mut rec) {
            warn!(error = %e, "rpc stats skipped");
        }
        if let Err(e) = poller.mem_stats(&mut rec) {
            warn!(error = %e, "memstats skipped");
        }
    }

    info!("getstats stopped");
    Ok(())
}
