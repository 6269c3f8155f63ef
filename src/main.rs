use anyhow::Context;
use nonzero_ext::nonzero;
use okx_rest::core::kernel::{EndpointLimit, GateConfig};
use okx_rest::{CallContext, Dispatch, Dispatcher, OkxConfig, OkxRest};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Credentials are optional; public endpoints work without them
    let config = OkxConfig::from_env("OKX").context("Failed to load OKX config")?;
    let has_credentials = config.has_credentials();

    // public/time allows 10 requests per 2 seconds
    let gate = GateConfig::default().with_endpoint(
        "GET /api/v5/public/time",
        EndpointLimit {
            max_in_flight: 2,
            per_second: Some(nonzero!(5u32)),
        },
    );
    let dispatcher = Dispatcher::builder(config)
        .with_gate_config(gate)
        .build()
        .context("Failed to build dispatcher")?;
    let okx = OkxRest::new(dispatcher);

    let ctx = CallContext::new().with_timeout(Duration::from_secs(10));

    let ts = okx.get_system_time(&ctx).await?;
    info!(ts, "server time");

    let ticker = okx.get_ticker(&ctx, "BTC-USDT").await?;
    println!("BTC-USDT last: {} (bid {}, ask {})", ticker.last, ticker.bid_px, ticker.ask_px);

    if has_credentials {
        match okx.get_balance(&ctx, Some("USDT")).await {
            Ok(account) => println!("Total equity: {}", account.total_eq),
            Err(e) => println!("Error fetching balance: {}", e),
        }
    }

    let stats = okx.dispatcher().stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
