//! Gateway binary: load configuration, wire the pipeline, serve.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use torii::{
    AuthorizationFilter, BreakerConfig, BreakerRegistry, Error, FilterChain, GatewayConfig,
    GatewayRouter, HttpBackend, Route, RouteTable, Server, TokenValidator, TrackingFilter,
};

#[derive(Parser)]
#[command(name = "torii", version, about = "Minimal edge gateway")]
struct Args {
    /// Path to the gateway configuration file.
    #[arg(long, env = "GATEWAY_CONFIG", default_value = "gateway.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let config = GatewayConfig::load(&args.config)?;
    let addr = config.listen_addr()?;

    let validator = TokenValidator::new(&config.jwt_secret)?;
    let chain = FilterChain::new()
        .stage(TrackingFilter::new(config.tracker.into()))
        .stage(AuthorizationFilter::new(validator));

    let routes = RouteTable::new(config.routes.into_iter().map(Route::from).collect())?;
    let breakers = BreakerRegistry::new(BreakerConfig::from(&config.breaker));

    let gateway = GatewayRouter::new(routes, chain, breakers, Arc::new(HttpBackend::new()));

    Server::bind(addr).serve(gateway).await
}
