//! Coding service: answers one Shannon-Fano-Elias request per connection
//! until interrupted.

use sfe_app::config::ServerConfig;
use sfe_core::CodingService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = ServerConfig::from_args(&args).map_err(anyhow::Error::msg)?;

    sfe_app::init_logging(config.log_level);
    if config.print_config {
        config.print();
    }

    let service = CodingService::bind(config.service_config()).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
    };

    let metrics = service.run_until(shutdown).await?;
    tracing::info!(
        served = metrics.served,
        failed = metrics.failed,
        "exiting"
    );

    Ok(())
}
