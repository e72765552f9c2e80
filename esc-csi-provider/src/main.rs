use anyhow::Result;
use dotenvy::dotenv;
use envconfig::Envconfig;
use esc_csi_domain::telemetry::{get_subscriber, init_subscriber};
use esc_csi_provider::{config::ProviderConfig, server::Server};
use tracing::info;

fn main() -> Result<()> {
    dotenv().ok();
    let config = ProviderConfig::init_from_env()?;

    let subscriber = get_subscriber("esc-csi-provider", &config.log_level, std::io::stdout);
    init_subscriber(subscriber)?;

    info!("Starting provider with config:\n{config}");

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads.unwrap_or(num_cpus::get()))
        .enable_all()
        .build()?
        .block_on(async move {
            let server = Server::init(config).await?;

            server.run().await
        })
}
