use log::info;
use svcregistry::{config::Config, error::Result, registry::service::RegistryService};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    let server = RegistryService::new(config.clone()).bind().await?;
    info!(
        "Registry discoverable on {}:{}",
        config.multicast_group, config.discovery_port
    );

    server.run().await
}
