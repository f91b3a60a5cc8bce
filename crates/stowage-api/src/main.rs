use stowage_api::setup;
use stowage_core::ServiceConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = ServiceConfig::from_env()?;

    let (state, router) = setup::initialize_app(config.clone()).await?;

    let sweeper = setup::start_sweeper(&state);

    let served = setup::server::start_server(&config, router).await;

    if let Some(handle) = sweeper {
        handle.stop().await;
    }

    served
}
