use docket_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = docket_api::setup::initialize_app(config.clone()).await?;

    docket_api::setup::server::start_server(&config, router).await?;

    state.shutdown_workers().await;
    Ok(())
}
